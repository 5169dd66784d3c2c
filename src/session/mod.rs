//! Sessions: the entry point for every knowledge-base operation.
//!
//! A [`Session`] owns a transport (one kept open for its lifetime, or one
//! opened per call), the bookkeeping identity attached to mutations, and four
//! result caches. It shares a [`Registry`] with every other session so that all
//! of them hand out the same canonical entities.
//!
//! Replies go through typed dispatch (`converse_*`). Object and list replies are
//! completed before they are returned: id-only entities from the binary
//! encoding are resolved and every entity is swapped for its canonical
//! instance.
//!
//! ```ignore
//! let session = Session::open(SessionConfig::default(), connector, Registry::shared())?;
//! let dog = session.constant_by_name("Dog")?.expect("Dog exists");
//! assert!(session.is_collection_cached(&dog.into())?);
//! ```

mod complete;
mod mutate;
mod query;
mod resolve;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::cache::QueryCaches;
use crate::config::SessionConfig;
use crate::error::{AccessResult, KbError, ProtocolError, TransportError};
use crate::registry::Registry;
use crate::term::{Constant, FormulaList, Value};
use crate::transport::{Command, Connector, Reply, TraceLevel, Transport};
use crate::well_known::WellKnown;

/// Author and project attached to mutations for provenance.
#[derive(Debug, Clone, Default)]
pub(crate) struct Bookkeeping {
    pub cyclist: Option<Arc<Constant>>,
    pub project: Option<Arc<Constant>>,
}

/// A client session with the knowledge-base server.
pub struct Session {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<Registry>,
    /// The open transport of a persistent session; `None` once closed.
    transport: Mutex<Option<Box<dyn Transport>>>,
    /// Trace level carried across the per-call transports of a transient session.
    saved_trace: Mutex<TraceLevel>,
    closed: AtomicBool,
    bookkeeping: RwLock<Bookkeeping>,
    caches: QueryCaches,
    /// Serializes `kill` and constant creation.
    mutation_lock: Mutex<()>,
}

impl Session {
    /// Open a session.
    ///
    /// Validates the configuration, opens the transport when the session is
    /// persistent, and resolves the bootstrap constants unless disabled.
    pub fn open(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        registry: Arc<Registry>,
    ) -> AccessResult<Self> {
        config.validate()?;

        let transport = if config.persistent {
            Some(connector.open(&config)?)
        } else {
            None
        };

        let session = Self {
            caches: QueryCaches::new(config.cache_capacity),
            config,
            connector,
            registry,
            transport: Mutex::new(transport),
            saved_trace: Mutex::new(TraceLevel::None),
            closed: AtomicBool::new(false),
            bookkeeping: RwLock::new(Bookkeeping::default()),
            mutation_lock: Mutex::new(()),
        };

        tracing::info!(
            host = %session.config.host,
            port = session.config.port,
            encoding = %session.config.encoding,
            persistent = session.config.persistent,
            "opened knowledge-base session"
        );

        if session.config.bootstrap {
            session.bootstrap()?;
        }
        Ok(session)
    }

    /// Resolve the bootstrap constants into the registry's well-known slots.
    /// Slots that are already filled are left alone.
    fn bootstrap(&self) -> AccessResult<()> {
        let mut fetched = 0usize;
        for which in WellKnown::BOOTSTRAP {
            if self.registry.well_known(which).is_none() {
                let constant = self.known_constant_by_guid(&which.guid())?;
                self.registry.set_well_known(which, constant);
                fetched += 1;
            }
        }
        tracing::info!(fetched, "well-known constants bootstrapped");
        Ok(())
    }

    /// A well-known constant, resolved on first use.
    pub fn well_known(&self, which: WellKnown) -> AccessResult<Arc<Constant>> {
        if let Some(constant) = self.registry.well_known(which) {
            return Ok(constant);
        }
        let constant = self.known_constant_by_guid(&which.guid())?;
        Ok(self.registry.set_well_known(which, constant))
    }

    /// Close the session.
    ///
    /// A transport relayed by a remote proxy is told the session is ending
    /// first; a failure to deliver that notice is logged and ignored.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(mut transport) = self.transport.lock().take() {
            if transport.is_remote_proxy() {
                let notice = Command::from("(end-cyc-access)");
                match transport.send(&notice) {
                    Ok(Reply::Success(_)) => {}
                    Ok(Reply::Failure(message)) => {
                        tracing::warn!(%message, "server rejected end-of-session notice");
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to send end-of-session notice"),
                }
            }
            transport.close();
        }
        tracing::info!(host = %self.config.host, port = self.config.port, "closed knowledge-base session");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn caches(&self) -> &QueryCaches {
        &self.caches
    }

    /// Drop every memoized query result of this session.
    pub fn clear_result_caches(&self) {
        self.caches.clear();
        tracing::debug!("result caches cleared");
    }

    // -----------------------------------------------------------------------
    // Trace control
    // -----------------------------------------------------------------------

    pub fn trace_on(&self) {
        self.set_trace(TraceLevel::Messages);
    }

    pub fn trace_on_detailed(&self) {
        self.set_trace(TraceLevel::Detailed);
    }

    pub fn trace_off(&self) {
        self.set_trace(TraceLevel::None);
    }

    pub fn trace_level(&self) -> TraceLevel {
        if let Some(transport) = self.transport.lock().as_ref() {
            return transport.trace_level();
        }
        *self.saved_trace.lock()
    }

    fn set_trace(&self, level: TraceLevel) {
        if let Some(transport) = self.transport.lock().as_mut() {
            transport.set_trace_level(level);
        }
        *self.saved_trace.lock() = level;
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Send one command and return the raw reply.
    ///
    /// A transient session opens a transport for this call alone, hands it the
    /// saved trace level and reads the level back before closing it.
    pub fn converse(&self, command: impl Into<Command>) -> AccessResult<Reply> {
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }
        let command = command.into();
        tracing::debug!(%command, "dispatch");

        let reply = if self.config.persistent {
            let mut guard = self.transport.lock();
            let transport = guard.as_mut().ok_or(TransportError::Closed)?;
            transport.send(&command)?
        } else {
            let mut transport = self.connector.open(&self.config)?;
            transport.set_trace_level(*self.saved_trace.lock());
            let reply = transport.send(&command);
            *self.saved_trace.lock() = transport.trace_level();
            transport.close();
            reply?
        };

        tracing::trace!(?reply, "reply");
        Ok(reply)
    }

    /// Any value; entities in it are completed and canonical.
    pub fn converse_object(&self, command: impl Into<Command>) -> AccessResult<Value> {
        let value = self.converse_success(command.into())?.1;
        self.complete(value)
    }

    /// A list; `NIL` is the empty list. Entities are completed and canonical.
    pub fn converse_list(&self, command: impl Into<Command>) -> AccessResult<FormulaList> {
        let (command, value) = self.converse_success(command.into())?;
        match value {
            Value::List(list) => self.complete_list(list),
            v if v.is_nil() => Ok(FormulaList::new()),
            other => Err(shape_error("list", &other, &command)),
        }
    }

    /// A string. Any other reply is a protocol error.
    pub fn converse_string(&self, command: impl Into<Command>) -> AccessResult<String> {
        let (command, value) = self.converse_success(command.into())?;
        match value {
            Value::String(s) => Ok(s),
            other => Err(shape_error("string", &other, &command)),
        }
    }

    /// `T` is true; every other reply is false.
    pub fn converse_bool(&self, command: impl Into<Command>) -> AccessResult<bool> {
        let (_, value) = self.converse_success(command.into())?;
        Ok(matches!(value, Value::Symbol(ref s) if s.is_true()))
    }

    pub fn converse_int(&self, command: impl Into<Command>) -> AccessResult<i64> {
        let (command, value) = self.converse_success(command.into())?;
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(shape_error("integer", &other, &command)),
        }
    }

    /// Discard the value; only a server failure is reported.
    pub fn converse_void(&self, command: impl Into<Command>) -> AccessResult<()> {
        self.converse_success(command.into()).map(|_| ())
    }

    fn converse_success(&self, command: Command) -> AccessResult<(Command, Value)> {
        match self.converse(command.clone())? {
            Reply::Success(value) => Ok((command, value)),
            Reply::Failure(message) => {
                tracing::debug!(%command, %message, "server reported failure");
                Err(KbError::Server { message }.into())
            }
        }
    }

    pub(crate) fn bookkeeping(&self) -> Bookkeeping {
        self.bookkeeping.read().clone()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("encoding", &self.config.encoding)
            .field("persistent", &self.config.persistent)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn shape_error(expected: &'static str, actual: &Value, command: &Command) -> crate::error::AccessError {
    ProtocolError::Shape {
        expected,
        actual: format!("({}) {actual}", actual.kind_name()),
        command: command.to_string(),
    }
    .into()
}

/// An internal id as a command argument. The server's integers are signed, so
/// ids past `i64::MAX` cannot name anything it holds.
pub(crate) fn id_arg(id: u64, lookup: &str) -> AccessResult<Value> {
    Value::try_from(id).map_err(|_| {
        ProtocolError::Shape {
            expected: "internal id within the server's integer range",
            actual: format!("(integer) {id}"),
            command: format!("({lookup} {id})"),
        }
        .into()
    })
}
