//! In-process fake knowledge base for integration tests.
//!
//! `FakeKb` understands the handful of commands the access layer issues for
//! resolution, completion and mutation, answers in either encoding, and counts
//! round trips and opened connections. Anything else is looked up in a table
//! of scripted replies, and unknown commands fail like a real server would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use parking_lot::Mutex;

use cyc_access::config::SessionConfig;
use cyc_access::error::TransportError;
use cyc_access::registry::Registry;
use cyc_access::session::Session;
use cyc_access::term::{Assertion, Constant, FormulaList, Guid, Nart, Value, Variable};
use cyc_access::transport::{Command, Connector, Encoding, Reply, TraceLevel, Transport};
use cyc_access::well_known::WellKnown;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct KbConstant {
    pub name: String,
    pub id: u64,
    pub guid: Guid,
}

/// A reference inside a stored formula.
#[derive(Debug, Clone)]
pub enum Ref {
    Constant(u64),
    Nart(u64),
    Assertion(u64),
    Variable(u64),
    Text(&'static str),
}

#[derive(Default)]
pub struct KbState {
    pub constants: Vec<KbConstant>,
    pub narts: HashMap<u64, Vec<Ref>>,
    pub assertions: HashMap<u64, Vec<Ref>>,
    pub variables: HashMap<u64, String>,
    pub scripted: HashMap<String, Reply>,
    /// Replies for any command starting with the given text; first match wins.
    pub prefixed: Vec<(String, Reply)>,
    /// Command bodies of accepted `cyc-assert`s, without bookkeeping.
    pub asserted: Vec<String>,
    next_id: u64,
}

impl KbState {
    fn by_name(&self, name: &str) -> Option<&KbConstant> {
        self.constants.iter().find(|c| c.name == name)
    }

    fn by_id(&self, id: u64) -> Option<&KbConstant> {
        self.constants.iter().find(|c| c.id == id)
    }

    fn by_guid(&self, guid: &str) -> Option<&KbConstant> {
        self.constants.iter().find(|c| c.guid.to_string() == guid)
    }
}

pub fn guid(n: u64) -> Guid {
    Guid::parse(&format!("00000000-0000-0000-0000-{n:012}")).unwrap()
}

/// The fake server. Clone the `Arc` to keep a handle for assertions.
pub struct FakeKb {
    pub encoding: Encoding,
    pub remote_proxy: bool,
    pub state: Mutex<KbState>,
    pub round_trips: AtomicUsize,
    pub opens: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
    /// Trace level of the transport at the time of each send.
    pub traces: Mutex<Vec<TraceLevel>>,
    stall: Mutex<Option<Stall>>,
}

/// Holds the next command with a given prefix until the test releases it.
struct Stall {
    prefix: String,
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

/// Test-side ends of a stall: wait on `entered`, then send on `release`.
pub struct StallHandle {
    pub entered: mpsc::Receiver<()>,
    pub release: mpsc::Sender<()>,
}

impl FakeKb {
    /// A KB holding every well-known constant plus a small animal taxonomy:
    /// `Dog` (100), `Animal` (101), `FruitFn` (102), `AppleTree` (103),
    /// `Cat` (104), `Pet` (105), `Microtheory` (106). NART 500 is `(FruitFn AppleTree)`.
    pub fn new(encoding: Encoding) -> Arc<Self> {
        Self::build(encoding, false)
    }

    /// Like [`FakeKb::new`], but connections report a remote proxy.
    pub fn remote(encoding: Encoding) -> Arc<Self> {
        Self::build(encoding, true)
    }

    fn build(encoding: Encoding, remote_proxy: bool) -> Arc<Self> {
        let mut state = KbState {
            next_id: 1_000,
            ..Default::default()
        };
        for (i, which) in WellKnown::all().enumerate() {
            state.constants.push(KbConstant {
                name: which.name().to_string(),
                id: i as u64 + 1,
                guid: which.guid(),
            });
        }
        for (id, name) in [
            (100, "Dog"),
            (101, "Animal"),
            (102, "FruitFn"),
            (103, "AppleTree"),
            (104, "Cat"),
            (105, "Pet"),
            (106, "Microtheory"),
        ] {
            state.constants.push(KbConstant {
                name: name.to_string(),
                id,
                guid: guid(id),
            });
        }
        state
            .narts
            .insert(500, vec![Ref::Constant(102), Ref::Constant(103)]);
        state.variables.insert(7, "X".to_string());

        Arc::new(Self {
            encoding,
            remote_proxy,
            state: Mutex::new(state),
            round_trips: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            traces: Mutex::new(Vec::new()),
            stall: Mutex::new(None),
        })
    }

    pub fn script(&self, command: &str, reply: Reply) {
        self.state.lock().scripted.insert(command.to_string(), reply);
    }

    pub fn script_prefix(&self, prefix: &str, reply: Reply) {
        self.state.lock().prefixed.push((prefix.to_string(), reply));
    }

    /// Block the next command starting with `prefix` until released. The
    /// command is answered from the state as it is after the release.
    pub fn stall_on(&self, prefix: &str) -> StallHandle {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.stall.lock() = Some(Stall {
            prefix: prefix.to_string(),
            entered: entered_tx,
            release: release_rx,
        });
        StallHandle {
            entered: entered_rx,
            release: release_tx,
        }
    }

    fn hold_if_stalled(&self, text: &str) {
        let stall = {
            let mut slot = self.stall.lock();
            let hit = slot.as_ref().is_some_and(|s| text.starts_with(&s.prefix));
            if hit { slot.take() } else { None }
        };
        if let Some(stall) = stall {
            let _ = stall.entered.send(());
            let _ = stall.release.recv();
        }
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.round_trips.store(0, Ordering::SeqCst);
        self.opens.store(0, Ordering::SeqCst);
        self.sent.lock().clear();
        self.traces.lock().clear();
    }

    pub fn sent_matching(&self, prefix: &str) -> usize {
        self.sent.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn encode_constant(&self, c: &KbConstant) -> Value {
        match self.encoding {
            Encoding::Binary => Value::Constant(Constant::from_id(c.id)),
            Encoding::Textual => Value::Constant(Constant::new(c.name.clone(), c.id, c.guid)),
        }
    }

    fn encode_ref(&self, state: &KbState, r: &Ref) -> Value {
        match r {
            Ref::Constant(id) => match state.by_id(*id) {
                Some(c) => self.encode_constant(c),
                None => Value::nil(),
            },
            Ref::Nart(id) => match self.encoding {
                Encoding::Binary => Value::Nart(Nart::from_id(*id)),
                Encoding::Textual => {
                    let body: Vec<Value> = state.narts[id]
                        .iter()
                        .map(|r| self.encode_ref(state, r))
                        .collect();
                    let functor = body[0].as_fort().unwrap();
                    Value::Nart(Nart::new(functor, body[1..].to_vec(), Some(*id)))
                }
            },
            Ref::Assertion(id) => Value::Assertion(Assertion::from_id(*id)),
            Ref::Variable(id) => match self.encoding {
                Encoding::Binary => Value::Variable(Variable::from_id(*id)),
                Encoding::Textual => Value::Variable(Variable::named(state.variables[id].clone())),
            },
            Ref::Text(s) => Value::from(*s),
        }
    }

    /// The text form the client sends for a stored formula.
    fn render_refs(state: &KbState, refs: &[Ref]) -> String {
        let parts: Vec<String> = refs
            .iter()
            .map(|r| match r {
                Ref::Constant(id) => state
                    .by_id(*id)
                    .map(|c| format!("#${}", c.name))
                    .unwrap_or_default(),
                Ref::Nart(id) => state
                    .narts
                    .get(id)
                    .map(|body| Self::render_refs(state, body))
                    .unwrap_or_default(),
                Ref::Assertion(id) => format!("(find-assertion-by-id {id})"),
                Ref::Variable(id) => format!("?{}", state.variables[id]),
                Ref::Text(s) => Value::from(*s).to_string(),
            })
            .collect();
        format!("({})", parts.join(" "))
    }

    fn encode_formula(&self, state: &KbState, refs: &[Ref]) -> Value {
        Value::List(refs.iter().map(|r| self.encode_ref(state, r)).collect())
    }

    fn answer(&self, text: &str) -> Reply {
        let mut state = self.state.lock();
        if let Some(reply) = state.scripted.get(text) {
            return reply.clone();
        }
        if let Some((_, reply)) = state.prefixed.iter().find(|(p, _)| text.starts_with(p.as_str())) {
            return reply.clone();
        }

        if let Some(name) = between(text, "(boolean (find-constant \"", "\"))") {
            return truth(state.by_name(name).is_some());
        }
        if let Some(name) = between(text, "(constant-internal-id (find-constant \"", "\"))") {
            return match state.by_name(name) {
                Some(c) => Reply::Success(Value::Integer(c.id as i64)),
                None => failure(text),
            };
        }
        if let Some(name) = between(text, "(guid-to-string (constant-guid (find-constant \"", "\")))") {
            return match state.by_name(name) {
                Some(c) => Reply::Success(Value::from(c.guid.to_string())),
                None => failure(text),
            };
        }
        if let Some(id) = id_between(text, "(boolean (find-constant-by-internal-id ", "))") {
            return truth(state.by_id(id).is_some());
        }
        if let Some(id) = id_between(text, "(constant-name (find-constant-by-internal-id ", "))") {
            return match state.by_id(id) {
                Some(c) => Reply::Success(Value::from(c.name.clone())),
                None => failure(text),
            };
        }
        if let Some(id) = id_between(
            text,
            "(guid-to-string (constant-guid (find-constant-by-internal-id ",
            ")))",
        ) {
            return match state.by_id(id) {
                Some(c) => Reply::Success(Value::from(c.guid.to_string())),
                None => failure(text),
            };
        }
        if let Some(g) = between(text, "(boolean (find-constant-by-guid (string-to-guid \"", "\")))") {
            return truth(state.by_guid(g).is_some());
        }
        if let Some(g) = between(text, "(constant-name (find-constant-by-guid (string-to-guid \"", "\")))") {
            return match state.by_guid(g) {
                Some(c) => Reply::Success(Value::from(c.name.clone())),
                None => failure(text),
            };
        }
        if let Some(id) = id_between(text, "(nart-el-formula (find-nart-by-id ", "))") {
            return match state.narts.get(&id) {
                Some(refs) => Reply::Success(self.encode_formula(&state, refs)),
                None => failure(text),
            };
        }
        if let Some(id) = id_between(text, "(assertion-el-formula (find-assertion-by-id ", "))") {
            return match state.assertions.get(&id) {
                Some(refs) => Reply::Success(self.encode_formula(&state, refs)),
                None => failure(text),
            };
        }
        if let Some(id) = id_between(text, "(variable-name (find-variable-by-id ", "))") {
            return match state.variables.get(&id) {
                Some(name) => Reply::Success(Value::from(name.clone())),
                None => failure(text),
            };
        }
        if let Some(quoted) = between(text, "(cyc-kill '", ")") {
            let found = state
                .narts
                .iter()
                .find(|(_, refs)| Self::render_refs(&state, refs) == quoted)
                .map(|(id, _)| *id);
            if let Some(id) = found {
                state.narts.remove(&id);
            }
            return truth(found.is_some());
        }
        if let Some(name) = between(text, "(cyc-kill #$", ")") {
            let before = state.constants.len();
            state.constants.retain(|c| c.name != name);
            return truth(state.constants.len() < before);
        }
        if let Some(body) = text.strip_prefix("(with-bookkeeping-info (new-bookkeeping-info ") {
            if let Some(name) = between_anywhere(body, "(cyc-create-new-permanent \"", "\"))") {
                let id = state.next_id;
                state.next_id += 1;
                state.constants.push(KbConstant {
                    name: name.to_string(),
                    id,
                    guid: guid(id),
                });
                return Reply::Success(Value::t());
            }
            if let Some(start) = body.find("(cyc-assert ") {
                let assertion = body[start..body.len() - 1].to_string();
                state.asserted.push(assertion);
                return Reply::Success(Value::t());
            }
        }
        if text == "(end-cyc-access)" {
            return Reply::Success(Value::nil());
        }
        failure(text)
    }
}

fn truth(b: bool) -> Reply {
    Reply::Success(if b { Value::t() } else { Value::nil() })
}

fn failure(text: &str) -> Reply {
    Reply::Failure(format!("cannot evaluate {text}"))
}

fn between<'a>(text: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    text.strip_prefix(prefix)?.strip_suffix(suffix)
}

fn id_between(text: &str, prefix: &str, suffix: &str) -> Option<u64> {
    between(text, prefix, suffix)?.parse().ok()
}

fn between_anywhere<'a>(text: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let start = text.find(prefix)? + prefix.len();
    let rest = &text[start..];
    let end = rest.find(suffix)?;
    Some(&rest[..end])
}

/// One connection to the fake server.
pub struct FakeTransport {
    kb: Arc<FakeKb>,
    trace: TraceLevel,
}

impl Transport for FakeTransport {
    fn send(&mut self, command: &Command) -> Result<Reply, TransportError> {
        let text = command.to_string();
        self.kb.round_trips.fetch_add(1, Ordering::SeqCst);
        self.kb.sent.lock().push(text.clone());
        self.kb.traces.lock().push(self.trace);
        self.kb.hold_if_stalled(&text);
        if text == "(disconnect-now)" {
            return Err(TransportError::Io {
                source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer"),
            });
        }
        // A server-side trace change, visible to the client afterwards.
        if text == "(api-trace-off)" {
            self.trace = TraceLevel::None;
            return Ok(Reply::Success(Value::nil()));
        }
        Ok(self.kb.answer(&text))
    }

    fn close(&mut self) {}

    fn set_trace_level(&mut self, level: TraceLevel) {
        self.trace = level;
    }

    fn trace_level(&self) -> TraceLevel {
        self.trace
    }

    fn is_remote_proxy(&self) -> bool {
        self.kb.remote_proxy
    }
}

pub struct FakeConnector(pub Arc<FakeKb>);

impl Connector for FakeConnector {
    fn open(&self, config: &SessionConfig) -> Result<Box<dyn Transport>, TransportError> {
        if config.port == 1 {
            return Err(TransportError::ConnectionRefused {
                host: config.host.clone(),
                port: config.port,
            });
        }
        self.0.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTransport {
            kb: self.0.clone(),
            trace: TraceLevel::None,
        }))
    }
}

/// Open a session on `kb` with a fresh registry, then zero the counters.
pub fn open_session(kb: &Arc<FakeKb>, config: SessionConfig) -> Session {
    open_session_with(kb, config, Registry::shared())
}

pub fn open_session_with(kb: &Arc<FakeKb>, config: SessionConfig, registry: Arc<Registry>) -> Session {
    init_tracing();
    let config = SessionConfig {
        encoding: kb.encoding,
        ..config
    };
    let session = Session::open(config, Arc::new(FakeConnector(kb.clone())), registry).unwrap();
    kb.reset_counters();
    session
}

pub fn formula(values: Vec<Value>) -> FormulaList {
    FormulaList::from(values)
}
