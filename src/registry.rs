//! Canonicalization registry: one in-memory instance per knowledge-base entity.
//!
//! Constants are indexed three ways (name, internal id, GUID); variables by
//! name; NARTs and assertions by id. Every index is a `DashMap`, and every
//! insert goes through the map's entry API so concurrent attempts to intern
//! the same key converge on the first writer's instance.
//!
//! NARTs and assertions use a two-phase protocol. [`Registry::reserve_nart`]
//! registers an empty shell under the id *before* its body is fetched and hands
//! back a [`Pending`] handle owned by the calling thread. When the owner's own
//! fetch meets the same id again (a self-referencing formula) it gets the
//! shell instead of fetching a second time. Other threads never see the shell
//! while it is empty: they block until the owner finishes and then look again.
//! [`Pending::populate`] writes the body in place. Dropping a `Pending` without
//! populating releases the reservation so a waiter or a later call re-fetches.
//!
//! The registry is an injected service: sessions share it through an `Arc`,
//! and [`Registry::reset`] restores a clean state for test isolation.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{AccessResult, RegistryError};
use crate::term::{Assertion, Constant, Fort, FormulaList, Guid, Nart, Value, Variable};
use crate::well_known::WellKnown;

/// Process-lifetime map from entity keys to canonical instances.
pub struct Registry {
    constants_by_name: DashMap<String, Arc<Constant>>,
    constants_by_id: DashMap<u64, Arc<Constant>>,
    constants_by_guid: DashMap<Guid, Arc<Constant>>,
    variables: DashMap<String, Arc<Variable>>,
    narts: DashMap<u64, Arc<Nart>>,
    assertions: DashMap<u64, Arc<Assertion>>,
    /// Ids whose body fetch is running, with the threads running it.
    narts_fetching: Fetching,
    assertions_fetching: Fetching,
    fetch_done: FetchSignal,
    well_known: DashMap<WellKnown, Arc<Constant>>,
    /// Readers: resolution and completion. Writer: `kill`, so a removal cannot
    /// interleave with an in-flight completion that would re-insert the entity.
    gate: RwLock<()>,
}

/// Sizes of the registry's indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub constants: usize,
    pub variables: usize,
    pub narts: usize,
    pub assertions: usize,
    pub well_known: usize,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            constants_by_name: DashMap::new(),
            constants_by_id: DashMap::new(),
            constants_by_guid: DashMap::new(),
            variables: DashMap::new(),
            narts: DashMap::new(),
            assertions: DashMap::new(),
            narts_fetching: DashMap::new(),
            assertions_fetching: DashMap::new(),
            fetch_done: FetchSignal::default(),
            well_known: DashMap::new(),
            gate: RwLock::new(()),
        }
    }

    /// Create a registry ready to be shared between sessions.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // -----------------------------------------------------------------------
    // Constants
    // -----------------------------------------------------------------------

    pub fn constant_by_name(&self, name: &str) -> Option<Arc<Constant>> {
        let name = name.strip_prefix("#$").unwrap_or(name);
        self.constants_by_name.get(name).map(|r| r.value().clone())
    }

    pub fn constant_by_id(&self, id: u64) -> Option<Arc<Constant>> {
        self.constants_by_id.get(&id).map(|r| r.value().clone())
    }

    pub fn constant_by_guid(&self, guid: &Guid) -> Option<Arc<Constant>> {
        self.constants_by_guid.get(guid).map(|r| r.value().clone())
    }

    /// Intern a fully described constant and return the canonical instance.
    ///
    /// If another instance already holds the name, that instance wins and the
    /// candidate is discarded. The winner is then indexed by id and GUID; an
    /// index that already points at a different instance is a consistency
    /// violation.
    pub fn intern_constant(&self, candidate: Arc<Constant>) -> AccessResult<Arc<Constant>> {
        let (Some(name), Some(id), Some(guid)) =
            (candidate.name(), candidate.id(), candidate.guid())
        else {
            return Err(RegistryError::Incomplete { kind: "constant" }.into());
        };

        let winner = self
            .constants_by_name
            .entry(name.to_string())
            .or_insert_with(|| candidate.clone())
            .value()
            .clone();

        if Arc::ptr_eq(&winner, &candidate) {
            tracing::debug!(name, id, "interned constant");
        } else {
            tracing::debug!(name, "constant already interned, discarding duplicate");
        }

        let by_id = self
            .constants_by_id
            .entry(winner.id().unwrap_or(id))
            .or_insert_with(|| winner.clone())
            .value()
            .clone();
        if !Arc::ptr_eq(&by_id, &winner) {
            return Err(self.consistency("constant", format!("id {id}")));
        }

        let by_guid = self
            .constants_by_guid
            .entry(winner.guid().unwrap_or(guid))
            .or_insert_with(|| winner.clone())
            .value()
            .clone();
        if !Arc::ptr_eq(&by_guid, &winner) {
            return Err(self.consistency("constant", format!("guid {guid}")));
        }

        Ok(winner)
    }

    /// Remove a constant from every index it is registered under.
    ///
    /// `constant` need not be the canonical instance: whatever the registry
    /// holds under its name, id or GUID is removed along with every key of
    /// that instance.
    pub fn remove_constant(&self, constant: &Constant) {
        let canonical = constant
            .name()
            .and_then(|name| self.constant_by_name(name))
            .or_else(|| constant.id().and_then(|id| self.constant_by_id(id)))
            .or_else(|| constant.guid().and_then(|guid| self.constant_by_guid(&guid)));

        for c in std::iter::once(constant).chain(canonical.as_deref()) {
            if let Some(name) = c.name() {
                self.constants_by_name.remove(name);
            }
            if let Some(id) = c.id() {
                self.constants_by_id.remove(&id);
            }
            if let Some(guid) = c.guid() {
                self.constants_by_guid.remove(&guid);
            }
        }
        self.well_known.retain(|_, slot| {
            let held = canonical.as_ref().is_some_and(|c| Arc::ptr_eq(slot, c));
            !held && **slot != *constant
        });
        tracing::debug!(name = constant.name(), id = constant.id(), "removed constant from registry");
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    pub fn variable(&self, name: &str) -> Option<Arc<Variable>> {
        let name = name.strip_prefix('?').unwrap_or(name);
        self.variables.get(name).map(|r| r.value().clone())
    }

    /// Intern a named variable and return the canonical instance.
    pub fn intern_variable(&self, candidate: Arc<Variable>) -> AccessResult<Arc<Variable>> {
        let Some(name) = candidate.name() else {
            return Err(RegistryError::Incomplete { kind: "variable" }.into());
        };
        Ok(self
            .variables
            .entry(name.to_string())
            .or_insert_with(|| candidate.clone())
            .value()
            .clone())
    }

    // -----------------------------------------------------------------------
    // NARTs and assertions
    // -----------------------------------------------------------------------

    pub fn nart(&self, id: u64) -> Option<Arc<Nart>> {
        self.narts.get(&id).map(|r| r.value().clone())
    }

    pub fn assertion(&self, id: u64) -> Option<Arc<Assertion>> {
        self.assertions.get(&id).map(|r| r.value().clone())
    }

    /// Phase one of NART completion: register a shell under `id`.
    ///
    /// Returns [`Reservation::Resolved`] when the NART is already populated, or
    /// when this thread is itself fetching it further up the call chain. While
    /// another thread fetches the same id the call blocks until that fetch ends.
    /// A thread that is in the middle of a fetch of its own does not block; it
    /// fetches the id as well and the first body written wins.
    pub fn reserve_nart(&self, id: u64) -> Reservation<'_, Nart> {
        self.reserve(&self.narts, &self.narts_fetching, id)
    }

    /// Phase one of assertion completion. A registered assertion whose formula
    /// is unset is not complete and is handed back for re-fetching.
    pub fn reserve_assertion(&self, id: u64) -> Reservation<'_, Assertion> {
        self.reserve(&self.assertions, &self.assertions_fetching, id)
    }

    fn reserve<'r, T: Shell>(
        &'r self,
        entries: &DashMap<u64, Arc<T>>,
        fetching: &'r Fetching,
        id: u64,
    ) -> Reservation<'r, T> {
        let me = thread::current().id();
        loop {
            let handle = entries
                .entry(id)
                .or_insert_with(|| T::shell(id))
                .value()
                .clone();
            if handle.is_complete() {
                return Reservation::Resolved(handle);
            }
            let nested = self.is_fetching(me);

            // Checked under the signal lock so a release cannot slip in
            // between the check and the wait.
            let mut signal = self.fetch_done.lock.lock();
            let busy = match fetching.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(vec![me]);
                    false
                }
                Entry::Occupied(owners) if owners.get().contains(&me) => {
                    return Reservation::Resolved(handle);
                }
                Entry::Occupied(mut owners) if nested => {
                    tracing::debug!(id, "fetching alongside another thread");
                    owners.get_mut().push(me);
                    false
                }
                Entry::Occupied(_) => true,
            };
            if busy {
                tracing::trace!(id, "waiting for another thread's fetch");
                self.fetch_done.done.wait(&mut signal);
                continue;
            }
            return Reservation::Reserved(Pending {
                fetching,
                signal: &self.fetch_done,
                thread: me,
                id,
                handle,
            });
        }
    }

    fn is_fetching(&self, thread: ThreadId) -> bool {
        [&self.narts_fetching, &self.assertions_fetching]
            .into_iter()
            .any(|map| map.iter().any(|owners| owners.value().contains(&thread)))
    }

    /// Intern a fully described NART that carries an id.
    ///
    /// An existing shell under the same id is populated from the candidate and
    /// kept as the canonical instance.
    pub fn intern_nart(&self, candidate: Arc<Nart>) -> AccessResult<Arc<Nart>> {
        let (Some(id), Some(body)) = (candidate.id(), candidate.body()) else {
            return Err(RegistryError::Incomplete { kind: "nart" }.into());
        };
        let winner = self
            .narts
            .entry(id)
            .or_insert_with(|| candidate.clone())
            .value()
            .clone();
        if !Arc::ptr_eq(&winner, &candidate) {
            winner.populate(body.functor.clone(), body.args.clone());
        }
        Ok(winner)
    }

    /// Intern an assertion whose formula is known.
    pub fn intern_assertion(&self, candidate: Arc<Assertion>) -> AccessResult<Arc<Assertion>> {
        let Some(formula) = candidate.formula() else {
            return Err(RegistryError::Incomplete { kind: "assertion" }.into());
        };
        let winner = self
            .assertions
            .entry(candidate.id())
            .or_insert_with(|| candidate.clone())
            .value()
            .clone();
        if !Arc::ptr_eq(&winner, &candidate) {
            winner.populate(formula.clone());
        }
        Ok(winner)
    }

    /// Remove a NART by id; an unreified NART removes whatever is registered
    /// with the same body.
    pub fn remove_nart(&self, nart: &Nart) {
        match (nart.id(), nart.body()) {
            (Some(id), _) => {
                self.narts.remove(&id);
            }
            (None, Some(body)) => self.narts.retain(|_, v| v.body() != Some(body)),
            (None, None) => {}
        }
    }

    pub fn remove_assertion(&self, assertion: &Assertion) {
        self.assertions.remove(&assertion.id());
    }

    // -----------------------------------------------------------------------
    // Well-known constants
    // -----------------------------------------------------------------------

    pub fn well_known(&self, which: WellKnown) -> Option<Arc<Constant>> {
        self.well_known.get(&which).map(|r| r.value().clone())
    }

    /// Fill a well-known slot. An already-filled slot is left alone and its
    /// current value returned.
    pub fn set_well_known(&self, which: WellKnown, constant: Arc<Constant>) -> Arc<Constant> {
        self.well_known
            .entry(which)
            .or_insert(constant)
            .value()
            .clone()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Drop every entry and well-known slot.
    pub fn reset(&self) {
        let _gate = self.gate.write();
        self.constants_by_name.clear();
        self.constants_by_id.clear();
        self.constants_by_guid.clear();
        self.variables.clear();
        self.narts.clear();
        self.assertions.clear();
        self.narts_fetching.clear();
        self.assertions_fetching.clear();
        self.well_known.clear();
        self.fetch_done.notify();
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            constants: self.constants_by_name.len(),
            variables: self.variables.len(),
            narts: self.narts.len(),
            assertions: self.assertions.len(),
            well_known: self.well_known.len(),
        }
    }

    /// Shared access for resolution and completion. Recursive, so nested
    /// completions on one thread never wait behind a queued writer.
    pub(crate) fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read_recursive()
    }

    /// Exclusive access for removals.
    pub(crate) fn write_gate(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write()
    }

    fn consistency(&self, kind: &'static str, key: String) -> crate::error::AccessError {
        tracing::error!(kind, %key, "two canonical instances registered under one key");
        RegistryError::Consistency { kind, key }.into()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Registry")
            .field("constants", &stats.constants)
            .field("variables", &stats.variables)
            .field("narts", &stats.narts)
            .field("assertions", &stats.assertions)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Two-phase reservations
// ---------------------------------------------------------------------------

/// Outcome of phase one.
pub enum Reservation<'r, T> {
    /// Use this instance as is: it is complete, or this thread is filling it.
    Resolved(Arc<T>),
    /// The caller must fetch the body and call [`Pending::populate`].
    Reserved(Pending<'r, T>),
}

/// Threads currently fetching each id.
type Fetching = DashMap<u64, Vec<ThreadId>>;

/// Wakes threads waiting for another thread's fetch.
#[derive(Default)]
struct FetchSignal {
    lock: Mutex<()>,
    done: Condvar,
}

impl FetchSignal {
    fn notify(&self) {
        let _signal = self.lock.lock();
        self.done.notify_all();
    }
}

/// Entities registered as empty shells while their body is fetched.
trait Shell {
    fn shell(id: u64) -> Arc<Self>;
    fn is_complete(&self) -> bool;
}

impl Shell for Nart {
    fn shell(id: u64) -> Arc<Self> {
        Nart::from_id(id)
    }

    fn is_complete(&self) -> bool {
        Nart::is_complete(self)
    }
}

impl Shell for Assertion {
    fn shell(id: u64) -> Arc<Self> {
        Assertion::from_id(id)
    }

    fn is_complete(&self) -> bool {
        Assertion::is_complete(self)
    }
}

/// A registered shell awaiting its body.
pub struct Pending<'r, T> {
    fetching: &'r Fetching,
    signal: &'r FetchSignal,
    thread: ThreadId,
    id: u64,
    handle: Arc<T>,
}

impl<T> Pending<'_, T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The shell, already visible to registry lookups.
    pub fn handle(&self) -> &Arc<T> {
        &self.handle
    }
}

impl Pending<'_, Nart> {
    /// Phase two: write the body into the registered shell.
    pub fn populate(self, functor: Fort, args: Vec<Value>) -> Arc<Nart> {
        self.handle.populate(functor, args);
        self.handle.clone()
    }
}

impl Pending<'_, Assertion> {
    /// Phase two: write the formula into the registered shell.
    pub fn populate(self, formula: FormulaList) -> Arc<Assertion> {
        self.handle.populate(formula);
        self.handle.clone()
    }
}

impl<T> Drop for Pending<'_, T> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut owners) = self.fetching.entry(self.id) {
            owners.get_mut().retain(|t| *t != self.thread);
            if owners.get().is_empty() {
                owners.remove();
            }
        }
        self.signal.notify();
    }
}
