//! Thread-keyed directory of sessions with a shared fallback.
//!
//! Passing a `&Session` explicitly is the primary API. The directory exists for
//! callers that want ambient access: register a session on a thread, then call
//! [`SessionDirectory::current`] anywhere on that thread. The first session
//! registered also becomes the shared fallback for threads that have none.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{AccessResult, SessionError};
use crate::session::Session;

#[derive(Default)]
pub struct SessionDirectory {
    by_thread: DashMap<ThreadId, Arc<Session>>,
    shared: RwLock<Option<Arc<Session>>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` for the calling thread. It becomes the shared
    /// fallback if there is none yet.
    pub fn register(&self, session: Arc<Session>) {
        let thread = thread::current().id();
        {
            let mut shared = self.shared.write();
            if shared.is_none() {
                *shared = Some(session.clone());
            }
        }
        self.by_thread.insert(thread, session);
        tracing::debug!(?thread, "session registered");
    }

    /// Replace the shared fallback session.
    pub fn set_shared(&self, session: Arc<Session>) {
        *self.shared.write() = Some(session);
    }

    /// The calling thread's session, else the shared one.
    pub fn current(&self) -> AccessResult<Arc<Session>> {
        if let Some(session) = self.by_thread.get(&thread::current().id()) {
            return Ok(session.value().clone());
        }
        self.shared
            .read()
            .clone()
            .ok_or_else(|| SessionError::NoCurrentSession.into())
    }

    /// Remove the calling thread's registration and return it.
    ///
    /// If that session was also the shared fallback, the fallback is cleared.
    pub fn unregister(&self) -> Option<Arc<Session>> {
        let (_, session) = self.by_thread.remove(&thread::current().id())?;
        let mut shared = self.shared.write();
        if shared.as_ref().is_some_and(|s| Arc::ptr_eq(s, &session)) {
            *shared = None;
        }
        Some(session)
    }

    /// Unregister the calling thread's session and close it.
    pub fn close_current(&self) {
        if let Some(session) = self.unregister() {
            session.close();
        }
    }

    pub fn len(&self) -> usize {
        self.by_thread.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_thread.is_empty()
    }
}

impl std::fmt::Debug for SessionDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDirectory")
            .field("threads", &self.by_thread.len())
            .field("has_shared", &self.shared.read().is_some())
            .finish()
    }
}
