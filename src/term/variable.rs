//! Query variables.
//!
//! A variable's canonical surface form is its name (`?X`). The binary encoding
//! may deliver resolved-formula variables carrying only an integer id; those
//! must be named before use.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

pub struct Variable {
    name: OnceLock<String>,
    id: Option<u64>,
}

impl Variable {
    /// A variable known by name. A leading `?` is optional.
    pub fn named(name: impl Into<String>) -> Arc<Self> {
        let cell = OnceLock::new();
        let _ = cell.set(normalize(name.into()));
        Arc::new(Self { name: cell, id: None })
    }

    /// An id-only variable, as produced by the binary encoding.
    pub fn from_id(id: u64) -> Arc<Self> {
        Arc::new(Self {
            name: OnceLock::new(),
            id: Some(id),
        })
    }

    /// The name without the leading `?`.
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_complete(&self) -> bool {
        self.name.get().is_some()
    }

    pub(crate) fn fill_name(&self, name: String) {
        let _ = self.name.set(normalize(name));
    }
}

fn normalize(name: String) -> String {
    match name.strip_prefix('?') {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.id) {
            (Some(name), _) => write!(f, "?{name}"),
            (None, Some(id)) => write!(f, "?var{id}"),
            (None, None) => write!(f, "?<unnamed>"),
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name())
            .field("id", &self.id)
            .finish()
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match (self.name(), other.name()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Variable {}

// Follows the name once it is known and the allocation before that. An unnamed
// variable must not be used as a map key; the result caches skip it.
impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.name() {
            Some(name) => name.hash(state),
            None => std::ptr::hash(self as *const Self, state),
        }
    }
}
