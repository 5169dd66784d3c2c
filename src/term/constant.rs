//! Constants: named, uniquely identified knowledge-base terms.
//!
//! A constant is known by three keys: its name, the server's internal integer
//! id, and a GUID that is stable across servers. The binary encoding delivers
//! constants carrying only the id; the remaining attributes are filled in
//! once, in place, by the completion protocol. Each attribute is write-once.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;

/// Globally unique identifier of a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    /// Parse a hyphenated GUID string.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Uuid::parse_str(text.trim())
            .map(Guid)
            .map_err(|_| ParseError::InvalidGuid {
                text: text.to_string(),
            })
    }
}

impl FromStr for Guid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Guid::parse(s)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A knowledge-base constant.
///
/// Identity is the allocation: the registry guarantees one `Arc<Constant>` per
/// entity, so two constants compare equal when they are the same instance or,
/// failing that, when both carry the same GUID.
#[derive(Default)]
pub struct Constant {
    name: OnceLock<String>,
    id: OnceLock<u64>,
    guid: OnceLock<Guid>,
}

impl Constant {
    /// A fully described constant.
    pub fn new(name: impl Into<String>, id: u64, guid: Guid) -> Arc<Self> {
        let constant = Self::default();
        let _ = constant.name.set(strip_prefix(name.into()));
        let _ = constant.id.set(id);
        let _ = constant.guid.set(guid);
        Arc::new(constant)
    }

    /// An id-only constant, as produced by the binary encoding.
    pub fn from_id(id: u64) -> Arc<Self> {
        let constant = Self::default();
        let _ = constant.id.set(id);
        Arc::new(constant)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    pub fn id(&self) -> Option<u64> {
        self.id.get().copied()
    }

    pub fn guid(&self) -> Option<Guid> {
        self.guid.get().copied()
    }

    /// Whether name, id and GUID are all known.
    pub fn is_complete(&self) -> bool {
        self.name.get().is_some() && self.id.get().is_some() && self.guid.get().is_some()
    }

    // Attributes are write-once; a second write with another value is ignored.
    pub(crate) fn fill_name(&self, name: String) {
        let _ = self.name.set(strip_prefix(name));
    }

    pub(crate) fn fill_guid(&self, guid: Guid) {
        let _ = self.guid.set(guid);
    }

    /// The textual API form: `#$Name`, or an id lookup while the name is unknown.
    pub fn api_text(&self) -> String {
        self.to_string()
    }
}

/// Remove the `#$` reader prefix from a constant name.
pub fn strip_prefix(name: String) -> String {
    match name.strip_prefix("#$") {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.id()) {
            (Some(name), _) => write!(f, "#${name}"),
            (None, Some(id)) => write!(f, "(find-constant-by-internal-id {id})"),
            (None, None) => write!(f, "#$<unresolved>"),
        }
    }
}

impl fmt::Debug for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constant")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("guid", &self.guid())
            .finish()
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match (self.guid(), other.guid()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

// Follows the GUID once it is known and the allocation before that, so the hash
// of an id-only constant changes when completion fills in its GUID. Incomplete
// constants must not be used as map keys; the result caches skip them.
impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.guid() {
            Some(guid) => guid.hash(state),
            None => std::ptr::hash(self as *const Self, state),
        }
    }
}
