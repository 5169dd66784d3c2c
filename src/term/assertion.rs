//! Assertions: formulas filed in the knowledge base under an integer id.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use super::FormulaList;

pub struct Assertion {
    id: u64,
    formula: OnceLock<FormulaList>,
}

impl Assertion {
    pub fn new(id: u64, formula: FormulaList) -> Arc<Self> {
        let cell = OnceLock::new();
        let _ = cell.set(formula);
        Arc::new(Self { id, formula: cell })
    }

    /// An id-only assertion whose formula has not been fetched.
    pub fn from_id(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            formula: OnceLock::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn formula(&self) -> Option<&FormulaList> {
        self.formula.get()
    }

    /// An assertion without its formula is not complete and must be re-fetched.
    pub fn is_complete(&self) -> bool {
        self.formula.get().is_some()
    }

    pub(crate) fn populate(&self, formula: FormulaList) -> bool {
        self.formula.set(formula).is_ok()
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.formula.get() {
            Some(formula) => write!(f, "{formula}"),
            None => write!(f, "(find-assertion-by-id {})", self.id),
        }
    }
}

// A formula may contain the assertion itself, so Debug does not descend into it.
impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assertion")
            .field("id", &self.id)
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl PartialEq for Assertion {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Assertion {}

impl Hash for Assertion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
