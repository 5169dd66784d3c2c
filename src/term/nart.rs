//! Non-Atomic Reified Terms (NARTs): a functor applied to arguments.
//!
//! NARTs such as `(#$FruitFn #$AppleTree)` are reified by the server and given
//! an integer id. The textual encoding delivers them fully described; the
//! binary encoding delivers the id alone, and the body is fetched later and
//! written into the same instance.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use super::{Fort, Value};

/// The functor and arguments of a NART.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NartBody {
    pub functor: Fort,
    pub args: Vec<Value>,
}

pub struct Nart {
    id: Option<u64>,
    body: OnceLock<NartBody>,
}

impl Nart {
    /// A fully described NART, optionally carrying its server id.
    pub fn new(functor: Fort, args: Vec<Value>, id: Option<u64>) -> Arc<Self> {
        let body = OnceLock::new();
        let _ = body.set(NartBody { functor, args });
        Arc::new(Self { id, body })
    }

    /// An id-only NART whose body has not been fetched.
    pub fn from_id(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: Some(id),
            body: OnceLock::new(),
        })
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn functor(&self) -> Option<&Fort> {
        self.body.get().map(|b| &b.functor)
    }

    pub fn args(&self) -> Option<&[Value]> {
        self.body.get().map(|b| b.args.as_slice())
    }

    pub fn body(&self) -> Option<&NartBody> {
        self.body.get()
    }

    pub fn is_complete(&self) -> bool {
        self.body.get().is_some()
    }

    /// Write the body once. Returns `false` if it was already populated.
    pub(crate) fn populate(&self, functor: Fort, args: Vec<Value>) -> bool {
        self.body.set(NartBody { functor, args }).is_ok()
    }
}

thread_local! {
    static RENDERING: RefCell<Vec<*const Nart>> = const { RefCell::new(Vec::new()) };
}

/// Marks a NART as being rendered on this thread; a NART reached again through
/// its own arguments is written by id instead of descending forever.
struct Rendering(*const Nart);

impl Rendering {
    fn enter(nart: &Nart) -> Option<Self> {
        let ptr = nart as *const Nart;
        RENDERING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&ptr) {
                return None;
            }
            stack.push(ptr);
            Some(Rendering(ptr))
        })
    }
}

impl Drop for Rendering {
    fn drop(&mut self) {
        RENDERING.with(|stack| stack.borrow_mut().retain(|p| *p != self.0));
    }
}

impl fmt::Display for Nart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body.get();
        let guard = body.and_then(|_| Rendering::enter(self));
        match (body, self.id) {
            (Some(body), _) if guard.is_some() => {
                write!(f, "({}", body.functor)?;
                for arg in &body.args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            (_, Some(id)) => write!(f, "(find-nart-by-id {id})"),
            (_, None) => write!(f, "(<unresolved nart>)"),
        }
    }
}

impl fmt::Debug for Nart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nart")
            .field("id", &self.id)
            .field("complete", &self.is_complete())
            .field("text", &format_args!("{self}"))
            .finish()
    }
}

// Reified NARTs are equal by server id. Unreified ones (built locally, no id)
// are equal by structure once populated.
impl PartialEq for Nart {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => match (self.body.get(), other.body.get()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl Eq for Nart {}

impl Hash for Nart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match (self.id, self.body.get()) {
            (Some(id), _) => id.hash(state),
            (None, Some(body)) => body.hash(state),
            (None, None) => std::ptr::hash(self as *const Self, state),
        }
    }
}
