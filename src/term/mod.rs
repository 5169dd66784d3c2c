//! Knowledge-base entity model.
//!
//! Everything the server can send back is a [`Value`]: atoms (symbols, strings,
//! numbers), entities ([`Constant`], [`Nart`], [`Assertion`], [`Variable`]) and
//! possibly improper [`FormulaList`]s nesting any of these. Entities are shared
//! as `Arc`s so the registry can hand out a single canonical instance per
//! entity; their lazily known attributes are write-once cells filled in by the
//! completion protocol.
//!
//! `Display` on every type renders the textual API form used when building
//! commands, e.g. `(#$isa #$Dog #$Collection)`.

pub mod assertion;
pub mod constant;
pub mod nart;
pub mod variable;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use assertion::Assertion;
pub use constant::{Constant, Guid};
pub use nart::{Nart, NartBody};
pub use variable::Variable;

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// A server-side symbol such as `T`, `NIL`, `:TRUE` or `find-constant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(name.into())
    }

    pub fn t() -> Self {
        Symbol::new("T")
    }

    pub fn nil() -> Self {
        Symbol::new("NIL")
    }

    pub fn quote() -> Self {
        Symbol::new("quote")
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.eq_ignore_ascii_case("nil")
    }

    pub fn is_true(&self) -> bool {
        self.0.eq_ignore_ascii_case("t")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Forts
// ---------------------------------------------------------------------------

/// A term that denotes and can appear as a predicate, collection or argument:
/// a constant or a NART.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fort {
    Constant(Arc<Constant>),
    Nart(Arc<Nart>),
}

impl Fort {
    pub fn as_constant(&self) -> Option<&Arc<Constant>> {
        match self {
            Fort::Constant(c) => Some(c),
            Fort::Nart(_) => None,
        }
    }

    pub fn as_nart(&self) -> Option<&Arc<Nart>> {
        match self {
            Fort::Nart(n) => Some(n),
            Fort::Constant(_) => None,
        }
    }

    /// Whether both forts are the very same instance.
    pub fn same_instance(&self, other: &Fort) -> bool {
        match (self, other) {
            (Fort::Constant(a), Fort::Constant(b)) => Arc::ptr_eq(a, b),
            (Fort::Nart(a), Fort::Nart(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn api_text(&self) -> String {
        self.to_string()
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Fort::Constant(c) => c.is_complete(),
            Fort::Nart(n) => n.is_complete(),
        }
    }
}

impl fmt::Display for Fort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fort::Constant(c) => write!(f, "{c}"),
            Fort::Nart(n) => write!(f, "{n}"),
        }
    }
}

impl From<Arc<Constant>> for Fort {
    fn from(c: Arc<Constant>) -> Self {
        Fort::Constant(c)
    }
}

impl From<Arc<Nart>> for Fort {
    fn from(n: Arc<Nart>) -> Self {
        Fort::Nart(n)
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Any value exchanged with the server.
#[derive(Debug, Clone)]
pub enum Value {
    Symbol(Symbol),
    String(String),
    Integer(i64),
    Float(f64),
    Constant(Arc<Constant>),
    Nart(Arc<Nart>),
    Assertion(Arc<Assertion>),
    Variable(Arc<Variable>),
    List(FormulaList),
}

impl Value {
    pub fn nil() -> Self {
        Value::Symbol(Symbol::nil())
    }

    pub fn t() -> Self {
        Value::Symbol(Symbol::t())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Value::Symbol(Symbol::new(name))
    }

    /// `(quote value)`.
    pub fn quoted(value: impl Into<Value>) -> Self {
        Value::List(FormulaList::from(vec![
            Value::Symbol(Symbol::quote()),
            value.into(),
        ]))
    }

    /// Whether this is the symbol `NIL` or the empty list.
    pub fn is_nil(&self) -> bool {
        match self {
            Value::Symbol(s) => s.is_nil(),
            Value::List(l) => l.is_empty() && l.tail().is_none(),
            _ => false,
        }
    }

    pub fn as_fort(&self) -> Option<Fort> {
        match self {
            Value::Constant(c) => Some(Fort::Constant(c.clone())),
            Value::Nart(n) => Some(Fort::Nart(n.clone())),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Arc<Constant>> {
        match self {
            Value::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&FormulaList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether every entity reachable from this value is fully described.
    /// Assertion formulas are not descended into.
    pub fn is_complete(&self) -> bool {
        match self {
            Value::Constant(c) => c.is_complete(),
            Value::Nart(n) => n.is_complete(),
            Value::Assertion(a) => a.is_complete(),
            Value::Variable(v) => v.is_complete(),
            Value::List(l) => l.is_complete(),
            _ => true,
        }
    }

    /// Short name of the variant, used in protocol error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Symbol(_) => "symbol",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Constant(_) => "constant",
            Value::Nart(_) => "nart",
            Value::Assertion(_) => "assertion",
            Value::Variable(_) => "variable",
            Value::List(_) => "list",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Constant(a), Value::Constant(b)) => a == b,
            (Value::Nart(a), Value::Nart(b)) => a == b,
            (Value::Assertion(a), Value::Assertion(b)) => a == b,
            (Value::Variable(a), Value::Variable(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Symbol(s) => s.hash(state),
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(x) => x.to_bits().hash(state),
            Value::Constant(c) => c.hash(state),
            Value::Nart(n) => n.hash(state),
            Value::Assertion(a) => a.hash(state),
            Value::Variable(v) => v.hash(state),
            Value::List(l) => l.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Symbol(s) => write!(f, "{s}"),
            Value::String(s) => write_string_literal(f, s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Constant(c) => write!(f, "{c}"),
            Value::Nart(n) => write!(f, "{n}"),
            // By handle: a formula may contain the assertion that holds it.
            Value::Assertion(a) => write!(f, "(find-assertion-by-id {})", a.id()),
            Value::Variable(v) => write!(f, "{v}"),
            Value::List(l) => write!(f, "{l}"),
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl From<Arc<Constant>> for Value {
    fn from(c: Arc<Constant>) -> Self {
        Value::Constant(c)
    }
}

impl From<Arc<Nart>> for Value {
    fn from(n: Arc<Nart>) -> Self {
        Value::Nart(n)
    }
}

impl From<Arc<Variable>> for Value {
    fn from(v: Arc<Variable>) -> Self {
        Value::Variable(v)
    }
}

impl From<Arc<Assertion>> for Value {
    fn from(a: Arc<Assertion>) -> Self {
        Value::Assertion(a)
    }
}

impl From<Fort> for Value {
    fn from(f: Fort) -> Self {
        match f {
            Fort::Constant(c) => Value::Constant(c),
            Fort::Nart(n) => Value::Nart(n),
        }
    }
}

impl From<&Fort> for Value {
    fn from(f: &Fort) -> Self {
        f.clone().into()
    }
}

impl From<FormulaList> for Value {
    fn from(l: FormulaList) -> Self {
        Value::List(l)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl TryFrom<u64> for Value {
    type Error = std::num::TryFromIntError;

    fn try_from(i: u64) -> Result<Self, Self::Error> {
        i64::try_from(i).map(Value::Integer)
    }
}

// ---------------------------------------------------------------------------
// Formula lists
// ---------------------------------------------------------------------------

/// An ordered, possibly improper (dotted-tail) list of values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FormulaList {
    items: Vec<Value>,
    tail: Option<Box<Value>>,
}

impl FormulaList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dotted list `(items... . tail)`.
    pub fn dotted(items: Vec<Value>, tail: Value) -> Self {
        Self {
            items,
            tail: Some(Box::new(tail)),
        }
    }

    /// A command list headed by the symbol `head`.
    pub fn command(head: &str, args: impl IntoIterator<Item = Value>) -> Self {
        let mut items = vec![Value::symbol(head)];
        items.extend(args);
        Self { items, tail: None }
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.items.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&Value> {
        self.items.first()
    }

    /// Everything after the first element, keeping the dotted tail.
    pub fn rest(&self) -> FormulaList {
        Self {
            items: self.items.iter().skip(1).cloned().collect(),
            tail: self.tail.clone(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn tail(&self) -> Option<&Value> {
        self.tail.as_deref()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Value> {
        &mut self.items
    }

    pub(crate) fn tail_mut(&mut self) -> Option<&mut Value> {
        self.tail.as_deref_mut()
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    /// Whether every element, and the dotted tail, is fully described.
    pub fn is_complete(&self) -> bool {
        self.items.iter().chain(self.tail()).all(Value::is_complete)
    }
}

impl From<Vec<Value>> for FormulaList {
    fn from(items: Vec<Value>) -> Self {
        Self { items, tail: None }
    }
}

impl FromIterator<Value> for FormulaList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            tail: None,
        }
    }
}

impl<'a> IntoIterator for &'a FormulaList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for FormulaList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() && self.tail.is_none() {
            return f.write_str("nil");
        }
        f.write_str("(")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{item}")?;
        }
        if let Some(tail) = &self.tail {
            write!(f, " . {tail}")?;
        }
        f.write_str(")")
    }
}
