//! Reader for textual formulas such as `(#$isa ?X #$Dog)`.
//!
//! Tokens:
//! - `(` ... `)` lists, with ` . ` introducing a dotted tail
//! - `'x` for `(quote x)`
//! - `"..."` strings, with `\"` and `\\` escapes
//! - `#$Name` constants and `?NAME` variables, looked up through a [`TermResolver`]
//! - integers, floats, and any other token as a symbol

use std::sync::Arc;

use crate::error::{AccessResult, ParseError};
use crate::session::Session;
use crate::term::{Constant, FormulaList, Value, Variable};

/// Turns constant and variable tokens into canonical entities.
pub trait TermResolver {
    fn constant(&self, name: &str) -> AccessResult<Arc<Constant>>;
    fn variable(&self, name: &str) -> AccessResult<Arc<Variable>>;
}

impl TermResolver for Session {
    fn constant(&self, name: &str) -> AccessResult<Arc<Constant>> {
        self.known_constant_by_name(name)
    }

    fn variable(&self, name: &str) -> AccessResult<Arc<Variable>> {
        self.registry().intern_variable(Variable::named(name))
    }
}

impl Session {
    /// Read a formula, resolving its constants through this session.
    pub fn make_formula(&self, text: &str) -> AccessResult<FormulaList> {
        read_formula(text, self)
    }
}

/// Read exactly one list from `text`.
pub fn read_formula(text: &str, resolver: &dyn TermResolver) -> AccessResult<FormulaList> {
    let mut reader = Reader {
        text,
        pos: 0,
        resolver,
    };
    reader.skip_whitespace();
    let start = reader.pos;
    let value = reader.read_value()?;
    reader.skip_whitespace();
    if reader.pos < text.len() {
        return Err(reader.unexpected().into());
    }
    match value {
        Value::List(list) => Ok(list),
        other => Err(ParseError::Unexpected {
            found: format!("{} where a list was expected", other.kind_name()),
            offset: start,
        }
        .into()),
    }
}

/// Read a single value of any kind from `text`.
pub fn read_value(text: &str, resolver: &dyn TermResolver) -> AccessResult<Value> {
    let mut reader = Reader {
        text,
        pos: 0,
        resolver,
    };
    let value = reader.read_value()?;
    reader.skip_whitespace();
    if reader.pos < text.len() {
        return Err(reader.unexpected().into());
    }
    Ok(value)
}

struct Reader<'a> {
    text: &'a str,
    pos: usize,
    resolver: &'a dyn TermResolver,
}

impl Reader<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn unexpected(&self) -> ParseError {
        let found: String = self.text[self.pos..].chars().take(12).collect();
        ParseError::Unexpected {
            found: format!("`{found}`"),
            offset: self.pos,
        }
    }

    fn read_value(&mut self) -> AccessResult<Value> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(ParseError::UnexpectedEof.into()),
            Some('(') => {
                self.bump();
                self.read_list_body().map(Value::List)
            }
            Some(')') => Err(self.unexpected().into()),
            Some('\'') => {
                self.bump();
                Ok(Value::quoted(self.read_value()?))
            }
            Some('"') => self.read_string(),
            Some(_) => self.read_atom(),
        }
    }

    fn read_list_body(&mut self) -> AccessResult<FormulaList> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof.into()),
                Some(')') => {
                    self.bump();
                    return Ok(FormulaList::from(items));
                }
                Some('.') if self.is_lone_dot() => {
                    if items.is_empty() {
                        return Err(self.unexpected().into());
                    }
                    self.bump();
                    let tail = self.read_value()?;
                    self.skip_whitespace();
                    if self.bump() != Some(')') {
                        return Err(ParseError::Unexpected {
                            found: "more than one value after a dot".into(),
                            offset: self.pos,
                        }
                        .into());
                    }
                    return Ok(FormulaList::dotted(items, tail));
                }
                Some(_) => items.push(self.read_value()?),
            }
        }
    }

    fn is_lone_dot(&self) -> bool {
        let mut rest = self.text[self.pos..].chars();
        rest.next();
        rest.next().is_none_or(|c| c.is_whitespace() || c == '(' || c == ')')
    }

    fn read_string(&mut self) -> AccessResult<Value> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedString { offset: start }.into()),
                Some('"') => return Ok(Value::String(out)),
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(ParseError::UnterminatedString { offset: start }.into()),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn read_atom(&mut self) -> AccessResult<Value> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '\''))
        {
            self.bump();
        }
        let token = &self.text[start..self.pos];

        if let Some(name) = token.strip_prefix("#$") {
            if name.is_empty() {
                return Err(ParseError::Unexpected {
                    found: "`#$` without a name".into(),
                    offset: start,
                }
                .into());
            }
            return Ok(Value::Constant(self.resolver.constant(name)?));
        }
        if token.len() > 1 && token.starts_with('?') {
            return Ok(Value::Variable(self.resolver.variable(token)?));
        }
        if let Ok(i) = token.parse::<i64>() {
            return Ok(Value::Integer(i));
        }
        if token.contains(['.', 'e', 'E']) && token.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            if let Ok(x) = token.parse::<f64>() {
                return Ok(Value::Float(x));
            }
        }
        Ok(Value::symbol(token))
    }
}
