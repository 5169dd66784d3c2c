//! Constant resolution by name, internal id and GUID.
//!
//! Every path checks the registry first. Resolution by id and by GUID learns
//! the name from the server and then funnels through [`Session::constant_by_name`],
//! so there is a single place where new constants are interned.

use std::sync::Arc;

use crate::error::{AccessResult, KbError, ProtocolError};
use crate::term::{Constant, FormulaList, Guid, Value};

use super::{Session, id_arg};

fn by_internal_id(id: u64) -> AccessResult<Value> {
    let lookup = "find-constant-by-internal-id";
    Ok(Value::List(FormulaList::command(lookup, [id_arg(id, lookup)?])))
}

fn quote_str(text: &str) -> String {
    Value::from(text).to_string()
}

impl Session {
    /// The constant named `name` (with or without `#$`), or `None` if the
    /// server has no such constant.
    ///
    /// A miss costs an existence check, an id fetch and a GUID fetch; a hit
    /// costs nothing.
    pub fn constant_by_name(&self, name: &str) -> AccessResult<Option<Arc<Constant>>> {
        let name = name.strip_prefix("#$").unwrap_or(name);
        let _gate = self.registry.read_gate();

        if let Some(hit) = self.registry.constant_by_name(name) {
            tracing::trace!(name, "constant registry hit");
            return Ok(Some(hit));
        }
        let Some(id) = self.constant_id(name)? else {
            tracing::debug!(name, "constant not found");
            return Ok(None);
        };
        let guid = self.constant_guid(name)?;
        let constant = self.registry.intern_constant(Constant::new(name, id, guid))?;
        Ok(Some(constant))
    }

    /// The constant with internal id `id`, or `None`.
    pub fn constant_by_id(&self, id: u64) -> AccessResult<Option<Arc<Constant>>> {
        if let Some(hit) = self.registry.constant_by_id(id) {
            return Ok(Some(hit));
        }
        let exists = self.converse_bool(FormulaList::command("boolean", [by_internal_id(id)?]))?;
        if !exists {
            return Ok(None);
        }
        let name = self.constant_name(id)?;
        self.constant_by_name(&name)
    }

    /// The constant with GUID `guid`, or `None`.
    pub fn constant_by_guid(&self, guid: &Guid) -> AccessResult<Option<Arc<Constant>>> {
        if let Some(hit) = self.registry.constant_by_guid(guid) {
            return Ok(Some(hit));
        }
        let lookup = format!("(find-constant-by-guid (string-to-guid {}))", quote_str(&guid.to_string()));
        if !self.converse_bool(format!("(boolean {lookup})"))? {
            return Ok(None);
        }
        let name = self.converse_string(format!("(constant-name {lookup})"))?;
        self.constant_by_name(&name)
    }

    /// Like [`constant_by_name`](Self::constant_by_name), but absence is an error.
    pub fn known_constant_by_name(&self, name: &str) -> AccessResult<Arc<Constant>> {
        self.constant_by_name(name)?.ok_or_else(|| {
            KbError::MissingConstant {
                key: name.to_string(),
            }
            .into()
        })
    }

    /// Like [`constant_by_guid`](Self::constant_by_guid), but absence is an error.
    pub fn known_constant_by_guid(&self, guid: &Guid) -> AccessResult<Arc<Constant>> {
        self.constant_by_guid(guid)?.ok_or_else(|| {
            KbError::MissingConstant {
                key: guid.to_string(),
            }
            .into()
        })
    }

    /// Like [`constant_by_id`](Self::constant_by_id), but absence is an error.
    pub fn known_constant_by_id(&self, id: u64) -> AccessResult<Arc<Constant>> {
        self.constant_by_id(id)?.ok_or_else(|| {
            KbError::MissingConstant {
                key: format!("id {id}"),
            }
            .into()
        })
    }

    /// Parse `text` as a GUID and resolve it; absence is an error.
    pub fn known_constant_by_guid_str(&self, text: &str) -> AccessResult<Arc<Constant>> {
        self.known_constant_by_guid(&Guid::parse(text)?)
    }

    // -----------------------------------------------------------------------
    // Attribute lookups (uncached, one or two round trips each)
    // -----------------------------------------------------------------------

    /// Internal id of the named constant, or `None` if it does not exist.
    pub fn constant_id(&self, name: &str) -> AccessResult<Option<u64>> {
        let find = format!("(find-constant {})", quote_str(name));
        if !self.converse_bool(format!("(boolean {find})"))? {
            return Ok(None);
        }
        let command = format!("(constant-internal-id {find})");
        let id = self.converse_int(command.clone())?;
        match u64::try_from(id) {
            Ok(id) => Ok(Some(id)),
            Err(_) => Err(ProtocolError::Shape {
                expected: "non-negative internal id",
                actual: format!("(integer) {id}"),
                command,
            }
            .into()),
        }
    }

    pub fn constant_guid(&self, name: &str) -> AccessResult<Guid> {
        let text = self.converse_string(format!(
            "(guid-to-string (constant-guid (find-constant {})))",
            quote_str(name)
        ))?;
        Ok(Guid::parse(&text)?)
    }

    pub fn constant_guid_by_id(&self, id: u64) -> AccessResult<Guid> {
        let command = FormulaList::command(
            "guid-to-string",
            [Value::List(FormulaList::command("constant-guid", [by_internal_id(id)?]))],
        );
        Ok(Guid::parse(&self.converse_string(command)?)?)
    }

    pub fn constant_name(&self, id: u64) -> AccessResult<String> {
        self.converse_string(FormulaList::command("constant-name", [by_internal_id(id)?]))
    }

    pub fn variable_name(&self, id: u64) -> AccessResult<String> {
        let find = FormulaList::command("find-variable-by-id", [id_arg(id, "find-variable-by-id")?]);
        self.converse_string(FormulaList::command("variable-name", [Value::List(find)]))
    }
}
