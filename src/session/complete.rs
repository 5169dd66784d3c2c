//! Lazy completion of partially known entities.
//!
//! The binary encoding sends bare ids in place of full entity descriptions.
//! Completion fetches what is missing and swaps every entity for its canonical
//! registry instance, recursing through lists. Entities that are already
//! complete are only canonicalized, which costs no round trips when the
//! registry knows them.
//!
//! NARTs and assertions are reserved in the registry before their bodies are
//! fetched. A body that refers back to an id this thread is fetching receives
//! the registered shell; other threads wait for the fetch to finish, so an
//! incomplete shell never escapes its owner.

use std::sync::Arc;

use crate::error::{AccessResult, ProtocolError};
use crate::registry::Reservation;
use crate::term::{Assertion, Constant, Fort, FormulaList, Nart, Value, Variable};

use super::{Session, id_arg};

impl Session {
    /// Complete every entity in `value` and return the canonical form.
    ///
    /// Completing an already complete, canonical value returns it unchanged.
    pub fn complete(&self, value: Value) -> AccessResult<Value> {
        let _gate = self.registry.read_gate();
        self.complete_value(value)
    }

    /// Complete every element of a list in place.
    pub fn complete_list(&self, list: FormulaList) -> AccessResult<FormulaList> {
        let _gate = self.registry.read_gate();
        self.complete_items(list)
    }

    fn complete_value(&self, value: Value) -> AccessResult<Value> {
        Ok(match value {
            Value::Constant(c) => Value::Constant(self.complete_constant(c)?),
            Value::Variable(v) => Value::Variable(self.complete_variable(v)?),
            Value::Nart(n) => Value::Nart(self.complete_nart(n)?),
            Value::Assertion(a) => Value::Assertion(self.complete_assertion(a)?),
            Value::List(list) => Value::List(self.complete_items(list)?),
            atom @ (Value::Symbol(_) | Value::String(_) | Value::Integer(_) | Value::Float(_)) => {
                atom
            }
        })
    }

    fn complete_items(&self, mut list: FormulaList) -> AccessResult<FormulaList> {
        for item in list.items_mut().iter_mut() {
            let taken = std::mem::replace(item, Value::nil());
            *item = self.complete_value(taken)?;
        }
        if let Some(tail) = list.tail_mut() {
            let taken = std::mem::replace(tail, Value::nil());
            *tail = self.complete_value(taken)?;
        }
        Ok(list)
    }

    fn complete_fort(&self, fort: Fort) -> AccessResult<Fort> {
        Ok(match fort {
            Fort::Constant(c) => Fort::Constant(self.complete_constant(c)?),
            Fort::Nart(n) => Fort::Nart(self.complete_nart(n)?),
        })
    }

    fn complete_constant(&self, constant: Arc<Constant>) -> AccessResult<Arc<Constant>> {
        if let Some(name) = constant.name() {
            if let Some(hit) = self.registry.constant_by_name(name) {
                return Ok(hit);
            }
        }
        let Some(id) = constant.id() else {
            // Known by name only: resolve it like any other name lookup.
            let name = constant.name().unwrap_or_default().to_string();
            return self.known_constant_by_name(&name);
        };
        if let Some(hit) = self.registry.constant_by_id(id) {
            return Ok(hit);
        }

        if constant.name().is_none() {
            constant.fill_name(self.constant_name(id)?);
        }
        if let Some(hit) = constant.name().and_then(|n| self.registry.constant_by_name(n)) {
            tracing::debug!(id, name = hit.name(), "discarding id-only constant for canonical instance");
            return Ok(hit);
        }
        if constant.guid().is_none() {
            constant.fill_guid(self.constant_guid_by_id(id)?);
        }
        self.registry.intern_constant(constant)
    }

    fn complete_variable(&self, variable: Arc<Variable>) -> AccessResult<Arc<Variable>> {
        if variable.name().is_none() {
            let Some(id) = variable.id() else {
                return Err(ProtocolError::Shape {
                    expected: "variable with a name or id",
                    actual: "anonymous variable".into(),
                    command: String::new(),
                }
                .into());
            };
            variable.fill_name(self.variable_name(id)?);
        }
        if let Some(hit) = variable.name().and_then(|n| self.registry.variable(n)) {
            return Ok(hit);
        }
        self.registry.intern_variable(variable)
    }

    fn complete_nart(&self, nart: Arc<Nart>) -> AccessResult<Arc<Nart>> {
        let Some(id) = nart.id() else {
            // An unreified term built locally: complete its parts.
            let Some(body) = nart.body() else {
                return Ok(nart);
            };
            let functor = self.complete_fort(body.functor.clone())?;
            let args = self.complete_args(body.args.clone())?;
            return Ok(Nart::new(functor, args, None));
        };

        let pending = match self.registry.reserve_nart(id) {
            Reservation::Resolved(canonical) => return Ok(canonical),
            Reservation::Reserved(pending) => pending,
        };

        let (functor, args) = match nart.body() {
            Some(body) => (
                self.complete_fort(body.functor.clone())?,
                self.complete_args(body.args.clone())?,
            ),
            None => {
                tracing::debug!(id, "fetching NART formula");
                let find = FormulaList::command("find-nart-by-id", [id_arg(id, "find-nart-by-id")?]);
                let formula = self.converse_list(FormulaList::command(
                    "nart-el-formula",
                    [Value::List(find)],
                ))?;
                let functor = formula
                    .first()
                    .and_then(Value::as_fort)
                    .ok_or_else(|| ProtocolError::Shape {
                        expected: "NART formula headed by a functor",
                        actual: formula.to_string(),
                        command: format!("(nart-el-formula (find-nart-by-id {id}))"),
                    })?;
                (functor, formula.rest().into_items())
            }
        };
        Ok(pending.populate(functor, args))
    }

    fn complete_assertion(&self, assertion: Arc<Assertion>) -> AccessResult<Arc<Assertion>> {
        let id = assertion.id();
        let pending = match self.registry.reserve_assertion(id) {
            Reservation::Resolved(canonical) => return Ok(canonical),
            Reservation::Reserved(pending) => pending,
        };
        let formula = match assertion.formula() {
            Some(formula) => self.complete_items(formula.clone())?,
            None => {
                tracing::debug!(id, "fetching assertion formula");
                let find = FormulaList::command("find-assertion-by-id", [id_arg(id, "find-assertion-by-id")?]);
                self.converse_list(FormulaList::command(
                    "assertion-el-formula",
                    [Value::List(find)],
                ))?
            }
        };
        Ok(pending.populate(formula))
    }

    fn complete_args(&self, args: Vec<Value>) -> AccessResult<Vec<Value>> {
        args.into_iter().map(|arg| self.complete_value(arg)).collect()
    }
}
