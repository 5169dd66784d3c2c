//! Knowledge-base mutations.
//!
//! Creations and assertions are wrapped in `with-bookkeeping-info` so the
//! server records the session's cyclist and project. Result caches are never
//! invalidated here; callers that need fresh answers after a mutation call
//! [`Session::clear_result_caches`].

use std::sync::Arc;

use crate::error::AccessResult;
use crate::term::{Constant, Fort, Value};
use crate::well_known::WellKnown;

use super::Session;

impl Session {
    // -----------------------------------------------------------------------
    // Bookkeeping identity
    // -----------------------------------------------------------------------

    /// Set the author attached to new knowledge-base entities, by name.
    pub fn set_cyclist(&self, name: &str) -> AccessResult<()> {
        let cyclist = self.known_constant_by_name(name)?;
        self.set_cyclist_constant(cyclist);
        Ok(())
    }

    pub fn set_cyclist_constant(&self, cyclist: Arc<Constant>) {
        tracing::debug!(cyclist = cyclist.name(), "bookkeeping cyclist set");
        self.bookkeeping.write().cyclist = Some(cyclist);
    }

    /// Set the project attached to new knowledge-base entities, by name.
    pub fn set_project(&self, name: &str) -> AccessResult<()> {
        let project = self.known_constant_by_name(name)?;
        self.set_project_constant(project);
        Ok(())
    }

    pub fn set_project_constant(&self, project: Arc<Constant>) {
        tracing::debug!(project = project.name(), "bookkeeping project set");
        self.bookkeeping.write().project = Some(project);
    }

    pub fn cyclist(&self) -> Option<Arc<Constant>> {
        self.bookkeeping().cyclist
    }

    pub fn project(&self) -> Option<Arc<Constant>> {
        self.bookkeeping().project
    }

    /// Wrap `command` so the server attributes it to this session's identity.
    pub fn with_bookkeeping(&self, command: &str) -> String {
        let bookkeeping = self.bookkeeping();
        let cyclist = bookkeeping
            .cyclist
            .map_or_else(|| "nil".to_string(), |c| c.to_string());
        let project = bookkeeping
            .project
            .map_or_else(|| "nil".to_string(), |p| p.to_string());
        format!(
            "(with-bookkeeping-info (new-bookkeeping-info {cyclist} (the-date) {project} (the-second)) {command})"
        )
    }

    // -----------------------------------------------------------------------
    // Creation and assertion
    // -----------------------------------------------------------------------

    /// Create a permanent constant named `name`, or return the existing one.
    pub fn create_constant(&self, name: &str) -> AccessResult<Arc<Constant>> {
        let _serial = self.mutation_lock.lock();
        let name = name.strip_prefix("#$").unwrap_or(name);
        if let Some(existing) = self.constant_by_name(name)? {
            return Ok(existing);
        }
        let create = format!("(cyc-create-new-permanent {})", Value::from(name));
        self.converse_void(self.with_bookkeeping(&create))?;
        tracing::info!(name, "created constant");
        self.known_constant_by_name(name)
    }

    /// Assert the ground atomic formula `(predicate args...)` in `mt`.
    pub fn assert_gaf(
        &self,
        mt: &Fort,
        predicate: &Fort,
        args: impl IntoIterator<Item = Value>,
    ) -> AccessResult<()> {
        let mut formula = format!("({predicate}");
        for arg in args {
            formula.push(' ');
            formula.push_str(&arg.to_string());
        }
        formula.push(')');
        let assert = format!("(cyc-assert '{formula} {mt})");
        tracing::debug!(%mt, %formula, "asserting");
        self.converse_void(self.with_bookkeeping(&assert))
    }

    pub fn assert_comment(&self, constant: &Arc<Constant>, comment: &str, mt: &Fort) -> AccessResult<()> {
        let predicate = self.well_known(WellKnown::Comment)?;
        self.assert_gaf(
            mt,
            &Fort::Constant(predicate),
            [Value::Constant(constant.clone()), Value::from(comment)],
        )
    }

    pub fn assert_isa(&self, term: &Fort, collection: &Fort, mt: &Fort) -> AccessResult<()> {
        let isa = self.well_known(WellKnown::Isa)?;
        self.assert_gaf(mt, &Fort::Constant(isa), [Value::from(term), Value::from(collection)])
    }

    pub fn assert_genls(&self, spec: &Fort, genl: &Fort, mt: &Fort) -> AccessResult<()> {
        let genls = self.well_known(WellKnown::Genls)?;
        self.assert_gaf(mt, &Fort::Constant(genls), [Value::from(spec), Value::from(genl)])
    }

    pub fn assert_isa_collection(&self, constant: &Arc<Constant>, mt: &Fort) -> AccessResult<()> {
        let collection = self.well_known(WellKnown::Collection)?;
        self.assert_isa(&Fort::Constant(constant.clone()), &Fort::Constant(collection), mt)
    }

    pub fn assert_isa_binary_predicate(&self, constant: &Arc<Constant>, mt: &Fort) -> AccessResult<()> {
        let binary = self.well_known(WellKnown::BinaryPredicate)?;
        self.assert_isa(&Fort::Constant(constant.clone()), &Fort::Constant(binary), mt)
    }

    /// Create microtheory `name` with a comment, a type and its `genlMt`s, all
    /// asserted in `#$BaseKB`. An existing microtheory of that name is killed
    /// first.
    pub fn create_microtheory(
        &self,
        name: &str,
        comment: &str,
        isa_mt: &Fort,
        genl_mts: &[Fort],
    ) -> AccessResult<Arc<Constant>> {
        if let Some(existing) = self.constant_by_name(name)? {
            self.kill(&Fort::Constant(existing))?;
        }
        let mt = self.create_constant(name)?;
        let base_kb = Fort::Constant(self.well_known(WellKnown::BaseKb)?);
        let mt_fort = Fort::Constant(mt.clone());

        self.assert_comment(&mt, comment, &base_kb)?;
        self.assert_isa(&mt_fort, isa_mt, &base_kb)?;
        let genl_mt = Fort::Constant(self.well_known(WellKnown::GenlMt)?);
        for genl in genl_mts {
            self.assert_gaf(&base_kb, &genl_mt, [Value::from(&mt_fort), Value::from(genl)])?;
        }
        tracing::info!(name, genl_mts = genl_mts.len(), "created microtheory");
        Ok(mt)
    }

    // -----------------------------------------------------------------------
    // Retraction
    // -----------------------------------------------------------------------

    /// Kill a constant or NART and drop it from the registry.
    ///
    /// Killing a microtheory cascades on the server; only `fort` itself is
    /// removed here. Registry removal happens only after the server accepts
    /// the kill, and no completion runs between the two steps.
    pub fn kill(&self, fort: &Fort) -> AccessResult<()> {
        let _serial = self.mutation_lock.lock();
        let _gate = self.registry.write_gate();

        let command = match fort {
            Fort::Constant(c) => format!("(cyc-kill {c})"),
            Fort::Nart(n) => format!("(cyc-kill '{n})"),
        };
        self.converse_bool(command)?;

        match fort {
            Fort::Constant(c) => self.registry.remove_constant(c),
            Fort::Nart(n) => self.registry.remove_nart(n),
        }
        tracing::info!(%fort, "killed");
        Ok(())
    }

    /// Kill each fort in order, stopping at the first failure.
    pub fn kill_all<'a>(&self, forts: impl IntoIterator<Item = &'a Fort>) -> AccessResult<()> {
        forts.into_iter().try_for_each(|fort| self.kill(fort))
    }
}
