//! Queries used by inference consumers, cached and uncached.
//!
//! The `_cached` variants memoize through the session's
//! [`QueryCaches`](crate::cache::QueryCaches). A query naming an incomplete
//! entity runs uncached: such entities hash by allocation until completion
//! fills them in, so they cannot serve as keys. Queries scoped to
//! `#$InferencePSC` or `#$EverythingPSC` run over all microtheories.

use std::sync::Arc;

use crate::error::AccessResult;
use crate::term::{Constant, Fort, FormulaList, Symbol, Value, Variable};
use crate::well_known::WellKnown;

use super::Session;

/// Shared prefix of `ask-template` queries: no result caching, unique bindings.
const ASK_TEMPLATE_PRELUDE: &str = "(clet ((*cache-inference-results* nil) \
     (*compute-inference-results* nil) \
     (*unique-inference-result-bindings* t) \
     (*generate-readable-fi-results* nil)) \
     (without-wff-semantics ";

#[derive(Debug, Clone, Copy)]
enum Direction {
    Backward,
    Forward,
}

impl Direction {
    fn keyword(self) -> &'static str {
        match self {
            Direction::Backward => ":backward",
            Direction::Forward => ":forward",
        }
    }
}

fn stable_keys(forts: &[&Fort]) -> bool {
    let stable = forts.iter().all(|fort| fort.is_complete());
    if !stable {
        tracing::trace!("incomplete entity in cache key, querying uncached");
    }
    stable
}

impl Session {
    /// Whether `mt` stands for "every microtheory".
    fn is_all_mts(&self, mt: &Fort) -> AccessResult<bool> {
        let Fort::Constant(c) = mt else {
            return Ok(false);
        };
        Ok(Arc::ptr_eq(c, &self.well_known(WellKnown::InferencePsc)?)
            || Arc::ptr_eq(c, &self.well_known(WellKnown::EverythingPsc)?))
    }

    /// `(with-all-mts ` or `(with-mt <mt> `, to be closed by the caller.
    fn mt_scope(&self, mt: &Fort) -> AccessResult<String> {
        Ok(if self.is_all_mts(mt)? {
            "(with-all-mts ".to_string()
        } else {
            format!("(with-mt {mt} ")
        })
    }

    // -----------------------------------------------------------------------
    // Ground queries
    // -----------------------------------------------------------------------

    /// Whether the ground `query` holds in `mt`.
    pub fn is_query_true(&self, query: &FormulaList, mt: &Fort) -> AccessResult<bool> {
        let command = FormulaList::command(
            "removal-ask",
            [Value::quoted(query.clone()), Value::from(mt)],
        );
        Ok(!self.converse_list(command)?.is_empty())
    }

    pub fn is_query_true_cached(&self, query: &FormulaList, mt: &Fort) -> AccessResult<bool> {
        if !query.is_complete() || !stable_keys(&[mt]) {
            return self.is_query_true(query, mt);
        }
        self.caches
            .ask
            .cached((query.clone(), mt.clone()), || self.is_query_true(query, mt))
    }

    /// Whether `genl` is a generalization of `spec` in any microtheory.
    pub fn is_genl_of(&self, genl: &Fort, spec: &Fort) -> AccessResult<bool> {
        self.converse_bool(format!("(genl-in-any-mt? {spec} {genl})"))
    }

    pub fn is_genl_of_cached(&self, genl: &Fort, spec: &Fort) -> AccessResult<bool> {
        if !stable_keys(&[genl, spec]) {
            return self.is_genl_of(genl, spec);
        }
        self.caches
            .genl
            .cached((genl.clone(), spec.clone()), || self.is_genl_of(genl, spec))
    }

    pub fn is_spec_of(&self, spec: &Fort, genl: &Fort) -> AccessResult<bool> {
        self.is_genl_of(genl, spec)
    }

    pub fn is_spec_of_cached(&self, spec: &Fort, genl: &Fort) -> AccessResult<bool> {
        self.is_genl_of_cached(genl, spec)
    }

    /// Whether `term` is a collection in any microtheory.
    pub fn is_collection(&self, term: &Fort) -> AccessResult<bool> {
        let collection = self.well_known(WellKnown::Collection)?;
        self.converse_bool(format!("(isa-in-any-mt? {term} {collection})"))
    }

    pub fn is_collection_cached(&self, term: &Fort) -> AccessResult<bool> {
        if !stable_keys(&[term]) {
            return self.is_collection(term);
        }
        self.caches
            .collection
            .cached(term.clone(), || self.is_collection(term))
    }

    /// Whether `term` is an instance of `collection` in `mt`.
    pub fn isa(&self, term: &Fort, collection: &Fort, mt: &Fort) -> AccessResult<bool> {
        self.converse_bool(FormulaList::command(
            "isa?",
            [Value::from(term), Value::from(collection), Value::from(mt)],
        ))
    }

    /// Whether `term` is an instance of `collection` in any microtheory.
    pub fn isa_in_any_mt(&self, term: &Fort, collection: &Fort) -> AccessResult<bool> {
        self.converse_bool(format!("(isa-in-any-mt? {term} {collection})"))
    }

    /// Number of instances of `collection` in `mt`.
    pub fn count_all_instances(&self, collection: &Fort, mt: &Fort) -> AccessResult<i64> {
        self.converse_int(format!("(count-all-instances {collection} {mt})"))
    }

    pub fn count_all_instances_cached(&self, collection: &Fort, mt: &Fort) -> AccessResult<i64> {
        if !stable_keys(&[collection, mt]) {
            return self.count_all_instances(collection, mt);
        }
        self.caches.count.cached((collection.clone(), mt.clone()), || {
            self.count_all_instances(collection, mt)
        })
    }

    /// Size of the best index for `formula` in `mt`.
    pub fn count_using_best_index(&self, formula: &FormulaList, mt: &Fort) -> AccessResult<i64> {
        let count = FormulaList::command(
            "best-index-count",
            [Value::quoted(formula.clone()), Value::t(), Value::t()],
        );
        let command = if self.is_all_mts(mt)? {
            FormulaList::command("with-all-mts", [Value::List(count)])
        } else {
            FormulaList::command("with-mt", [Value::from(mt), Value::List(count)])
        };
        self.converse_int(command)
    }

    pub fn is_well_formed_formula(&self, formula: &FormulaList) -> AccessResult<bool> {
        let wff = FormulaList::command("el-wff?", [Value::quoted(formula.clone())]);
        self.converse_bool(FormulaList::command("with-all-mts", [Value::List(wff)]))
    }

    // -----------------------------------------------------------------------
    // Bindings
    // -----------------------------------------------------------------------

    /// Bindings of `variable` that satisfy `query` in `mt`.
    pub fn ask_with_variable(
        &self,
        query: &FormulaList,
        variable: &Arc<Variable>,
        mt: &Fort,
    ) -> AccessResult<FormulaList> {
        self.converse_list(format!(
            "{ASK_TEMPLATE_PRELUDE}(ask-template '{variable} '{query} {mt} 0 nil nil nil)))"
        ))
    }

    /// Tuples of bindings of `variables` that satisfy `query` in `mt`.
    pub fn ask_with_variables(
        &self,
        query: &FormulaList,
        variables: &[Arc<Variable>],
        mt: &Fort,
    ) -> AccessResult<FormulaList> {
        let template: FormulaList = variables.iter().cloned().map(Value::Variable).collect();
        self.converse_list(format!(
            "{ASK_TEMPLATE_PRELUDE}(ask-template '{template} '{query} {mt} 0 nil nil nil)))"
        ))
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    /// `#$implies` rules that can conclude `predicate` by backward chaining.
    pub fn backchain_rules(&self, predicate: &Arc<Constant>, mt: &Fort) -> AccessResult<FormulaList> {
        self.predicate_rules(predicate, mt, Direction::Backward)
    }

    /// `#$implies` rules that fire forward on `predicate`.
    pub fn forward_chain_rules(
        &self,
        predicate: &Arc<Constant>,
        mt: &Fort,
    ) -> AccessResult<FormulaList> {
        self.predicate_rules(predicate, mt, Direction::Forward)
    }

    /// Backward rules whose consequent unifies with `formula`.
    pub fn backchain_implication_rules(
        &self,
        predicate: &Arc<Constant>,
        formula: &FormulaList,
        mt: &Fort,
    ) -> AccessResult<FormulaList> {
        self.implication_rules(predicate, formula, mt, Direction::Backward)
    }

    /// Forward rules whose consequent unifies with `formula`.
    pub fn forward_chain_implication_rules(
        &self,
        predicate: &Arc<Constant>,
        formula: &FormulaList,
        mt: &Fort,
    ) -> AccessResult<FormulaList> {
        self.implication_rules(predicate, formula, mt, Direction::Forward)
    }

    fn predicate_rules(
        &self,
        predicate: &Arc<Constant>,
        mt: &Fort,
        direction: Direction,
    ) -> AccessResult<FormulaList> {
        let scope = self.mt_scope(mt)?;
        let direction = direction.keyword();
        self.converse_list(format!(
            "(clet (backchain-rules) {scope}\
             (do-predicate-rule-index (rule {predicate} :sense :pos :done nil :direction {direction}) \
             (pwhen (eq (first (assertion-el-formula rule)) #$implies) \
             (cpush (assertion-el-formula rule) backchain-rules)))) \
             backchain-rules)"
        ))
    }

    fn implication_rules(
        &self,
        predicate: &Arc<Constant>,
        formula: &FormulaList,
        mt: &Fort,
        direction: Direction,
    ) -> AccessResult<FormulaList> {
        let scope = self.mt_scope(mt)?;
        let direction = direction.keyword();
        self.converse_list(format!(
            "(clet (backchain-rules formula) {scope}\
             (do-predicate-rule-index (rule {predicate} :pos nil {direction}) \
             (csetq formula (assertion-el-formula rule)) \
             (pwhen (cand (eq (first formula) #$implies) \
             (unify-el-possible '{formula} (third formula))) \
             (cpush formula backchain-rules)))) \
             backchain-rules)"
        ))
    }

    // -----------------------------------------------------------------------
    // Predicate properties
    // -----------------------------------------------------------------------

    /// Whether some `predicate` assertion has `term` at `arg_position` in `mt`.
    pub fn has_some_predicate_using_term(
        &self,
        predicate: &Arc<Constant>,
        term: &Fort,
        arg_position: u32,
        mt: &Fort,
    ) -> AccessResult<bool> {
        let mut args = vec![Value::from(term), Value::Constant(predicate.clone())];
        let head = if self.is_all_mts(mt)? {
            "some-pred-value-in-any-mt"
        } else {
            args.push(Value::from(mt));
            "some-pred-value-in-relevant-mts"
        };
        args.push(Value::from(i64::from(arg_position)));
        self.converse_bool(FormulaList::command(head, args))
    }

    pub fn is_backchain_required(&self, predicate: &Arc<Constant>, mt: &Fort) -> AccessResult<bool> {
        self.has_backchain_marker(WellKnown::BackchainRequired, predicate, mt)
    }

    pub fn is_backchain_encouraged(&self, predicate: &Arc<Constant>, mt: &Fort) -> AccessResult<bool> {
        self.has_backchain_marker(WellKnown::BackchainEncouraged, predicate, mt)
    }

    pub fn is_backchain_discouraged(&self, predicate: &Arc<Constant>, mt: &Fort) -> AccessResult<bool> {
        self.has_backchain_marker(WellKnown::BackchainDiscouraged, predicate, mt)
    }

    pub fn is_backchain_forbidden(&self, predicate: &Arc<Constant>, mt: &Fort) -> AccessResult<bool> {
        self.has_backchain_marker(WellKnown::BackchainForbidden, predicate, mt)
    }

    fn has_backchain_marker(
        &self,
        marker: WellKnown,
        predicate: &Arc<Constant>,
        mt: &Fort,
    ) -> AccessResult<bool> {
        let marker = self.well_known(marker)?;
        self.has_some_predicate_using_term(&marker, &Fort::Constant(predicate.clone()), 1, mt)
    }

    pub fn is_irreflexive_predicate(&self, predicate: &Arc<Constant>, mt: &Fort) -> AccessResult<bool> {
        let irreflexive = self.well_known(WellKnown::IrreflexiveBinaryPredicate)?;
        self.isa(
            &Fort::Constant(predicate.clone()),
            &Fort::Constant(irreflexive),
            mt,
        )
    }

    // -----------------------------------------------------------------------
    // Server symbols
    // -----------------------------------------------------------------------

    pub fn symbol_value(&self, symbol: &Symbol) -> AccessResult<Value> {
        self.converse_object(format!("(symbol-value '{symbol})"))
    }

    pub fn set_symbol_value(&self, symbol: &Symbol, value: impl Into<Value>) -> AccessResult<()> {
        self.converse_void(FormulaList::command(
            "csetq",
            [Value::Symbol(symbol.clone()), value.into()],
        ))
    }
}
