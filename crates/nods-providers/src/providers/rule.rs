// crates/nods-providers/src/providers/rule.rs
// ============================================================================
// Module: Rule Provider
// Description: Serves the `rule` category by evaluating catalogue rules.
// Purpose: Bridge the rule evaluator and the router.
// Dependencies: nods-core, nods-rules, crate::router
// ============================================================================

//! ## Overview
//! The `rule` input names the rule item. Its expression is evaluated by
//! [`RuleEvaluator`], which resolves each referenced item back through the
//! [`DataRouter`]. The router is held weakly because it owns this provider.

use std::sync::Weak;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::DataUri;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_rules::RULE_INPUT_KEY;
use nods_rules::RuleEvaluator;
use serde_json::Value;

use crate::router::DataRouter;

/// Provider evaluating rule items.
pub struct RuleProvider {
    /// Owning router.
    router: Weak<DataRouter>,
    /// Expression evaluator.
    evaluator: RuleEvaluator,
}

impl RuleProvider {
    /// Creates a provider resolving references through `router`.
    #[must_use]
    pub const fn new(router: Weak<DataRouter>, evaluator: RuleEvaluator) -> Self {
        Self {
            router,
            evaluator,
        }
    }
}

impl DataProvider for RuleProvider {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Rule {
            return Err(NodsError::not_implemented("rule", category));
        }
        let path = inputs
            .non_empty(RULE_INPUT_KEY)
            .ok_or_else(|| NodsError::MissingInputs(RULE_INPUT_KEY.to_string()))?;
        let Some(router) = self.router.upgrade() else {
            return Err(NodsError::NoDataPresent);
        };
        let item = router.schema().item(&DataUri::parse(path))?;
        let resolve = |ctx: &QueryContext, uri: &DataUri, inputs: &DataInputs| router.data_value(ctx, uri, inputs);
        self.evaluator.evaluate(ctx, &item, inputs, &resolve).map_err(NodsError::from)
    }

    fn is_cached(&self) -> bool {
        false
    }
}
