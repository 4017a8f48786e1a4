// crates/nods-rules/src/evaluator.rs
// ============================================================================
// Module: Rule Evaluator
// Description: Resolves item references and evaluates a rule's expression.
// Purpose: Compute rule item values from other catalogue items.
// Dependencies: crate::{expr, macros, normalize, references}, nods-core, time
// ============================================================================

//! ## Overview
//! Evaluation runs in fixed stages: date macros are expanded, bracketed item
//! references are lifted into parameter slots and resolved through a
//! [`ReferenceResolver`], operator aliases are normalized, and the resulting
//! expression is parsed and evaluated. The result is written at the rule
//! item's extraction path.
//!
//! References that miss softly (source not found, no data, bad data) still
//! participate with their type-correct default. Any other reference failure,
//! and every parse or evaluation failure, aborts the rule.
//!
//! # Invariants
//! - Each reference is resolved with the caller's inputs, `rule` rewritten to
//!   the referenced path, and a context one level deeper.
//! - Rules nested deeper than [`MAX_RULE_DEPTH`] fail instead of recursing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use nods_core::DataInputs;
use nods_core::DataUri;
use nods_core::Item;
use nods_core::ItemAnswer;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::TypedValue;
use nods_core::path::write_at;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::RuleError;
use crate::expr::Expression;
use crate::expr::MAX_EXPR_INPUT_BYTES;
use crate::expr::Value;
use crate::macros::expand_date_macros;
use crate::normalize::normalize_operators;
use crate::references::Template;
use crate::references::placeholder;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum number of nested rule levels.
pub const MAX_RULE_DEPTH: usize = 8;

/// Input key carrying the path of the item a rule lookup is for.
pub const RULE_INPUT_KEY: &str = "rule";

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves referenced items to typed answers.
pub trait ReferenceResolver {
    /// Returns the answer for `uri` given `inputs`.
    fn resolve(&self, ctx: &QueryContext, uri: &DataUri, inputs: &DataInputs) -> ItemAnswer;
}

impl<F> ReferenceResolver for F
where
    F: Fn(&QueryContext, &DataUri, &DataInputs) -> ItemAnswer,
{
    fn resolve(&self, ctx: &QueryContext, uri: &DataUri, inputs: &DataInputs) -> ItemAnswer {
        (self)(ctx, uri, inputs)
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Slot binding produced from a resolved reference.
enum Binding {
    /// Bound as a named parameter.
    Param(Value),
    /// Substituted into the text as a literal.
    Literal(String),
}

/// Rule evaluator with an optional fixed clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator {
    /// Evaluation instant override; `None` uses the current UTC time.
    now: Option<OffsetDateTime>,
}

impl RuleEvaluator {
    /// Creates an evaluator using the current time.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: None,
        }
    }

    /// Creates an evaluator pinned to `now`.
    #[must_use]
    pub const fn at(now: OffsetDateTime) -> Self {
        Self {
            now: Some(now),
        }
    }

    /// Evaluates `item`'s rule and encodes the result at its extraction path.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when the rule is empty or malformed, a reference
    /// fails with a non-tolerated error, or nesting is too deep.
    pub fn evaluate(
        &self,
        ctx: &QueryContext,
        item: &Item,
        inputs: &DataInputs,
        resolver: &dyn ReferenceResolver,
    ) -> Result<serde_json::Value, RuleError> {
        let value = self.evaluate_value(ctx, item, inputs, resolver)?;
        Ok(write_at(&item.gjson, value.to_json()))
    }

    /// Evaluates `item`'s rule and returns the raw expression value.
    ///
    /// # Errors
    ///
    /// See [`RuleEvaluator::evaluate`].
    pub fn evaluate_value(
        &self,
        ctx: &QueryContext,
        item: &Item,
        inputs: &DataInputs,
        resolver: &dyn ReferenceResolver,
    ) -> Result<Value, RuleError> {
        if ctx.depth() >= MAX_RULE_DEPTH {
            return Err(RuleError::DepthExceeded {
                max_depth: MAX_RULE_DEPTH,
            });
        }
        let query = item.query.trim();
        if query.is_empty() {
            return Err(RuleError::EmptyRule {
                item: item.path.key(),
            });
        }
        if query.len() > MAX_EXPR_INPUT_BYTES {
            return Err(RuleError::RuleTooLarge {
                max_bytes: MAX_EXPR_INPUT_BYTES,
                actual_bytes: query.len(),
            });
        }

        let now = self.now.unwrap_or_else(OffsetDateTime::now_utc);
        let expanded = expand_date_macros(query, now)?;
        let template = Template::parse(&expanded)?;

        let nested = ctx.nested();
        let mut params = BTreeMap::new();
        let mut literals = BTreeMap::new();
        for (slot, uri) in template.references().iter().enumerate() {
            let lookup_inputs = inputs.clone().with(RULE_INPUT_KEY, uri.key());
            let answer = resolver.resolve(&nested, uri, &lookup_inputs);
            match bind(uri, answer)? {
                Binding::Param(value) => {
                    params.insert(placeholder(slot), value);
                }
                Binding::Literal(text) => {
                    literals.insert(slot, text);
                }
            }
        }

        let text = normalize_operators(&template.render(|slot| literals.get(&slot).cloned()));
        let value = Expression::parse(&text)?.evaluate(&params)?;
        debug!(
            rule = %item.path,
            references = template.references().len(),
            depth = ctx.depth(),
            result = %value,
            "rule evaluated"
        );
        Ok(value)
    }
}

/// Converts a reference answer into a parameter or literal binding.
fn bind(uri: &DataUri, answer: ItemAnswer) -> Result<Binding, RuleError> {
    if let Some(err) = answer.error {
        match err {
            NodsError::Rule(message) => return Err(RuleError::Nested(message)),
            err if err.is_rule_tolerated() => {
                debug!(reference = %uri, error = %err, "reference defaulted");
            }
            err => {
                return Err(RuleError::Reference {
                    item: uri.key(),
                    message: err.to_string(),
                });
            }
        }
    }
    #[allow(clippy::cast_precision_loss, reason = "Expression numbers are f64.")]
    let binding = match answer.result.value() {
        TypedValue::Boolean(flag) => Binding::Param(Value::Bool(*flag)),
        TypedValue::Integer(number) => Binding::Param(Value::Number(*number as f64)),
        TypedValue::Float(number) => Binding::Param(Value::Number(*number)),
        TypedValue::String(text) | TypedValue::Json(text) => Binding::Param(Value::Str(text.clone())),
        TypedValue::Date(text) => Binding::Literal(quote_literal(text)),
        TypedValue::Null => Binding::Param(Value::Bool(false)),
    };
    Ok(binding)
}

/// Quotes `text` as an expression string literal.
fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use nods_core::DataInputs;
    use nods_core::DataResult;
    use nods_core::DataUri;
    use nods_core::Item;
    use nods_core::ItemAnswer;
    use nods_core::ItemDescriptor;
    use nods_core::ItemType;
    use nods_core::NodsError;
    use nods_core::QueryContext;
    use nods_core::TypedValue;
    use serde_json::json;
    use time::macros::datetime;

    use super::RuleEvaluator;
    use crate::error::RuleError;

    /// Builds a rule item.
    fn rule(query: &str, gjson: &str) -> Item {
        Item::from_descriptor(
            ItemDescriptor::new("rule/rule/test", gjson, ItemType::Boolean).with_query(query),
            true,
        )
    }

    /// Tests that dates are compared as substituted literals.
    #[test]
    fn date_references_are_substituted_as_literals() {
        let evaluator = RuleEvaluator::at(datetime!(2024-06-01 00:00 UTC));
        let resolver = |_: &QueryContext, _: &DataUri, _: &DataInputs| {
            ItemAnswer::ok(DataResult::new(TypedValue::Date("2024-05-20".to_string())))
        };
        let item = rule("[domain/whois/created] > @{30.days.ago}", "");
        let out = evaluator.evaluate(&QueryContext::new(), &item, &DataInputs::new(), &resolver);
        assert_eq!(out.unwrap(), json!(true));
    }

    /// Tests that the rule key is rewritten for each reference.
    #[test]
    fn rule_key_names_the_referenced_item() {
        let evaluator = RuleEvaluator::new();
        let resolver = |_: &QueryContext, uri: &DataUri, inputs: &DataInputs| {
            assert_eq!(inputs.get("rule"), Some(uri.key().as_str()));
            ItemAnswer::ok(DataResult::new(TypedValue::Boolean(true)))
        };
        let item = rule("[ip/a/x] AND [ip/b/y]", "result");
        let inputs = DataInputs::new().with("rule", "rule/rule/test");
        let out = evaluator.evaluate(&QueryContext::new(), &item, &inputs, &resolver).unwrap();
        assert_eq!(out, json!({"result": true}));
    }

    /// Tests default participation versus aborting errors.
    #[test]
    fn soft_misses_default_and_hard_errors_abort() {
        let evaluator = RuleEvaluator::new();
        let soft = |_: &QueryContext, _: &DataUri, _: &DataInputs| {
            ItemAnswer::miss(ItemType::Boolean, NodsError::NoDataPresent)
        };
        let item = rule("![ip/a/x]", "");
        let out = evaluator.evaluate(&QueryContext::new(), &item, &DataInputs::new(), &soft);
        assert_eq!(out.unwrap(), json!(true));

        let hard = |_: &QueryContext, uri: &DataUri, _: &DataInputs| {
            ItemAnswer::miss(ItemType::Boolean, NodsError::ItemNotFound(uri.key()))
        };
        let out = evaluator.evaluate(&QueryContext::new(), &item, &DataInputs::new(), &hard);
        assert!(matches!(out, Err(RuleError::Reference { .. })));
    }

    /// Tests the nesting guard.
    #[test]
    fn depth_limit_is_enforced() {
        let mut ctx = QueryContext::new();
        for _ in 0 .. super::MAX_RULE_DEPTH {
            ctx = ctx.nested();
        }
        let resolver = |_: &QueryContext, _: &DataUri, _: &DataInputs| {
            ItemAnswer::ok(DataResult::new(TypedValue::Boolean(true)))
        };
        let out = RuleEvaluator::new().evaluate(&ctx, &rule("[ip/a/x]", ""), &DataInputs::new(), &resolver);
        assert!(matches!(out, Err(RuleError::DepthExceeded { .. })));
    }

    /// Tests that an empty query is a rule error.
    #[test]
    fn empty_query_is_rejected() {
        let resolver = |_: &QueryContext, _: &DataUri, _: &DataInputs| {
            ItemAnswer::ok(DataResult::new(TypedValue::Null))
        };
        let out = RuleEvaluator::new().evaluate(&QueryContext::new(), &rule("  ", ""), &DataInputs::new(), &resolver);
        assert!(matches!(out, Err(RuleError::EmptyRule { .. })));
    }
}
