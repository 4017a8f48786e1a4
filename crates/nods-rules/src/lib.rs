// crates/nods-rules/src/lib.rs
// ============================================================================
// Module: nods Rules
// Description: Rule expression language and evaluator for catalogue rules.
// Purpose: Compute rule items by combining other catalogue items.
// Dependencies: nods-core, serde_json, time, tracing
// ============================================================================

//! ## Overview
//! A rule item's query is a small boolean/arithmetic expression over other
//! catalogue items written as `[category/source/item]`. This crate expands
//! date macros, lifts references into parameters, normalizes operator
//! aliases, and evaluates the result. Reference lookups go through a
//! [`ReferenceResolver`], so the evaluator never depends on how items are
//! routed.
//! Invariants:
//! - Parse and evaluation failures are surfaced, never defaulted.
//! - Input size, reference count, expression nesting, and rule depth are
//!   bounded.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod evaluator;
pub mod expr;
pub mod macros;
pub mod normalize;
pub mod references;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::RuleError;
pub use evaluator::MAX_RULE_DEPTH;
pub use evaluator::RULE_INPUT_KEY;
pub use evaluator::ReferenceResolver;
pub use evaluator::RuleEvaluator;
pub use expr::ExprError;
pub use expr::Expression;
pub use expr::Value;
pub use macros::expand_date_macros;
pub use normalize::normalize_operators;
pub use references::Template;
