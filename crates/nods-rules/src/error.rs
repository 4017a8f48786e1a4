// crates/nods-rules/src/error.rs
// ============================================================================
// Module: Rule Errors
// Description: Failures raised while preparing or evaluating a rule.
// Purpose: Report rule configuration defects with positions and context.
// Dependencies: crate::expr, nods-core
// ============================================================================

//! ## Overview
//! [`RuleError`] covers every stage of rule evaluation. All variants map onto
//! [`NodsError::Rule`], the one error class that is never masked with a
//! default because it points at a defect in the rule text itself.

use std::fmt;

use nods_core::NodsError;

use crate::expr::ExprError;

/// Errors raised by the rule evaluator.
///
/// # Invariants
/// - Positions are byte offsets into the rule text at the failing stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Item carries no rule text.
    EmptyRule {
        /// Rule item path.
        item: String,
    },
    /// Rule text exceeded the size limit.
    RuleTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
    /// A date macro could not be expanded.
    InvalidMacro {
        /// Offending macro text.
        text: String,
        /// Byte offset of the macro.
        position: usize,
    },
    /// A `[` was not closed or a `]` had no opener.
    UnbalancedBracket {
        /// Byte offset of the offending bracket.
        position: usize,
    },
    /// A bracketed reference is not a `category/source/item` path.
    InvalidReference {
        /// Bracket content.
        reference: String,
        /// Byte offset of the opening bracket.
        position: usize,
    },
    /// Too many distinct references.
    TooManyReferences {
        /// Maximum allowed distinct references.
        max: usize,
    },
    /// Nested rule resolution went too deep.
    DepthExceeded {
        /// Maximum rule depth.
        max_depth: usize,
    },
    /// A referenced item failed with a non-tolerated error.
    Reference {
        /// Referenced item path.
        item: String,
        /// Underlying error message.
        message: String,
    },
    /// A referenced rule failed; carries its message unchanged.
    Nested(String),
    /// Expression failed to parse or evaluate.
    Expression(ExprError),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRule {
                item,
            } => write!(f, "rule {item} has no query"),
            Self::RuleTooLarge {
                max_bytes,
                actual_bytes,
            } => write!(f, "rule exceeds size limit: {actual_bytes} bytes (max {max_bytes})"),
            Self::InvalidMacro {
                text,
                position,
            } => write!(f, "invalid date macro `{text}` at {position}"),
            Self::UnbalancedBracket {
                position,
            } => write!(f, "unbalanced bracket at {position}"),
            Self::InvalidReference {
                reference,
                position,
            } => write!(f, "invalid item reference `[{reference}]` at {position}"),
            Self::TooManyReferences {
                max,
            } => write!(f, "rule references more than {max} items"),
            Self::DepthExceeded {
                max_depth,
            } => write!(f, "rule reference depth exceeded (max {max_depth})"),
            Self::Reference {
                item,
                message,
            } => write!(f, "reference {item} failed: {message}"),
            Self::Nested(message) => f.write_str(message),
            Self::Expression(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RuleError {}

impl From<ExprError> for RuleError {
    fn from(err: ExprError) -> Self {
        Self::Expression(err)
    }
}

impl From<RuleError> for NodsError {
    fn from(err: RuleError) -> Self {
        Self::Rule(err.to_string())
    }
}
