// crates/nods-core/src/error.rs
// ============================================================================
// Module: Query Errors
// Description: Closed error taxonomy for catalogue queries.
// Purpose: Give every query failure a stable kind that transports can map.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every query path returns [`NodsError`] values. Soft misses (not found,
//! missing input, no data present) are paired with a type-correct default at
//! the instance and router boundaries; only rule failures propagate as hard
//! configuration errors. [`ErrorKind`] collapses variants into the classes a
//! transport layer maps onto statuses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Stable classification of query errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling and transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Category, source, or item is unknown.
    NotFound,
    /// A required category input was absent.
    MissingInput,
    /// Backend was reached but held nothing for the key.
    NoData,
    /// Provider asked for a category it does not serve.
    NotImplemented,
    /// Upstream returned a malformed payload.
    BadData,
    /// Rule text failed to parse or evaluate.
    Rule,
}

impl ErrorKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::MissingInput => "missing_input",
            Self::NoData => "no_data",
            Self::NotImplemented => "not_implemented",
            Self::BadData => "bad_data",
            Self::Rule => "rule",
        }
    }
}

// ============================================================================
// SECTION: Query Error
// ============================================================================

/// Errors produced while answering a catalogue query.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Display strings are safe to return to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodsError {
    /// Category is not part of the closed category set.
    #[error("category not found: {0}")]
    CategoryNotFound(String),
    /// Source is unknown or disabled.
    #[error("source not found: {0}")]
    SourceNotFound(String),
    /// Item is unknown, disabled, or the URI was malformed.
    #[error("item not found: {0}")]
    ItemNotFound(String),
    /// The input for the category was not supplied.
    #[error("missing inputs: {0}")]
    MissingInputs(String),
    /// The backend holds no value for the requested key.
    #[error("no data present")]
    NoDataPresent,
    /// The provider does not serve the requested category.
    #[error("category {category} not implemented by {provider}")]
    NotImplemented {
        /// Provider label.
        provider: String,
        /// Requested category.
        category: String,
    },
    /// Upstream payload was malformed or did not match the declared type.
    #[error("bad data: {0}")]
    BadData(String),
    /// Rule expression failed to parse or evaluate.
    #[error("rule error: {0}")]
    Rule(String),
}

impl NodsError {
    /// Returns the stable kind for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CategoryNotFound(_) | Self::SourceNotFound(_) | Self::ItemNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::MissingInputs(_) => ErrorKind::MissingInput,
            Self::NoDataPresent => ErrorKind::NoData,
            Self::NotImplemented {
                ..
            } => ErrorKind::NotImplemented,
            Self::BadData(_) => ErrorKind::BadData,
            Self::Rule(_) => ErrorKind::Rule,
        }
    }

    /// Builds a not-implemented error for a provider/category pair.
    #[must_use]
    pub fn not_implemented(provider: &str, category: impl AsRef<str>) -> Self {
        Self::NotImplemented {
            provider: provider.to_string(),
            category: category.as_ref().to_string(),
        }
    }

    /// Returns true for soft misses that a rule may still consume as defaults.
    #[must_use]
    pub const fn is_rule_tolerated(&self) -> bool {
        matches!(self, Self::SourceNotFound(_) | Self::NoDataPresent | Self::BadData(_))
    }
}
