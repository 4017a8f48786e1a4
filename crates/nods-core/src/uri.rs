// crates/nods-core/src/uri.rs
// ============================================================================
// Module: Data URI
// Description: Three-part `category/source/item` keys.
// Purpose: Decompose and recompose catalogue keys without failing on bad input.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`DataUri`] splits a catalogue path into its category, source, and item
//! segments. Malformed input never fails: it normalizes to the
//! `unknown/unknown/unknown` sentinel, which callers must treat as not found.

use std::fmt;

use serde::Serialize;
use serde::Serializer;

/// Segment used by the sentinel URI.
const UNKNOWN: &str = "unknown";

/// Catalogue key of the form `category/source/item`.
///
/// # Invariants
/// - Equality is string equality on the recomposed key.
/// - Malformed input becomes the sentinel; [`DataUri::is_unknown`] reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataUri {
    /// Category segment.
    category: String,
    /// Source (vendor) segment.
    source: String,
    /// Item name segment; may itself contain `/`.
    item: String,
}

impl DataUri {
    /// Parses a path, normalizing malformed input to the sentinel URI.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let mut parts = path.trim().splitn(3, '/');
        let (Some(category), Some(source), Some(item)) = (parts.next(), parts.next(), parts.next())
        else {
            return Self::unknown();
        };
        if category.is_empty() || source.is_empty() || item.is_empty() {
            return Self::unknown();
        }
        Self {
            category: category.to_string(),
            source: source.to_string(),
            item: item.to_string(),
        }
    }

    /// Builds a URI from already separated segments.
    #[must_use]
    pub fn from_parts(category: &str, source: &str, item: &str) -> Self {
        Self::parse(&format!("{category}/{source}/{item}"))
    }

    /// Returns the sentinel URI used for malformed input.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            category: UNKNOWN.to_string(),
            source: UNKNOWN.to_string(),
            item: UNKNOWN.to_string(),
        }
    }

    /// Returns true when this is the sentinel URI.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.category == UNKNOWN && self.source == UNKNOWN && self.item == UNKNOWN
    }

    /// Returns the category segment.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the source segment.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the item segment.
    #[must_use]
    pub fn item(&self) -> &str {
        &self.item
    }

    /// Returns the recomposed key.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.category, self.source, self.item)
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
