// crates/nods-core/src/inputs.rs
// ============================================================================
// Module: Data Inputs
// Description: Request parameters passed to providers.
// Purpose: Carry caller inputs and strip internal routing keys on output.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`DataInputs`] is a string map of request parameters. The keys `role`,
//! `key`, `type`, and `rule` are reserved for internal routing and are never
//! echoed back to callers.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// Keys reserved for internal routing.
pub const RESERVED_KEYS: [&str; 4] = ["role", "key", "type", "rule"];

/// Request parameters keyed by input name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataInputs(BTreeMap<String, String>);

impl DataInputs {
    /// Creates an empty input map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the value for `key` when present and non-blank.
    #[must_use]
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|value| !value.is_empty())
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns a copy with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns a copy without the reserved routing keys.
    #[must_use]
    pub fn stripped(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns true when no inputs are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DataInputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}
