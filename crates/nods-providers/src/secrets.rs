// crates/nods-providers/src/secrets.rs
// ============================================================================
// Module: Secrets
// Description: Secret lookup backed by the process environment or a map.
// Purpose: Resolve API keys named by source descriptors.
// Dependencies: nods-core
// ============================================================================

//! ## Overview
//! Secrets are looked up by name. [`EnvSecrets`] maps a name such as
//! `greynoise.key` to the environment variable `NODS_SECRET_GREYNOISE_KEY`
//! (prefix configurable) and consults an optional override map first.
//! [`StaticSecrets`] serves a fixed map and is used by tests and embedders.
//! An absent secret is the empty string.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use nods_core::SecretStore;

// ============================================================================
// SECTION: Environment Secrets
// ============================================================================

/// Default environment variable prefix.
pub const DEFAULT_SECRET_PREFIX: &str = "NODS_SECRET_";

/// Environment-backed secret store.
///
/// # Invariants
/// - `overrides` take precedence over environment reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSecrets {
    /// Variable name prefix.
    prefix: String,
    /// Fixed values consulted before the environment.
    overrides: BTreeMap<String, String>,
}

impl EnvSecrets {
    /// Creates a store reading variables under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: BTreeMap::new(),
        }
    }

    /// Adds a fixed override for `name`.
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Returns the environment variable consulted for `name`.
    #[must_use]
    pub fn variable_name(&self, name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{suffix}", self.prefix)
    }
}

impl Default for EnvSecrets {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_PREFIX)
    }
}

impl SecretStore for EnvSecrets {
    fn find(&self, name: &str) -> String {
        if let Some(value) = self.overrides.get(name) {
            return value.clone();
        }
        std::env::var(self.variable_name(name)).unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Static Secrets
// ============================================================================

/// Fixed in-memory secret store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSecrets(BTreeMap<String, String>);

impl StaticSecrets {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds a secret.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl SecretStore for StaticSecrets {
    fn find(&self, name: &str) -> String {
        self.0.get(name).cloned().unwrap_or_default()
    }
}
