// crates/nods-core/src/interfaces.rs
// ============================================================================
// Module: nods Interfaces
// Description: Backend-agnostic contracts for providers and collaborators.
// Purpose: Define the surfaces the router, providers, and stores plug into.
// Dependencies: crate::{category, context, error, inputs}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`DataProvider`] is the single capability every backend implements: turn a
//! category plus request inputs into a raw JSON payload. The remaining traits
//! describe collaborators the providers consume: IP-prefix stores, flat
//! key/value stores, file watchers, and secret lookup.
//! Implementations must be `Send + Sync`; the router shares them across
//! concurrent requests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::category::Category;
use crate::context::QueryContext;
use crate::error::NodsError;
use crate::inputs::DataInputs;

// ============================================================================
// SECTION: Data Provider
// ============================================================================

/// Backend adapter producing raw payloads for a category.
pub trait DataProvider: Send + Sync {
    /// Returns the raw payload for `category` given the request inputs.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::NoDataPresent`] on a soft miss and
    /// [`NodsError::NotImplemented`] for categories the provider does not serve.
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError>;

    /// Returns true when results may be memoized by the caching decorator.
    fn is_cached(&self) -> bool;
}

impl<P: DataProvider + ?Sized> DataProvider for Arc<P> {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        (**self).category_info(ctx, category, inputs)
    }

    fn is_cached(&self) -> bool {
        (**self).is_cached()
    }
}

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Errors raised while opening or reloading a store file.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File could not be read.
    #[error("store io error: {0}")]
    Io(String),
    /// File content is malformed.
    #[error("store parse error: {0}")]
    Parse(String),
    /// A prefix or key is invalid.
    #[error("invalid store entry: {0}")]
    InvalidEntry(String),
}

/// IP-prefix keyed store with longest-prefix lookups.
pub trait TrieStore: Send + Sync {
    /// Returns the payload for the longest prefix containing `ip`.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::NoDataPresent`] on any miss.
    fn lookup(&self, ip: IpAddr) -> Result<Value, NodsError>;

    /// Reopens the backing file after replacement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be reloaded; the previous
    /// table stays active.
    fn resync(&self) -> Result<(), StoreError>;

    /// Returns the backing file path.
    fn file_name(&self) -> &Path;
}

/// Exact-match key/value store.
pub trait KeyValueStore: Send + Sync {
    /// Returns the payload stored for `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Reloads the table from its backing file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be reloaded.
    fn reload(&self) -> Result<(), StoreError>;

    /// Returns the backing file path.
    fn file_name(&self) -> &Path;
}

// ============================================================================
// SECTION: File Watching
// ============================================================================

/// Callback invoked when a watched file changes.
pub type ReloadCallback = Arc<dyn Fn() + Send + Sync>;

/// Errors raised by file watchers.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watcher refused the registration.
    #[error("watch registration failed: {0}")]
    Register(String),
}

/// File-change notification service.
pub trait FileWatcher: Send + Sync {
    /// Registers `on_change` to run whenever `path` changes.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] when the path cannot be watched.
    fn add(&self, path: &Path, on_change: ReloadCallback) -> Result<(), WatchError>;

    /// Starts background dispatch of change events (fire and forget).
    fn listen(&self);
}

// ============================================================================
// SECTION: Secrets
// ============================================================================

/// Named secret lookup.
pub trait SecretStore: Send + Sync {
    /// Returns the secret value, or an empty string when absent.
    fn find(&self, name: &str) -> String;
}
