// crates/nods-providers/src/providers/cache.rs
// ============================================================================
// Module: Caching Decorator
// Description: TTL memoization of successful provider payloads.
// Purpose: Avoid repeated remote calls for identical lookups.
// Dependencies: nods-core, tracing
// ============================================================================

//! ## Overview
//! [`CachedProvider`] wraps a cacheable provider. Entries are keyed by
//! `category/source/input` and live for a fixed TTL.
//!
//! # Invariants
//! - Errors are never stored.
//! - A payload produced after the query context was cancelled or expired is
//!   returned to the caller but not stored.
//! - The table never exceeds `max_entries`; the entry closest to expiry is
//!   evicted first.
//! - An expiry-ordered index mirrors the table, so purging and eviction touch
//!   only the entries they remove.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use serde_json::Value;
use tracing::debug;

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Entry lifetime.
    pub ttl: Duration,
    /// Maximum number of stored entries.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_entries: 100_000,
        }
    }
}

/// Stored payload with its expiry.
struct CacheEntry {
    /// Payload returned by the wrapped provider.
    value: Value,
    /// Instant after which the entry is stale.
    expires: Instant,
}

/// Entries plus their expiry index.
#[derive(Default)]
struct CacheTable {
    /// Stored entries by key.
    entries: HashMap<String, CacheEntry>,
    /// `(expires, key)` for every stored entry, earliest first.
    by_expiry: BTreeSet<(Instant, String)>,
}

impl CacheTable {
    /// Removes `key` from both the table and the index.
    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.by_expiry.remove(&(entry.expires, key.to_string()));
        }
    }

    /// Removes the entry closest to expiry when it expires at or before `limit`.
    fn pop_expiring_by(&mut self, limit: Option<Instant>) -> bool {
        let Some((expires, _)) = self.by_expiry.first() else {
            return false;
        };
        if limit.is_some_and(|limit| *expires > limit) {
            return false;
        }
        if let Some((_, key)) = self.by_expiry.pop_first() {
            self.entries.remove(&key);
        }
        true
    }

    /// Inserts or replaces `key`.
    fn insert(&mut self, key: String, entry: CacheEntry) {
        self.remove(&key);
        self.by_expiry.insert((entry.expires, key.clone()));
        self.entries.insert(key, entry);
    }
}

/// Memoizing wrapper around a provider.
pub struct CachedProvider {
    /// Source name, part of the key.
    source: String,
    /// Wrapped provider.
    inner: Arc<dyn DataProvider>,
    /// Limits.
    settings: CacheSettings,
    /// Stored entries.
    table: Mutex<CacheTable>,
}

impl CachedProvider {
    /// Wraps `inner` for `source`.
    #[must_use]
    pub fn new(source: impl Into<String>, inner: Arc<dyn DataProvider>, settings: CacheSettings) -> Self {
        Self {
            source: source.into(),
            inner,
            settings,
            table: Mutex::new(CacheTable::default()),
        }
    }

    /// Returns the number of stored entries, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the memo key.
    fn key(&self, category: Category, inputs: &DataInputs) -> String {
        let input = inputs.get(category.input_key()).map_or("", str::trim);
        format!("{category}/{}/{input}", self.source)
    }

    /// Returns a fresh stored payload.
    fn lookup(&self, key: &str, now: Instant) -> Option<Value> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let expires = table.entries.get(key).map(|entry| entry.expires)?;
        if expires > now {
            return table.entries.get(key).map(|entry| entry.value.clone());
        }
        table.remove(key);
        None
    }

    /// Stores a payload, evicting to stay within limits.
    fn store(&self, key: String, value: Value, now: Instant) {
        if self.settings.max_entries == 0 {
            return;
        }
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table.entries.len() >= self.settings.max_entries && !table.entries.contains_key(&key) {
            while table.pop_expiring_by(Some(now)) {}
            if table.entries.len() >= self.settings.max_entries {
                table.pop_expiring_by(None);
            }
        }
        let expires = now.checked_add(self.settings.ttl).unwrap_or(now);
        table.insert(key, CacheEntry {
            value,
            expires,
        });
    }
}

impl DataProvider for CachedProvider {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        let key = self.key(category, inputs);
        if let Some(value) = self.lookup(&key, Instant::now()) {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }
        let value = self.inner.category_info(ctx, category, inputs)?;
        if ctx.is_cancelled() {
            debug!(key = %key, "cancelled lookup not cached");
        } else {
            self.store(key, value.clone(), Instant::now());
        }
        Ok(value)
    }

    fn is_cached(&self) -> bool {
        true
    }
}
