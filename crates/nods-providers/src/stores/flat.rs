// crates/nods-providers/src/stores/flat.rs
// ============================================================================
// Module: Flat Store
// Description: Exact-match key/value table with file warm start.
// Purpose: Back `fast` sources with keyed payloads.
// Dependencies: arc-swap, serde_json, nods-core
// ============================================================================

//! ## Overview
//! A flat store is a JSON object of keys to payloads. It is loaded at open,
//! swapped wholesale on reload, and can be persisted back to its file so a
//! restarted process starts warm.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use nods_core::KeyValueStore;
use nods_core::StoreError;
use serde_json::Map;
use serde_json::Value;
use tracing::info;

/// File-backed key/value store.
pub struct FlatFileStore {
    /// Backing file.
    path: PathBuf,
    /// Current table.
    entries: ArcSwap<HashMap<String, Value>>,
}

impl FlatFileStore {
    /// Opens `path`; a missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when an existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() { load_entries(&path)? } else { HashMap::new() };
        info!(path = %path.display(), keys = entries.len(), "flat store opened");
        Ok(Self {
            path,
            entries: ArcSwap::from_pointee(entries),
        })
    }

    /// Builds an in-memory store bound to `path` for later persistence.
    #[must_use]
    pub fn from_entries(path: impl Into<PathBuf>, entries: HashMap<String, Value>) -> Self {
        Self {
            path: path.into(),
            entries: ArcSwap::from_pointee(entries),
        }
    }

    /// Inserts or replaces one entry by swapping in an updated copy.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.clone(), value.clone());
            next
        });
    }

    /// Writes the current table to the backing file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the file cannot be written.
    pub fn persist(&self) -> Result<(), StoreError> {
        let snapshot = self.entries.load();
        let map: Map<String, Value> =
            snapshot.iter().map(|(key, value)| (key.clone(), value.clone())).collect();
        let bytes = serde_json::to_vec(&Value::Object(map))
            .map_err(|err| StoreError::Parse(err.to_string()))?;
        fs::write(&self.path, bytes)
            .map_err(|err| StoreError::Io(format!("{}: {err}", self.path.display())))
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Returns true when the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for FlatFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.load().get(key).cloned()
    }

    fn reload(&self) -> Result<(), StoreError> {
        let entries = load_entries(&self.path)?;
        info!(path = %self.path.display(), keys = entries.len(), "flat store reloaded");
        self.entries.store(Arc::new(entries));
        Ok(())
    }

    fn file_name(&self) -> &Path {
        &self.path
    }
}

/// Reads a flat store file.
fn load_entries(path: &Path) -> Result<HashMap<String, Value>, StoreError> {
    let bytes = fs::read(path).map_err(|err| StoreError::Io(format!("{}: {err}", path.display())))?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(_) => Err(StoreError::Parse(format!("{}: expected a json object", path.display()))),
        Err(err) => Err(StoreError::Parse(format!("{}: {err}", path.display()))),
    }
}
