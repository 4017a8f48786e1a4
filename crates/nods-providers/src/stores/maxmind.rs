// crates/nods-providers/src/stores/maxmind.rs
// ============================================================================
// Module: MaxMind Store
// Description: Longest-prefix IP lookups against a MaxMind DB file.
// Purpose: Serve `mmdb` sources straight from the files the feeds produce.
// Dependencies: arc-swap, maxminddb, serde_json, nods-core
// ============================================================================

//! ## Overview
//! [`MaxMindStore`] memory-loads a `.mmdb` file and decodes the record found
//! for an address into JSON. It is chosen over the JSON prefix table whenever
//! `{trie_dir}/{source}.mmdb` exists.
//!
//! # Invariants
//! - `resync` swaps the whole reader; a failed resync keeps the previous one.
//! - Every miss or decode failure is reported as [`NodsError::NoDataPresent`].

use std::net::IpAddr;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use maxminddb::MaxMindDBError;
use maxminddb::Reader;
use nods_core::NodsError;
use nods_core::StoreError;
use nods_core::TrieStore;
use serde_json::Value;
use tracing::debug;
use tracing::info;

/// File-backed MaxMind DB reader with atomic resync.
pub struct MaxMindStore {
    /// Backing file.
    path: PathBuf,
    /// Current reader.
    reader: ArcSwap<Reader<Vec<u8>>>,
}

impl MaxMindStore {
    /// Opens and loads `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be read or is not a MaxMind DB.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let reader = load_reader(&path)?;
        info!(path = %path.display(), nodes = reader.metadata.node_count, "maxmind store opened");
        Ok(Self {
            path,
            reader: ArcSwap::from_pointee(reader),
        })
    }
}

impl TrieStore for MaxMindStore {
    fn lookup(&self, ip: IpAddr) -> Result<Value, NodsError> {
        match self.reader.load().lookup::<Value>(ip) {
            Ok(Value::Null) => Err(NodsError::NoDataPresent),
            Ok(value) => Ok(value),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Err(NodsError::NoDataPresent),
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "maxmind lookup failed");
                Err(NodsError::NoDataPresent)
            }
        }
    }

    fn resync(&self) -> Result<(), StoreError> {
        let reader = load_reader(&self.path)?;
        info!(path = %self.path.display(), nodes = reader.metadata.node_count, "maxmind store resynced");
        self.reader.store(Arc::new(reader));
        Ok(())
    }

    fn file_name(&self) -> &Path {
        &self.path
    }
}

/// Reads a database file into memory.
fn load_reader(path: &Path) -> Result<Reader<Vec<u8>>, StoreError> {
    Reader::open_readfile(path).map_err(|err| match err {
        MaxMindDBError::IoError(message) => StoreError::Io(format!("{}: {message}", path.display())),
        other => StoreError::Parse(format!("{}: {other}", path.display())),
    })
}
