// crates/nods-providers/src/stores/trie.rs
// ============================================================================
// Module: Prefix Store
// Description: Longest-prefix IP lookup table loaded from a JSON file.
// Purpose: Back `mmdb` sources with CIDR-keyed payloads.
// Dependencies: arc-swap, serde_json, nods-core
// ============================================================================

//! ## Overview
//! The on-disk format is a JSON object whose keys are CIDR prefixes
//! (`"10.0.0.0/8"`, `"2001:db8::/32"`) or bare addresses and whose values are
//! arbitrary JSON payloads. The table is grouped by prefix length so a lookup
//! tries each distinct length once, longest first. IPv4-mapped IPv6
//! addresses are looked up as IPv4.
//!
//! # Invariants
//! - `resync` swaps the whole table; a failed resync keeps the previous one.
//! - Every miss is reported as [`NodsError::NoDataPresent`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use nods_core::NodsError;
use nods_core::StoreError;
use nods_core::TrieStore;
use serde_json::Value;
use tracing::info;

// ============================================================================
// SECTION: Prefix Table
// ============================================================================

/// Address family of a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Family {
    /// IPv4 (32-bit).
    V4,
    /// IPv6 (128-bit).
    V6,
}

impl Family {
    /// Returns the address width in bits.
    const fn bits(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }
}

/// Normalizes an address to its family and integer form.
fn address_key(ip: IpAddr) -> (Family, u128) {
    match ip {
        IpAddr::V4(v4) => (Family::V4, u128::from(u32::from(v4))),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or_else(
            || (Family::V6, u128::from(v6)),
            |v4| (Family::V4, u128::from(u32::from(v4))),
        ),
    }
}

/// Masks `value` to its top `len` bits within a `width`-bit address.
const fn mask(value: u128, len: u8, width: u8) -> u128 {
    if len == 0 {
        return 0;
    }
    let shift = width - len;
    let full = if width == 128 { u128::MAX } else { (1u128 << width) - 1 };
    value & (full >> shift << shift)
}

/// Immutable prefix table.
#[derive(Debug, Default)]
pub struct PrefixTable {
    /// Networks by family, then prefix length (iterated longest first).
    networks: BTreeMap<Family, BTreeMap<u8, HashMap<u128, Value>>>,
    /// Number of stored prefixes.
    len: usize,
}

impl PrefixTable {
    /// Parses a prefix such as `1.2.3.0/24` or a bare address.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntry`] for malformed prefixes.
    fn parse_prefix(prefix: &str) -> Result<(Family, u8, u128), StoreError> {
        let invalid = || StoreError::InvalidEntry(prefix.to_string());
        let (addr, len) = match prefix.trim().split_once('/') {
            Some((addr, len)) => (addr, Some(len.parse::<u8>().map_err(|_| invalid())?)),
            None => (prefix.trim(), None),
        };
        let ip: IpAddr = addr.parse().map_err(|_| invalid())?;
        let (family, value) = address_key(ip);
        let width = family.bits();
        let mapped_offset = if matches!(ip, IpAddr::V6(_)) && family == Family::V4 { 96 } else { 0 };
        let len = match len {
            Some(len) if len < mapped_offset => return Err(invalid()),
            Some(len) => len - mapped_offset,
            None => width,
        };
        if len > width {
            return Err(invalid());
        }
        Ok((family, len, mask(value, len, width)))
    }

    /// Inserts a payload at `prefix`, replacing any previous payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntry`] for malformed prefixes.
    pub fn insert(&mut self, prefix: &str, payload: Value) -> Result<(), StoreError> {
        let (family, len, network) = Self::parse_prefix(prefix)?;
        let slot = self.networks.entry(family).or_default().entry(len).or_default();
        if slot.insert(network, payload).is_none() {
            self.len += 1;
        }
        Ok(())
    }

    /// Returns the payload of the longest prefix containing `ip`.
    #[must_use]
    pub fn lookup(&self, ip: IpAddr) -> Option<&Value> {
        let (family, value) = address_key(ip);
        let by_len = self.networks.get(&family)?;
        by_len
            .iter()
            .rev()
            .find_map(|(len, nets)| nets.get(&mask(value, *len, family.bits())))
    }

    /// Returns the number of stored prefixes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no prefixes are stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Builds a table from a JSON object of prefixes to payloads.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the document is not an object or a prefix
    /// is malformed.
    pub fn from_json(document: Value) -> Result<Self, StoreError> {
        let Value::Object(entries) = document else {
            return Err(StoreError::Parse("prefix file must be a json object".to_string()));
        };
        let mut table = Self::default();
        for (prefix, payload) in entries {
            table.insert(&prefix, payload)?;
        }
        Ok(table)
    }
}

// ============================================================================
// SECTION: File Store
// ============================================================================

/// File-backed prefix store with atomic resync.
pub struct PrefixFileStore {
    /// Backing file.
    path: PathBuf,
    /// Current table.
    table: ArcSwap<PrefixTable>,
}

impl PrefixFileStore {
    /// Opens and loads `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = load_table(&path)?;
        info!(path = %path.display(), prefixes = table.len(), "prefix store opened");
        Ok(Self {
            path,
            table: ArcSwap::from_pointee(table),
        })
    }

    /// Wraps an in-memory table; `resync` will read `path` if it ever exists.
    #[must_use]
    pub fn from_table(path: impl Into<PathBuf>, table: PrefixTable) -> Self {
        Self {
            path: path.into(),
            table: ArcSwap::from_pointee(table),
        }
    }

    /// Returns the number of stored prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    /// Returns true when the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrieStore for PrefixFileStore {
    fn lookup(&self, ip: IpAddr) -> Result<Value, NodsError> {
        self.table.load().lookup(ip).cloned().ok_or(NodsError::NoDataPresent)
    }

    fn resync(&self) -> Result<(), StoreError> {
        let table = load_table(&self.path)?;
        info!(path = %self.path.display(), prefixes = table.len(), "prefix store resynced");
        self.table.store(Arc::new(table));
        Ok(())
    }

    fn file_name(&self) -> &Path {
        &self.path
    }
}

/// Reads and parses a prefix file.
fn load_table(path: &Path) -> Result<PrefixTable, StoreError> {
    let bytes = fs::read(path).map_err(|err| StoreError::Io(format!("{}: {err}", path.display())))?;
    let document: Value = serde_json::from_slice(&bytes)
        .map_err(|err| StoreError::Parse(format!("{}: {err}", path.display())))?;
    PrefixTable::from_json(document)
}
