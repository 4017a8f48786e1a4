// crates/nods-core/src/schema.rs
// ============================================================================
// Module: Item Catalogue
// Description: Sources and their items, loaded from JSON catalogue files.
// Purpose: Resolve item paths and serve read-only catalogue views.
// Dependencies: crate::{item, uri, interfaces}, arc-swap, serde_json, tracing
// ============================================================================

//! ## Overview
//! The [`Schema`] reads a top-level JSON array of sources, then one item file
//! per source at `{data_dir}/{source}.json`. Each source's items live behind
//! an [`ArcSwap`] pointer so a reload replaces the whole map at once while
//! concurrent readers keep the snapshot they already hold.
//!
//! # Invariants
//! - The set of sources is fixed at construction.
//! - Items of a disabled source are always disabled.
//! - A missing or corrupt per-source file leaves that source empty without
//!   affecting any other source.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use arc_swap::ArcSwapOption;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::category::Category;
use crate::error::NodsError;
use crate::interfaces::FileWatcher;
use crate::interfaces::ReloadCallback;
use crate::item::Item;
use crate::item::ItemDescriptor;
use crate::item::SourceInfo;
use crate::uri::DataUri;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while reading catalogue files.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// A catalogue file could not be read.
    #[error("catalogue io error at {path}: {message}")]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// A catalogue file is not valid JSON of the expected shape.
    #[error("catalogue parse error at {path}: {message}")]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Two sources share a name.
    #[error("duplicate source: {0}")]
    DuplicateSource(String),
    /// A reload was requested for an unknown source.
    #[error("unknown source: {0}")]
    UnknownSource(String),
}

// ============================================================================
// SECTION: Source Slots
// ============================================================================

/// Items keyed by full path.
type ItemMap = BTreeMap<String, Item>;

/// One source registration with its swappable item map.
struct SourceSlot {
    /// Source descriptor.
    info: SourceInfo,
    /// Per-source item file, when loaded from disk.
    file: Option<PathBuf>,
    /// Current item snapshot.
    items: Arc<ArcSwap<ItemMap>>,
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Process-wide item catalogue.
pub struct Schema {
    /// Sources by name.
    sources: BTreeMap<String, SourceSlot>,
    /// Memoized flattened item listing; cleared on reload.
    listing: Arc<ArcSwapOption<Vec<Item>>>,
}

impl Schema {
    /// Returns a catalogue with no sources.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sources: BTreeMap::new(),
            listing: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Loads the catalogue, yielding an empty catalogue when the top-level
    /// sources file is missing or corrupt.
    #[must_use]
    pub fn load(sources_file: &Path, data_dir: &Path, watcher: Option<&dyn FileWatcher>) -> Self {
        match Self::try_load(sources_file, data_dir, watcher) {
            Ok(schema) => schema,
            Err(err) => {
                warn!(error = %err, "catalogue load failed; continuing with an empty catalogue");
                Self::empty()
            }
        }
    }

    /// Loads the catalogue from disk and registers item files with `watcher`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogueError`] when the top-level sources file cannot be
    /// read or parsed, or declares the same source twice.
    pub fn try_load(
        sources_file: &Path,
        data_dir: &Path,
        watcher: Option<&dyn FileWatcher>,
    ) -> Result<Self, CatalogueError> {
        let bytes = fs::read(sources_file).map_err(|err| CatalogueError::Io {
            path: sources_file.to_path_buf(),
            message: err.to_string(),
        })?;
        let infos: Vec<SourceInfo> =
            serde_json::from_slice(&bytes).map_err(|err| CatalogueError::Parse {
                path: sources_file.to_path_buf(),
                message: err.to_string(),
            })?;

        let mut sources = BTreeMap::new();
        for info in infos {
            if sources.contains_key(&info.name) {
                return Err(CatalogueError::DuplicateSource(info.name));
            }
            let file = data_dir.join(format!("{}.json", info.name));
            let items = read_items_lenient(&file, &info);
            let slot = SourceSlot {
                info,
                file: Some(file),
                items: Arc::new(ArcSwap::from_pointee(items)),
            };
            sources.insert(slot.info.name.clone(), slot);
        }

        let schema = Self {
            sources,
            listing: Arc::new(ArcSwapOption::empty()),
        };
        if let Some(watcher) = watcher {
            schema.watch(watcher);
        }
        info!(
            sources = schema.sources.len(),
            items = schema.list_items().len(),
            "catalogue loaded"
        );
        Ok(schema)
    }

    /// Builds a catalogue from in-memory descriptors, grouping items by the
    /// source segment of their path.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogueError::DuplicateSource`] when two sources share a name.
    pub fn from_sources(
        infos: Vec<SourceInfo>,
        descriptors: Vec<ItemDescriptor>,
    ) -> Result<Self, CatalogueError> {
        let mut grouped: BTreeMap<String, Vec<ItemDescriptor>> = BTreeMap::new();
        for descriptor in descriptors {
            let uri = DataUri::parse(&descriptor.item);
            grouped.entry(uri.source().to_string()).or_default().push(descriptor);
        }
        let mut sources = BTreeMap::new();
        for info in infos {
            if sources.contains_key(&info.name) {
                return Err(CatalogueError::DuplicateSource(info.name));
            }
            let items = build_items(grouped.remove(&info.name).unwrap_or_default(), &info);
            let slot = SourceSlot {
                info,
                file: None,
                items: Arc::new(ArcSwap::from_pointee(items)),
            };
            sources.insert(slot.info.name.clone(), slot);
        }
        Ok(Self {
            sources,
            listing: Arc::new(ArcSwapOption::empty()),
        })
    }

    /// Registers every per-source item file with the watcher.
    fn watch(&self, watcher: &dyn FileWatcher) {
        for slot in self.sources.values() {
            let Some(file) = slot.file.clone() else {
                continue;
            };
            let info = slot.info.clone();
            let items = Arc::clone(&slot.items);
            let listing = Arc::clone(&self.listing);
            let reload_file = file.clone();
            let callback: ReloadCallback = Arc::new(move || {
                match read_items(&reload_file, &info) {
                    Ok(fresh) => {
                        info!(source = %info.name, items = fresh.len(), "source items reloaded");
                        items.store(Arc::new(fresh));
                        listing.store(None);
                    }
                    Err(err) => {
                        warn!(source = %info.name, error = %err, "source reload failed; keeping previous items");
                    }
                }
            });
            if let Err(err) = watcher.add(&file, callback) {
                warn!(source = %slot.info.name, error = %err, "item file not watched");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Returns the item at `uri` within its named source.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::ItemNotFound`] when the source is unknown or holds
    /// no such item.
    pub fn item(&self, uri: &DataUri) -> Result<Item, NodsError> {
        let key = uri.key();
        self.sources
            .get(uri.source())
            .and_then(|slot| slot.items.load().get(&key).cloned())
            .ok_or(NodsError::ItemNotFound(key))
    }

    /// Returns true when `name` belongs to the closed category set.
    #[must_use]
    pub fn is_valid_category(&self, name: &str) -> bool {
        Category::is_valid(name)
    }

    /// Returns the descriptor of the named source.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::SourceNotFound`] when no such source exists.
    pub fn source(&self, name: &str) -> Result<&SourceInfo, NodsError> {
        self.sources
            .get(name)
            .map(|slot| &slot.info)
            .ok_or_else(|| NodsError::SourceNotFound(name.to_string()))
    }

    /// Returns true when the catalogue holds no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    /// Returns every item, memoized until the next reload or invalidation.
    #[must_use]
    pub fn list_items(&self) -> Arc<Vec<Item>> {
        if let Some(cached) = self.listing.load_full() {
            return cached;
        }
        let all: Vec<Item> = self
            .sources
            .values()
            .flat_map(|slot| slot.items.load().values().cloned().collect::<Vec<_>>())
            .collect();
        let all = Arc::new(all);
        self.listing.store(Some(Arc::clone(&all)));
        all
    }

    /// Returns every source descriptor.
    #[must_use]
    pub fn list_sources(&self) -> Vec<SourceInfo> {
        self.sources.values().map(|slot| slot.info.clone()).collect()
    }

    /// Returns every item of the named category.
    #[must_use]
    pub fn list_items_by_category(&self, category: &str) -> Vec<Item> {
        self.list_items().iter().filter(|item| item.category_name() == category).cloned().collect()
    }

    /// Returns every rule item (rule category or non-empty query).
    #[must_use]
    pub fn list_rules_items(&self) -> Vec<Item> {
        self.list_items().iter().filter(|item| item.is_rule()).cloned().collect()
    }

    /// Returns per-source item counts.
    #[must_use]
    pub fn item_counts(&self) -> BTreeMap<String, usize> {
        self.sources.iter().map(|(name, slot)| (name.clone(), slot.items.load().len())).collect()
    }

    /// Drops the memoized listing.
    pub fn invalidate_listing(&self) {
        self.listing.store(None);
    }

    /// Reloads one source's items from its item file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogueError`] when the source is unknown or the file cannot
    /// be read; the previous items stay active.
    pub fn reload_source(&self, name: &str) -> Result<usize, CatalogueError> {
        let slot =
            self.sources.get(name).ok_or_else(|| CatalogueError::UnknownSource(name.to_string()))?;
        let Some(file) = &slot.file else {
            return Ok(slot.items.load().len());
        };
        let fresh = read_items(file, &slot.info)?;
        let count = fresh.len();
        slot.items.store(Arc::new(fresh));
        self.invalidate_listing();
        info!(source = %name, items = count, "source items reloaded");
        Ok(count)
    }
}

// ============================================================================
// SECTION: File Helpers
// ============================================================================

/// Reads a per-source item file, treating absence as an empty item set.
fn read_items(path: &Path, info: &SourceInfo) -> Result<ItemMap, CatalogueError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == IoErrorKind::NotFound => {
            debug!(source = %info.name, path = %path.display(), "no item file for source");
            return Ok(ItemMap::new());
        }
        Err(err) => {
            return Err(CatalogueError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            });
        }
    };
    let descriptors: Vec<ItemDescriptor> =
        serde_json::from_slice(&bytes).map_err(|err| CatalogueError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    Ok(build_items(descriptors, info))
}

/// Reads a per-source item file, logging and returning an empty set on failure.
fn read_items_lenient(path: &Path, info: &SourceInfo) -> ItemMap {
    read_items(path, info).unwrap_or_else(|err| {
        warn!(source = %info.name, error = %err, "item file unreadable; source left empty");
        ItemMap::new()
    })
}

/// Converts descriptors into items owned by `info`, dropping malformed paths.
fn build_items(descriptors: Vec<ItemDescriptor>, info: &SourceInfo) -> ItemMap {
    let mut items = ItemMap::new();
    for descriptor in descriptors {
        let item = Item::from_descriptor(descriptor, info.enabled);
        if item.path.is_unknown() || item.source_name() != info.name {
            warn!(source = %info.name, item = %item.path, "item path does not belong to source");
            continue;
        }
        items.insert(item.path.key(), item);
    }
    items
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use super::Schema;
    use crate::error::NodsError;
    use crate::item::DatabaseKind;
    use crate::item::ItemDescriptor;
    use crate::item::ItemType;
    use crate::item::SourceInfo;
    use crate::uri::DataUri;

    /// Builds a two-source catalogue with a rule.
    fn sample() -> Schema {
        Schema::from_sources(
            vec![
                SourceInfo::new("ipsum", DatabaseKind::Mmdb),
                SourceInfo::new("rule", DatabaseKind::Code),
            ],
            vec![
                ItemDescriptor::new("ip/ipsum/blacklist.isBlacklisted", "blacklist.isBlacklisted", ItemType::Boolean),
                ItemDescriptor::new("rule/rule/listed", "", ItemType::Boolean)
                    .with_query("[ip/ipsum/blacklist.isBlacklisted]"),
                ItemDescriptor::new("ip/other/stray", "", ItemType::String),
            ],
        )
        .unwrap()
    }

    /// Tests exact item lookup and the not-found paths.
    #[test]
    fn item_lookup_is_exact() {
        let schema = sample();
        let found = schema.item(&DataUri::parse("ip/ipsum/blacklist.isBlacklisted")).unwrap();
        assert_eq!(found.item_type, ItemType::Boolean);
        assert!(matches!(
            schema.item(&DataUri::parse("ip/ipsum/missing")),
            Err(NodsError::ItemNotFound(_))
        ));
        assert!(matches!(
            schema.item(&DataUri::parse("ip/other/stray")),
            Err(NodsError::ItemNotFound(_))
        ));
    }

    /// Tests the rule and category views.
    #[test]
    fn views_filter_by_category_and_rule() {
        let schema = sample();
        assert_eq!(schema.list_items().len(), 2);
        assert_eq!(schema.list_items_by_category("ip").len(), 1);
        assert_eq!(schema.list_rules_items().len(), 1);
        assert!(schema.is_valid_category("password"));
        assert!(!schema.is_valid_category("vehicle"));
    }

    /// Tests that duplicate source names are rejected.
    #[test]
    fn duplicate_sources_are_rejected() {
        let result = Schema::from_sources(
            vec![SourceInfo::new("a", DatabaseKind::Fast), SourceInfo::new("a", DatabaseKind::Fast)],
            Vec::new(),
        );
        assert!(result.is_err());
    }
}
