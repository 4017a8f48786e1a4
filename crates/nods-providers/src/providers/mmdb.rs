// crates/nods-providers/src/providers/mmdb.rs
// ============================================================================
// Module: Prefix Store Provider
// Description: `ip` category lookups against a longest-prefix store.
// Purpose: Serve `mmdb` sources.
// Dependencies: nods-core, tracing
// ============================================================================

//! ## Overview
//! The provider parses the `ip` input and asks its [`TrieStore`] for the
//! longest matching prefix. Every failure, including an unparsable address,
//! is a soft miss. When a watcher is supplied the store file is registered
//! so a replaced file is resynced in place.

use std::net::IpAddr;
use std::sync::Arc;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::FileWatcher;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::TrieStore;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use super::category_input;

/// Provider over a prefix store.
pub struct MmdbProvider {
    /// Source name, for diagnostics.
    name: String,
    /// Backing store.
    store: Arc<dyn TrieStore>,
}

impl MmdbProvider {
    /// Creates the provider and registers the store file with `watcher`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn TrieStore>,
        watcher: Option<&dyn FileWatcher>,
    ) -> Self {
        let name = name.into();
        if let Some(watcher) = watcher {
            let reloaded = Arc::clone(&store);
            let source = name.clone();
            let registered = watcher.add(
                store.file_name(),
                Arc::new(move || {
                    if let Err(err) = reloaded.resync() {
                        warn!(source = %source, error = %err, "prefix store resync failed");
                    }
                }),
            );
            if let Err(err) = registered {
                warn!(source = %name, error = %err, "prefix store not watched");
            }
        }
        Self {
            name,
            store,
        }
    }
}

impl DataProvider for MmdbProvider {
    fn category_info(
        &self,
        _ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Ip {
            return Err(NodsError::not_implemented(&self.name, category));
        }
        let input = category_input(inputs, category)?;
        let Ok(ip) = input.parse::<IpAddr>() else {
            debug!(source = %self.name, input, "unparsable ip");
            return Err(NodsError::NoDataPresent);
        };
        self.store.lookup(ip).map_err(|_| NodsError::NoDataPresent)
    }

    fn is_cached(&self) -> bool {
        false
    }
}
