// crates/nods-providers/src/providers/fast.rs
// ============================================================================
// Module: Flat Store Provider
// Description: Exact key lookups against a flat key/value store.
// Purpose: Serve `fast` sources (domains, phone numbers, ...).
// Dependencies: nods-core, tracing
// ============================================================================

//! ## Overview
//! The category input is used as the key, first verbatim (trimmed) and then
//! lowercased. A miss is [`NodsError::NoDataPresent`]. The store file is
//! registered with the watcher so edits reload the table.

use std::sync::Arc;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::FileWatcher;
use nods_core::KeyValueStore;
use nods_core::NodsError;
use nods_core::QueryContext;
use serde_json::Value;
use tracing::warn;

use super::category_input;

/// Provider over a flat store.
pub struct FastProvider {
    /// Source name, for diagnostics.
    name: String,
    /// Backing store.
    store: Arc<dyn KeyValueStore>,
}

impl FastProvider {
    /// Creates the provider and registers the store file with `watcher`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
        watcher: Option<&dyn FileWatcher>,
    ) -> Self {
        let name = name.into();
        if let Some(watcher) = watcher {
            let reloaded = Arc::clone(&store);
            let source = name.clone();
            let registered = watcher.add(
                store.file_name(),
                Arc::new(move || {
                    if let Err(err) = reloaded.reload() {
                        warn!(source = %source, error = %err, "flat store reload failed");
                    }
                }),
            );
            if let Err(err) = registered {
                warn!(source = %name, error = %err, "flat store not watched");
            }
        }
        Self {
            name,
            store,
        }
    }
}

impl DataProvider for FastProvider {
    fn category_info(
        &self,
        _ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category == Category::Rule {
            return Err(NodsError::not_implemented(&self.name, category));
        }
        let key = category_input(inputs, category)?;
        self.store
            .get(key)
            .or_else(|| self.store.get(&key.to_lowercase()))
            .ok_or(NodsError::NoDataPresent)
    }

    fn is_cached(&self) -> bool {
        false
    }
}
