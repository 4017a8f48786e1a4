// crates/nods-providers/src/environment.rs
// ============================================================================
// Module: Provider Environment
// Description: Collaborators and settings used to construct providers.
// Purpose: Give the router everything it needs to build one provider per source.
// Dependencies: nods-core, nods-rules
// ============================================================================

//! ## Overview
//! [`ProviderEnvironment`] bundles secrets, the optional file watcher, store
//! locations, outbound HTTP limits, cache limits, the API quirk table and any
//! embedder-supplied stores or code providers. Injected stores and providers
//! take precedence over the built-in ones of the same source name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use nods_core::ApiQuirk;
use nods_core::DataProvider;
use nods_core::FileWatcher;
use nods_core::KeyValueStore;
use nods_core::SecretStore;
use nods_core::TrieStore;
use nods_rules::RuleEvaluator;

use crate::http::HttpSettings;
use crate::providers::api::QuirkTable;
use crate::providers::cache::CacheSettings;
use crate::secrets::EnvSecrets;

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Construction inputs for [`crate::DataRouter::init`].
///
/// # Invariants
/// - Injected stores and code providers shadow built-in ones by source name.
#[derive(Clone)]
pub struct ProviderEnvironment {
    /// Secret lookup for API keys and tokens.
    pub secrets: Arc<dyn SecretStore>,
    /// Optional watcher for store files.
    pub watcher: Option<Arc<dyn FileWatcher>>,
    /// Directory of prefix store files (`{source}.mmdb`, else `{source}.prefixes.json`).
    pub trie_dir: PathBuf,
    /// Directory of flat store files (`{source}.kv.json`).
    pub flat_dir: PathBuf,
    /// Outbound HTTP limits.
    pub http: HttpSettings,
    /// Cache limits.
    pub cache: CacheSettings,
    /// Vendor response quirks.
    pub quirks: QuirkTable,
    /// Rule evaluator.
    pub evaluator: RuleEvaluator,
    /// Injected prefix stores by source name.
    trie_stores: BTreeMap<String, Arc<dyn TrieStore>>,
    /// Injected flat stores by source name.
    flat_stores: BTreeMap<String, Arc<dyn KeyValueStore>>,
    /// Injected code providers by source name.
    code_providers: BTreeMap<String, Arc<dyn DataProvider>>,
}

impl ProviderEnvironment {
    /// Creates an environment with default settings and environment secrets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            secrets: Arc::new(EnvSecrets::default()),
            watcher: None,
            trie_dir: PathBuf::from("data/trie"),
            flat_dir: PathBuf::from("data/flat"),
            http: HttpSettings::default(),
            cache: CacheSettings::default(),
            quirks: QuirkTable::builtin(),
            evaluator: RuleEvaluator::new(),
            trie_stores: BTreeMap::new(),
            flat_stores: BTreeMap::new(),
            code_providers: BTreeMap::new(),
        }
    }

    /// Sets the secret store.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Sets the file watcher.
    #[must_use]
    pub fn with_watcher(mut self, watcher: Arc<dyn FileWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Sets the store directories.
    #[must_use]
    pub fn with_store_dirs(mut self, trie_dir: impl Into<PathBuf>, flat_dir: impl Into<PathBuf>) -> Self {
        self.trie_dir = trie_dir.into();
        self.flat_dir = flat_dir.into();
        self
    }

    /// Sets outbound HTTP limits.
    #[must_use]
    pub fn with_http(mut self, http: HttpSettings) -> Self {
        self.http = http;
        self
    }

    /// Sets cache limits.
    #[must_use]
    pub const fn with_cache(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }

    /// Registers or replaces a vendor quirk.
    #[must_use]
    pub fn with_quirk(mut self, vendor: impl Into<String>, quirk: ApiQuirk) -> Self {
        self.quirks = self.quirks.with(vendor, quirk);
        self
    }

    /// Sets the rule evaluator.
    #[must_use]
    pub const fn with_evaluator(mut self, evaluator: RuleEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Injects the prefix store for `source`.
    #[must_use]
    pub fn with_trie_store(mut self, source: impl Into<String>, store: Arc<dyn TrieStore>) -> Self {
        self.trie_stores.insert(source.into(), store);
        self
    }

    /// Injects the flat store for `source`.
    #[must_use]
    pub fn with_flat_store(mut self, source: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        self.flat_stores.insert(source.into(), store);
        self
    }

    /// Registers a code provider for `source`.
    #[must_use]
    pub fn with_code_provider(mut self, source: impl Into<String>, provider: Arc<dyn DataProvider>) -> Self {
        self.code_providers.insert(source.into(), provider);
        self
    }

    /// Returns the injected prefix store for `source`.
    pub(crate) fn trie_store(&self, source: &str) -> Option<Arc<dyn TrieStore>> {
        self.trie_stores.get(source).cloned()
    }

    /// Returns the injected flat store for `source`.
    pub(crate) fn flat_store(&self, source: &str) -> Option<Arc<dyn KeyValueStore>> {
        self.flat_stores.get(source).cloned()
    }

    /// Returns the injected code provider for `source`.
    pub(crate) fn code_provider(&self, source: &str) -> Option<Arc<dyn DataProvider>> {
        self.code_providers.get(source).cloned()
    }

    /// Returns the MaxMind database path for `source`.
    pub(crate) fn mmdb_path(&self, source: &str) -> PathBuf {
        store_path(&self.trie_dir, source, "mmdb")
    }

    /// Returns the prefix store file path for `source`.
    pub(crate) fn trie_path(&self, source: &str) -> PathBuf {
        store_path(&self.trie_dir, source, "prefixes.json")
    }

    /// Returns the flat store file path for `source`.
    pub(crate) fn flat_path(&self, source: &str) -> PathBuf {
        store_path(&self.flat_dir, source, "kv.json")
    }
}

impl Default for ProviderEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins `{dir}/{source}.{suffix}`.
fn store_path(dir: &Path, source: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{source}.{suffix}"))
}
