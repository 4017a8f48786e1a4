// crates/nods-server/src/service.rs
// ============================================================================
// Module: Service Assembly
// Description: Builds the catalogue, providers and router from configuration.
// Purpose: One construction path shared by `serve`, `check` and `query`.
// Dependencies: nods-config, nods-core, nods-providers, tracing
// ============================================================================

//! ## Overview
//! [`NodsService::from_config`] wires the polling watcher, environment
//! secrets, store locations and limits into a [`ProviderEnvironment`], loads
//! the catalogue and initialises the [`DataRouter`].
//!
//! Construction may build a blocking HTTP client, so it must run outside the
//! async runtime (for example inside `spawn_blocking`).

use std::sync::Arc;

use nods_config::NodsConfig;
use nods_core::FileWatcher;
use nods_core::Schema;
use nods_providers::DataRouter;
use nods_providers::EnvSecrets;
use nods_providers::PollingWatcher;
use nods_providers::ProviderEnvironment;
use tracing::info;

use crate::error::ServerError;

/// Router plus the watcher that keeps its files fresh.
pub struct NodsService {
    /// Query router.
    router: Arc<DataRouter>,
    /// File watcher; its polling thread stops once this is dropped.
    watcher: Option<Arc<PollingWatcher>>,
}

impl NodsService {
    /// Builds the service, tolerating a missing or corrupt sources file.
    #[must_use]
    pub fn from_config(config: &NodsConfig) -> Self {
        let watcher = watcher_for(config);
        let schema = Schema::load(
            &config.catalogue.sources_file,
            &config.catalogue.data_dir,
            watcher.as_deref().map(|watcher| watcher as &dyn FileWatcher),
        );
        Self::assemble(config, schema, watcher)
    }

    /// Builds the service, failing when the sources file cannot be loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Init`] when the catalogue cannot be read.
    pub fn try_from_config(config: &NodsConfig) -> Result<Self, ServerError> {
        let watcher = watcher_for(config);
        let schema = Schema::try_load(
            &config.catalogue.sources_file,
            &config.catalogue.data_dir,
            watcher.as_deref().map(|watcher| watcher as &dyn FileWatcher),
        )
        .map_err(|err| ServerError::Init(err.to_string()))?;
        Ok(Self::assemble(config, schema, watcher))
    }

    /// Initialises the router over a loaded catalogue.
    fn assemble(config: &NodsConfig, schema: Schema, watcher: Option<Arc<PollingWatcher>>) -> Self {
        let env = environment(config, watcher.clone());
        let router = DataRouter::init(Arc::new(schema), &env);
        info!(sources = router.source_names().len(), "router ready");
        Self {
            router,
            watcher,
        }
    }

    /// Returns the query router.
    #[must_use]
    pub const fn router(&self) -> &Arc<DataRouter> {
        &self.router
    }

    /// Starts background reloads when watching is enabled.
    pub fn listen(&self) {
        if let Some(watcher) = &self.watcher {
            watcher.listen();
        }
    }
}

/// Builds the provider environment from configuration.
#[must_use]
pub fn environment(config: &NodsConfig, watcher: Option<Arc<PollingWatcher>>) -> ProviderEnvironment {
    let env = ProviderEnvironment::new()
        .with_secrets(Arc::new(EnvSecrets::new(config.secrets.env_prefix.clone())))
        .with_store_dirs(config.stores.trie_dir.clone(), config.stores.flat_dir.clone())
        .with_http(config.http.clone())
        .with_cache(config.cache.settings());
    match watcher {
        Some(watcher) => env.with_watcher(watcher),
        None => env,
    }
}

/// Creates the watcher when enabled.
fn watcher_for(config: &NodsConfig) -> Option<Arc<PollingWatcher>> {
    config.watch.enabled.then(|| Arc::new(PollingWatcher::new(config.watch.poll_interval())))
}
