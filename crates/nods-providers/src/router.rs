// crates/nods-providers/src/router.rs
// ============================================================================
// Module: Data Router
// Description: Routes item queries to per-source data instances.
// Purpose: Validate queries and dispatch them to the owning source.
// Dependencies: nods-core, nods-rules, tracing
// ============================================================================

//! ## Overview
//! [`DataRouter::init`] builds one [`DataInstance`] per enabled source, once.
//! Provider construction follows the source's database kind; a source whose
//! provider cannot be built is skipped with a warning and answers
//! [`NodsError::SourceNotFound`]. Cacheable providers are wrapped in the
//! [`CachedProvider`] decorator.
//!
//! Queries are validated in a fixed order: category, category input (not
//! required for `rule`), source, item. Every rejection still carries a
//! default result of the item's declared type when the catalogue knows it.
//!
//! # Invariants
//! - The instance map is never mutated after construction.
//! - The rule provider holds the router weakly; dropping the router ends it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Weak;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataOutput;
use nods_core::DataProvider;
use nods_core::DataUri;
use nods_core::DatabaseKind;
use nods_core::ItemAnswer;
use nods_core::ItemType;
use nods_core::KeyValueStore;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::Schema;
use nods_core::SourceInfo;
use nods_core::TrieStore;
use nods_rules::RULE_INPUT_KEY;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::environment::ProviderEnvironment;
use crate::http::HttpFetcher;
use crate::instance::DataInstance;
use crate::providers::api::ApiProvider;
use crate::providers::cache::CachedProvider;
use crate::providers::code;
use crate::providers::fast::FastProvider;
use crate::providers::mmdb::MmdbProvider;
use crate::providers::rule::RuleProvider;
use crate::stores::FlatFileStore;
use crate::stores::MaxMindStore;
use crate::stores::PrefixFileStore;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Query router over the catalogue and its data instances.
pub struct DataRouter {
    /// Item catalogue.
    schema: Arc<Schema>,
    /// Instances keyed by source name.
    instances: BTreeMap<String, DataInstance>,
}

impl DataRouter {
    /// Builds the router and one instance per enabled source.
    #[must_use]
    pub fn init(schema: Arc<Schema>, env: &ProviderEnvironment) -> Arc<Self> {
        Arc::new_cyclic(|router| {
            let mut builder = InstanceBuilder {
                env,
                router,
                http: None,
            };
            let mut instances = BTreeMap::new();
            for info in schema.list_sources() {
                if !info.enabled {
                    debug!(source = %info.name, "source disabled");
                    continue;
                }
                match builder.provider(&info) {
                    Ok(provider) => {
                        let provider: Arc<dyn DataProvider> = if provider.is_cached() {
                            Arc::new(CachedProvider::new(info.name.clone(), provider, env.cache))
                        } else {
                            provider
                        };
                        info!(
                            source = %info.name,
                            database = info.database.as_str(),
                            cached = provider.is_cached(),
                            "source ready"
                        );
                        instances.insert(info.name.clone(), DataInstance::new(info.name.clone(), provider));
                    }
                    Err(reason) => warn!(source = %info.name, reason = %reason, "source skipped"),
                }
            }
            Self {
                schema,
                instances,
            }
        })
    }

    /// Returns the catalogue.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the names of sources with a live instance.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        self.instances.keys().cloned().collect()
    }

    /// Returns the typed value of the item at `uri`.
    #[must_use]
    pub fn data_value(&self, ctx: &QueryContext, uri: &DataUri, inputs: &DataInputs) -> ItemAnswer {
        let category = match uri.category().parse::<Category>() {
            Ok(category) => category,
            Err(err) => return self.reject(uri, err),
        };
        if category != Category::Rule && inputs.non_empty(category.input_key()).is_none() {
            return self.reject(uri, NodsError::MissingInputs(category.input_key().to_string()));
        }
        let Some(instance) = self.instances.get(uri.source()) else {
            return self.reject(uri, NodsError::SourceNotFound(uri.source().to_string()));
        };
        let item = match self.schema.item(uri) {
            Ok(item) if item.enabled => item,
            Ok(item) => return ItemAnswer::miss(item.item_type, NodsError::ItemNotFound(uri.key())),
            Err(err) => return ItemAnswer::miss(ItemType::Null, err),
        };
        if category == Category::Rule {
            let inputs = inputs.clone().with(RULE_INPUT_KEY, uri.key());
            return instance.item_value(ctx, &item, &inputs);
        }
        instance.item_value(ctx, &item, inputs)
    }

    /// Returns the caller-facing output for the item at `uri`.
    #[must_use]
    pub fn data_output(&self, ctx: &QueryContext, uri: &DataUri, inputs: &DataInputs) -> DataOutput {
        DataOutput::new(uri, inputs, self.data_value(ctx, uri, inputs))
    }

    /// Queries every enabled item of `category`.
    ///
    /// Individual failures are kept in the outputs with their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::CategoryNotFound`] for unknown categories and
    /// [`NodsError::ItemNotFound`] when no item answered.
    pub fn category_values(
        &self,
        ctx: &QueryContext,
        category: &str,
        inputs: &DataInputs,
    ) -> Result<Vec<DataOutput>, NodsError> {
        let category: Category = category.parse()?;
        let inputs = inputs.stripped();
        let outputs: Vec<DataOutput> = self
            .schema
            .list_items_by_category(category.as_str())
            .into_iter()
            .filter(|item| item.enabled)
            .map(|item| self.data_output(ctx, &item.path, &inputs))
            .collect();
        if !outputs.iter().any(DataOutput::is_ok) {
            debug!(category = %category, items = outputs.len(), "no item answered");
            return Err(NodsError::ItemNotFound(format!("{category}/*")));
        }
        Ok(outputs)
    }

    /// Builds a rejection with the item's default when the catalogue knows it.
    fn reject(&self, uri: &DataUri, err: NodsError) -> ItemAnswer {
        let item_type = self.schema.item(uri).map_or(ItemType::Null, |item| item.item_type);
        ItemAnswer::miss(item_type, err)
    }
}

// ============================================================================
// SECTION: Provider Construction
// ============================================================================

/// Per-init provider factory.
struct InstanceBuilder<'a> {
    /// Construction inputs.
    env: &'a ProviderEnvironment,
    /// Router under construction, for the rule provider.
    router: &'a Weak<DataRouter>,
    /// Shared HTTP client, built on first use.
    http: Option<HttpFetcher>,
}

impl InstanceBuilder<'_> {
    /// Returns the shared HTTP client.
    fn http(&mut self) -> Result<HttpFetcher, String> {
        if let Some(http) = &self.http {
            return Ok(http.clone());
        }
        let http = HttpFetcher::new(self.env.http.clone()).map_err(|err| err.to_string())?;
        self.http = Some(http.clone());
        Ok(http)
    }

    /// Builds the provider for one source.
    fn provider(&mut self, info: &SourceInfo) -> Result<Arc<dyn DataProvider>, String> {
        let env = self.env;
        let watcher = env.watcher.as_deref();
        let name = info.name.as_str();
        let provider: Arc<dyn DataProvider> = match info.database {
            DatabaseKind::Mmdb => {
                let mmdb = env.mmdb_path(name);
                let store: Arc<dyn TrieStore> = match env.trie_store(name) {
                    Some(store) => store,
                    None if mmdb.is_file() => Arc::new(MaxMindStore::open(mmdb).map_err(|err| err.to_string())?),
                    None => Arc::new(PrefixFileStore::open(env.trie_path(name)).map_err(|err| err.to_string())?),
                };
                Arc::new(MmdbProvider::new(name, store, watcher))
            }
            DatabaseKind::Fast => {
                let store: Arc<dyn KeyValueStore> = match env.flat_store(name) {
                    Some(store) => store,
                    None => Arc::new(FlatFileStore::open(env.flat_path(name)).map_err(|err| err.to_string())?),
                };
                Arc::new(FastProvider::new(name, store, watcher))
            }
            DatabaseKind::Byod => {
                let api = info.api.clone().ok_or_else(|| "byod source has no API descriptor".to_string())?;
                let http = self.http()?;
                Arc::new(ApiProvider::new(name, api, &env.quirks, Arc::clone(&env.secrets), http))
            }
            DatabaseKind::Code => self.code_provider(name)?,
        };
        Ok(provider)
    }

    /// Builds a code provider by source name.
    fn code_provider(&mut self, name: &str) -> Result<Arc<dyn DataProvider>, String> {
        if let Some(provider) = self.env.code_provider(name) {
            return Ok(provider);
        }
        let secrets = Arc::clone(&self.env.secrets);
        let provider: Arc<dyn DataProvider> = match name {
            "internal" => Arc::new(code::internal()),
            "spamhaus" => Arc::new(code::SpamhausProvider::new()),
            "whois" => Arc::new(code::WhoisProvider::new()),
            "pwned" => Arc::new(code::PwnedProvider::new(secrets, self.http()?)),
            "ipinfo" => Arc::new(code::IpInfoProvider::new(secrets, self.http()?)),
            "rule" => Arc::new(RuleProvider::new(Weak::clone(self.router), self.env.evaluator)),
            other => return Err(format!("no code provider named {other}")),
        };
        Ok(provider)
    }
}
