// crates/nods-providers/src/lib.rs
// ============================================================================
// Module: nods Providers
// Description: Stores, providers, caching, data instances and the router.
// Purpose: Turn catalogue queries into typed answers from concrete backends.
// Dependencies: arc-swap, nods-core, nods-rules, reqwest, serde, tracing, url
// ============================================================================

//! ## Overview
//! This crate wires the catalogue to its backends. Each enabled source gets
//! one provider chosen by its database kind: prefix stores for `mmdb`, flat
//! stores for `fast`, vendor HTTP APIs for `byod`, and in-process code for
//! `code` (parsers, RBL, WHOIS, breach and geolocation lookups, and rules).
//! Cacheable providers are memoized by [`CachedProvider`]. The
//! [`DataRouter`] validates each query and dispatches it to the owning
//! source's [`DataInstance`].
//! Invariants:
//! - Every answer carries a typed result, populated or default.
//! - Store tables and catalogue maps are swapped atomically on reload.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod environment;
pub mod http;
pub mod instance;
pub mod providers;
pub mod router;
pub mod secrets;
pub mod stores;
pub mod watch;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use environment::ProviderEnvironment;
pub use http::HttpFetcher;
pub use http::HttpSettings;
pub use instance::DataInstance;
pub use providers::api::ApiProvider;
pub use providers::api::QuirkTable;
pub use providers::cache::CacheSettings;
pub use providers::cache::CachedProvider;
pub use providers::code::CompositeProvider;
pub use providers::fast::FastProvider;
pub use providers::mmdb::MmdbProvider;
pub use providers::rule::RuleProvider;
pub use router::DataRouter;
pub use secrets::EnvSecrets;
pub use secrets::StaticSecrets;
pub use stores::FlatFileStore;
pub use stores::MaxMindStore;
pub use stores::PrefixFileStore;
pub use stores::PrefixTable;
pub use watch::PollingWatcher;
