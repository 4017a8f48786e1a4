// crates/nods-config/src/config.rs
// ============================================================================
// Module: nods Service Configuration
// Description: Configuration loading and validation for the nods service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: nods-providers, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and falls back to defaults, but any value that is
//! present must pass validation; invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use nods_providers::CacheSettings;
use nods_providers::HttpSettings;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "nods.toml";
/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "NODS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for inbound request bodies.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Upper bound for per-request deadlines.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;
/// Upper bound for outbound response bodies.
pub(crate) const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Upper bound for cached entries.
pub(crate) const MAX_CACHE_ENTRIES: usize = 10_000_000;
/// Lower bound for the watcher poll interval.
pub(crate) const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Default inbound request body limit.
const fn default_max_body_bytes() -> usize {
    64 * 1024
}

/// Default per-request deadline.
const fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Default cache TTL (24 hours).
const fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

/// Default cache capacity.
const fn default_max_entries() -> usize {
    100_000
}

/// Default watcher poll interval.
const fn default_poll_interval_ms() -> u64 {
    2_000
}

/// Default watcher switch.
const fn default_watch_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// nods service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodsConfig {
    /// HTTP listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Catalogue file locations.
    #[serde(default)]
    pub catalogue: CatalogueConfig,
    /// Store file locations.
    #[serde(default)]
    pub stores: StoresConfig,
    /// Response cache limits.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Outbound HTTP limits.
    #[serde(default)]
    pub http: HttpSettings,
    /// File watcher configuration.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Secret resolution configuration.
    #[serde(default)]
    pub secrets: SecretsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

impl NodsConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: `path`, then `NODS_CONFIG`, then `nods.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.catalogue.validate()?;
        self.stores.validate()?;
        self.cache.validate()?;
        validate_http(&self.http)?;
        self.watch.validate()?;
        self.secrets.validate()?;
        self.log.validate()
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Per-request deadline in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `bind` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("server.bind must be a socket address".to_string()))
    }

    /// Returns the per-request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates listener settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "server.request_timeout_ms must be between 1 and {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Catalogue file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogueConfig {
    /// Top-level JSON array of sources.
    #[serde(default = "default_sources_file")]
    pub sources_file: PathBuf,
    /// Directory holding `{source}.json` item files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Default sources file.
fn default_sources_file() -> PathBuf {
    PathBuf::from("catalogue/sources.json")
}

/// Default item directory.
fn default_data_dir() -> PathBuf {
    PathBuf::from("catalogue/data")
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            sources_file: default_sources_file(),
            data_dir: default_data_dir(),
        }
    }
}

impl CatalogueConfig {
    /// Validates catalogue paths.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("catalogue.sources_file", &self.sources_file)?;
        validate_path_string("catalogue.data_dir", &self.data_dir)
    }
}

/// Store file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoresConfig {
    /// Directory of `{source}.prefixes.json` files.
    #[serde(default = "default_trie_dir")]
    pub trie_dir: PathBuf,
    /// Directory of `{source}.kv.json` files.
    #[serde(default = "default_flat_dir")]
    pub flat_dir: PathBuf,
}

/// Default prefix store directory.
fn default_trie_dir() -> PathBuf {
    PathBuf::from("data/trie")
}

/// Default flat store directory.
fn default_flat_dir() -> PathBuf {
    PathBuf::from("data/flat")
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            trie_dir: default_trie_dir(),
            flat_dir: default_flat_dir(),
        }
    }
}

impl StoresConfig {
    /// Validates store paths.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("stores.trie_dir", &self.trie_dir)?;
        validate_path_string("stores.flat_dir", &self.flat_dir)
    }
}

/// Response cache limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum number of cached entries per source.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Returns the provider-level cache settings.
    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.ttl_secs),
            max_entries: self.max_entries,
        }
    }

    /// Validates cache limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be greater than zero".to_string()));
        }
        if self.max_entries == 0 || self.max_entries > MAX_CACHE_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "cache.max_entries must be between 1 and {MAX_CACHE_ENTRIES}"
            )));
        }
        Ok(())
    }
}

/// File watcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Reload catalogue and store files when they change.
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,
    /// Poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_watch_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchConfig {
    /// Returns the poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validates watcher settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "watch.poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}"
            )));
        }
        Ok(())
    }
}

/// Secret resolution configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretsConfig {
    /// Prefix of secret environment variables.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
}

/// Default secret variable prefix.
fn default_env_prefix() -> String {
    nods_providers::secrets::DEFAULT_SECRET_PREFIX.to_string()
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
        }
    }
}

impl SecretsConfig {
    /// Validates the prefix as an environment variable fragment.
    fn validate(&self) -> Result<(), ConfigError> {
        let prefix = self.env_prefix.as_str();
        if prefix.is_empty() {
            return Err(ConfigError::Invalid("secrets.env_prefix must be non-empty".to_string()));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_') {
            return Err(ConfigError::Invalid(
                "secrets.env_prefix must use A-Z, 0-9 and underscore".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Default log filter.
fn default_log_filter() -> String {
    "info,nods=debug".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl LogConfig {
    /// Validates the filter directive.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log.filter must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Validates outbound HTTP limits.
fn validate_http(http: &HttpSettings) -> Result<(), ConfigError> {
    if http.timeout_ms == 0 || http.timeout_ms > MAX_REQUEST_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "http.timeout_ms must be between 1 and {MAX_REQUEST_TIMEOUT_MS}"
        )));
    }
    if http.max_response_bytes == 0 || http.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
        return Err(ConfigError::Invalid(format!(
            "http.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
        )));
    }
    if http.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("http.user_agent must be non-empty".to_string()));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path against length constraints.
fn validate_path_string(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use std::time::Duration;

    use super::NodsConfig;

    /// Tests that an empty document yields the documented defaults.
    #[test]
    fn empty_document_uses_defaults() {
        let config = NodsConfig::from_toml("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.cache.settings().ttl, Duration::from_secs(86_400));
        assert_eq!(config.cache.max_entries, 100_000);
        assert_eq!(config.secrets.env_prefix, "NODS_SECRET_");
        assert_eq!(config.log.filter, "info,nods=debug");
        assert!(config.watch.enabled);
    }

    /// Tests that unknown keys are rejected.
    #[test]
    fn unknown_keys_fail_closed() {
        let err = NodsConfig::from_toml("[server]\nport = 80\n").unwrap_err();
        assert!(err.to_string().starts_with("config parse error"));
    }
}
