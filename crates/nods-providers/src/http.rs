// crates/nods-providers/src/http.rs
// ============================================================================
// Module: Outbound HTTP
// Description: Bounded blocking HTTP GET shared by remote providers.
// Purpose: Issue context-aware requests with size-limited bodies.
// Dependencies: reqwest, serde, nods-core
// ============================================================================

//! ## Overview
//! Remote providers (vendor APIs, breach lookups, geolocation) share one
//! [`HttpFetcher`]. Each request derives its timeout from the query context,
//! refuses to start once the context is cancelled, and reads at most
//! `max_response_bytes` of body. Status handling is left to the caller so
//! per-vendor quirks can interpret non-200 responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use nods_core::NodsError;
use nods_core::QueryContext;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Outbound HTTP limits.
///
/// # Invariants
/// - `max_response_bytes` is a hard upper bound on bodies.
/// - `timeout_ms` caps every request; the query deadline may shorten it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size in bytes.
    pub max_response_bytes: usize,
    /// User agent for outbound requests.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_response_bytes: 1024 * 1024,
            user_agent: "nods/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Credentials for basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub user: String,
    /// Password.
    pub password: String,
}

/// Outbound GET request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL.
    pub url: String,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Optional basic auth.
    pub auth: Option<Credentials>,
}

impl HttpRequest {
    /// Creates a GET request for `url`.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::BadData`] when the body is not JSON.
    pub fn json(&self) -> Result<serde_json::Value, NodsError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| NodsError::BadData(format!("response is not json: {err}")))
    }
}

// ============================================================================
// SECTION: Fetcher
// ============================================================================

/// Blocking HTTP client with limits.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// Limits applied to every request.
    settings: HttpSettings,
    /// Underlying client.
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::BadData`] when the client cannot be constructed.
    pub fn new(settings: HttpSettings) -> Result<Self, NodsError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(settings.user_agent.clone())
            .redirect(Policy::limited(3))
            .build()
            .map_err(|err| NodsError::BadData(format!("http client build failed: {err}")))?;
        Ok(Self {
            settings,
            client,
        })
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Performs a GET and returns status and body.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::NoDataPresent`] when the context is cancelled or
    /// the transport fails, and [`NodsError::BadData`] when the body exceeds
    /// the size limit.
    pub fn fetch(&self, ctx: &QueryContext, request: &HttpRequest) -> Result<HttpReply, NodsError> {
        if ctx.is_cancelled() {
            return Err(NodsError::NoDataPresent);
        }
        let timeout = ctx.timeout_or(Duration::from_millis(self.settings.timeout_ms));
        let mut builder = self.client.get(&request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.password));
        }
        let mut response = builder.send().map_err(|err| {
            tracing::debug!(error = %err, "http request failed");
            NodsError::NoDataPresent
        })?;
        let status = response.status().as_u16();
        let body = read_response_limited(&mut response, self.settings.max_response_bytes)?;
        Ok(HttpReply {
            status,
            body,
        })
    }
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, NodsError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| NodsError::BadData("response size limit exceeds u64".to_string()))?;
    if response.content_length().is_some_and(|expected| expected > max_bytes_u64) {
        return Err(NodsError::BadData("http response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    response
        .take(max_bytes_u64.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|_| NodsError::NoDataPresent)?;
    if buf.len() > max_bytes {
        return Err(NodsError::BadData("http response exceeds size limit".to_string()));
    }
    Ok(buf)
}
