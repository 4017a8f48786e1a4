// crates/nods-providers/src/providers/code/pwned.rs
// ============================================================================
// Module: Breach Lookup
// Description: Breach and paste exposure of an email address.
// Purpose: Serve the `email` category of the `pwned` source.
// Dependencies: nods-core, serde_json, crate::http
// ============================================================================

//! ## Overview
//! Two calls against the Have I Been Pwned v3 API: breached accounts and
//! pastes. A 404 means "none" and is data, not a miss. The API key is the
//! `pwned` secret, sent in the `hibp-api-key` header.

use std::sync::Arc;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::SecretStore;
use serde_json::Value;
use serde_json::json;

use crate::http::HttpFetcher;
use crate::http::HttpRequest;
use crate::providers::api::encode;
use crate::providers::category_input;

/// Default API base.
pub const HIBP_BASE: &str = "https://haveibeenpwned.com/api/v3";

/// Secret holding the API key.
pub const PWNED_SECRET: &str = "pwned";

/// Breach lookup provider.
pub struct PwnedProvider {
    /// API base URL without trailing slash.
    base: String,
    /// Secret lookup.
    secrets: Arc<dyn SecretStore>,
    /// Outbound client.
    http: HttpFetcher,
}

impl PwnedProvider {
    /// Creates a provider against the public API.
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretStore>, http: HttpFetcher) -> Self {
        Self::with_base(HIBP_BASE, secrets, http)
    }

    /// Creates a provider against an explicit API base.
    #[must_use]
    pub fn with_base(base: impl Into<String>, secrets: Arc<dyn SecretStore>, http: HttpFetcher) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            secrets,
            http,
        }
    }

    /// Fetches one listing; 404 is an empty list.
    fn listing(&self, ctx: &QueryContext, path: &str) -> Result<Vec<Value>, NodsError> {
        let request = HttpRequest::get(format!("{}/{path}", self.base))
            .header("hibp-api-key", self.secrets.find(PWNED_SECRET));
        let reply = self.http.fetch(ctx, &request)?;
        match reply.status {
            200 => match reply.json()? {
                Value::Array(items) => Ok(items),
                Value::Null => Ok(Vec::new()),
                _ => Err(NodsError::BadData("expected a json array".to_string())),
            },
            404 => Ok(Vec::new()),
            _ => Err(NodsError::NoDataPresent),
        }
    }
}

impl DataProvider for PwnedProvider {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Email {
            return Err(NodsError::not_implemented("pwned", category));
        }
        let account = encode(&category_input(inputs, category)?.to_lowercase());
        let breaches = self.listing(ctx, &format!("breachedaccount/{account}?truncateResponse=false"))?;
        let pastes = self.listing(ctx, &format!("pasteaccount/{account}"))?;
        let names: Vec<Value> = breaches.iter().filter_map(|breach| breach.get("Name").cloned()).collect();
        Ok(json!({
            "pwned": !breaches.is_empty() || !pastes.is_empty(),
            "breach_count": breaches.len(),
            "paste_count": pastes.len(),
            "breaches": names,
        }))
    }

    fn is_cached(&self) -> bool {
        true
    }
}
