// crates/nods-providers/src/providers/api.rs
// ============================================================================
// Module: Vendor API Provider
// Description: Templated HTTP GET against a vendor API with response quirks.
// Purpose: Serve `byod` sources.
// Dependencies: nods-core, serde_json, tracing, url, crate::http
// ============================================================================

//! ## Overview
//! A source's `API` descriptor carries a URL template, optional basic auth,
//! static headers and the name of its secret. Placeholders are written
//! `{name}`: `{key}` becomes the secret, `{input}` the category input and any
//! other name the input of that name. Inputs are percent-encoded; secrets are
//! inserted verbatim.
//!
//! The response is interpreted through the vendor's quirk, if any:
//! - without a quirk only HTTP 200 is data;
//! - [`ApiQuirk::NotFoundIsData`] also accepts a 404 body;
//! - [`ApiQuirk::ErrorFieldIsMiss`] turns a 200 with a truthy `error` field
//!   into a miss.
//!
//! Everything else is [`NodsError::NoDataPresent`]; a body that is not JSON
//! is [`NodsError::BadData`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use nods_core::ApiDescriptor;
use nods_core::ApiQuirk;
use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::SecretStore;
use serde_json::Value;
use tracing::debug;
use url::Url;
use url::form_urlencoded;

use super::category_input;
use crate::http::Credentials;
use crate::http::HttpFetcher;
use crate::http::HttpReply;
use crate::http::HttpRequest;

// ============================================================================
// SECTION: Quirk Table
// ============================================================================

/// Vendor name to response quirk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuirkTable(BTreeMap<String, ApiQuirk>);

impl QuirkTable {
    /// Returns the built-in table.
    #[must_use]
    pub fn builtin() -> Self {
        Self(BTreeMap::from([
            ("greynoise".to_string(), ApiQuirk::NotFoundIsData),
            ("ipapi".to_string(), ApiQuirk::ErrorFieldIsMiss),
        ]))
    }

    /// Returns an empty table.
    #[must_use]
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Registers or replaces a vendor quirk.
    #[must_use]
    pub fn with(mut self, vendor: impl Into<String>, quirk: ApiQuirk) -> Self {
        self.0.insert(vendor.into(), quirk);
        self
    }

    /// Returns the quirk registered for `vendor`.
    #[must_use]
    pub fn get(&self, vendor: &str) -> Option<ApiQuirk> {
        self.0.get(vendor).copied()
    }
}

impl Default for QuirkTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Provider calling a vendor HTTP API.
pub struct ApiProvider {
    /// Source name.
    name: String,
    /// Request template.
    api: ApiDescriptor,
    /// Effective response quirk.
    quirk: Option<ApiQuirk>,
    /// Secret lookup.
    secrets: Arc<dyn SecretStore>,
    /// Outbound client.
    http: HttpFetcher,
}

impl ApiProvider {
    /// Creates a provider; the descriptor's own quirk overrides the table.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        api: ApiDescriptor,
        quirks: &QuirkTable,
        secrets: Arc<dyn SecretStore>,
        http: HttpFetcher,
    ) -> Self {
        let name = name.into();
        let quirk = api.quirk.or_else(|| quirks.get(&name));
        Self {
            name,
            api,
            quirk,
            secrets,
            http,
        }
    }

    /// Returns the effective quirk.
    #[must_use]
    pub const fn quirk(&self) -> Option<ApiQuirk> {
        self.quirk
    }

    /// Returns the secret substituted for `{key}`.
    fn secret(&self) -> String {
        self.secrets.find(self.api.key.as_deref().unwrap_or(&self.name))
    }

    /// Renders the request for one lookup.
    fn build_request(&self, category: Category, inputs: &DataInputs) -> Result<HttpRequest, NodsError> {
        let input = category_input(inputs, category)?;
        let secret = self.secret();
        let url = render_template(&self.api.url, |name| match name {
            "key" => Ok(secret.clone()),
            "input" => Ok(encode(input)),
            other => inputs
                .non_empty(other)
                .map(encode)
                .ok_or_else(|| NodsError::MissingInputs(other.to_string())),
        })?;
        Url::parse(&url).map_err(|err| NodsError::BadData(format!("invalid api url: {err}")))?;

        let secret_only = |name: &str| -> Result<String, NodsError> {
            Ok(if name == "key" { secret.clone() } else { format!("{{{name}}}") })
        };
        let mut request = HttpRequest::get(url);
        for (header, value) in &self.api.headers {
            request = request.header(header.clone(), render_template(value, secret_only)?);
        }
        if let Some(auth) = &self.api.auth {
            request.auth = Some(Credentials {
                user: render_template(&auth.user, secret_only)?,
                password: render_template(&auth.password, secret_only)?,
            });
        }
        Ok(request)
    }

    /// Applies status and quirk rules to a reply.
    fn interpret(&self, reply: &HttpReply) -> Result<Value, NodsError> {
        match (reply.status, self.quirk) {
            (200, Some(ApiQuirk::ErrorFieldIsMiss)) => {
                let body = reply.json()?;
                if body.get("error").is_some_and(is_truthy) {
                    debug!(source = %self.name, "api reported error field");
                    return Err(NodsError::NoDataPresent);
                }
                Ok(body)
            }
            (200, _) | (404, Some(ApiQuirk::NotFoundIsData)) => reply.json(),
            (status, _) => {
                debug!(source = %self.name, status, "api returned no data");
                Err(NodsError::NoDataPresent)
            }
        }
    }
}

impl DataProvider for ApiProvider {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category == Category::Rule {
            return Err(NodsError::not_implemented(&self.name, category));
        }
        let request = self.build_request(category, inputs)?;
        let reply = self.http.fetch(ctx, &request)?;
        self.interpret(&reply)
    }

    fn is_cached(&self) -> bool {
        true
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Replaces `{name}` placeholders using `lookup`; unmatched braces are kept.
pub(crate) fn render_template(
    template: &str,
    mut lookup: impl FnMut(&str) -> Result<String, NodsError>,
) -> Result<String, NodsError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[.. open]);
        let after = &rest[open + 1 ..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open ..]);
            return Ok(out);
        };
        out.push_str(&lookup(&after[.. close])?);
        rest = &after[close + 1 ..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Percent-encodes a value for use anywhere in a URL.
pub(crate) fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>().replace('+', "%20")
}

/// Returns true for values other than null, false, zero and empty.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
