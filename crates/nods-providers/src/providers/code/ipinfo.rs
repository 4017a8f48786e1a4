// crates/nods-providers/src/providers/code/ipinfo.rs
// ============================================================================
// Module: IP Geolocation
// Description: Geolocation lookup against the ipinfo API.
// Purpose: Serve the `ip` category of the `ipinfo` source.
// Dependencies: nods-core, crate::http
// ============================================================================

//! ## Overview
//! One GET per address with the `ipinfo` secret as token. The `loc` field
//! (`"lat,lon"`) is split into numeric `latitude` and `longitude` so items
//! can declare them as floats.

use std::net::IpAddr;
use std::sync::Arc;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::SecretStore;
use serde_json::Value;

use crate::http::HttpFetcher;
use crate::http::HttpRequest;
use crate::providers::api::encode;
use crate::providers::category_input;

/// Default API base.
pub const IPINFO_BASE: &str = "https://ipinfo.io";

/// Secret holding the API token.
pub const IPINFO_SECRET: &str = "ipinfo";

/// Geolocation provider.
pub struct IpInfoProvider {
    /// API base URL without trailing slash.
    base: String,
    /// Secret lookup.
    secrets: Arc<dyn SecretStore>,
    /// Outbound client.
    http: HttpFetcher,
}

impl IpInfoProvider {
    /// Creates a provider against the public API.
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretStore>, http: HttpFetcher) -> Self {
        Self::with_base(IPINFO_BASE, secrets, http)
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
}

impl DataProvider for IpInfoProvider {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Ip {
            return Err(NodsError::not_implemented("ipinfo", category));
        }
        let ip: IpAddr = category_input(inputs, category)?.parse().map_err(|_| NodsError::NoDataPresent)?;
        let token = encode(&self.secrets.find(IPINFO_SECRET));
        let request = HttpRequest::get(format!("{}/{ip}/json?token={token}", self.base));
        let reply = self.http.fetch(ctx, &request)?;
        if reply.status != 200 {
            return Err(NodsError::NoDataPresent);
        }
        let mut body = reply.json()?;
        if body.get("bogon").and_then(Value::as_bool) == Some(true) {
            return Err(NodsError::NoDataPresent);
        }
        split_location(&mut body);
        Ok(body)
    }

    fn is_cached(&self) -> bool {
        true
    }
}

/// Adds numeric `latitude`/`longitude` from a `"lat,lon"` field.
fn split_location(body: &mut Value) {
    let coordinates = body
        .get("loc")
        .and_then(Value::as_str)
        .and_then(|loc| loc.split_once(','))
        .and_then(|(lat, lon)| Some((lat.trim().parse::<f64>().ok()?, lon.trim().parse::<f64>().ok()?)));
    if let (Some((lat, lon)), Value::Object(map)) = (coordinates, body) {
        map.insert("latitude".to_string(), Value::from(lat));
        map.insert("longitude".to_string(), Value::from(lon));
    }
}
