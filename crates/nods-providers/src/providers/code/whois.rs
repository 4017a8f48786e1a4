// crates/nods-providers/src/providers/code/whois.rs
// ============================================================================
// Module: WHOIS Lookup
// Description: WHOIS over TCP port 43 with IANA referral.
// Purpose: Serve the `domain` and `ip` categories of the `whois` source.
// Dependencies: nods-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! The query goes to the root server first; a `refer:` (or `whois:`) line in
//! its answer names the authoritative server, which is asked once more.
//! Responses are parsed as `key: value` lines into an object with lowercased
//! keys, keeping the first occurrence. Common registration fields are also
//! exposed under stable names (`created`, `updated`, `expires`, `registrar`)
//! with dates trimmed to `YYYY-MM-DD`.
//!
//! A referral that cannot be reached is a miss: the root answer describes the
//! registry, not the queried name.
//!
//! # Invariants
//! - Every connect, read and write is bounded by the query deadline.
//! - Responses are read up to [`MAX_WHOIS_BYTES`].

use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::time::Duration;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use crate::providers::category_input;

/// Default root server.
pub const IANA_WHOIS: &str = "whois.iana.org:43";

/// Maximum bytes read per response.
pub const MAX_WHOIS_BYTES: usize = 256 * 1024;

/// Default per-server timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalized field names and the raw keys they are taken from.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("created", &["creation date", "created", "registered", "domain_dateregistered", "regdate"]),
    ("updated", &["updated date", "last-modified", "changed", "last updated", "updated"]),
    ("expires", &["registry expiry date", "expiration date", "expiry date", "paid-till", "expires"]),
    ("registrar", &["registrar", "sponsoring registrar", "org", "orgname"]),
];

/// WHOIS provider.
#[derive(Debug, Clone)]
pub struct WhoisProvider {
    /// Root server (`host:port`).
    root: String,
}

impl WhoisProvider {
    /// Creates a provider querying IANA first.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(IANA_WHOIS)
    }

    /// Creates a provider with an explicit root server.
    #[must_use]
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
        }
    }
}

impl Default for WhoisProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for WhoisProvider {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if !matches!(category, Category::Domain | Category::Ip) {
            return Err(NodsError::not_implemented("whois", category));
        }
        let query = category_input(inputs, category)?.to_lowercase();
        let root = query_server(ctx, &self.root, &query)?;
        let referral = referral(&root).filter(|server| !self.root.starts_with(server.as_str()));
        let (server, answer) = match referral {
            Some(server) => {
                let address = if server.contains(':') { server.clone() } else { format!("{server}:43") };
                let answer = query_server(ctx, &address, &query).inspect_err(|err| {
                    debug!(server = %server, error = %err, "whois referral failed");
                })?;
                (server, answer)
            }
            None => (self.root.clone(), root),
        };
        let mut fields = parse_fields(&answer);
        if fields.is_empty() {
            return Err(NodsError::NoDataPresent);
        }
        normalize_fields(&mut fields);
        fields.insert("whois_server".to_string(), Value::String(server));
        Ok(Value::Object(fields))
    }

    fn is_cached(&self) -> bool {
        true
    }
}

/// Sends one query and reads the answer.
fn query_server(ctx: &QueryContext, server: &str, query: &str) -> Result<String, NodsError> {
    if ctx.is_cancelled() {
        return Err(NodsError::NoDataPresent);
    }
    let timeout = ctx.timeout_or(DEFAULT_TIMEOUT);
    let address: SocketAddr = server
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or(NodsError::NoDataPresent)?;
    let io = |err: std::io::Error| {
        debug!(server, error = %err, "whois io failed");
        NodsError::NoDataPresent
    };
    let mut stream = TcpStream::connect_timeout(&address, timeout).map_err(io)?;
    stream.set_read_timeout(Some(timeout)).map_err(io)?;
    stream.set_write_timeout(Some(timeout)).map_err(io)?;
    stream.write_all(format!("{query}\r\n").as_bytes()).map_err(io)?;
    let mut buf = Vec::new();
    let limit = u64::try_from(MAX_WHOIS_BYTES).unwrap_or(u64::MAX);
    stream.take(limit).read_to_end(&mut buf).map_err(io)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Returns the referral server named in a root answer.
fn referral(answer: &str) -> Option<String> {
    answer.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_lowercase();
        let value = value.trim();
        ((key == "refer" || key == "whois") && !value.is_empty()).then(|| value.to_string())
    })
}

/// Parses `key: value` lines, keeping the first value per key.
fn parse_fields(answer: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    for line in answer.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(['%', '#', '>']) {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if key.is_empty() || value.is_empty() || fields.contains_key(&key) {
            continue;
        }
        fields.insert(key, Value::String(value.to_string()));
    }
    fields
}

/// Adds stable aliases for common registration fields.
fn normalize_fields(fields: &mut Map<String, Value>) {
    for (name, keys) in FIELD_ALIASES {
        let found = keys.iter().find_map(|key| fields.get(*key).and_then(Value::as_str));
        let Some(found) = found.map(str::to_string) else {
            continue;
        };
        let value = if *name == "registrar" { found } else { date_prefix(&found) };
        fields.insert((*name).to_string(), Value::String(value));
    }
}

/// Trims an ISO timestamp to its date, leaving other formats untouched.
fn date_prefix(value: &str) -> String {
    let candidate = value.get(.. 10).unwrap_or(value);
    let bytes = candidate.as_bytes();
    let iso = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes.iter().enumerate().all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if iso { candidate.to_string() } else { value.to_string() }
}
