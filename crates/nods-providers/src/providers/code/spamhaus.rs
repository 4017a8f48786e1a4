// crates/nods-providers/src/providers/code/spamhaus.rs
// ============================================================================
// Module: Spamhaus RBL
// Description: DNS blocklist lookup against the Spamhaus ZEN zone.
// Purpose: Serve the `ip` category of the `spamhaus` source.
// Dependencies: hickory-resolver, nods-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! The address is reversed (octets for IPv4, nibbles for IPv6), prefixed to
//! the zone and resolved. Each `127.0.0.x` answer names a list; a
//! non-existent name means the address is not listed. Resolution goes through
//! a pluggable resolver so tests need no network.
//!
//! # Invariants
//! - Only "no such record" counts as clean; any other resolver failure is a
//!   miss, so the cache never stores it.
//! - `127.255.255.x` answers (query refused by the zone) are bad data.

use std::fmt::Write as _;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::OnceLock;

use hickory_resolver::Resolver;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::config::ResolverOpts;
use hickory_resolver::error::ResolveErrorKind;
use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use serde_json::Value;
use serde_json::json;
use tracing::debug;

use crate::providers::category_input;

/// Default query zone.
pub const DEFAULT_ZONE: &str = "zen.spamhaus.org";

/// IPv4 answers for one host; empty when the name does not exist.
pub type DnsAnswer = Result<Vec<Ipv4Addr>, String>;

/// Resolves a host name to its IPv4 answers.
pub type DnsResolver = Arc<dyn Fn(&str) -> DnsAnswer + Send + Sync>;

/// RBL lookup provider.
pub struct SpamhausProvider {
    /// Query zone.
    zone: String,
    /// Host resolver.
    resolver: DnsResolver,
}

impl SpamhausProvider {
    /// Creates a provider using the system resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(DEFAULT_ZONE, system_resolver())
    }

    /// Creates a provider with an explicit zone and resolver.
    #[must_use]
    pub fn with_resolver(zone: impl Into<String>, resolver: DnsResolver) -> Self {
        Self {
            zone: zone.into(),
            resolver,
        }
    }
}

impl Default for SpamhausProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for SpamhausProvider {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Ip {
            return Err(NodsError::not_implemented("spamhaus", category));
        }
        let input = category_input(inputs, category)?;
        let ip: IpAddr = input.parse().map_err(|_| NodsError::NoDataPresent)?;
        if ctx.is_cancelled() {
            return Err(NodsError::NoDataPresent);
        }
        let host = format!("{}.{}", reversed(ip), self.zone);
        let answers = (self.resolver)(&host).map_err(|err| {
            debug!(host = %host, error = %err, "rbl lookup failed");
            NodsError::NoDataPresent
        })?;
        debug!(host = %host, answers = answers.len(), "rbl lookup");
        let mut lists: Vec<&str> = Vec::new();
        let mut codes = Vec::new();
        for answer in answers {
            let code = match answer.octets() {
                [127, 0, 0, code] => code,
                [127, 255, 255, code] => {
                    return Err(NodsError::BadData(format!("rbl query refused (code {code})")));
                }
                _ => continue,
            };
            codes.push(code);
            if let Some(list) = list_name(code)
                && !lists.contains(&list)
            {
                lists.push(list);
            }
        }
        Ok(json!({
            "listed": !codes.is_empty(),
            "lists": lists,
            "codes": codes,
        }))
    }

    fn is_cached(&self) -> bool {
        true
    }
}

/// Maps a ZEN return code to its list name.
const fn list_name(code: u8) -> Option<&'static str> {
    match code {
        2 => Some("SBL"),
        3 => Some("CSS"),
        4 ..= 7 => Some("XBL"),
        9 => Some("DROP"),
        10 | 11 => Some("PBL"),
        _ => None,
    }
}

/// Returns the reversed label form of an address.
fn reversed(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}")
        }
        IpAddr::V6(v6) => {
            let mut out = String::with_capacity(64);
            for byte in v6.octets().iter().rev() {
                let _ = write!(out, "{:x}.{:x}.", byte & 0x0f, byte >> 4);
            }
            out.pop();
            out
        }
    }
}

/// Builds a resolver over the system configuration, created on first use.
fn system_resolver() -> DnsResolver {
    let resolver: OnceLock<Result<Resolver, String>> = OnceLock::new();
    Arc::new(move |host: &str| {
        let resolver = resolver
            .get_or_init(|| {
                Resolver::from_system_conf()
                    .or_else(|_| Resolver::new(ResolverConfig::default(), ResolverOpts::default()))
                    .map_err(|err| err.to_string())
            })
            .as_ref()
            .map_err(Clone::clone)?;
        match resolver.ipv4_lookup(host) {
            Ok(lookup) => Ok(lookup.iter().map(|record| record.0).collect()),
            Err(err) if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
            Err(err) => Err(err.to_string()),
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use nods_core::Category;
    use nods_core::DataInputs;
    use nods_core::DataProvider;
    use nods_core::NodsError;
    use nods_core::QueryContext;

    use super::DnsAnswer;
    use super::SpamhausProvider;
    use super::reversed;
    use crate::providers::cache::CacheSettings;
    use crate::providers::cache::CachedProvider;

    /// Tests reversed label construction.
    #[test]
    fn reverses_addresses() {
        assert_eq!(reversed("1.2.3.4".parse().unwrap()), "4.3.2.1");
        let v6 = reversed("2001:db8::1".parse().unwrap());
        assert!(v6.starts_with("1.0.0.0."));
        assert!(v6.ends_with("8.b.d.0.1.0.0.2"));
    }

    /// Resolver answering `127.0.0.2` with three list codes and everything else with no record.
    fn listing_resolver(host: &str) -> DnsAnswer {
        if host == "2.0.0.127.zen.test" {
            Ok(vec![Ipv4Addr::new(127, 0, 0, 2), Ipv4Addr::new(127, 0, 0, 4), Ipv4Addr::new(127, 0, 0, 10)])
        } else {
            Ok(Vec::new())
        }
    }

    /// Tests decoding of listed and unlisted answers.
    #[test]
    fn decodes_return_codes() {
        let provider = SpamhausProvider::with_resolver("zen.test", Arc::new(listing_resolver));
        let ctx = QueryContext::new();
        let listed = provider
            .category_info(&ctx, Category::Ip, &DataInputs::new().with("ip", "127.0.0.2"))
            .unwrap();
        assert_eq!(listed["listed"], true);
        assert_eq!(listed["lists"], serde_json::json!(["SBL", "XBL", "PBL"]));
        let clean = provider
            .category_info(&ctx, Category::Ip, &DataInputs::new().with("ip", "192.0.2.1"))
            .unwrap();
        assert_eq!(clean["listed"], false);
    }

    /// Tests that a resolver failure is a miss and is never memoized.
    #[test]
    fn resolver_failure_is_an_uncached_miss() {
        let provider = SpamhausProvider::with_resolver("zen.test", Arc::new(|_: &str| Err("timed out".to_string())));
        let cached = CachedProvider::new("spamhaus", Arc::new(provider), CacheSettings::default());
        let inputs = DataInputs::new().with("ip", "127.0.0.2");
        let out = cached.category_info(&QueryContext::new(), Category::Ip, &inputs);
        assert_eq!(out, Err(NodsError::NoDataPresent));
        assert!(cached.is_empty());
    }

    /// Tests that a refused query is bad data rather than a clean answer.
    #[test]
    fn refused_query_is_bad_data() {
        let provider = SpamhausProvider::with_resolver(
            "zen.test",
            Arc::new(|_: &str| Ok(vec![Ipv4Addr::new(127, 255, 255, 254)])),
        );
        let cached = CachedProvider::new("spamhaus", Arc::new(provider), CacheSettings::default());
        let out = cached.category_info(&QueryContext::new(), Category::Ip, &DataInputs::new().with("ip", "192.0.2.1"));
        assert!(matches!(out, Err(NodsError::BadData(message)) if message.contains("254")));
        assert!(cached.is_empty());
    }
}
