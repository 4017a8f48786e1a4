// crates/nods-providers/tests/api_quirks.rs
// ============================================================================
// Module: API Provider Quirk Tests
// Description: Vendor API status handling against a local HTTP server.
// Purpose: Validate quirk interpretation, body limits and cache behaviour.
// Dependencies: nods-providers, nods-core, tiny_http
// ============================================================================

//! ## Overview
//! Each test starts a `tiny_http` server that answers a scripted status and
//! body, then drives an [`ApiProvider`] (optionally cache-wrapped) at it.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use nods_core::ApiDescriptor;
use nods_core::ApiQuirk;
use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_providers::ApiProvider;
use nods_providers::CacheSettings;
use nods_providers::CachedProvider;
use nods_providers::HttpFetcher;
use nods_providers::HttpSettings;
use nods_providers::QuirkTable;
use nods_providers::StaticSecrets;
use serde_json::json;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Scripted server: answers `replies` in order and records request URLs.
fn serve(replies: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>, JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let handle = thread::spawn(move || {
        for (status, body) in replies {
            let request = server.recv().unwrap();
            log.lock().unwrap().push(request.url().to_string());
            let _ = request.respond(Response::from_string(body).with_status_code(status));
        }
    });
    (format!("http://{addr}"), seen, handle)
}

/// Builds a provider for `vendor` against `base`.
fn provider(vendor: &str, base: &str, quirk: Option<ApiQuirk>) -> ApiProvider {
    let api = ApiDescriptor {
        url: format!("{base}/v1/{{input}}?key={{key}}"),
        auth: None,
        headers: BTreeMap::new(),
        key: Some("vendor".to_string()),
        quirk,
    };
    let secrets = Arc::new(StaticSecrets::new().with("vendor", "k"));
    let http = HttpFetcher::new(HttpSettings::default()).unwrap();
    ApiProvider::new(vendor, api, &QuirkTable::builtin(), secrets, http)
}

/// Inputs for one IP lookup.
fn ip(value: &str) -> DataInputs {
    DataInputs::new().with("ip", value)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests that a 404 body is data for vendors with the not-found quirk.
#[test]
fn not_found_is_data_for_greynoise() {
    let (base, seen, handle) = serve(vec![(404, r#"{"seen": false, "message": "IP not observed"}"#)]);
    let out = provider("greynoise", &base, None).category_info(&QueryContext::new(), Category::Ip, &ip("192.0.2.1"));
    handle.join().unwrap();
    assert_eq!(out.unwrap(), json!({"seen": false, "message": "IP not observed"}));
    assert_eq!(seen.lock().unwrap()[0], "/v1/192.0.2.1?key=k");
}

/// Tests that a 200 with an error field is a miss for the error-field quirk.
#[test]
fn error_field_is_miss_for_ipapi() {
    let (base, _, handle) = serve(vec![
        (200, r#"{"error": true, "reason": "Reserved IP Address"}"#),
        (200, r#"{"error": false, "country": "NZ"}"#),
    ]);
    let provider = provider("ipapi", &base, None);
    let ctx = QueryContext::new();
    let miss = provider.category_info(&ctx, Category::Ip, &ip("10.0.0.1"));
    let hit = provider.category_info(&ctx, Category::Ip, &ip("203.0.113.9"));
    handle.join().unwrap();
    assert_eq!(miss, Err(NodsError::NoDataPresent));
    assert_eq!(hit.unwrap()["country"], "NZ");
}

/// Tests the default rule: any non-200 status is a miss.
#[test]
fn non_success_status_is_miss_by_default() {
    let (base, _, handle) = serve(vec![(404, r#"{"seen": false}"#), (500, "oops")]);
    let provider = provider("plainvendor", &base, None);
    let ctx = QueryContext::new();
    let not_found = provider.category_info(&ctx, Category::Ip, &ip("192.0.2.1"));
    let failed = provider.category_info(&ctx, Category::Ip, &ip("192.0.2.2"));
    handle.join().unwrap();
    assert_eq!(not_found, Err(NodsError::NoDataPresent));
    assert_eq!(failed, Err(NodsError::NoDataPresent));
}

/// Tests that a descriptor quirk overrides the built-in table.
#[test]
fn descriptor_quirk_overrides_table() {
    let (base, _, handle) = serve(vec![(404, r#"{"known": false}"#)]);
    let out = provider("plainvendor", &base, Some(ApiQuirk::NotFoundIsData))
        .category_info(&QueryContext::new(), Category::Ip, &ip("192.0.2.1"));
    handle.join().unwrap();
    assert_eq!(out.unwrap(), json!({"known": false}));
}

/// Tests that a non-JSON success body is bad data.
#[test]
fn non_json_body_is_bad_data() {
    let (base, _, handle) = serve(vec![(200, "<html>rate limited</html>")]);
    let out = provider("plainvendor", &base, None).category_info(&QueryContext::new(), Category::Ip, &ip("192.0.2.1"));
    handle.join().unwrap();
    assert!(matches!(out, Err(NodsError::BadData(_))));
}

/// Tests that the cache memoizes successes and never stores failures.
#[test]
fn cache_stores_successes_only() {
    let (base, seen, handle) = serve(vec![(500, "down"), (200, r#"{"score": 7}"#)]);
    let inner: Arc<dyn DataProvider> = Arc::new(provider("plainvendor", &base, None));
    let cached = CachedProvider::new("plainvendor", inner, CacheSettings::default());
    let ctx = QueryContext::new();
    let first = cached.category_info(&ctx, Category::Ip, &ip("192.0.2.7"));
    let second = cached.category_info(&ctx, Category::Ip, &ip("192.0.2.7"));
    let third = cached.category_info(&ctx, Category::Ip, &ip("192.0.2.7"));
    handle.join().unwrap();
    assert_eq!(first, Err(NodsError::NoDataPresent));
    assert_eq!(second.unwrap(), json!({"score": 7}));
    assert_eq!(third.unwrap(), json!({"score": 7}));
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(cached.len(), 1);
}

/// Tests that a cancelled context never reaches the network.
#[test]
fn cancelled_context_skips_request() {
    let provider = provider("plainvendor", "http://127.0.0.1:9", None);
    let ctx = QueryContext::new();
    ctx.cancel();
    let out = provider.category_info(&ctx, Category::Ip, &ip("192.0.2.1"));
    assert_eq!(out, Err(NodsError::NoDataPresent));
}
