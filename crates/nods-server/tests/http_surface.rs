// crates/nods-server/tests/http_surface.rs
// ============================================================================
// Module: HTTP Surface Tests
// Description: Drives the axum surface over a real loopback listener.
// Purpose: Validate statuses, input handling, fan-out renderings and views.
// Dependencies: nods-server, nods-core, nods-providers, reqwest, tokio
// ============================================================================

//! ## Overview
//! Builds an in-memory catalogue with one injected feed provider, the built-in
//! parsers and rules, serves it on an ephemeral port and queries it with an
//! async `reqwest` client.

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

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::DatabaseKind;
use nods_core::ItemDescriptor;
use nods_core::ItemType;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::Schema;
use nods_core::SourceInfo;
use nods_providers::DataRouter;
use nods_providers::ProviderEnvironment;
use nods_server::AppState;
use nods_server::app;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Listed address known to the feed.
const LISTED: &str = "192.0.2.1";

/// Feed answering one listed address.
struct Feed;

impl DataProvider for Feed {
    fn category_info(
        &self,
        _ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Ip {
            return Err(NodsError::not_implemented("feed", category));
        }
        match inputs.get("ip") {
            Some(LISTED) => Ok(json!({"listed": true, "score": 7})),
            _ => Err(NodsError::NoDataPresent),
        }
    }

    fn is_cached(&self) -> bool {
        false
    }
}

/// Builds the router over an in-memory catalogue.
fn router() -> Arc<DataRouter> {
    let sources = vec![
        SourceInfo::new("feed", DatabaseKind::Code),
        SourceInfo::new("internal", DatabaseKind::Code),
        SourceInfo::new("rule", DatabaseKind::Code),
        SourceInfo::new("offline", DatabaseKind::Code).enabled(false),
    ];
    let items = vec![
        ItemDescriptor::new("ip/feed/listed", "listed", ItemType::Boolean),
        ItemDescriptor::new("ip/feed/score", "score", ItemType::Integer),
        ItemDescriptor::new("ip/offline/listed", "listed", ItemType::Boolean),
        ItemDescriptor::new("email/internal/valid", "valid", ItemType::Boolean),
        ItemDescriptor::new("rule/rule/listed", "", ItemType::Boolean).with_query("[ip/feed/listed] && true"),
        ItemDescriptor::new("rule/rule/typo", "", ItemType::Boolean).with_query("[ip/feed/listed] &&& true"),
    ];
    let schema = Schema::from_sources(sources, items).unwrap();
    let env = ProviderEnvironment::new().with_code_provider("feed", Arc::new(Feed));
    DataRouter::init(Arc::new(schema), &env)
}

/// Serves the router on an ephemeral port and returns its base URL.
async fn start() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState::new(router(), Duration::from_secs(5), 4096));
    tokio::spawn(async move {
        axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

/// Issues a GET and returns status and body text.
async fn get(url: &str) -> (u16, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

/// Issues a POST with a raw body and returns status and body text.
async fn post(url: &str, body: &str) -> (u16, String) {
    let response = reqwest::Client::new().post(url).body(body.to_string()).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

/// Parses a JSON body.
fn parse(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests a hit, a typed default and the missing-input soft miss.
#[tokio::test(flavor = "multi_thread")]
async fn item_queries_return_typed_outputs() {
    let base = start().await;

    let (status, body) = get(&format!("{base}/v1/nods/ip/feed/listed?ip={LISTED}")).await;
    assert_eq!(status, 200);
    let out = parse(&body);
    assert_eq!(out["item"], "ip/feed/listed");
    assert_eq!(out["keys"]["ip"], LISTED);
    assert_eq!(out["error"], "");
    assert_eq!(out["result"]["bool"], true);

    let (status, body) = get(&format!("{base}/v1/nods/ip/feed/score?ip=198.51.100.1")).await;
    assert_eq!(status, 200);
    let out = parse(&body);
    assert_eq!(out["error"], "no data present");
    assert_eq!(out["result"]["num"], -1);
    assert_eq!(out["result"]["raw"], "-1");

    let (status, body) = get(&format!("{base}/v1/nods/ip/feed/listed")).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["error"], "missing inputs: ip");
}

/// Tests that unknown catalogue paths are 404 and still carry a default.
#[tokio::test(flavor = "multi_thread")]
async fn unknown_paths_are_not_found() {
    let base = start().await;
    let (status, body) = get(&format!("{base}/v1/nods/ip/feed/nothing?ip={LISTED}")).await;
    assert_eq!(status, 404);
    assert_eq!(parse(&body)["result"]["type"], "Null");

    let (status, _) = get(&format!("{base}/v1/nods/planet/feed/listed?ip={LISTED}")).await;
    assert_eq!(status, 404);

    let (status, body) = get(&format!("{base}/v1/nods/ip/offline/listed?ip={LISTED}")).await;
    assert_eq!(status, 404);
    let out = parse(&body);
    assert_eq!(out["error"], "source not found: offline");
    assert_eq!(out["result"]["bool"], false);
}

/// Tests POST bodies as inputs and rejection of non-object bodies.
#[tokio::test(flavor = "multi_thread")]
async fn post_body_supplies_inputs() {
    let base = start().await;
    let (status, body) =
        post(&format!("{base}/v1/nods/email/internal/valid"), r#"{"email": "alice@example.com"}"#).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["result"]["bool"], true);

    let (status, body) = post(&format!("{base}/v1/nods/email/internal/valid"), "[1, 2]").await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["kind"], "bad_request");
}

/// Tests that rule results evaluate and rule syntax errors are 400.
#[tokio::test(flavor = "multi_thread")]
async fn rules_evaluate_and_surface_syntax_errors() {
    let base = start().await;
    let (status, body) = get(&format!("{base}/v1/nods/rule/rule/listed?ip={LISTED}")).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["result"]["bool"], true);

    let (status, body) = get(&format!("{base}/v1/nods/rule/rule/typo?ip={LISTED}")).await;
    assert_eq!(status, 400);
    let out = parse(&body);
    assert!(out["error"].as_str().unwrap().starts_with("rule error"));
    assert_eq!(out["result"]["bool"], false);
}

/// Tests the JSON and tab-separated category fan-out.
#[tokio::test(flavor = "multi_thread")]
async fn category_fan_out_renders_json_and_tsv() {
    let base = start().await;
    let (status, body) = get(&format!("{base}/v1/nods/ip?ip={LISTED}")).await;
    assert_eq!(status, 200);
    let outputs = parse(&body);
    let items: Vec<&str> = outputs.as_array().unwrap().iter().map(|out| out["item"].as_str().unwrap()).collect();
    assert!(items.contains(&"ip/feed/listed"));
    assert!(items.contains(&"ip/feed/score"));
    assert!(!items.contains(&"ip/offline/listed"));

    let response = reqwest::get(format!("{base}/v1/nods/ip?ip={LISTED}&csv=true")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/tab-separated-values"));
    let text = response.text().await.unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("item\ttype\traw\terror"));
    assert!(text.contains("ip/feed/score\tInteger\t7\t\n"));

    let (status, body) = get(&format!("{base}/v1/nods/ip?ip=198.51.100.1")).await;
    assert_eq!(status, 404);
    assert_eq!(parse(&body)["error"], "item not found: ip/*");

    let (status, body) = get(&format!("{base}/v1/nods/planet?ip={LISTED}")).await;
    assert_eq!(status, 404);
    assert_eq!(parse(&body)["kind"], "not_found");
}

/// Tests that whoami profiles the first forwarded hop.
#[tokio::test(flavor = "multi_thread")]
async fn whoami_uses_forwarded_address() {
    let base = start().await;
    let response = reqwest::Client::new()
        .get(format!("{base}/v1/whoami"))
        .header("X-Forwarded-For", format!("{LISTED}, 10.0.0.1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let outputs = parse(&response.text().await.unwrap());
    let listed = outputs.as_array().unwrap().iter().find(|out| out["item"] == "ip/feed/listed").unwrap();
    assert_eq!(listed["keys"]["ip"], LISTED);
    assert_eq!(listed["result"]["bool"], true);

    let (status, _) = get(&format!("{base}/v1/whoami")).await;
    assert_eq!(status, 404);
}

/// Tests the read-only catalogue views and the health check.
#[tokio::test(flavor = "multi_thread")]
async fn catalogue_views_and_health() {
    let base = start().await;
    let (status, body) = get(&format!("{base}/healthz")).await;
    assert_eq!((status, body.as_str()), (200, "ok"));

    let (_, body) = get(&format!("{base}/v1/catalogue/sources")).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 4);

    let (_, body) = get(&format!("{base}/v1/catalogue/rules")).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 2);

    let (_, body) = get(&format!("{base}/v1/catalogue/items")).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 6);

    let (_, body) = get(&format!("{base}/v1/catalogue/items/email")).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 1);

    let (status, _) = get(&format!("{base}/v1/catalogue/items/planet")).await;
    assert_eq!(status, 404);
}
