// crates/nods-providers/tests/router_queries.rs
// ============================================================================
// Module: Router Query Tests
// Description: End-to-end queries through catalogue, router and providers.
// Purpose: Validate routing, defaults, caching, fan-out and rule evaluation.
// Dependencies: nods-providers, nods-core, tempfile, serde_json
// ============================================================================

//! ## Overview
//! Builds a catalogue on disk (sources, items and prefix store files) and
//! queries it through [`DataRouter`]. Counting stub providers are injected as
//! code sources where call counts matter.

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

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::DataUri;
use nods_core::ErrorKind;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::Schema;
use nods_core::TypedValue;
use nods_providers::DataRouter;
use nods_providers::ProviderEnvironment;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Code provider counting calls; fails when `fail` is set.
struct Counting {
    /// Number of calls.
    calls: AtomicUsize,
    /// Whether every call fails.
    fail: bool,
}

impl Counting {
    /// Creates a counting provider.
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    /// Returns the number of calls so far.
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataProvider for Counting {
    fn category_info(
        &self,
        _ctx: &QueryContext,
        _category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NodsError::NoDataPresent);
        }
        Ok(json!({"echo": inputs.get("domain"), "length": inputs.get("domain").map_or(0, str::len)}))
    }

    fn is_cached(&self) -> bool {
        true
    }
}

/// Writes a JSON file.
fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// On-disk catalogue with two blocklists, two stub sources and rules.
struct Fixture {
    /// Temporary root.
    dir: TempDir,
}

impl Fixture {
    /// Writes the catalogue and prefix stores.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for sub in ["items", "trie", "flat"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        write_json(
            &root.join("sources.json"),
            &json!([
                {"Name": "ipsum", "Database": "mmdb", "Enabled": true},
                {"Name": "uhb", "Database": "mmdb", "Enabled": true},
                {"Name": "offline", "Database": "mmdb", "Enabled": false},
                {"Name": "stub", "Database": "code", "Enabled": true},
                {"Name": "broken", "Database": "code", "Enabled": true},
                {"Name": "rule", "Database": "code", "Enabled": true}
            ]),
        );
        let blacklist = |source: &str| {
            json!([
                {"Item": format!("ip/{source}/blacklist.isBlacklisted"), "Enabled": true, "GJSON": "listed", "Type": "Boolean", "Description": "listed"},
                {"Item": format!("ip/{source}/blacklist.hits"), "Enabled": true, "GJSON": "hits", "Type": "Integer", "Description": "hits"}
            ])
        };
        write_json(&root.join("items/ipsum.json"), &blacklist("ipsum"));
        write_json(&root.join("items/uhb.json"), &blacklist("uhb"));
        write_json(&root.join("items/offline.json"), &blacklist("offline"));
        write_json(
            &root.join("items/stub.json"),
            &json!([
                {"Item": "domain/stub/echo", "Enabled": true, "GJSON": "echo", "Type": "String", "Description": ""},
                {"Item": "domain/stub/length", "Enabled": true, "GJSON": "length", "Type": "Integer", "Description": ""},
                {"Item": "domain/stub/missing", "Enabled": true, "GJSON": "nothing.here", "Type": "Float", "Description": ""}
            ]),
        );
        write_json(
            &root.join("items/broken.json"),
            &json!([
                {"Item": "email/broken/anything", "Enabled": true, "GJSON": "x", "Type": "Boolean", "Description": ""}
            ]),
        );
        write_json(
            &root.join("items/rule.json"),
            &json!([
                {"Item": "rule/rule/anyBlacklist", "Enabled": true, "GJSON": "", "Type": "Boolean", "Description": "",
                 "Query": "[ip/ipsum/blacklist.isBlacklisted] || [ip/uhb/blacklist.isBlacklisted]"},
                {"Item": "rule/rule/wordy", "Enabled": true, "GJSON": "result", "Type": "Boolean", "Description": "",
                 "Query": "[ip/ipsum/blacklist.isBlacklisted] OR [ip/offline/blacklist.isBlacklisted]"},
                {"Item": "rule/rule/loop", "Enabled": true, "GJSON": "", "Type": "Boolean", "Description": "",
                 "Query": "[rule/rule/loop] AND true"},
                {"Item": "rule/rule/typo", "Enabled": true, "GJSON": "", "Type": "Boolean", "Description": "",
                 "Query": "[ip/ipsum/blacklist.isBlacklisted] &&& true"}
            ]),
        );
        write_json(
            &root.join("trie/ipsum.prefixes.json"),
            &json!({"1.2.3.4/32": {"listed": true, "hits": 12}, "5.6.7.0/24": {"listed": true, "hits": 3}}),
        );
        write_json(&root.join("trie/uhb.prefixes.json"), &json!({"1.2.3.4/32": {"listed": true, "hits": 1}}));
        Self {
            dir,
        }
    }

    /// Loads the catalogue and builds a router with the given stubs.
    fn router(&self, stub: Arc<Counting>, broken: Arc<Counting>) -> Arc<DataRouter> {
        let root = self.dir.path();
        let schema = Schema::try_load(&root.join("sources.json"), &root.join("items"), None).unwrap();
        let env = ProviderEnvironment::new()
            .with_store_dirs(root.join("trie"), root.join("flat"))
            .with_code_provider("stub", stub)
            .with_code_provider("broken", broken);
        DataRouter::init(Arc::new(schema), &env)
    }
}

/// Shorthand for a parsed item path.
fn uri(path: &str) -> DataUri {
    DataUri::parse(path)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests the prefix-store round trip and the typed default on a miss.
#[test]
fn trie_round_trip_and_default() {
    let fixture = Fixture::new();
    let router = fixture.router(Counting::new(false), Counting::new(true));
    let ctx = QueryContext::new();

    let hit = router.data_value(&ctx, &uri("ip/ipsum/blacklist.isBlacklisted"), &DataInputs::new().with("ip", "1.2.3.4"));
    assert!(hit.is_ok());
    assert_eq!(hit.result.value(), &TypedValue::Boolean(true));

    let miss = router.data_value(&ctx, &uri("ip/ipsum/blacklist.isBlacklisted"), &DataInputs::new().with("ip", "1.2.3.5"));
    assert_eq!(miss.error, Some(NodsError::NoDataPresent));
    assert_eq!(miss.result.value(), &TypedValue::Boolean(false));

    let hits = router.data_value(&ctx, &uri("ip/ipsum/blacklist.hits"), &DataInputs::new().with("ip", "5.6.7.99"));
    assert_eq!(hits.result.value(), &TypedValue::Integer(3));
}

/// Tests the validation order and that rejections never reach a provider.
#[test]
fn validation_rejects_before_providers() {
    let fixture = Fixture::new();
    let stub = Counting::new(false);
    let router = fixture.router(Arc::clone(&stub), Counting::new(true));
    let ctx = QueryContext::new();
    let inputs = DataInputs::new().with("domain", "example.com");

    let bad_category = router.data_value(&ctx, &uri("planet/stub/echo"), &inputs);
    assert!(matches!(bad_category.error, Some(NodsError::CategoryNotFound(_))));

    let no_input = router.data_value(&ctx, &uri("domain/stub/echo"), &DataInputs::new().with("ip", "1.2.3.4"));
    assert_eq!(no_input.error, Some(NodsError::MissingInputs("domain".to_string())));
    assert_eq!(no_input.result.value(), &TypedValue::String(String::new()));

    let no_item = router.data_value(&ctx, &uri("domain/stub/unknown"), &inputs);
    assert!(matches!(no_item.error, Some(NodsError::ItemNotFound(_))));
    assert_eq!(stub.calls(), 0);

    let disabled = router.data_value(&ctx, &uri("ip/offline/blacklist.hits"), &DataInputs::new().with("ip", "1.2.3.4"));
    assert_eq!(disabled.error, Some(NodsError::SourceNotFound("offline".to_string())));
    assert_eq!(disabled.result.value(), &TypedValue::Integer(-1));
    assert_eq!(disabled.error.unwrap().kind(), ErrorKind::NotFound);
}

/// Tests that cacheable providers are called once per key and errors are retried.
#[test]
fn cache_memoizes_successes() {
    let fixture = Fixture::new();
    let stub = Counting::new(false);
    let broken = Counting::new(true);
    let router = fixture.router(Arc::clone(&stub), Arc::clone(&broken));
    let ctx = QueryContext::new();
    let inputs = DataInputs::new().with("domain", "example.com");

    let first = router.data_value(&ctx, &uri("domain/stub/echo"), &inputs);
    let second = router.data_value(&ctx, &uri("domain/stub/length"), &inputs);
    assert_eq!(first.result.value(), &TypedValue::String("example.com".to_string()));
    assert_eq!(second.result.value(), &TypedValue::Integer(11));
    assert_eq!(stub.calls(), 1);

    let email = DataInputs::new().with("email", "a@example.com");
    let failed = router.data_value(&ctx, &uri("email/broken/anything"), &email);
    let retried = router.data_value(&ctx, &uri("email/broken/anything"), &email);
    assert_eq!(failed.error, Some(NodsError::NoDataPresent));
    assert_eq!(retried.error, Some(NodsError::NoDataPresent));
    assert_eq!(broken.calls(), 2);
}

/// Tests that a MaxMind file shadows the JSON prefix file of the same source.
#[test]
fn maxmind_file_shadows_prefix_file() {
    let fixture = Fixture::new();
    fs::write(fixture.dir.path().join("trie/uhb.mmdb"), b"not a maxmind database").unwrap();
    let router = fixture.router(Counting::new(false), Counting::new(true));
    let names = router.source_names();
    assert!(names.contains(&"ipsum".to_string()));
    assert!(!names.contains(&"uhb".to_string()));

    let answer = router.data_value(
        &QueryContext::new(),
        &uri("ip/uhb/blacklist.isBlacklisted"),
        &DataInputs::new().with("ip", "1.2.3.4"),
    );
    assert_eq!(answer.error, Some(NodsError::SourceNotFound("uhb".to_string())));
}

/// Tests category fan-out with partial and total failure.
#[test]
fn category_values_fan_out() {
    let fixture = Fixture::new();
    let router = fixture.router(Counting::new(false), Counting::new(true));
    let ctx = QueryContext::new();

    let outputs = router
        .category_values(&ctx, "domain", &DataInputs::new().with("domain", "example.com").with("role", "admin"))
        .unwrap();
    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs.iter().filter(|output| output.is_ok()).count(), 2);
    assert!(outputs.iter().all(|output| output.keys.get("role").is_none()));
    let missing = outputs.iter().find(|output| output.item == "domain/stub/missing").unwrap();
    assert_eq!(missing.result.raw(), "0.00");

    let none = router.category_values(&ctx, "email", &DataInputs::new().with("email", "a@example.com"));
    assert!(matches!(none, Err(NodsError::ItemNotFound(_))));

    let unknown = router.category_values(&ctx, "planet", &DataInputs::new());
    assert!(matches!(unknown, Err(NodsError::CategoryNotFound(_))));
}

/// Tests OR rules over two blocklists, with one or both sides missing.
#[test]
fn rule_or_survives_one_missing_side() {
    let fixture = Fixture::new();
    let router = fixture.router(Counting::new(false), Counting::new(true));
    let ctx = QueryContext::new();
    let rule = uri("rule/rule/anyBlacklist");

    let both = router.data_value(&ctx, &rule, &DataInputs::new().with("ip", "1.2.3.4"));
    assert_eq!(both.result.value(), &TypedValue::Boolean(true));

    let one = router.data_value(&ctx, &rule, &DataInputs::new().with("ip", "5.6.7.8"));
    assert!(one.is_ok());
    assert_eq!(one.result.value(), &TypedValue::Boolean(true));

    let neither = router.data_value(&ctx, &rule, &DataInputs::new().with("ip", "9.9.9.9"));
    assert!(neither.is_ok());
    assert_eq!(neither.result.value(), &TypedValue::Boolean(false));

    let wordy = router.data_value(&ctx, &uri("rule/rule/wordy"), &DataInputs::new().with("ip", "1.2.3.4"));
    assert!(wordy.is_ok(), "{:?}", wordy.error);
    assert_eq!(wordy.result.value(), &TypedValue::Boolean(true));
}

/// Tests that self-referencing and malformed rules surface as rule errors.
#[test]
fn rule_errors_are_visible() {
    let fixture = Fixture::new();
    let router = fixture.router(Counting::new(false), Counting::new(true));
    let ctx = QueryContext::new();
    let inputs = DataInputs::new().with("ip", "1.2.3.4");

    let looped = router.data_value(&ctx, &uri("rule/rule/loop"), &inputs);
    let Some(NodsError::Rule(message)) = &looped.error else {
        panic!("expected rule error, got {:?}", looped.error);
    };
    assert!(message.contains("depth"), "{message}");
    assert_eq!(looped.result.value(), &TypedValue::Boolean(false));

    let typo = router.data_value(&ctx, &uri("rule/rule/typo"), &inputs);
    assert_eq!(typo.error.map(|err| err.kind()), Some(ErrorKind::Rule));
}

/// Tests that the rule category fan-out evaluates every rule.
#[test]
fn rule_category_fan_out() {
    let fixture = Fixture::new();
    let router = fixture.router(Counting::new(false), Counting::new(true));
    let outputs = router
        .category_values(&QueryContext::new(), "rule", &DataInputs::new().with("ip", "1.2.3.4").with("rule", "ignored"))
        .unwrap();
    assert_eq!(outputs.len(), 4);
    let any = outputs.iter().find(|output| output.item == "rule/rule/anyBlacklist").unwrap();
    assert!(any.is_ok());
    assert_eq!(any.result.raw(), "true");
    assert_eq!(router.source_names(), vec!["broken", "ipsum", "rule", "stub", "uhb"]);
}
