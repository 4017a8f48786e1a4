// crates/nods-rules/tests/rule_language.rs
// ============================================================================
// Module: Rule Language Tests
// Description: End-to-end rule evaluation over a stub resolver.
// Purpose: Validate alias equivalence, date macros, and OR semantics.
// Dependencies: nods-rules, nods-core, proptest, time
// ============================================================================

//! ## Overview
//! Evaluates complete rule items through [`RuleEvaluator`] with resolvers that
//! return fixed answers, covering the properties rule authors rely on.

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

use nods_core::DataInputs;
use nods_core::DataResult;
use nods_core::DataUri;
use nods_core::Item;
use nods_core::ItemAnswer;
use nods_core::ItemDescriptor;
use nods_core::ItemType;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::TypedValue;
use nods_rules::RuleEvaluator;
use nods_rules::Value;
use nods_rules::expand_date_macros;
use proptest::prelude::*;
use serde_json::json;
use time::Duration;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a Boolean rule item with passthrough extraction.
fn rule(query: &str) -> Item {
    Item::from_descriptor(
        ItemDescriptor::new("rule/rule/under_test", "", ItemType::Boolean).with_query(query),
        true,
    )
}

/// Evaluates `query` with answers keyed by referenced path; absent paths miss.
fn run(query: &str, answers: &BTreeMap<String, bool>) -> Value {
    let resolver = |_: &QueryContext, uri: &DataUri, _: &DataInputs| match answers.get(&uri.key()) {
        Some(flag) => ItemAnswer::ok(DataResult::new(TypedValue::Boolean(*flag))),
        None => ItemAnswer::miss(ItemType::Boolean, NodsError::NoDataPresent),
    };
    RuleEvaluator::new()
        .evaluate_value(&QueryContext::new(), &rule(query), &DataInputs::new(), &resolver)
        .unwrap()
}

/// Builds an answer table for the two blacklist items.
fn answers(ipsum: Option<bool>, uhb: Option<bool>) -> BTreeMap<String, bool> {
    let mut table = BTreeMap::new();
    if let Some(flag) = ipsum {
        table.insert("ip/ipsum/blacklist.isBlacklisted".to_string(), flag);
    }
    if let Some(flag) = uhb {
        table.insert("ip/uhb/blacklist.isBlacklisted".to_string(), flag);
    }
    table
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests that OR holds while either side stays true.
#[test]
fn or_rule_survives_one_side_missing() {
    let query = "[ip/ipsum/blacklist.isBlacklisted] || [ip/uhb/blacklist.isBlacklisted]";
    assert_eq!(run(query, &answers(Some(true), Some(true))), Value::Bool(true));
    assert_eq!(run(query, &answers(None, Some(true))), Value::Bool(true));
    assert_eq!(run(query, &answers(Some(true), None)), Value::Bool(true));
    assert_eq!(run(query, &answers(None, None)), Value::Bool(false));
}

/// Tests that a year is exactly 365 days before the current UTC date.
#[test]
fn year_macro_is_365_days_back() {
    let before = OffsetDateTime::now_utc();
    let expanded = expand_date_macros("@{1.years.ago}", OffsetDateTime::now_utc()).unwrap();
    let after = OffsetDateTime::now_utc();
    let render = |instant: OffsetDateTime| {
        let date = (instant - Duration::days(365)).date();
        format!("\"{:04}-{:02}-{:02}\"", date.year(), u8::from(date.month()), date.day())
    };
    assert!(expanded == render(before) || expanded == render(after), "{expanded}");
}

/// Tests that rule results are written at the extraction path.
#[test]
fn result_lands_at_extraction_path() {
    let item = Item::from_descriptor(
        ItemDescriptor::new("rule/rule/score", "score.value", ItemType::Integer)
            .with_query("[ip/a/count] * 2"),
        true,
    );
    let resolver = |_: &QueryContext, _: &DataUri, _: &DataInputs| {
        ItemAnswer::ok(DataResult::new(TypedValue::Integer(21)))
    };
    let out = RuleEvaluator::new()
        .evaluate(&QueryContext::new(), &item, &DataInputs::new(), &resolver)
        .unwrap();
    assert_eq!(out, json!({"score": {"value": 42}}));
}

proptest! {
    /// Tests that operator spellings evaluate identically.
    #[test]
    fn or_spellings_are_equivalent(left in any::<Option<bool>>(), right in any::<Option<bool>>()) {
        let table = answers(left, right);
        let canonical = run("[ip/ipsum/blacklist.isBlacklisted] || [ip/uhb/blacklist.isBlacklisted]", &table);
        let word = run("[ip/ipsum/blacklist.isBlacklisted]OR[ip/uhb/blacklist.isBlacklisted]", &table);
        let pipe = run("[ip/ipsum/blacklist.isBlacklisted] | [ip/uhb/blacklist.isBlacklisted]", &table);
        prop_assert_eq!(&canonical, &word);
        prop_assert_eq!(&canonical, &pipe);
    }

    /// Tests that AND spellings evaluate identically.
    #[test]
    fn and_spellings_are_equivalent(left in any::<Option<bool>>(), right in any::<Option<bool>>()) {
        let table = answers(left, right);
        let canonical = run("[ip/ipsum/blacklist.isBlacklisted] && [ip/uhb/blacklist.isBlacklisted]", &table);
        let word = run("[ip/ipsum/blacklist.isBlacklisted] and [ip/uhb/blacklist.isBlacklisted]", &table);
        let amp = run("[ip/ipsum/blacklist.isBlacklisted]&[ip/uhb/blacklist.isBlacklisted]", &table);
        prop_assert_eq!(&canonical, &word);
        prop_assert_eq!(&canonical, &amp);
    }
}
