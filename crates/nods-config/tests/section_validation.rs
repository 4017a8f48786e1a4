//! Section validation tests for nods-config.
// crates/nods-config/tests/section_validation.rs
// =============================================================================
// Module: Config Section Validation Tests
// Description: Validate per-section limits and value checks.
// Purpose: Ensure out-of-range settings fail closed with a named field.
// =============================================================================

use std::time::Duration;

use nods_config::NodsConfig;

/// Result type for tests that report failures as messages.
type TestResult = Result<(), String>;

/// Asserts that `toml` is rejected with a message containing `needle`.
fn assert_rejected(toml: &str, needle: &str) -> TestResult {
    match NodsConfig::from_toml(toml) {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err(format!("expected rejection for {toml}")),
    }
}

/// Tests that server bind must be socket address.
#[test]
fn server_bind_must_be_socket_address() -> TestResult {
    assert_rejected("[server]\nbind = \"localhost\"\n", "server.bind")
}

/// Tests that server body limit must be positive.
#[test]
fn server_body_limit_must_be_positive() -> TestResult {
    assert_rejected("[server]\nmax_body_bytes = 0\n", "server.max_body_bytes")
}

/// Tests that server timeout is bounded.
#[test]
fn server_timeout_is_bounded() -> TestResult {
    assert_rejected("[server]\nrequest_timeout_ms = 900000\n", "server.request_timeout_ms")
}

/// Tests that catalogue paths must be non empty.
#[test]
fn catalogue_paths_must_be_non_empty() -> TestResult {
    assert_rejected("[catalogue]\nsources_file = \"  \"\n", "catalogue.sources_file")
}

/// Tests that store path components are bounded.
#[test]
fn store_path_components_are_bounded() -> TestResult {
    let toml = format!("[stores]\ntrie_dir = \"data/{}\"\n", "t".repeat(300));
    assert_rejected(&toml, "stores.trie_dir path component too long")
}

/// Tests that cache limits must be positive.
#[test]
fn cache_limits_must_be_positive() -> TestResult {
    assert_rejected("[cache]\nttl_secs = 0\n", "cache.ttl_secs")?;
    assert_rejected("[cache]\nmax_entries = 0\n", "cache.max_entries")
}

/// Tests that http limits are checked.
#[test]
fn http_limits_are_checked() -> TestResult {
    assert_rejected("[http]\ntimeout_ms = 0\n", "http.timeout_ms")?;
    assert_rejected("[http]\nmax_response_bytes = 0\n", "http.max_response_bytes")?;
    assert_rejected("[http]\nuser_agent = \"\"\n", "http.user_agent")
}

/// Tests that watch interval has floor only when enabled.
#[test]
fn watch_interval_has_floor_only_when_enabled() -> TestResult {
    assert_rejected("[watch]\npoll_interval_ms = 10\n", "watch.poll_interval_ms")?;
    NodsConfig::from_toml("[watch]\nenabled = false\npoll_interval_ms = 10\n")
        .map(|_| ())
        .map_err(|err| err.to_string())
}

/// Tests that secret prefix is an env fragment.
#[test]
fn secret_prefix_is_an_env_fragment() -> TestResult {
    assert_rejected("[secrets]\nenv_prefix = \"nods-\"\n", "secrets.env_prefix")
}

/// Tests that log filter must be non empty.
#[test]
fn log_filter_must_be_non_empty() -> TestResult {
    assert_rejected("[log]\nfilter = \" \"\n", "log.filter")
}

/// Tests that partial sections keep other defaults.
#[test]
fn partial_sections_keep_other_defaults() -> TestResult {
    let config = NodsConfig::from_toml("[cache]\nttl_secs = 60\n").map_err(|err| err.to_string())?;
    if config.cache.settings().ttl != Duration::from_secs(60) {
        return Err("ttl not applied".to_string());
    }
    if config.cache.max_entries != 100_000 {
        return Err("max_entries default lost".to_string());
    }
    if config.http.timeout_ms != 5_000 {
        return Err("http default lost".to_string());
    }
    Ok(())
}
