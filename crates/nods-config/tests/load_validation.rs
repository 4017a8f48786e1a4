//! Config load validation tests for nods-config.
// crates/nods-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use nods_config::ConfigError;
use nods_config::NodsConfig;
use nods_config::config_toml_example;
use tempfile::NamedTempFile;

/// Result type for tests that report failures as messages.
type TestResult = Result<(), String>;

/// Asserts that a load failed with a message containing `needle`.
fn assert_invalid(result: Result<NodsConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

/// Tests that load rejects path too long.
#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(NodsConfig::load(Some(path)), "config path exceeds max length")
}

/// Tests that load rejects path component too long.
#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(NodsConfig::load(Some(path)), "config path component too long")
}

/// Tests that load rejects missing file.
#[test]
fn load_rejects_missing_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(NodsConfig::load(Some(&path)), "config io error")
}

/// Tests that load rejects oversized file.
#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(NodsConfig::load(Some(file.path())), "config file exceeds size limit")
}

/// Tests that load rejects non utf8 file.
#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(NodsConfig::load(Some(file.path())), "config file must be utf-8")
}

/// Tests that load rejects malformed toml.
#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[server\nbind = ").map_err(|err| err.to_string())?;
    assert_invalid(NodsConfig::load(Some(file.path())), "config parse error")
}

/// Tests that load accepts canonical example.
#[test]
fn load_accepts_canonical_example() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(config_toml_example().as_bytes()).map_err(|err| err.to_string())?;
    let config = NodsConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.server.request_timeout_ms != 10_000 {
        return Err("request timeout not loaded".to_string());
    }
    if config.stores.flat_dir != Path::new("data/flat") {
        return Err("flat_dir not loaded".to_string());
    }
    Ok(())
}
