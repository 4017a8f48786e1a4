// crates/nods-server/src/logging.rs
// ============================================================================
// Module: Logging
// Description: Process-wide tracing subscriber initialisation.
// Purpose: Route library `tracing` events to stderr with an env-driven filter.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! `RUST_LOG` takes precedence over the configured default filter. Events go
//! to stderr so stdout stays clean for command output.

use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`ServerError::Config`] when `default_filter` is not a valid
/// directive and `RUST_LOG` is unset, or [`ServerError::Init`] when a
/// subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), ServerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|err| ServerError::Config(format!("log.filter: {err}")))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ServerError::Init(format!("logging: {err}")))
}
