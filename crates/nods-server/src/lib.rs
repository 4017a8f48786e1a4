// crates/nods-server/src/lib.rs
// ============================================================================
// Module: nods Server Library
// Description: Service assembly, HTTP surface and logging for the nods binary.
// Purpose: Keep the binary thin and the HTTP surface testable.
// Dependencies: axum, nods-config, nods-core, nods-providers, tokio, tracing
// ============================================================================

//! ## Overview
//! `nods-server` assembles a [`DataRouter`](nods_providers::DataRouter) from
//! `nods.toml` and exposes it over HTTP: item queries, category fan-out (JSON
//! or tab-separated), the caller's own address profile and read-only
//! catalogue views. The `nods` binary in `src/main.rs` adds the CLI.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod http;
pub mod logging;
pub mod service;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::ServerError;
pub use http::AppState;
pub use http::app;
pub use http::serve;
pub use logging::init_logging;
pub use service::NodsService;
