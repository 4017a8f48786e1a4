// crates/nods-config/src/lib.rs
// ============================================================================
// Module: nods Config Library
// Description: Service config model, validation, and example generation.
// Purpose: Single source of truth for nods.toml semantics.
// Dependencies: nods-providers, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! `nods-config` defines the service configuration for the `nods` binary:
//! listener, catalogue and store locations, cache and outbound HTTP limits,
//! the file watcher, secret resolution and logging. Validation is strict and
//! fail-closed; catalogue files themselves stay JSON and are read by
//! `nods-core`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
