// crates/nods-server/src/error.rs
// ============================================================================
// Module: Server Errors
// Description: Error type for service construction and transport failures.
// Purpose: Give the binary one error surface with stable variants.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`ServerError`] separates configuration problems from initialization and
//! transport failures so the CLI can report them without inspecting strings.

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
