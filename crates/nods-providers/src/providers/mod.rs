// crates/nods-providers/src/providers/mod.rs
// ============================================================================
// Module: Providers
// Description: Concrete data providers and the caching decorator.
// Purpose: Group backend adapters by storage technology.
// Dependencies: nods-core
// ============================================================================

//! ## Overview
//! One module per backend kind: prefix stores ([`mmdb`]), flat stores
//! ([`fast`]), remote vendor APIs ([`api`]), in-process logic ([`code`]) and
//! rule evaluation ([`rule`]). [`cache`] wraps any cacheable provider.

pub mod api;
pub mod cache;
pub mod code;
pub mod fast;
pub mod mmdb;
pub mod rule;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::NodsError;

/// Returns the trimmed input for `category`.
///
/// # Errors
///
/// Returns [`NodsError::MissingInputs`] when the input is absent or blank.
pub(crate) fn category_input(inputs: &DataInputs, category: Category) -> Result<&str, NodsError> {
    inputs
        .non_empty(category.input_key())
        .ok_or_else(|| NodsError::MissingInputs(category.input_key().to_string()))
}
