// crates/nods-core/src/lib.rs
// ============================================================================
// Module: nods Core
// Description: Data model, error taxonomy, interfaces, and item catalogue.
// Purpose: Provide the backend-agnostic types every nods crate shares.
// Dependencies: arc-swap, jsonpath_lib, serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! `nods-core` defines the normalized data catalogue: items and sources, the
//! three-part [`DataUri`] key, request [`DataInputs`], typed [`DataResult`]
//! answers with their type-correct defaults, and the [`Schema`] that loads the
//! catalogue from JSON files and hot-reloads it per source.
//! Invariants:
//! - Every answer carries a well-typed result, populated or default.
//! - The category set is closed; see [`Category`].
//! - Catalogue maps are replaced wholesale on reload, never mutated in place.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod category;
pub mod context;
pub mod error;
pub mod inputs;
pub mod interfaces;
pub mod item;
pub mod path;
pub mod result;
pub mod schema;
pub mod uri;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use category::Category;
pub use context::QueryContext;
pub use error::ErrorKind;
pub use error::NodsError;
pub use inputs::DataInputs;
pub use inputs::RESERVED_KEYS;
pub use interfaces::DataProvider;
pub use interfaces::FileWatcher;
pub use interfaces::KeyValueStore;
pub use interfaces::ReloadCallback;
pub use interfaces::SecretStore;
pub use interfaces::StoreError;
pub use interfaces::TrieStore;
pub use interfaces::WatchError;
pub use item::ApiDescriptor;
pub use item::ApiQuirk;
pub use item::BasicAuth;
pub use item::DatabaseKind;
pub use item::Item;
pub use item::ItemDescriptor;
pub use item::ItemType;
pub use item::SourceInfo;
pub use result::DataOutput;
pub use result::DataResult;
pub use result::ItemAnswer;
pub use result::TypedValue;
pub use schema::CatalogueError;
pub use schema::Schema;
pub use uri::DataUri;
