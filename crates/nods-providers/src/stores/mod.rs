// crates/nods-providers/src/stores/mod.rs
// ============================================================================
// Module: Stores
// Description: File-backed prefix, MaxMind and key/value stores.
// Purpose: Provide the local lookup tables behind `mmdb` and `fast` sources.
// Dependencies: arc-swap, maxminddb, serde_json, nods-core
// ============================================================================

//! ## Overview
//! Every store keeps an immutable table behind an atomic pointer, so reloads
//! never block or tear concurrent lookups.

pub mod flat;
pub mod maxmind;
pub mod trie;

pub use flat::FlatFileStore;
pub use maxmind::MaxMindStore;
pub use trie::PrefixFileStore;
pub use trie::PrefixTable;
