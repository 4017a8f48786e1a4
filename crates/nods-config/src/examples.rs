// crates/nods-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for operators and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for `nods.toml`. Every key is spelled out with its
//! default value so the example doubles as a reference.

/// Returns a canonical example `nods.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 65536
request_timeout_ms = 10000

[catalogue]
sources_file = "catalogue/sources.json"
data_dir = "catalogue/data"

[stores]
trie_dir = "data/trie"
flat_dir = "data/flat"

[cache]
ttl_secs = 86400
max_entries = 100000

[http]
timeout_ms = 5000
max_response_bytes = 1048576
user_agent = "nods/0.1"

[watch]
enabled = true
poll_interval_ms = 2000

[secrets]
env_prefix = "NODS_SECRET_"

[log]
filter = "info,nods=debug"
"#,
    )
}
