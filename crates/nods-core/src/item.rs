// crates/nods-core/src/item.rs
// ============================================================================
// Module: Catalogue Entries
// Description: Item, source, and API descriptors loaded from catalogue files.
// Purpose: Describe every queryable leaf and the backend that serves it.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Catalogue files are JSON. The top-level file is an array of
//! [`SourceInfo`] records; each enabled or disabled source has its own array
//! of [`ItemDescriptor`] records. Descriptors become immutable [`Item`]
//! values at load time; a disabled source forces every one of its items to
//! disabled regardless of what the item file says.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

use crate::category::Category;
use crate::uri::DataUri;

// ============================================================================
// SECTION: Item Type
// ============================================================================

/// Declared value type of a catalogue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum ItemType {
    /// No value.
    #[default]
    Null,
    /// Boolean value.
    Boolean,
    /// Floating point value.
    Float,
    /// Integer value.
    Integer,
    /// Text value.
    String,
    /// Date rendered as text.
    Date,
    /// Arbitrary JSON rendered as text.
    Json,
}

impl ItemType {
    /// Every declared type.
    pub const ALL: [Self; 7] =
        [Self::Null, Self::Boolean, Self::Float, Self::Integer, Self::String, Self::Date, Self::Json];

    /// Returns the canonical type label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::Float => "Float",
            Self::Integer => "Integer",
            Self::String => "String",
            Self::Date => "Date",
            Self::Json => "JSON",
        }
    }

    /// Parses a type label case-insensitively; unknown labels become `Null`.
    #[must_use]
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Self::Boolean,
            "float" | "number" => Self::Float,
            "integer" | "int" => Self::Integer,
            "string" => Self::String,
            "date" => Self::Date,
            "json" => Self::Json,
            _ => Self::Null,
        }
    }
}

impl From<String> for ItemType {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl Serialize for ItemType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Sources
// ============================================================================

/// Storage technology behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// IP-prefix trie store.
    Mmdb,
    /// Flat key/value store.
    Fast,
    /// Remote vendor API ("bring your own data").
    Byod,
    /// In-process computed logic.
    Code,
}

impl DatabaseKind {
    /// Returns the descriptor spelling of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mmdb => "mmdb",
            Self::Fast => "fast",
            Self::Byod => "byod",
            Self::Code => "code",
        }
    }
}

/// Vendor-specific response handling for remote APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiQuirk {
    /// HTTP 404 carries a data body rather than signalling a miss.
    NotFoundIsData,
    /// HTTP 200 with a truthy `error` field is a miss.
    ErrorFieldIsMiss,
}

/// Basic-auth credentials for a remote API; `{key}` placeholders resolve to secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    /// Username template.
    #[serde(rename = "User", alias = "user")]
    pub user: String,
    /// Password template.
    #[serde(rename = "Password", alias = "password", default)]
    pub password: String,
}

/// Remote API descriptor for `byod` sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    /// URL template with `{key}`, `{input}`, and `{<input name>}` placeholders.
    #[serde(rename = "URL", alias = "url")]
    pub url: String,
    /// Optional basic-auth credentials.
    #[serde(rename = "Auth", alias = "auth", default)]
    pub auth: Option<BasicAuth>,
    /// Static request headers; values may use `{key}`.
    #[serde(rename = "Headers", alias = "headers", default)]
    pub headers: BTreeMap<String, String>,
    /// Name of the secret substituted for `{key}`.
    #[serde(rename = "Key", alias = "key", default)]
    pub key: Option<String>,
    /// Optional response quirk overriding the built-in table.
    #[serde(rename = "Quirk", alias = "quirk", default)]
    pub quirk: Option<ApiQuirk>,
}

/// One vendor/backend registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Unique source name.
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    /// Storage technology.
    #[serde(rename = "Database", alias = "database")]
    pub database: DatabaseKind,
    /// Whether the source participates in routing.
    #[serde(rename = "Enabled", alias = "enabled", default)]
    pub enabled: bool,
    /// Remote API descriptor for `byod` sources.
    #[serde(rename = "API", alias = "api", default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiDescriptor>,
}

impl SourceInfo {
    /// Creates an enabled source without an API descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, database: DatabaseKind) -> Self {
        Self {
            name: name.into(),
            database,
            enabled: true,
            api: None,
        }
    }

    /// Returns a copy with the enabled flag set.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns a copy carrying an API descriptor.
    #[must_use]
    pub fn with_api(mut self, api: ApiDescriptor) -> Self {
        self.api = Some(api);
        self
    }
}

// ============================================================================
// SECTION: Items
// ============================================================================

/// Item record as written in a per-source catalogue file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemDescriptor {
    /// Full `category/source/name` path.
    #[serde(rename = "Item", alias = "item")]
    pub item: String,
    /// Whether the item is enabled.
    #[serde(rename = "Enabled", alias = "enabled", default)]
    pub enabled: bool,
    /// Extraction path into the raw payload; empty means the whole payload.
    #[serde(rename = "GJSON", alias = "gjson", alias = "Gjson", default)]
    pub gjson: String,
    /// Human description.
    #[serde(rename = "Description", alias = "description", default)]
    pub description: String,
    /// Declared type.
    #[serde(rename = "Type", alias = "type", default)]
    pub item_type: ItemType,
    /// Rule expression for rule items.
    #[serde(rename = "Query", alias = "query", default)]
    pub query: String,
}

impl ItemDescriptor {
    /// Creates an enabled descriptor.
    #[must_use]
    pub fn new(item: &str, gjson: &str, item_type: ItemType) -> Self {
        Self {
            item: item.to_string(),
            enabled: true,
            gjson: gjson.to_string(),
            description: String::new(),
            item_type,
            query: String::new(),
        }
    }

    /// Returns a copy carrying a rule expression.
    #[must_use]
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    /// Returns a copy with the enabled flag set.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Immutable catalogue entry.
///
/// # Invariants
/// - `path` is the primary key; category and source are derived from it.
/// - `enabled` is false whenever the owning source is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Canonical `category/source/name` path.
    pub path: DataUri,
    /// Effective enabled flag.
    pub enabled: bool,
    /// Extraction path into the raw payload.
    pub gjson: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Rule expression (rule items only).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub query: String,
    /// Human description.
    pub description: String,
}

impl Item {
    /// Builds an item from a descriptor, applying the source-level enabled gate.
    #[must_use]
    pub fn from_descriptor(descriptor: ItemDescriptor, source_enabled: bool) -> Self {
        Self {
            path: DataUri::parse(&descriptor.item),
            enabled: descriptor.enabled && source_enabled,
            gjson: descriptor.gjson,
            item_type: descriptor.item_type,
            query: descriptor.query,
            description: descriptor.description,
        }
    }

    /// Returns the category name from the path.
    #[must_use]
    pub fn category_name(&self) -> &str {
        self.path.category()
    }

    /// Returns the source name from the path.
    #[must_use]
    pub fn source_name(&self) -> &str {
        self.path.source()
    }

    /// Returns the category when it belongs to the closed set.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        self.category_name().parse().ok()
    }

    /// Returns true for rule items (rule category or a non-empty query).
    #[must_use]
    pub fn is_rule(&self) -> bool {
        self.category() == Some(Category::Rule) || !self.query.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use super::ItemDescriptor;
    use super::ItemType;
    use super::SourceInfo;
    use crate::item::DatabaseKind;
    use crate::item::Item;

    /// Tests that descriptor files deserialize with their upstream field names.
    #[test]
    fn descriptor_reads_catalogue_field_names() {
        let raw = r#"{"Item":"ip/ipsum/blacklist.isBlacklisted","Enabled":true,
            "GJSON":"blacklist.isBlacklisted","Description":"listed","Type":"Boolean"}"#;
        let descriptor: ItemDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.item_type, ItemType::Boolean);
        assert_eq!(descriptor.gjson, "blacklist.isBlacklisted");
        assert!(descriptor.query.is_empty());
    }

    /// Tests that unknown type labels fall back to Null.
    #[test]
    fn unknown_type_label_is_null() {
        assert_eq!(ItemType::parse_lenient("decimal"), ItemType::Null);
        assert_eq!(ItemType::parse_lenient("json"), ItemType::Json);
    }

    /// Tests that a disabled source disables its items.
    #[test]
    fn disabled_source_wins_over_item_flag() {
        let descriptor = ItemDescriptor::new("ip/uhb/listed", "listed", ItemType::Boolean);
        let item = Item::from_descriptor(descriptor, false);
        assert!(!item.enabled);
    }

    /// Tests that source records deserialize with the database kind.
    #[test]
    fn source_reads_database_kind() {
        let raw = r#"{"Name":"ipinfo","Database":"code","Enabled":true}"#;
        let source: SourceInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(source.database, DatabaseKind::Code);
        assert!(source.api.is_none());
    }
}
