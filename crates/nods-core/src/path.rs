// crates/nods-core/src/path.rs
// ============================================================================
// Module: Payload Paths
// Description: Dot-path extraction and insertion over JSON payloads.
// Purpose: Resolve item `Gjson` paths against raw provider payloads.
// Dependencies: jsonpath_lib, serde_json
// ============================================================================

//! ## Overview
//! Item paths use dot syntax: `a.b.c`, `\.` escapes a literal dot, numeric
//! segments index arrays, and a trailing `#` yields an array's length. An
//! empty path is the passthrough convention and selects the whole payload.
//! Paths beginning with `$` are evaluated as `JSONPath` instead.

use jsonpath_lib::select;
use serde_json::Map;
use serde_json::Value;

use crate::error::NodsError;

/// Extracts the value at `path`; `None` when the path does not resolve.
///
/// # Errors
///
/// Returns [`NodsError::BadData`] when a `JSONPath` expression is invalid.
pub fn extract(document: &Value, path: &str) -> Result<Option<Value>, NodsError> {
    let path = path.trim();
    if path.is_empty() {
        return Ok(Some(document.clone()));
    }
    if path.starts_with('$') {
        return select_jsonpath(document, path);
    }
    let mut current = document;
    let segments = split_segments(path);
    let last = segments.len().saturating_sub(1);
    for (index, segment) in segments.iter().enumerate() {
        match current {
            Value::Object(map) => {
                let Some(next) = map.get(segment.as_str()) else {
                    return Ok(None);
                };
                current = next;
            }
            Value::Array(items) if segment == "#" && index == last => {
                return Ok(Some(Value::from(items.len())));
            }
            Value::Array(items) => {
                let Some(next) = segment.parse::<usize>().ok().and_then(|i| items.get(i)) else {
                    return Ok(None);
                };
                current = next;
            }
            _ => return Ok(None),
        }
    }
    Ok(Some(current.clone()))
}

/// Builds a document with `value` placed at `path`; an empty path returns `value`.
#[must_use]
pub fn write_at(path: &str, value: Value) -> Value {
    let path = path.trim();
    if path.is_empty() {
        return value;
    }
    split_segments(path).into_iter().rev().fold(value, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment, inner);
        Value::Object(map)
    })
}

/// Splits a dot path into segments, honouring `\.` escapes.
fn split_segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    segments.push(current);
    segments
}

/// Selects values using a `JSONPath` expression.
fn select_jsonpath(document: &Value, path: &str) -> Result<Option<Value>, NodsError> {
    let matches =
        select(document, path).map_err(|_| NodsError::BadData("invalid jsonpath".to_string()))?;
    match matches.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some((*single).clone())),
        many => Ok(Some(Value::Array(many.iter().map(|value| (*value).clone()).collect()))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use serde_json::json;

    use super::extract;
    use super::write_at;

    /// Tests nested object and array traversal.
    #[test]
    fn extract_walks_objects_and_arrays() {
        let doc = json!({"blacklist": {"isBlacklisted": true, "lists": ["a", "b"]}});
        assert_eq!(extract(&doc, "blacklist.isBlacklisted").unwrap(), Some(json!(true)));
        assert_eq!(extract(&doc, "blacklist.lists.1").unwrap(), Some(json!("b")));
        assert_eq!(extract(&doc, "blacklist.lists.#").unwrap(), Some(json!(2)));
        assert_eq!(extract(&doc, "blacklist.missing").unwrap(), None);
    }

    /// Tests that an empty path is passthrough.
    #[test]
    fn empty_path_selects_whole_payload() {
        let doc = json!(true);
        assert_eq!(extract(&doc, "").unwrap(), Some(json!(true)));
        assert_eq!(write_at("", json!(3)), json!(3));
    }

    /// Tests escaped dots and JSONPath expressions.
    #[test]
    fn escapes_and_jsonpath_are_supported() {
        let doc = json!({"a.b": {"c": 1}});
        assert_eq!(extract(&doc, r"a\.b.c").unwrap(), Some(json!(1)));
        assert_eq!(extract(&doc, "$['a.b'].c").unwrap(), Some(json!(1)));
    }

    /// Tests that insertion round-trips through extraction.
    #[test]
    fn write_at_nests_objects() {
        let doc = write_at("rule.result", json!(false));
        assert_eq!(doc, json!({"rule": {"result": false}}));
        assert_eq!(extract(&doc, "rule.result").unwrap(), Some(json!(false)));
    }
}
