// crates/nods-core/src/result.rs
// ============================================================================
// Module: Typed Results
// Description: Tagged query results, type-correct defaults, and output shapes.
// Purpose: Guarantee every answer carries a value matching its declared type.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`TypedValue`] is a sum type, so "exactly one typed field is populated" is
//! enforced by construction. [`DataResult::empty`] produces the stable
//! default for each [`ItemType`]; the instance and router substitute it on
//! every soft miss so callers never branch on a type without its value.
//!
//! Wire shape: `{"type": "...", "bool"|"num"|"str": ..., "raw": "..."}` where
//! at most one of `bool`/`num`/`str` is present (`Null` and empty `Date`
//! carry none).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;
use serde_json::Value;

use crate::error::NodsError;
use crate::inputs::DataInputs;
use crate::item::ItemType;
use crate::uri::DataUri;

// ============================================================================
// SECTION: Typed Value
// ============================================================================

/// Value tagged by its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// No value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Floating point value.
    Float(f64),
    /// Integer value.
    Integer(i64),
    /// Text value.
    String(String),
    /// Date rendered as text.
    Date(String),
    /// JSON rendered as compact text.
    Json(String),
}

impl TypedValue {
    /// Returns the declared type for this value.
    #[must_use]
    pub const fn item_type(&self) -> ItemType {
        match self {
            Self::Null => ItemType::Null,
            Self::Boolean(_) => ItemType::Boolean,
            Self::Float(_) => ItemType::Float,
            Self::Integer(_) => ItemType::Integer,
            Self::String(_) => ItemType::String,
            Self::Date(_) => ItemType::Date,
            Self::Json(_) => ItemType::Json,
        }
    }

    /// Renders the raw string form.
    #[must_use]
    pub fn raw(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Boolean(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Integer(value) => value.to_string(),
            Self::String(value) | Self::Date(value) | Self::Json(value) => value.clone(),
        }
    }
}

// ============================================================================
// SECTION: Data Result
// ============================================================================

/// Typed query result with its raw string form.
///
/// # Invariants
/// - `raw` is always set and derived from `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataResult {
    /// Tagged value.
    value: TypedValue,
    /// Raw string form.
    raw: String,
}

impl DataResult {
    /// Wraps a typed value, deriving its raw form.
    #[must_use]
    pub fn new(value: TypedValue) -> Self {
        let raw = value.raw();
        Self {
            value,
            raw,
        }
    }

    /// Returns the type-correct default for `item_type`.
    ///
    /// Boolean `false`, Integer `-1`, Float `0.00`, String `""`, Date `""`,
    /// JSON `"{}"`, Null no value.
    #[must_use]
    pub fn empty(item_type: ItemType) -> Self {
        match item_type {
            ItemType::Null => Self::new(TypedValue::Null),
            ItemType::Boolean => Self::new(TypedValue::Boolean(false)),
            ItemType::Integer => Self::new(TypedValue::Integer(-1)),
            ItemType::Float => Self {
                value: TypedValue::Float(0.0),
                raw: "0.00".to_string(),
            },
            ItemType::String => Self::new(TypedValue::String(String::new())),
            ItemType::Date => Self::new(TypedValue::Date(String::new())),
            ItemType::Json => Self::new(TypedValue::Json("{}".to_string())),
        }
    }

    /// Converts an extracted JSON value into a result of the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::NoDataPresent`] for JSON `null` and
    /// [`NodsError::BadData`] when the value cannot represent the type.
    pub fn from_json(item_type: ItemType, value: &Value) -> Result<Self, NodsError> {
        if value.is_null() && item_type != ItemType::Null {
            return Err(NodsError::NoDataPresent);
        }
        let typed = match item_type {
            ItemType::Null => TypedValue::Null,
            ItemType::Boolean => TypedValue::Boolean(to_bool(value)?),
            ItemType::Integer => TypedValue::Integer(to_integer(value)?),
            ItemType::Float => TypedValue::Float(to_float(value)?),
            ItemType::String => TypedValue::String(to_text(value)?),
            ItemType::Date => TypedValue::Date(to_text(value)?),
            ItemType::Json => TypedValue::Json(
                serde_json::to_string(value).map_err(|err| NodsError::BadData(err.to_string()))?,
            ),
        };
        Ok(Self::new(typed))
    }

    /// Returns the tagged value.
    #[must_use]
    pub const fn value(&self) -> &TypedValue {
        &self.value
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn item_type(&self) -> ItemType {
        self.value.item_type()
    }

    /// Returns the raw string form.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the boolean value for Boolean results.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self.value {
            TypedValue::Boolean(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the numeric value for Integer and Float results.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Numbers are exposed as f64 on the wire.")]
    pub const fn as_number(&self) -> Option<f64> {
        match self.value {
            TypedValue::Integer(value) => Some(value as f64),
            TypedValue::Float(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text value for String, Date, and JSON results.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            TypedValue::String(value) | TypedValue::Json(value) => Some(value),
            TypedValue::Date(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }
}

impl Serialize for DataResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.item_type())?;
        match &self.value {
            TypedValue::Boolean(value) => map.serialize_entry("bool", value)?,
            TypedValue::Integer(value) => map.serialize_entry("num", value)?,
            TypedValue::Float(value) => map.serialize_entry("num", value)?,
            TypedValue::String(value) | TypedValue::Json(value) => {
                map.serialize_entry("str", value)?;
            }
            TypedValue::Date(value) if !value.is_empty() => map.serialize_entry("str", value)?,
            TypedValue::Date(_) | TypedValue::Null => {}
        }
        map.serialize_entry("raw", &self.raw)?;
        map.end()
    }
}

// ============================================================================
// SECTION: Answers
// ============================================================================

/// Typed result paired with the reason it may be a default.
///
/// # Invariants
/// - `result` is always well-typed; `error` explains why it is a default.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemAnswer {
    /// Typed result (populated or default).
    pub result: DataResult,
    /// Error that caused a default, if any.
    pub error: Option<NodsError>,
}

impl ItemAnswer {
    /// Builds a successful answer.
    #[must_use]
    pub const fn ok(result: DataResult) -> Self {
        Self {
            result,
            error: None,
        }
    }

    /// Builds a default answer for `item_type` tagged with `error`.
    #[must_use]
    pub fn miss(item_type: ItemType, error: NodsError) -> Self {
        Self {
            result: DataResult::empty(item_type),
            error: Some(error),
        }
    }

    /// Returns true when no error was recorded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Externally visible answer to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataOutput {
    /// Item path that was queried.
    pub item: String,
    /// Caller inputs with reserved keys stripped.
    pub keys: DataInputs,
    /// Error message; empty on success.
    pub error: String,
    /// Typed result.
    pub result: DataResult,
}

impl DataOutput {
    /// Builds the caller-facing output for an answer.
    #[must_use]
    pub fn new(uri: &DataUri, inputs: &DataInputs, answer: ItemAnswer) -> Self {
        Self {
            item: uri.key(),
            keys: inputs.stripped(),
            error: answer.error.map(|err| err.to_string()).unwrap_or_default(),
            result: answer.result,
        }
    }

    /// Returns true when the output carries no error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

// ============================================================================
// SECTION: Conversion Helpers
// ============================================================================

/// Converts a JSON value into a boolean.
fn to_bool(value: &Value) -> Result<bool, NodsError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => Ok(number.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(NodsError::BadData(format!("not a boolean: {text}"))),
        },
        _ => Err(NodsError::BadData("not a boolean".to_string())),
    }
}

/// Converts a JSON value into an integer.
fn to_integer(value: &Value) -> Result<i64, NodsError> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(integral_f64))
            .ok_or_else(|| NodsError::BadData(format!("not an integer: {number}"))),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| NodsError::BadData(format!("not an integer: {text}"))),
        Value::Bool(flag) => Ok(i64::from(*flag)),
        _ => Err(NodsError::BadData("not an integer".to_string())),
    }
}

/// Returns the integer form of an integral float within `i64` range.
#[allow(clippy::cast_possible_truncation, reason = "Range and fraction are checked first.")]
fn integral_f64(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() <= LIMIT { Some(value as i64) } else { None }
}

/// Converts a JSON value into a float.
fn to_float(value: &Value) -> Result<f64, NodsError> {
    match value {
        Value::Number(number) => {
            number.as_f64().ok_or_else(|| NodsError::BadData(format!("not a float: {number}")))
        }
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| NodsError::BadData(format!("not a float: {text}"))),
        _ => Err(NodsError::BadData("not a float".to_string())),
    }
}

/// Converts a scalar JSON value into text.
fn to_text(value: &Value) -> Result<String, NodsError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).map_err(|err| NodsError::BadData(err.to_string()))
        }
        Value::Null => Err(NodsError::NoDataPresent),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use serde_json::json;

    use super::DataResult;
    use super::TypedValue;
    use crate::error::NodsError;
    use crate::item::ItemType;

    /// Tests the documented raw default for every type.
    #[test]
    fn empty_defaults_match_documented_raw_forms() {
        let expected = [
            (ItemType::Null, ""),
            (ItemType::Boolean, "false"),
            (ItemType::Float, "0.00"),
            (ItemType::Integer, "-1"),
            (ItemType::String, ""),
            (ItemType::Date, ""),
            (ItemType::Json, "{}"),
        ];
        for (item_type, raw) in expected {
            let result = DataResult::empty(item_type);
            assert_eq!(result.raw(), raw, "{item_type}");
            assert_eq!(result.item_type(), item_type);
        }
    }

    /// Tests that only the matching typed field is serialized.
    #[test]
    fn serialization_carries_single_typed_field() {
        let value = serde_json::to_value(DataResult::empty(ItemType::Boolean)).unwrap();
        assert_eq!(value, json!({"type": "Boolean", "bool": false, "raw": "false"}));
        let value = serde_json::to_value(DataResult::empty(ItemType::Date)).unwrap();
        assert_eq!(value, json!({"type": "Date", "raw": ""}));
        let value = serde_json::to_value(DataResult::empty(ItemType::Null)).unwrap();
        assert_eq!(value, json!({"type": "Null", "raw": ""}));
        let value = serde_json::to_value(DataResult::empty(ItemType::Integer)).unwrap();
        assert_eq!(value, json!({"type": "Integer", "num": -1, "raw": "-1"}));
    }

    /// Tests conversion of loosely typed upstream values.
    #[test]
    fn from_json_coerces_common_encodings() {
        let flag = DataResult::from_json(ItemType::Boolean, &json!("yes")).unwrap();
        assert_eq!(flag.as_bool(), Some(true));
        let number = DataResult::from_json(ItemType::Integer, &json!(42.0)).unwrap();
        assert_eq!(number.value(), &TypedValue::Integer(42));
        let text = DataResult::from_json(ItemType::Json, &json!({"a": 1})).unwrap();
        assert_eq!(text.as_text(), Some(r#"{"a":1}"#));
    }

    /// Tests that null is a miss and mismatches are bad data.
    #[test]
    fn from_json_reports_misses_and_mismatches() {
        assert_eq!(
            DataResult::from_json(ItemType::String, &json!(null)),
            Err(NodsError::NoDataPresent)
        );
        assert!(matches!(
            DataResult::from_json(ItemType::Integer, &json!("abc")),
            Err(NodsError::BadData(_))
        ));
    }
}
