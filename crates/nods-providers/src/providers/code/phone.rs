// crates/nods-providers/src/providers/code/phone.rs
// ============================================================================
// Module: Phone Parser
// Description: E.164 normalization and calling-code classification.
// Purpose: Serve the `phone` category of the `internal` source.
// Dependencies: nods-core, serde_json
// ============================================================================

//! ## Overview
//! Punctuation is stripped, a leading `00` becomes `+`, and ten-digit numbers
//! without a prefix are read as North American. The calling code is matched
//! longest first against a table of common codes.

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use serde_json::Value;
use serde_json::json;

use crate::providers::category_input;

/// Calling codes and the region they map to.
const CALLING_CODES: &[(&str, &str)] = &[
    ("1", "US"),
    ("7", "RU"),
    ("20", "EG"),
    ("27", "ZA"),
    ("30", "GR"),
    ("31", "NL"),
    ("32", "BE"),
    ("33", "FR"),
    ("34", "ES"),
    ("36", "HU"),
    ("39", "IT"),
    ("40", "RO"),
    ("41", "CH"),
    ("43", "AT"),
    ("44", "GB"),
    ("45", "DK"),
    ("46", "SE"),
    ("47", "NO"),
    ("48", "PL"),
    ("49", "DE"),
    ("52", "MX"),
    ("54", "AR"),
    ("55", "BR"),
    ("56", "CL"),
    ("57", "CO"),
    ("60", "MY"),
    ("61", "AU"),
    ("62", "ID"),
    ("63", "PH"),
    ("64", "NZ"),
    ("65", "SG"),
    ("66", "TH"),
    ("81", "JP"),
    ("82", "KR"),
    ("84", "VN"),
    ("86", "CN"),
    ("90", "TR"),
    ("91", "IN"),
    ("92", "PK"),
    ("234", "NG"),
    ("254", "KE"),
    ("351", "PT"),
    ("353", "IE"),
    ("358", "FI"),
    ("380", "UA"),
    ("420", "CZ"),
    ("852", "HK"),
    ("886", "TW"),
    ("966", "SA"),
    ("971", "AE"),
    ("972", "IL"),
];

/// Phone number parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneProvider;

impl DataProvider for PhoneProvider {
    fn category_info(
        &self,
        _ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Phone {
            return Err(NodsError::not_implemented("phone", category));
        }
        Ok(parse_phone(category_input(inputs, category)?))
    }

    fn is_cached(&self) -> bool {
        false
    }
}

/// Normalizes and classifies a phone number.
#[must_use]
pub fn parse_phone(number: &str) -> Value {
    let Some(digits) = normalize(number) else {
        return invalid();
    };
    let code = (1 ..= 3)
        .rev()
        .filter_map(|len| digits.get(.. len))
        .find_map(|prefix| CALLING_CODES.iter().find(|(code, _)| *code == prefix));
    let Some((code, region)) = code else {
        return invalid();
    };
    let national = &digits[code.len() ..];
    if national.len() < 4 {
        return invalid();
    }
    json!({
        "valid": true,
        "e164": format!("+{digits}"),
        "calling_code": code,
        "region": region,
        "national_number": national,
    })
}

/// Returns the international digits without `+`, if plausible.
fn normalize(number: &str) -> Option<String> {
    let trimmed = number.trim();
    let (international, body) = if let Some(rest) = trimmed.strip_prefix('+') {
        (true, rest)
    } else if let Some(rest) = trimmed.strip_prefix("00") {
        (true, rest)
    } else {
        (false, trimmed)
    };
    if !body.chars().all(|ch| ch.is_ascii_digit() || " -.()/".contains(ch)) {
        return None;
    }
    let digits: String = body.chars().filter(char::is_ascii_digit).collect();
    let digits = match (international, digits.len()) {
        (true, _) => digits,
        (false, 10) if !digits.starts_with(['0', '1']) => format!("1{digits}"),
        (false, 11) if digits.starts_with('1') => digits,
        (false, _) => return None,
    };
    (8 ..= 15).contains(&digits.len()).then_some(digits)
}

/// Answer for unparsable numbers.
fn invalid() -> Value {
    json!({
        "valid": false,
        "e164": "",
        "calling_code": "",
        "region": "",
        "national_number": "",
    })
}
