// crates/nods-providers/src/providers/code/password.rs
// ============================================================================
// Module: Password Strength
// Description: Character-class and entropy scoring of passwords.
// Purpose: Serve the `password` category of the `internal` source.
// Dependencies: nods-core, serde_json
// ============================================================================

//! ## Overview
//! Entropy is estimated as `length * log2(pool)` where the pool is the sum of
//! the character classes present. The score runs from 0 to 4; passwords from
//! the common list always score 0. The password itself is never echoed.

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use serde_json::Value;
use serde_json::json;

use crate::providers::category_input;

/// Frequently used passwords.
const COMMON: &[&str] = &[
    "123456",
    "12345678",
    "123456789",
    "abc123",
    "admin",
    "dragon",
    "iloveyou",
    "letmein",
    "monkey",
    "password",
    "password1",
    "qwerty",
    "qwerty123",
    "welcome",
];

/// Entropy thresholds (bits) for scores 1 through 4.
const SCORE_THRESHOLDS: [f64; 4] = [28.0, 36.0, 60.0, 128.0];

/// Password strength estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordProvider;

impl DataProvider for PasswordProvider {
    fn category_info(
        &self,
        _ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Password {
            return Err(NodsError::not_implemented("password", category));
        }
        Ok(score_password(category_input(inputs, category)?))
    }

    fn is_cached(&self) -> bool {
        false
    }
}

/// Scores a password.
#[must_use]
pub fn score_password(password: &str) -> Value {
    let lowercase = password.chars().any(|ch| ch.is_ascii_lowercase());
    let uppercase = password.chars().any(|ch| ch.is_ascii_uppercase());
    let digits = password.chars().any(|ch| ch.is_ascii_digit());
    let symbols = password.chars().any(|ch| !ch.is_ascii_alphanumeric());
    let pool: u32 = [(lowercase, 26), (uppercase, 26), (digits, 10), (symbols, 33)]
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, size)| size)
        .sum();
    let length = u32::try_from(password.chars().count()).unwrap_or(u32::MAX);
    let entropy = if pool == 0 { 0.0 } else { f64::from(length) * f64::from(pool).log2() };
    let common = COMMON.contains(&password.to_lowercase().as_str());
    let score = if common {
        0
    } else {
        SCORE_THRESHOLDS.iter().filter(|threshold| entropy >= **threshold).count()
    };
    json!({
        "length": length,
        "lowercase": lowercase,
        "uppercase": uppercase,
        "digits": digits,
        "symbols": symbols,
        "entropy": (entropy * 100.0).round() / 100.0,
        "common": common,
        "score": score,
    })
}
