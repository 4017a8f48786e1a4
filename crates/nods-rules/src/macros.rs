// crates/nods-rules/src/macros.rs
// ============================================================================
// Module: Date Macros
// Description: Relative-date macro expansion for rule text.
// Purpose: Replace `@{N.unit.ago}` with quoted calendar dates.
// Dependencies: time
// ============================================================================

//! ## Overview
//! A macro such as `@{30.days.ago}` becomes the quoted literal `"2024-05-01"`
//! computed from the evaluation instant in UTC. Units are days, weeks, months
//! (30 days), and years (365 days); singular and plural spellings are both
//! accepted. Expansion is purely textual and happens before any parsing.

use time::Duration;
use time::OffsetDateTime;

use crate::error::RuleError;

/// Macro opening sequence.
const MACRO_OPEN: &str = "@{";

/// Expands every date macro in `text` relative to `now`.
///
/// # Errors
///
/// Returns [`RuleError::InvalidMacro`] for unterminated macros, unknown units,
/// non-numeric counts, or dates outside the supported range.
pub fn expand_date_macros(text: &str, now: OffsetDateTime) -> Result<String, RuleError> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    let mut consumed = 0;
    while let Some(start) = rest.find(MACRO_OPEN) {
        output.push_str(&rest[.. start]);
        let body_start = start + MACRO_OPEN.len();
        let Some(body_len) = rest[body_start ..].find('}') else {
            return Err(RuleError::InvalidMacro {
                text: rest[start ..].to_string(),
                position: consumed + start,
            });
        };
        let body = &rest[body_start .. body_start + body_len];
        let date = resolve(body, now).ok_or_else(|| RuleError::InvalidMacro {
            text: format!("@{{{body}}}"),
            position: consumed + start,
        })?;
        output.push('"');
        output.push_str(&date);
        output.push('"');
        let end = body_start + body_len + 1;
        consumed += end;
        rest = &rest[end ..];
    }
    output.push_str(rest);
    Ok(output)
}

/// Resolves a macro body such as `1.years.ago` to `YYYY-MM-DD`.
fn resolve(body: &str, now: OffsetDateTime) -> Option<String> {
    let mut parts = body.trim().split('.');
    let (Some(count), Some(unit), Some("ago"), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let count: i64 = count.trim().parse().ok()?;
    let days_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "day" | "days" => 1,
        "week" | "weeks" => 7,
        "month" | "months" => 30,
        "year" | "years" => 365,
        _ => return None,
    };
    let offset = Duration::days(count.checked_mul(days_per_unit)?);
    let date = now.checked_sub(offset)?.date();
    Some(format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use time::macros::datetime;

    use super::expand_date_macros;
    use crate::error::RuleError;

    /// Tests each supported unit.
    #[test]
    fn units_expand_to_quoted_dates() {
        let now = datetime!(2024-03-01 12:00 UTC);
        assert_eq!(expand_date_macros("@{1.day.ago}", now).unwrap(), "\"2024-02-29\"");
        assert_eq!(expand_date_macros("@{2.weeks.ago}", now).unwrap(), "\"2024-02-16\"");
        assert_eq!(expand_date_macros("@{1.month.ago}", now).unwrap(), "\"2024-01-31\"");
        assert_eq!(expand_date_macros("@{1.years.ago}", now).unwrap(), "\"2023-03-02\"");
    }

    /// Tests that surrounding text is preserved.
    #[test]
    fn surrounding_text_is_untouched() {
        let now = datetime!(2024-03-01 00:00 UTC);
        let out = expand_date_macros("[a/b/c] > @{0.days.ago} && true", now).unwrap();
        assert_eq!(out, "[a/b/c] > \"2024-03-01\" && true");
    }

    /// Tests malformed macros.
    #[test]
    fn malformed_macros_are_rejected() {
        let now = datetime!(2024-03-01 00:00 UTC);
        assert!(matches!(
            expand_date_macros("@{1.fortnights.ago}", now),
            Err(RuleError::InvalidMacro { .. })
        ));
        assert!(matches!(
            expand_date_macros("x @{1.days.ago", now),
            Err(RuleError::InvalidMacro { position: 2, .. })
        ));
    }
}
