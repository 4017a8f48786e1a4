// crates/nods-rules/src/normalize.rs
// ============================================================================
// Module: Operator Normalization
// Description: Rewrites human-friendly operator aliases to canonical tokens.
// Purpose: Accept `OR`, `AND`, `NOT`, `|`, and `&` spellings in rule text.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Normalization is a quote-aware textual rewrite applied after references
//! have been lifted into placeholders, so words inside item paths are never
//! touched. Keywords are matched case-insensitively as whole words; single
//! `|` and `&` become `||` and `&&`. Longer runs are left for the parser to
//! reject.

/// Rewrites operator aliases in `text` to `||`, `&&`, and `!`.
#[must_use]
pub fn normalize_operators(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                out.push(ch);
            }
            '|' | '&' => {
                let mut run = 1;
                while chars.next_if_eq(&ch).is_some() {
                    run += 1;
                }
                if run <= 2 {
                    out.push(ch);
                    out.push(ch);
                } else {
                    out.extend(std::iter::repeat_n(ch, run));
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut word = String::from(c);
                while let Some(next) = chars.next_if(|n| n.is_ascii_alphanumeric() || *n == '_') {
                    word.push(next);
                }
                match word.to_ascii_lowercase().as_str() {
                    "or" => out.push_str(" || "),
                    "and" => out.push_str(" && "),
                    "not" => out.push_str(" !"),
                    _ => out.push_str(&word),
                }
            }
            _ => out.push(ch),
        }
    }
    out
}
