// crates/nods-rules/src/references.rs
// ============================================================================
// Module: Item References
// Description: Bracket-matched `[category/source/item]` extraction.
// Purpose: Split rule text into literal segments and item references.
// Dependencies: crate::error, nods-core
// ============================================================================

//! ## Overview
//! References are found by bracket matching outside string literals. Each
//! distinct path gets one parameter slot; repeated references share it. A
//! [`Template`] renders back to expression text with space-padded
//! placeholders (`__p0`, `__p1`, ...) or, per slot, a substituted literal.

use nods_core::DataUri;

use crate::error::RuleError;

/// Maximum number of distinct references in one rule.
pub const MAX_REFERENCES: usize = 64;

/// Returns the parameter name for a reference slot.
#[must_use]
pub fn placeholder(index: usize) -> String {
    format!("__p{index}")
}

/// Piece of a rule template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Literal rule text.
    Text(String),
    /// Reference slot index.
    Slot(usize),
}

/// Rule text with references lifted into slots.
///
/// # Invariants
/// - Every [`Segment::Slot`] index is a valid index into `references`.
/// - `references` holds distinct, well-formed paths in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Ordered segments.
    segments: Vec<Segment>,
    /// Distinct referenced paths.
    references: Vec<DataUri>,
}

impl Template {
    /// Extracts references from `text`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::UnbalancedBracket`] for unmatched brackets,
    /// [`RuleError::InvalidReference`] for malformed paths, and
    /// [`RuleError::TooManyReferences`] past the reference limit.
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let mut segments = Vec::new();
        let mut references: Vec<DataUri> = Vec::new();
        let mut literal = String::new();
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut chars = text.char_indices();

        while let Some((position, ch)) = chars.next() {
            if let Some(open) = quote {
                literal.push(ch);
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
                    literal.push(ch);
                }
                ']' => {
                    return Err(RuleError::UnbalancedBracket {
                        position,
                    });
                }
                '[' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for (inner_position, inner) in chars.by_ref() {
                        match inner {
                            ']' => {
                                closed = true;
                                break;
                            }
                            '[' => {
                                return Err(RuleError::UnbalancedBracket {
                                    position: inner_position,
                                });
                            }
                            _ => body.push(inner),
                        }
                    }
                    if !closed {
                        return Err(RuleError::UnbalancedBracket {
                            position,
                        });
                    }
                    let uri = DataUri::parse(&body);
                    if uri.is_unknown() {
                        return Err(RuleError::InvalidReference {
                            reference: body,
                            position,
                        });
                    }
                    let slot = match references.iter().position(|known| known == &uri) {
                        Some(slot) => slot,
                        None => {
                            if references.len() >= MAX_REFERENCES {
                                return Err(RuleError::TooManyReferences {
                                    max: MAX_REFERENCES,
                                });
                            }
                            references.push(uri);
                            references.len() - 1
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }
        Ok(Self {
            segments,
            references,
        })
    }

    /// Returns the distinct referenced paths in slot order.
    #[must_use]
    pub fn references(&self) -> &[DataUri] {
        &self.references
    }

    /// Renders expression text; `literal` may replace a slot with literal text.
    #[must_use]
    pub fn render(&self, literal: impl Fn(usize) -> Option<String>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) => {
                    out.push(' ');
                    out.push_str(&literal(*slot).unwrap_or_else(|| placeholder(*slot)));
                    out.push(' ');
                }
            }
        }
        out
    }
}
