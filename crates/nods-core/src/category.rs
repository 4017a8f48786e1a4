// crates/nods-core/src/category.rs
// ============================================================================
// Module: Categories
// Description: The closed set of query dimensions.
// Purpose: Validate category names and name the input each category needs.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A category decides which request input a query must supply. The set is
//! closed; anything outside it is rejected before a provider is reached.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::NodsError;

/// Query dimension.
///
/// # Invariants
/// - The input key for a category is its lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// IP address reputation and network data.
    Ip,
    /// Email address data.
    Email,
    /// Phone number data.
    Phone,
    /// Domain name data.
    Domain,
    /// Browser user-agent data.
    Browser,
    /// Computed rule expressions.
    Rule,
    /// Password strength data.
    Password,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Ip,
        Self::Email,
        Self::Phone,
        Self::Domain,
        Self::Browser,
        Self::Rule,
        Self::Password,
    ];

    /// Returns the canonical category name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Domain => "domain",
            Self::Browser => "browser",
            Self::Rule => "rule",
            Self::Password => "password",
        }
    }

    /// Returns the request input key the category reads.
    #[must_use]
    pub const fn input_key(self) -> &'static str {
        self.as_str()
    }

    /// Returns true when `name` is a member of the closed category set.
    #[must_use]
    pub fn is_valid(name: &str) -> bool {
        name.parse::<Self>().is_ok()
    }
}

impl FromStr for Category {
    type Err = NodsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| NodsError::CategoryNotFound(value.to_string()))
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
