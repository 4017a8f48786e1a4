// crates/nods-providers/src/providers/code/email.rs
// ============================================================================
// Module: Email Parser
// Description: Syntax and provider classification of email addresses.
// Purpose: Serve the `email` category of the `internal` source.
// Dependencies: nods-core, regex, serde_json
// ============================================================================

//! ## Overview
//! Splits an address into user and domain, checks a conservative syntax and
//! classifies the domain as a free mailbox provider or a disposable service,
//! and the user as a role account. Invalid addresses are still answered with
//! `valid: false`; the parse itself never misses.

use std::sync::LazyLock;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use regex::Regex;
use serde_json::Value;
use serde_json::json;

use crate::providers::category_input;

/// Free mailbox providers.
const FREE_PROVIDERS: &[&str] = &[
    "aol.com",
    "gmail.com",
    "gmx.com",
    "googlemail.com",
    "hotmail.com",
    "icloud.com",
    "live.com",
    "mail.com",
    "outlook.com",
    "proton.me",
    "protonmail.com",
    "yahoo.com",
    "yandex.com",
    "zoho.com",
];

/// Disposable mailbox services.
const DISPOSABLE: &[&str] = &[
    "10minutemail.com",
    "dispostable.com",
    "getnada.com",
    "guerrillamail.com",
    "mailinator.com",
    "sharklasers.com",
    "tempmail.com",
    "throwawaymail.com",
    "trashmail.com",
    "yopmail.com",
];

/// Role account local parts.
const ROLE_ACCOUNTS: &[&str] = &[
    "abuse",
    "admin",
    "billing",
    "contact",
    "help",
    "hostmaster",
    "info",
    "no-reply",
    "noreply",
    "office",
    "postmaster",
    "sales",
    "support",
    "webmaster",
];

/// Maximum local part length.
const MAX_USER_BYTES: usize = 64;

/// Maximum domain length.
const MAX_DOMAIN_BYTES: usize = 253;

/// Email address parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailProvider;

impl DataProvider for EmailProvider {
    fn category_info(
        &self,
        _ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Email {
            return Err(NodsError::not_implemented("email", category));
        }
        Ok(parse_email(category_input(inputs, category)?))
    }

    fn is_cached(&self) -> bool {
        false
    }
}

/// Parses and classifies an address.
#[must_use]
pub fn parse_email(address: &str) -> Value {
    let address = address.trim().to_lowercase();
    let (user, domain) = address.rsplit_once('@').unwrap_or(("", address.as_str()));
    let tld = domain.rsplit_once('.').map_or("", |(_, tld)| tld);
    let valid = is_valid_user(user) && is_valid_domain(domain);
    json!({
        "valid": valid,
        "user": user,
        "domain": domain,
        "tld": tld,
        "free": FREE_PROVIDERS.contains(&domain),
        "disposable": DISPOSABLE.contains(&domain),
        "role": ROLE_ACCOUNTS.contains(&user),
    })
}

/// Local part: dot-separated atoms of the usual unquoted characters.
static USER_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9%+'_-]+(\.[a-z0-9%+'_-]+)*$").ok());

/// Domain: dotted labels without edge hyphens and an alphabetic TLD.
static DOMAIN_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$").ok()
});

/// Checks the local part.
fn is_valid_user(user: &str) -> bool {
    user.len() <= MAX_USER_BYTES && USER_REGEX.as_ref().is_some_and(|regex| regex.is_match(user))
}

/// Checks the domain.
fn is_valid_domain(domain: &str) -> bool {
    domain.len() <= MAX_DOMAIN_BYTES && DOMAIN_REGEX.as_ref().is_some_and(|regex| regex.is_match(domain))
}
