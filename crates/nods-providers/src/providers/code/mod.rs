// crates/nods-providers/src/providers/code/mod.rs
// ============================================================================
// Module: Code Providers
// Description: In-process parsers and network lookups served as providers.
// Purpose: Back `code` sources and the composite `internal` source.
// Dependencies: nods-core
// ============================================================================

//! ## Overview
//! Each code provider serves one or two categories and answers
//! [`NodsError::NotImplemented`] for the rest. [`CompositeProvider`] chains
//! several of them so one source can fan a category out to whichever part
//! implements it; [`internal`] builds the pure-parser composite.

pub mod browser;
pub mod email;
pub mod ipinfo;
pub mod password;
pub mod phone;
pub mod pwned;
pub mod spamhaus;
pub mod whois;

use std::sync::Arc;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use serde_json::Value;

pub use self::browser::BrowserProvider;
pub use self::email::EmailProvider;
pub use self::ipinfo::IpInfoProvider;
pub use self::password::PasswordProvider;
pub use self::phone::PhoneProvider;
pub use self::pwned::PwnedProvider;
pub use self::spamhaus::SpamhausProvider;
pub use self::whois::WhoisProvider;

/// Provider delegating to the first part that implements a category.
pub struct CompositeProvider {
    /// Source name.
    name: String,
    /// Parts, consulted in order.
    parts: Vec<Arc<dyn DataProvider>>,
}

impl CompositeProvider {
    /// Creates a composite over `parts`.
    #[must_use]
    pub fn new(name: impl Into<String>, parts: Vec<Arc<dyn DataProvider>>) -> Self {
        Self {
            name: name.into(),
            parts,
        }
    }
}

impl DataProvider for CompositeProvider {
    fn category_info(
        &self,
        ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        for part in &self.parts {
            match part.category_info(ctx, category, inputs) {
                Err(NodsError::NotImplemented {
                    ..
                }) => {}
                other => return other,
            }
        }
        Err(NodsError::not_implemented(&self.name, category))
    }

    fn is_cached(&self) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(|part| part.is_cached())
    }
}

/// Builds the `internal` composite of the email, phone, browser and password
/// parsers.
#[must_use]
pub fn internal() -> CompositeProvider {
    let parts: Vec<Arc<dyn DataProvider>> = vec![
        Arc::new(EmailProvider),
        Arc::new(PhoneProvider),
        Arc::new(BrowserProvider),
        Arc::new(PasswordProvider),
    ];
    CompositeProvider::new("internal", parts)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use nods_core::Category;
    use nods_core::DataInputs;
    use nods_core::DataProvider;
    use nods_core::NodsError;
    use nods_core::QueryContext;

    use super::internal;

    /// Tests fan-out to the matching parser and the unmatched fallback.
    #[test]
    fn internal_fans_out_by_category() {
        let provider = internal();
        let ctx = QueryContext::new();
        let email = provider
            .category_info(&ctx, Category::Email, &DataInputs::new().with("email", "info@gmail.com"))
            .unwrap();
        assert_eq!(email["role"], true);
        let ip = provider.category_info(&ctx, Category::Ip, &DataInputs::new().with("ip", "1.2.3.4"));
        assert!(matches!(ip, Err(NodsError::NotImplemented { .. })));
        assert!(!provider.is_cached());
    }
}
