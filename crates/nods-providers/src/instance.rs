// crates/nods-providers/src/instance.rs
// ============================================================================
// Module: Data Instance
// Description: Binds one source's provider to validation and typed results.
// Purpose: Turn raw provider payloads into well-typed item answers.
// Dependencies: nods-core, tracing
// ============================================================================

//! ## Overview
//! A [`DataInstance`] validates the category and its input before calling
//! the provider, then extracts the item's path from the payload and converts
//! it to the declared type.
//!
//! # Invariants
//! - [`DataInstance::item_value`] always returns a well-typed result.
//! - Provider failures surface as [`NodsError::NoDataPresent`], except rule
//!   errors (propagated unchanged) and [`NodsError::NotImplemented`], which
//!   marks a catalogue wiring defect.

use std::sync::Arc;

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::DataResult;
use nods_core::Item;
use nods_core::ItemAnswer;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_core::path;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

/// One source's provider with category validation.
#[derive(Clone)]
pub struct DataInstance {
    /// Source name.
    source: String,
    /// Provider, possibly cache-wrapped.
    provider: Arc<dyn DataProvider>,
}

impl DataInstance {
    /// Binds `provider` to `source`.
    #[must_use]
    pub fn new(source: impl Into<String>, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            source: source.into(),
            provider,
        }
    }

    /// Returns the source name.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true when the provider is cache-wrapped.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.provider.is_cached()
    }

    /// Validates `category` and its input, then returns the raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`NodsError::CategoryNotFound`] for unknown categories,
    /// [`NodsError::MissingInputs`] when the category input is absent, and
    /// any provider error otherwise.
    pub fn category_info(
        &self,
        ctx: &QueryContext,
        category: &str,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        let category = validate(category, inputs)?;
        self.provider.category_info(ctx, category, inputs)
    }

    /// Returns the typed value of `item` for `inputs`.
    #[must_use]
    pub fn item_value(&self, ctx: &QueryContext, item: &Item, inputs: &DataInputs) -> ItemAnswer {
        let category = match validate(item.category_name(), inputs) {
            Ok(category) => category,
            Err(err) => return ItemAnswer::miss(item.item_type, err),
        };
        let raw = match self.provider.category_info(ctx, category, inputs) {
            Ok(raw) => raw,
            Err(err @ NodsError::Rule(_)) => return ItemAnswer::miss(item.item_type, err),
            Err(
                err @ NodsError::NotImplemented {
                    ..
                },
            ) => {
                warn!(source = %self.source, item = %item.path, error = %err, "provider wiring mismatch");
                return ItemAnswer::miss(item.item_type, err);
            }
            Err(err) => {
                debug!(source = %self.source, item = %item.path, error = %err, "provider miss");
                return ItemAnswer::miss(item.item_type, NodsError::NoDataPresent);
            }
        };
        let extracted = match path::extract(&raw, &item.gjson) {
            Ok(Some(value)) => value,
            Ok(None) => return ItemAnswer::miss(item.item_type, NodsError::NoDataPresent),
            Err(err) => return ItemAnswer::miss(item.item_type, err),
        };
        match DataResult::from_json(item.item_type, &extracted) {
            Ok(result) => ItemAnswer::ok(result),
            Err(err) => {
                debug!(item = %item.path, error = %err, "payload conversion failed");
                ItemAnswer::miss(item.item_type, err)
            }
        }
    }
}

/// Parses the category and checks that its input is present.
fn validate(category: &str, inputs: &DataInputs) -> Result<Category, NodsError> {
    let category: Category = category.parse()?;
    if inputs.non_empty(category.input_key()).is_none() {
        return Err(NodsError::MissingInputs(category.input_key().to_string()));
    }
    Ok(category)
}
