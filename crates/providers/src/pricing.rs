//! Built-in pricing tables for the supported backends.
//!
//! Prices are in USD per 1 million tokens. Lookups match the longest
//! known prefix, so dated model ids ("claude-sonnet-4-20250514") resolve
//! to their family entry.

use tandem_core::provider::ModelPricing;

type PriceTable = &'static [(&'static str, ModelPricing)];

pub const ANTHROPIC: PriceTable = &[
    ("claude-opus-4", ModelPricing::new(15.0, 75.0)),
    ("claude-sonnet-4", ModelPricing::new(3.0, 15.0)),
    ("claude-3-7-sonnet", ModelPricing::new(3.0, 15.0)),
    ("claude-3-5-sonnet", ModelPricing::new(3.0, 15.0)),
    ("claude-3-5-haiku", ModelPricing::new(0.8, 4.0)),
    ("claude-haiku-4", ModelPricing::new(1.0, 5.0)),
    ("claude-3-haiku", ModelPricing::new(0.25, 1.25)),
];

pub const OPENAI: PriceTable = &[
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.6)),
    ("gpt-4o", ModelPricing::new(2.5, 10.0)),
    ("gpt-4.1-mini", ModelPricing::new(0.4, 1.6)),
    ("gpt-4.1-nano", ModelPricing::new(0.1, 0.4)),
    ("gpt-4.1", ModelPricing::new(2.0, 8.0)),
    ("gpt-4-turbo", ModelPricing::new(10.0, 30.0)),
    ("o1-mini", ModelPricing::new(3.0, 12.0)),
    ("o1", ModelPricing::new(15.0, 60.0)),
    ("o3-mini", ModelPricing::new(1.1, 4.4)),
    ("o4-mini", ModelPricing::new(1.1, 4.4)),
];

pub const GEMINI: PriceTable = &[
    ("gemini-2.5-pro", ModelPricing::new(1.25, 10.0)),
    ("gemini-2.5-flash", ModelPricing::new(0.3, 2.5)),
    ("gemini-2.0-flash-lite", ModelPricing::new(0.075, 0.3)),
    ("gemini-2.0-flash", ModelPricing::new(0.1, 0.4)),
    ("gemini-1.5-pro", ModelPricing::new(1.25, 5.0)),
    ("gemini-1.5-flash", ModelPricing::new(0.075, 0.3)),
];

/// Find the entry whose prefix matches `model` most specifically.
pub fn lookup(table: PriceTable, model: &str) -> Option<ModelPricing> {
    let model = model.rsplit('/').next().unwrap_or(model);
    table
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, pricing)| *pricing)
}
