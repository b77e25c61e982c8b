//! Model pricing table.
//!
//! Prices are USD per one million tokens. Lookup is case-insensitive and
//! tries an exact match first, then the longest matching prefix, so
//! `gpt-4o-2024-08-06` resolves to `gpt-4o` and `gpt-4o-mini-2024` to
//! `gpt-4o-mini`. Unknown models fall back to a default rate instead of
//! being free.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Input and output price per one million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Cost in USD of one call.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_million
            + output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Rate applied to models missing from the table.
pub const DEFAULT_PRICING: ModelPricing = ModelPricing::new(10.0, 30.0);

const BUILTIN: &[(&str, ModelPricing)] = &[
    // OpenAI
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.60)),
    ("gpt-4o", ModelPricing::new(2.50, 10.0)),
    ("gpt-4-turbo", ModelPricing::new(10.0, 30.0)),
    ("gpt-4", ModelPricing::new(30.0, 60.0)),
    ("gpt-3.5-turbo", ModelPricing::new(0.50, 1.50)),
    ("o1-mini", ModelPricing::new(3.0, 12.0)),
    ("o1", ModelPricing::new(15.0, 60.0)),
    // Anthropic
    ("claude-3-5-sonnet", ModelPricing::new(3.0, 15.0)),
    ("claude-3-5-haiku", ModelPricing::new(0.80, 4.0)),
    ("claude-3-opus", ModelPricing::new(15.0, 75.0)),
    ("claude-3-sonnet", ModelPricing::new(3.0, 15.0)),
    ("claude-3-haiku", ModelPricing::new(0.25, 1.25)),
    ("claude-sonnet-4", ModelPricing::new(3.0, 15.0)),
    ("claude-opus-4", ModelPricing::new(15.0, 75.0)),
];

/// Pricing lookup with custom overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    entries: HashMap<String, ModelPricing>,
    fallback: ModelPricing,
}

impl PricingTable {
    /// Built-in table.
    pub fn new() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(model, pricing)| (model.to_string(), *pricing))
                .collect(),
            fallback: DEFAULT_PRICING,
        }
    }

    /// Add or replace a model entry. Keys are stored lowercase.
    #[must_use]
    pub fn with_model(mut self, model: &str, pricing: ModelPricing) -> Self {
        self.entries.insert(model.to_ascii_lowercase(), pricing);
        self
    }

    /// Merge a map of overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &HashMap<String, ModelPricing>) -> Self {
        for (model, pricing) in overrides {
            self.entries.insert(model.to_ascii_lowercase(), *pricing);
        }
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, pricing: ModelPricing) -> Self {
        self.fallback = pricing;
        self
    }

    /// Exact match, then longest prefix, then the fallback.
    pub fn lookup(&self, model: &str) -> ModelPricing {
        let model = model.to_ascii_lowercase();
        if let Some(pricing) = self.entries.get(&model) {
            return *pricing;
        }

        let prefix = self
            .entries
            .iter()
            .filter(|(key, _)| model.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len());

        match prefix {
            Some((_, pricing)) => *pricing,
            None => {
                debug!(model = %model, "no pricing entry, using fallback");
                self.fallback
            }
        }
    }

    /// Cost in USD of one call to `model`.
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.lookup(model).cost(input_tokens, output_tokens)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}
