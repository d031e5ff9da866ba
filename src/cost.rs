//! Token pricing and per-page cost computation.
//!
//! There is exactly one pricing table per run. It is built (or loaded from a
//! JSON file) before any page is processed and shared read-only through an
//! `Arc`, so the classifier and the extractor are always priced the same way.

use crate::error::TriageError;
use crate::output::{round_to, UsageMetrics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// USD prices per 1 000 tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    #[serde(alias = "input")]
    pub input_per_1k: f64,
    #[serde(alias = "output")]
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }
}

/// Model identifier → price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    prices: HashMap<String, ModelPrice>,
}

const BUILTIN_PRICES: &[(&str, ModelPrice)] = &[
    // Anthropic via Bedrock, global and EU inference profiles
    ("anthropic.claude-opus-4-5", ModelPrice::new(0.005, 0.025)),
    ("anthropic.claude-haiku-4-5", ModelPrice::new(0.001, 0.005)),
    ("anthropic.claude-sonnet-4-5", ModelPrice::new(0.003, 0.015)),
    ("eu.anthropic.claude-haiku-4-5", ModelPrice::new(0.0011, 0.0055)),
    ("eu.anthropic.claude-sonnet-4-5", ModelPrice::new(0.0033, 0.0165)),
    ("anthropic.claude-opus-4", ModelPrice::new(0.015, 0.075)),
    ("anthropic.claude-opus-4-1", ModelPrice::new(0.015, 0.075)),
    ("anthropic.claude-sonnet-4", ModelPrice::new(0.003, 0.015)),
    ("eu.anthropic.claude-sonnet-4", ModelPrice::new(0.003, 0.015)),
    ("eu.anthropic.claude-sonnet-4-20250514-v1:0", ModelPrice::new(0.003, 0.015)),
    ("anthropic.claude-3-7-sonnet-20250219-v1:0", ModelPrice::new(0.003, 0.015)),
    ("anthropic.claude-3-5-sonnet-20241022-v2:0", ModelPrice::new(0.003, 0.015)),
    ("anthropic.claude-3-haiku-20240307-v1:0", ModelPrice::new(0.00025, 0.00125)),
    // Direct provider model ids
    ("claude-sonnet-4-20250514", ModelPrice::new(0.003, 0.015)),
    ("claude-haiku-4-20250514", ModelPrice::new(0.0008, 0.004)),
    ("gpt-4.1-nano", ModelPrice::new(0.0001, 0.0004)),
    ("gpt-4.1-mini", ModelPrice::new(0.0004, 0.0016)),
    ("gpt-4.1", ModelPrice::new(0.002, 0.008)),
    ("gpt-4o", ModelPrice::new(0.0025, 0.01)),
    ("gemini-2.0-flash", ModelPrice::new(0.0001, 0.0004)),
    ("gemini-2.5-pro", ModelPrice::new(0.00125, 0.01)),
];

impl PricingTable {
    /// An empty table: every model costs 0.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in price list.
    pub fn builtin() -> Self {
        Self {
            prices: BUILTIN_PRICES
                .iter()
                .map(|(id, price)| (id.to_string(), *price))
                .collect(),
        }
    }

    /// Load a table from a JSON object `{"model-id": {"input": 0.003, "output": 0.015}, …}`.
    pub fn from_json_file(path: &Path) -> Result<Self, TriageError> {
        let raw = std::fs::read_to_string(path).map_err(|e| TriageError::InvalidPricing {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::from_json_str(&raw).map_err(|detail| TriageError::InvalidPricing {
            path: path.to_path_buf(),
            detail,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        let table: Self = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        if let Some((id, _)) = table
            .prices
            .iter()
            .find(|(_, p)| p.input_per_1k < 0.0 || p.output_per_1k < 0.0)
        {
            return Err(format!("negative price for model '{id}'"));
        }
        Ok(table)
    }

    pub fn with_price(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.prices.insert(model.into(), price);
        self
    }

    pub fn get(&self, model: &str) -> Option<ModelPrice> {
        self.prices.get(model).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Prices usage for one model against the shared table.
#[derive(Debug)]
pub struct CostMeter {
    pricing: Arc<PricingTable>,
    model: String,
    warned_unknown: AtomicBool,
}

impl CostMeter {
    pub fn new(pricing: Arc<PricingTable>, model: impl Into<String>) -> Self {
        Self {
            pricing,
            model: model.into(),
            warned_unknown: AtomicBool::new(false),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// USD cost of `usage`, rounded to 6 decimals. Unknown models cost 0.
    pub fn cost(&self, usage: &UsageMetrics) -> f64 {
        let Some(price) = self.pricing.get(&self.model) else {
            if !usage.is_zero() && !self.warned_unknown.swap(true, Ordering::Relaxed) {
                warn!(
                    "No price configured for model '{}'; costs will be reported as 0",
                    self.model
                );
            }
            return 0.0;
        };
        let input = usage.prompt_tokens() as f64 / 1000.0 * price.input_per_1k;
        let output = usage.completion_tokens() as f64 / 1000.0 * price.output_per_1k;
        round_to(input + output, 6)
    }
}
