//! Per-model pricing table.
//!
//! Prices are USD per 1 000 tokens, split across the four token classes the
//! provider bills separately. Estimates from this table are approximate;
//! the authoritative figure arrives on the final result message.

use serde::{Deserialize, Serialize};

/// Per-1k-token prices for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Uncached input tokens.
    pub input_per_1k: f64,
    /// Generated output tokens.
    pub output_per_1k: f64,
    /// Cache-read input tokens.
    pub cache_read_per_1k: f64,
    /// Cache-creation input tokens.
    pub cache_create_per_1k: f64,
}

/// Sonnet-class pricing used for unknown models.
const DEFAULT_PRICING: ModelPricing = ModelPricing {
    input_per_1k: 0.003,
    output_per_1k: 0.015,
    cache_read_per_1k: 0.0003,
    cache_create_per_1k: 0.00375,
};

const OPUS_PRICING: ModelPricing = ModelPricing {
    input_per_1k: 0.015,
    output_per_1k: 0.075,
    cache_read_per_1k: 0.0015,
    cache_create_per_1k: 0.01875,
};

const HAIKU_PRICING: ModelPricing = ModelPricing {
    input_per_1k: 0.00025,
    output_per_1k: 0.00125,
    cache_read_per_1k: 0.00003,
    cache_create_per_1k: 0.0003,
};

impl ModelPricing {
    /// Look up pricing for a model id, falling back to Sonnet-class prices
    /// for unknown models.
    pub fn for_model(model: &str) -> ModelPricing {
        match model {
            "claude-sonnet-4-20250514" | "claude-3-5-sonnet-20241022" => DEFAULT_PRICING,
            "claude-3-opus-20240229" => OPUS_PRICING,
            "claude-3-haiku-20240307" => HAIKU_PRICING,
            _ => DEFAULT_PRICING,
        }
    }

    /// Estimated cost in USD for the given token counts.
    pub fn cost(&self, input: u64, output: u64, cache_read: u64, cache_create: u64) -> f64 {
        (input as f64 / 1000.0) * self.input_per_1k
            + (output as f64 / 1000.0) * self.output_per_1k
            + (cache_read as f64 / 1000.0) * self.cache_read_per_1k
            + (cache_create as f64 / 1000.0) * self.cache_create_per_1k
    }
}
