//! Cost estimation for vendor calls.
//!
//! Provides a hardcoded default pricing table for known models with
//! user override capability from `config.toml`. Text and speech are priced per
//! million tokens (speech counts characters as input tokens); images are
//! priced per generated item. Estimates are approximate.

use omnigen_core::provider::cost::CostEstimator;
use omnigen_types::config::ProviderPricing;
use omnigen_types::provider::{UsageMeta, VendorType};

/// Internal pricing entry for the hardcoded default table.
struct PricingEntry {
    vendor: VendorType,
    model_pattern: &'static str,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
    per_item_cost: Option<f64>,
}

const fn tokens(
    vendor: VendorType,
    model_pattern: &'static str,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
) -> PricingEntry {
    PricingEntry {
        vendor,
        model_pattern,
        input_cost_per_million,
        output_cost_per_million,
        per_item_cost: None,
    }
}

const fn item(vendor: VendorType, model_pattern: &'static str, cost: f64) -> PricingEntry {
    PricingEntry {
        vendor,
        model_pattern,
        input_cost_per_million: 0.0,
        output_cost_per_million: 0.0,
        per_item_cost: Some(cost),
    }
}

/// Conservative fallback pricing when no model match is found.
const FALLBACK_INPUT_COST: f64 = 5.0;
const FALLBACK_OUTPUT_COST: f64 = 15.0;
const FALLBACK_ITEM_COST: f64 = 0.04;

/// Approximate list prices in USD. More specific patterns come first because
/// lookup is first-prefix-wins (`gpt-4o-mini` before `gpt-4o`).
const DEFAULT_PRICING: &[PricingEntry] = &[
    // OpenAI
    tokens(VendorType::OpenAi, "gpt-4o-mini", 0.15, 0.60),
    tokens(VendorType::OpenAi, "gpt-4o", 2.50, 10.0),
    tokens(VendorType::OpenAi, "tts-1-hd", 30.0, 0.0),
    tokens(VendorType::OpenAi, "tts-1", 15.0, 0.0),
    item(VendorType::OpenAi, "dall-e-3", 0.04),
    item(VendorType::OpenAi, "dall-e-2", 0.02),
    // Anthropic
    tokens(VendorType::Anthropic, "claude-sonnet-4", 3.0, 15.0),
    tokens(VendorType::Anthropic, "claude-opus-4", 15.0, 75.0),
    tokens(VendorType::Anthropic, "claude-3-5-haiku", 0.80, 4.0),
    // Gemini
    tokens(VendorType::Gemini, "gemini-2.0-flash", 0.10, 0.40),
    tokens(VendorType::Gemini, "gemini-2", 1.25, 5.0),
    // Mistral
    tokens(VendorType::Mistral, "mistral-large", 2.0, 6.0),
    tokens(VendorType::Mistral, "codestral", 0.30, 0.90),
    // Stability
    item(VendorType::Stability, "stable-diffusion-xl", 0.002),
    item(VendorType::Stability, "stable-diffusion-v1-6", 0.002),
];

/// Check if a model name matches a pattern using simple prefix matching.
///
/// The pattern is treated as a prefix: `"claude-sonnet-4"` matches
/// `"claude-sonnet-4-20250514"`.
fn matches_pattern(model: &str, pattern: &str) -> bool {
    model.starts_with(pattern)
}

/// Compute cost in USD given token counts and per-million rates.
fn compute_cost(usage: &UsageMeta, input_cost_per_million: f64, output_cost_per_million: f64) -> f64 {
    let input_cost = (f64::from(usage.input_tokens) / 1_000_000.0) * input_cost_per_million;
    let output_cost = (f64::from(usage.output_tokens) / 1_000_000.0) * output_cost_per_million;
    input_cost + output_cost
}

/// Default table plus user overrides from `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    overrides: Vec<ProviderPricing>,
}

impl PricingTable {
    pub fn new(overrides: Vec<ProviderPricing>) -> Self {
        Self { overrides }
    }

    fn user_entry(&self, vendor: VendorType, model: &str) -> Option<&ProviderPricing> {
        self.overrides.iter().find(|p| {
            p.provider_name.eq_ignore_ascii_case(vendor.as_str())
                && matches_pattern(model, &p.model_pattern)
        })
    }

    fn default_entry(vendor: VendorType, model: &str) -> Option<&'static PricingEntry> {
        DEFAULT_PRICING
            .iter()
            .find(|e| e.vendor == vendor && matches_pattern(model, e.model_pattern))
    }

    /// Estimate the token cost of a request in USD.
    ///
    /// Lookup order:
    /// 1. User-defined pricing overrides from `config.toml`
    /// 2. Hardcoded default pricing table
    /// 3. Conservative fallback ($5.00 / $15.00 per million tokens)
    pub fn estimate_cost(&self, vendor: VendorType, model: &str, usage: &UsageMeta) -> f64 {
        if let Some(pricing) = self.user_entry(vendor, model) {
            return compute_cost(
                usage,
                pricing.input_cost_per_million,
                pricing.output_cost_per_million,
            );
        }
        if let Some(entry) = Self::default_entry(vendor, model) {
            return compute_cost(
                usage,
                entry.input_cost_per_million,
                entry.output_cost_per_million,
            );
        }
        tracing::debug!(%vendor, model, "no pricing entry, using fallback rates");
        compute_cost(usage, FALLBACK_INPUT_COST, FALLBACK_OUTPUT_COST)
    }

    /// Estimate the cost of `items` generated artifacts in USD.
    pub fn estimate_item_cost(&self, vendor: VendorType, model: &str, items: u32) -> f64 {
        let unit = self
            .user_entry(vendor, model)
            .and_then(|p| p.per_item_cost)
            .or_else(|| Self::default_entry(vendor, model).and_then(|e| e.per_item_cost))
            .unwrap_or(FALLBACK_ITEM_COST);
        unit * f64::from(items)
    }
}

impl CostEstimator for PricingTable {
    fn token_cost(&self, vendor: VendorType, model: &str, usage: &UsageMeta) -> f64 {
        self.estimate_cost(vendor, model, usage)
    }

    fn item_cost(&self, vendor: VendorType, model: &str, items: u32) -> f64 {
        self.estimate_item_cost(vendor, model, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input_tokens: u32, output_tokens: u32) -> UsageMeta {
        UsageMeta {
            input_tokens,
            output_tokens,
        }
    }

    #[test]
    fn estimate_cost_known_model_returns_correct_value() {
        let table = PricingTable::default();
        let cost = table.estimate_cost(
            VendorType::Anthropic,
            "claude-sonnet-4-20250514",
            &usage(1_000_000, 100_000),
        );
        // $3.00 + $1.50
        assert!((cost - 4.50).abs() < 0.001, "Expected ~$4.50, got ${cost}");
    }

    #[test]
    fn more_specific_pattern_wins() {
        let table = PricingTable::default();
        let mini = table.estimate_cost(VendorType::OpenAi, "gpt-4o-mini", &usage(1_000_000, 0));
        let full = table.estimate_cost(VendorType::OpenAi, "gpt-4o-2024-08-06", &usage(1_000_000, 0));
        assert!((mini - 0.15).abs() < 1e-9);
        assert!((full - 2.50).abs() < 1e-9);
    }

    #[test]
    fn user_override_takes_priority() {
        let table = PricingTable::new(vec![ProviderPricing {
            provider_name: "Anthropic".to_string(),
            model_pattern: "claude-sonnet-4".to_string(),
            input_cost_per_million: 1.0,
            output_cost_per_million: 5.0,
            per_item_cost: None,
        }]);
        let cost = table.estimate_cost(
            VendorType::Anthropic,
            "claude-sonnet-4-20250514",
            &usage(1_000_000, 100_000),
        );
        assert!((cost - 1.50).abs() < 0.001, "Expected ~$1.50, got ${cost}");
    }

    #[test]
    fn unknown_model_uses_fallback() {
        let table = PricingTable::default();
        let cost = table.estimate_cost(VendorType::Mistral, "open-mixtral", &usage(1_000_000, 100_000));
        assert!((cost - 6.50).abs() < 0.001, "Expected ~$6.50, got ${cost}");
    }

    #[test]
    fn item_cost_scales_with_count() {
        let table = PricingTable::default();
        let cost = table.estimate_item_cost(VendorType::OpenAi, "dall-e-2", 3);
        assert!((cost - 0.06).abs() < 1e-9);

        let table = PricingTable::new(vec![ProviderPricing {
            provider_name: "stability".to_string(),
            model_pattern: "stable-diffusion-xl".to_string(),
            input_cost_per_million: 0.0,
            output_cost_per_million: 0.0,
            per_item_cost: Some(0.01),
        }]);
        let cost = table.item_cost(VendorType::Stability, "stable-diffusion-xl-1024-v1-0", 2);
        assert!((cost - 0.02).abs() < 1e-9);
    }

    #[test]
    fn speech_is_priced_per_character() {
        let table = PricingTable::default();
        let cost = table.token_cost(VendorType::OpenAi, "tts-1", &usage(1_000, 0));
        assert!((cost - 0.015).abs() < 1e-9);
        let hd = table.token_cost(VendorType::OpenAi, "tts-1-hd", &usage(1_000, 0));
        assert!((hd - 0.030).abs() < 1e-9);
    }

    #[test]
    fn default_table_covers_every_vendor() {
        for vendor in VendorType::ALL {
            assert!(
                DEFAULT_PRICING.iter().any(|e| e.vendor == vendor),
                "missing {vendor}"
            );
        }
    }
}
