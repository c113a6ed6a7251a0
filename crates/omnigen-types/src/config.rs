//! Global configuration types for omnigen.
//!
//! `GlobalConfig` represents the top-level `config.toml`: category defaults,
//! resilience tuning, per-adapter settings and pricing overrides.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.omnigen/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Adapter id used as the default for the chat category.
    #[serde(default)]
    pub default_chat: Option<String>,

    /// Adapter id used as the default for the image category.
    #[serde(default)]
    pub default_image: Option<String>,

    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Per-adapter settings keyed by adapter id.
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterSettings>,

    /// Pricing information for cost estimation per provider/model.
    #[serde(default)]
    pub provider_pricing: Vec<ProviderPricing>,
}

impl GlobalConfig {
    /// Settings for one adapter, falling back to defaults when unconfigured.
    pub fn adapter(&self, id: &str) -> AdapterSettings {
        self.adapters.get(id).cloned().unwrap_or_default()
    }

    /// Resilience for one adapter: its override if present, else the global block.
    pub fn resilience_for(&self, id: &str) -> ResilienceConfig {
        self.adapters
            .get(id)
            .and_then(|a| a.resilience.clone())
            .unwrap_or_else(|| self.resilience.clone())
    }
}

/// Fixed-backoff retry and fixed-window rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Total attempts per call, first attempt included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Constant delay between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Minimum spacing between two dispatches on the same adapter.
    #[serde(default = "default_rate_limit_interval_ms")]
    pub rate_limit_interval_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_rate_limit_interval_ms() -> u64 {
    1_000
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            rate_limit_interval_ms: default_rate_limit_interval_ms(),
        }
    }
}

impl ResilienceConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }
}

/// `[adapters.<id>]` block. Unset fields use the adapter's built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub resilience: Option<ResilienceConfig>,
}

fn default_enabled() -> bool {
    true
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            model: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            timeout_ms: None,
            resilience: None,
        }
    }
}

/// Cost information for a specific provider/model pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPricing {
    /// Name of the provider (e.g., "anthropic", "openai").
    pub provider_name: String,
    /// Model name prefix (e.g., "gpt-4o").
    pub model_pattern: String,
    /// Cost per million input tokens in USD.
    #[serde(default)]
    pub input_cost_per_million: f64,
    /// Cost per million output tokens in USD.
    #[serde(default)]
    pub output_cost_per_million: f64,
    /// Flat cost per generated item (image, speech clip) in USD.
    #[serde(default)]
    pub per_item_cost: Option<f64>,
}
