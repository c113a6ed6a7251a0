//! Concrete vendor adapters.
//!
//! Each adapter owns its wire format (request body, response parsing, prompt
//! convention) and delegates everything else to `AdapterBase`.

pub mod anthropic;
pub mod gemini;
pub mod mistral;
pub mod openai;
pub mod stability;

use serde_json::{Map, Value};

use omnigen_core::credential::DynKeyResolver;
use omnigen_core::gateway::DynNetworkGateway;
use omnigen_core::provider::base::AdapterBase;
use omnigen_core::provider::cost::DynCostEstimator;
use omnigen_types::config::{AdapterSettings, ResilienceConfig};
use omnigen_types::error::ProviderError;
use omnigen_types::provider::{
    AdapterConfig, AdapterIdentity, Capabilities, Category, VendorType,
};

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use mistral::MistralAdapter;
pub use openai::OpenAiAdapter;
pub use stability::StabilityAdapter;

/// Collaborators every adapter is built with.
#[derive(Clone)]
pub struct AdapterContext {
    pub resolver: DynKeyResolver,
    pub gateway: DynNetworkGateway,
    pub pricing: DynCostEstimator,
}

/// Built-in defaults an adapter falls back to when config leaves a field unset.
pub(crate) struct AdapterDefaults {
    pub id: &'static str,
    pub name: &'static str,
    pub vendor: VendorType,
    pub category: Category,
    pub model: &'static str,
    pub base_url: &'static str,
}

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub(crate) fn adapter_config(defaults: &AdapterDefaults, settings: &AdapterSettings) -> AdapterConfig {
    AdapterConfig {
        model: settings
            .model
            .clone()
            .unwrap_or_else(|| defaults.model.to_string()),
        base_url: settings
            .base_url
            .clone()
            .unwrap_or_else(|| defaults.base_url.to_string()),
        temperature: settings.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        timeout_ms: settings.timeout_ms,
    }
}

pub(crate) fn build_base(
    ctx: &AdapterContext,
    defaults: &AdapterDefaults,
    capabilities: Capabilities,
    settings: &AdapterSettings,
    resilience: &ResilienceConfig,
) -> AdapterBase {
    let identity = AdapterIdentity {
        id: defaults.id.to_string(),
        name: defaults.name.to_string(),
        vendor: defaults.vendor,
        category: defaults.category,
    };
    AdapterBase::new(
        identity,
        capabilities,
        adapter_config(defaults, settings),
        resilience,
        ctx.resolver.clone(),
        ctx.gateway.clone(),
    )
    .with_pricing(ctx.pricing.clone())
}

/// A 2xx response the adapter cannot read. Retrying will not help.
pub(crate) fn invalid_response(vendor: VendorType, what: &str) -> ProviderError {
    ProviderError::vendor("invalid_response", format!("{vendor} response {what}")).permanent()
}

pub(crate) fn encode_body<T: serde::Serialize>(body: &T) -> Result<Value, ProviderError> {
    serde_json::to_value(body)
        .map_err(|e| ProviderError::unknown(format!("failed to encode request body: {e}")))
}

/// Parse `WIDTHxHEIGHT`.
pub(crate) fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Copy caller-supplied extension options into a request body without
/// overriding fields the adapter already set.
pub(crate) fn merge_extensions(body: &mut Value, extensions: &Map<String, Value>) {
    if let Value::Object(map) = body {
        for (key, value) in extensions {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// Non-blank trimmed text, if any.
pub(crate) fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|s| !s.is_empty())
}
