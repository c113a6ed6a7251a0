//! Startup wiring: config + collaborators in, a populated registry out.
//!
//! Adapters are constructed in a fixed order (OpenAI, Anthropic, Gemini,
//! Mistral, Stability), skipping any disabled in config. Initialization is
//! best-effort: an adapter whose key cannot be resolved is still registered
//! and retries the lookup on its first call.

use std::sync::Arc;

use omnigen_core::provider::box_adapter::BoxProviderAdapter;
use omnigen_core::provider::registry::ProviderRegistry;
use omnigen_types::config::GlobalConfig;
use omnigen_types::error::ProviderError;
use omnigen_types::provider::Category;

use crate::adapter::{
    AdapterContext, AnthropicAdapter, GeminiAdapter, MistralAdapter, OpenAiAdapter,
    StabilityAdapter, anthropic, gemini, mistral, openai, stability,
};
use crate::config::{load_global_config, resolve_data_dir};
use crate::gateway::HttpGateway;
use crate::keychain::KeychainKeyResolver;
use crate::pricing::PricingTable;
use crate::secret::build_default_chain;

/// Construction order. The first chat adapter here is the fallback chat default.
const ROSTER: [&str; 5] = [
    openai::DEFAULTS.id,
    anthropic::DEFAULTS.id,
    gemini::DEFAULTS.id,
    mistral::DEFAULTS.id,
    stability::DEFAULTS.id,
];

fn construct(id: &str, ctx: &AdapterContext, config: &GlobalConfig) -> Option<BoxProviderAdapter> {
    let settings = config.adapter(id);
    let resilience = config.resilience_for(id);
    let adapter = match id {
        "openai" => BoxProviderAdapter::new(OpenAiAdapter::new(ctx, &settings, &resilience)),
        "anthropic" => BoxProviderAdapter::new(AnthropicAdapter::new(ctx, &settings, &resilience)),
        "gemini" => BoxProviderAdapter::new(GeminiAdapter::new(ctx, &settings, &resilience)),
        "mistral" => BoxProviderAdapter::new(MistralAdapter::new(ctx, &settings, &resilience)),
        "stability" => BoxProviderAdapter::new(StabilityAdapter::new(ctx, &settings, &resilience)),
        _ => return None,
    };
    Some(adapter)
}

/// Construct every enabled adapter, in roster order.
pub fn build_adapters(config: &GlobalConfig, ctx: &AdapterContext) -> Vec<BoxProviderAdapter> {
    ROSTER
        .iter()
        .filter(|id| {
            let enabled = config.adapter(id).enabled;
            if !enabled {
                tracing::info!(adapter = %id, "adapter disabled in config");
            }
            enabled
        })
        .filter_map(|id| construct(id, ctx, config))
        .collect()
}

/// Build the registry, initialize every adapter and pick category defaults.
pub async fn build_registry(config: &GlobalConfig, ctx: AdapterContext) -> ProviderRegistry {
    let registry = ProviderRegistry::new();
    for adapter in build_adapters(config, &ctx) {
        registry.register(adapter);
    }

    let ready = registry
        .initialize_all()
        .await
        .iter()
        .filter(|(_, result)| result.is_ok())
        .count();
    tracing::info!(
        adapters = registry.len(),
        ready,
        "provider registry initialized"
    );

    choose_default(&registry, Category::Chat, config.default_chat.as_deref(), Some(openai::DEFAULTS.id));
    choose_default(&registry, Category::Image, config.default_image.as_deref(), None);
    registry
}

/// Configured id if registered, else `fallback`, else the first adapter of
/// the category.
fn choose_default(
    registry: &ProviderRegistry,
    category: Category,
    configured: Option<&str>,
    fallback: Option<&str>,
) {
    if let Some(id) = configured {
        match registry.set_default_by_id(category, id) {
            Ok(()) => return,
            Err(err) => {
                tracing::warn!(%category, adapter = %id, error = %err, "configured default unavailable");
            }
        }
    }
    if let Some(id) = fallback {
        if registry.set_default_by_id(category, id).is_ok() {
            return;
        }
    }
    match registry.get_adapters_by_category(category).into_iter().next() {
        Some(adapter) => registry.set_default_adapter(category, adapter),
        None => tracing::debug!(%category, "no adapter for category, default left unset"),
    }
}

/// Production wiring: config from the data directory, env + keychain keys,
/// the reqwest gateway and the default pricing table with config overrides.
pub async fn bootstrap() -> Result<Arc<ProviderRegistry>, ProviderError> {
    let data_dir = resolve_data_dir();
    let config = load_global_config(&data_dir).await;

    let gateway = HttpGateway::new().map_err(|e| ProviderError::unknown(e.to_string()))?;
    let ctx = AdapterContext {
        resolver: Arc::new(build_default_chain(Some(KeychainKeyResolver::new()), true)),
        gateway: Arc::new(gateway),
        pricing: Arc::new(PricingTable::new(config.provider_pricing.clone())),
    };
    Ok(Arc::new(build_registry(&config, ctx).await))
}
