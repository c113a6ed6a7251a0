//! Input validation and option clamping.
//!
//! Everything here runs before a credential is fetched or a request is built.

use omnigen_types::error::ProviderError;
use omnigen_types::provider::{AdapterConfig, GenerationOptions, ResolvedOptions};

pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 1.0;
pub const MIN_MAX_TOKENS: u32 = 1;

/// Clamp a temperature into `[0, 1]`. NaN has no nearer bound and is rejected.
pub fn clamp_temperature(temperature: f64) -> Result<f64, ProviderError> {
    if temperature.is_nan() {
        return Err(ProviderError::validation("temperature must be a number"));
    }
    Ok(temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE))
}

/// Clamp a token limit to at least 1.
pub fn clamp_max_tokens(max_tokens: i64) -> u32 {
    u32::try_from(max_tokens.max(i64::from(MIN_MAX_TOKENS))).unwrap_or(u32::MAX)
}

pub fn validate_prompt(prompt: &str) -> Result<(), ProviderError> {
    if prompt.trim().is_empty() {
        return Err(ProviderError::validation("prompt must not be empty"));
    }
    Ok(())
}

/// Merge caller options over adapter defaults and clamp the result.
pub fn resolve_options(
    options: &GenerationOptions,
    config: &AdapterConfig,
) -> Result<ResolvedOptions, ProviderError> {
    let model = match options.model.as_deref() {
        Some(m) if m.trim().is_empty() => {
            return Err(ProviderError::validation("model must not be empty"));
        }
        Some(m) => m.to_string(),
        None => config.model.clone(),
    };
    let temperature = clamp_temperature(options.temperature.unwrap_or(config.temperature))?;
    let max_tokens = options
        .max_tokens
        .map(clamp_max_tokens)
        .unwrap_or(config.max_tokens.max(MIN_MAX_TOKENS));

    Ok(ResolvedOptions {
        model,
        temperature,
        max_tokens,
        timeout_ms: options.timeout_ms.or(config.timeout_ms),
        extensions: options.extensions.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnigen_types::error::ProviderErrorCode;

    fn config() -> AdapterConfig {
        AdapterConfig {
            model: "default-model".to_string(),
            base_url: "https://example.invalid".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            timeout_ms: None,
        }
    }

    #[test]
    fn test_temperature_clamps_to_nearer_bound() {
        assert_eq!(clamp_temperature(-0.5).unwrap(), 0.0);
        assert_eq!(clamp_temperature(2.0).unwrap(), 1.0);
        assert_eq!(clamp_temperature(0.42).unwrap(), 0.42);
        assert_eq!(clamp_temperature(f64::INFINITY).unwrap(), 1.0);
        assert_eq!(clamp_temperature(f64::NEG_INFINITY).unwrap(), 0.0);
        assert!(clamp_temperature(f64::NAN).is_err());
    }

    #[test]
    fn test_max_tokens_below_one_becomes_one() {
        for value in [0, -1, -10_000, i64::MIN] {
            assert_eq!(clamp_max_tokens(value), 1);
        }
        assert_eq!(clamp_max_tokens(500), 500);
        assert_eq!(clamp_max_tokens(i64::MAX), u32::MAX);
    }

    #[test]
    fn test_resolve_uses_defaults_then_overrides() {
        let resolved = resolve_options(&GenerationOptions::default(), &config()).unwrap();
        assert_eq!(resolved.model, "default-model");
        assert_eq!(resolved.temperature, 0.7);
        assert_eq!(resolved.max_tokens, 256);

        let options = GenerationOptions::default()
            .with_model("other")
            .with_temperature(3.0)
            .with_max_tokens(0)
            .with_timeout_ms(5_000);
        let resolved = resolve_options(&options, &config()).unwrap();
        assert_eq!(resolved.model, "other");
        assert_eq!(resolved.temperature, 1.0);
        assert_eq!(resolved.max_tokens, 1);
        assert_eq!(resolved.timeout_ms, Some(5_000));
    }

    #[test]
    fn test_resolve_rejects_blank_model() {
        let err = resolve_options(&GenerationOptions::default().with_model("  "), &config())
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::ValidationError);
    }

    #[test]
    fn test_validate_prompt() {
        assert!(validate_prompt("hello").is_ok());
        let err = validate_prompt("   ").unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::ValidationError);
    }
}
