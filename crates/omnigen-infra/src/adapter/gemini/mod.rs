//! Google Gemini adapter (`generateContent`).

pub mod types;

use serde::Deserialize;
use serde_json::Value;

use omnigen_core::gateway::{AuthScheme, GatewayRequest};
use omnigen_core::provider::adapter::ProviderAdapter;
use omnigen_core::provider::base::AdapterBase;
use omnigen_types::config::{AdapterSettings, ResilienceConfig};
use omnigen_types::error::ProviderError;
use omnigen_types::provider::{
    Capabilities, Category, Completion, GenerationContext, ResolvedOptions, UsageMeta, VendorType,
};

use self::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, RequestPart};
use super::{
    AdapterContext, AdapterDefaults, build_base, encode_body, invalid_response, merge_extensions,
    non_blank,
};

pub(crate) const DEFAULTS: AdapterDefaults = AdapterDefaults {
    id: "gemini",
    name: "Google Gemini",
    vendor: VendorType::Gemini,
    category: Category::Chat,
    model: "gemini-2.0-flash",
    base_url: "https://generativelanguage.googleapis.com",
};

pub struct GeminiAdapter {
    base: AdapterBase,
}

impl GeminiAdapter {
    pub fn new(ctx: &AdapterContext, settings: &AdapterSettings, resilience: &ResilienceConfig) -> Self {
        let capabilities = Capabilities {
            chat: true,
            rag: true,
            ..Default::default()
        };
        Self {
            base: build_base(ctx, &DEFAULTS, capabilities, settings, resilience),
        }
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    /// `System:` / `Style:` / `Modifiers:` lines followed by `User: <prompt>`.
    fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String {
        let mut lines = Vec::new();
        if let Some(instruction) = non_blank(context.system_instruction.as_deref()) {
            lines.push(format!("System: {instruction}"));
        }
        if let Some(style) = non_blank(context.style.as_deref()) {
            lines.push(format!("Style: {style}"));
        }
        if !context.modifiers.is_empty() {
            lines.push(format!("Modifiers: {}", context.modifiers.join(", ")));
        }
        if lines.is_empty() {
            return prompt.to_string();
        }
        lines.push(format!("User: {prompt}"));
        lines.join("\n")
    }

    fn text_request(
        &self,
        prompt: &str,
        options: &ResolvedOptions,
    ) -> Result<GatewayRequest, ProviderError> {
        let mut body = encode_body(&GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            },
        })?;
        // Extra sampling knobs (topP, topK, ...) belong in generationConfig.
        if let Some(config) = body.get_mut("generationConfig") {
            merge_extensions(config, &options.extensions);
        }

        let path = format!("v1beta/models/{}:generateContent", options.model);
        Ok(GatewayRequest::post(
            VendorType::Gemini,
            "chat",
            self.base.endpoint(&path),
            AuthScheme::Header("x-goog-api-key"),
            body,
        ))
    }

    fn parse_text(&self, body: &Value, options: &ResolvedOptions) -> Result<Completion, ProviderError> {
        let response = GenerateContentResponse::deserialize(body)
            .map_err(|_| invalid_response(VendorType::Gemini, "is not a generateContent result"))?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(ProviderError::vendor(
                "blocked",
                format!("gemini returned no candidates: {reason}"),
            )
            .permanent());
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(Completion {
            text,
            model: response.model_version.unwrap_or_else(|| options.model.clone()),
            usage: UsageMeta {
                input_tokens: response.usage_metadata.prompt_token_count,
                output_tokens: response.usage_metadata.candidates_token_count,
            },
            finish_reason: candidate.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use omnigen_types::error::ProviderErrorCode;
    use omnigen_types::provider::GenerationOptions;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::testing::{RecordingGateway, context, quick_resilience};

    fn adapter(gateway: &Arc<RecordingGateway>) -> GeminiAdapter {
        GeminiAdapter::new(&context(gateway.clone()), &AdapterSettings::default(), &quick_resilience())
    }

    #[tokio::test]
    async fn test_generate_text_wire_format() {
        let gateway = Arc::new(RecordingGateway::replying(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Bonjour"}, {"text": "!"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 2, "totalTokenCount": 7},
            "modelVersion": "gemini-2.0-flash-001"
        })));
        let adapter = adapter(&gateway);
        let mut options = GenerationOptions::default().with_max_tokens(64);
        options.extensions.insert("topP".to_string(), json!(0.8));

        let completion = adapter
            .generate_text("Hello", &options, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(completion.text, "Bonjour!");
        assert_eq!(completion.model, "gemini-2.0-flash-001");
        assert_eq!(completion.usage.total(), 7);
        assert_eq!(completion.finish_reason.as_deref(), Some("STOP"));

        let request = gateway.last();
        assert_eq!(
            request.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(request.auth, AuthScheme::Header("x-goog-api-key"));
        assert_eq!(
            request.body.unwrap(),
            json!({
                "contents": [{"role": "user", "parts": [{"text": "Hello"}]}],
                "generationConfig": {"temperature": 0.7, "maxOutputTokens": 64, "topP": 0.8}
            })
        );
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_permanent() {
        let gateway = Arc::new(RecordingGateway::replying(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })));
        let err = adapter(&gateway)
            .generate_text("Hello", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::VendorError);
        assert!(err.message.contains("SAFETY"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_enhance_prompt_role_lines() {
        let gateway = Arc::new(RecordingGateway::replying(json!({})));
        let context = GenerationContext {
            system_instruction: Some("You are a poet.".to_string()),
            style: None,
            modifiers: vec!["haiku".to_string()],
        };
        assert_eq!(
            adapter(&gateway).enhance_prompt("Write about snow.", &context),
            "System: You are a poet.\nModifiers: haiku\nUser: Write about snow."
        );
    }
}
