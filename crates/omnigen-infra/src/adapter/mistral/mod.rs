//! Mistral adapter.
//!
//! The chat endpoint speaks the OpenAI chat-completions shape, so request and
//! response mapping are shared with the OpenAI adapter. Code generation
//! defaults to Codestral.

use serde_json::Value;

use omnigen_core::gateway::GatewayRequest;
use omnigen_core::provider::adapter::ProviderAdapter;
use omnigen_core::provider::base::AdapterBase;
use omnigen_types::config::{AdapterSettings, ResilienceConfig};
use omnigen_types::error::ProviderError;
use omnigen_types::provider::{
    Capabilities, Category, Completion, GenerationContext, ResolvedOptions, VendorType,
};

use super::openai::{chat_request, parse_chat_completion};
use super::{AdapterContext, AdapterDefaults, build_base, non_blank};

pub(crate) const DEFAULTS: AdapterDefaults = AdapterDefaults {
    id: "mistral",
    name: "Mistral AI",
    vendor: VendorType::Mistral,
    category: Category::Chat,
    model: "mistral-large-latest",
    base_url: "https://api.mistral.ai",
};

pub const CODE_MODEL: &str = "codestral-latest";

pub struct MistralAdapter {
    base: AdapterBase,
}

impl MistralAdapter {
    pub fn new(ctx: &AdapterContext, settings: &AdapterSettings, resilience: &ResilienceConfig) -> Self {
        let capabilities = Capabilities {
            chat: true,
            dev: true,
            rag: true,
            ..Default::default()
        };
        Self {
            base: build_base(ctx, &DEFAULTS, capabilities, settings, resilience),
        }
    }
}

impl ProviderAdapter for MistralAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    /// Instruction-tuned turn markers: `<s>[INST] system\n\nprompt [/INST]`.
    fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String {
        let mut system = Vec::new();
        if let Some(instruction) = non_blank(context.system_instruction.as_deref()) {
            system.push(instruction.to_string());
        }
        if let Some(style) = non_blank(context.style.as_deref()) {
            system.push(format!("Style: {style}"));
        }
        if !context.modifiers.is_empty() {
            system.push(format!("Modifiers: {}", context.modifiers.join(", ")));
        }

        if system.is_empty() {
            format!("<s>[INST] {prompt} [/INST]")
        } else {
            format!("<s>[INST] {}\n\n{prompt} [/INST]", system.join("\n"))
        }
    }

    fn text_request(
        &self,
        prompt: &str,
        options: &ResolvedOptions,
    ) -> Result<GatewayRequest, ProviderError> {
        chat_request(
            VendorType::Mistral,
            self.base.endpoint("v1/chat/completions"),
            prompt,
            options,
        )
    }

    fn parse_text(&self, body: &Value, options: &ResolvedOptions) -> Result<Completion, ProviderError> {
        parse_chat_completion(VendorType::Mistral, body, options)
    }

    fn code_model(&self) -> Option<&str> {
        Some(CODE_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use omnigen_core::gateway::AuthScheme;
    use omnigen_types::provider::{CodeRequest, GenerationOptions};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::testing::{RecordingGateway, context, quick_resilience};

    fn reply(text: &str) -> Value {
        json!({
            "id": "cmpl-1",
            "object": "chat.completion",
            "model": "mistral-large-latest",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 7, "completion_tokens": 5, "total_tokens": 12}
        })
    }

    fn adapter(gateway: &Arc<RecordingGateway>) -> MistralAdapter {
        MistralAdapter::new(&context(gateway.clone()), &AdapterSettings::default(), &quick_resilience())
    }

    #[test]
    fn test_enhance_prompt_turn_markers() {
        let gateway = Arc::new(RecordingGateway::replying(json!({})));
        let adapter = adapter(&gateway);
        let context = GenerationContext {
            system_instruction: Some("Answer in French.".to_string()),
            ..Default::default()
        };
        assert_eq!(
            adapter.enhance_prompt("Hello", &context),
            "<s>[INST] Answer in French.\n\nHello [/INST]"
        );
        assert_eq!(
            adapter.enhance_prompt("Hello", &GenerationContext::default()),
            "<s>[INST] Hello [/INST]"
        );
    }

    #[tokio::test]
    async fn test_generate_text_uses_chat_endpoint() {
        let gateway = Arc::new(RecordingGateway::replying(reply("Salut")));
        let adapter = adapter(&gateway);
        let completion = adapter
            .generate_text("Hello", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(completion.text, "Salut");
        assert_eq!(adapter.usage().tokens_used, 12);

        let request = gateway.last();
        assert_eq!(request.vendor, VendorType::Mistral);
        assert_eq!(request.url, "https://api.mistral.ai/v1/chat/completions");
        assert_eq!(request.auth, AuthScheme::Bearer);
        assert_eq!(request.body.unwrap()["model"], json!("mistral-large-latest"));
    }

    #[tokio::test]
    async fn test_generate_code_defaults_to_codestral() {
        let gateway = Arc::new(RecordingGateway::replying(reply("```python\nprint('hi')\n```")));
        let adapter = adapter(&gateway);
        let request = CodeRequest {
            instruction: "print hi".to_string(),
            language: Some("python".to_string()),
            snippet: Some("def main():\n    pass".to_string()),
        };

        let code = adapter
            .generate_code(&request, &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(code, "print('hi')");

        let body = gateway.last().body.unwrap();
        assert_eq!(body["model"], json!(CODE_MODEL));
        let prompt = body["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("```python\ndef main():\n    pass\n```"));

        let explicit = GenerationOptions::default().with_model("mistral-small-latest");
        adapter
            .generate_code(&request, &explicit, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(gateway.last().body.unwrap()["model"], json!("mistral-small-latest"));
    }
}
