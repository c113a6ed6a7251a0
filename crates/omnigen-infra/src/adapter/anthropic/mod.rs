//! Anthropic adapter (Messages API).
//!
//! Prompts use XML-style tag blocks, which Claude models are trained to
//! attend to: `<instructions>`, `<style>`, `<modifiers>`, `<prompt>`, and
//! `<documents>` / `<question>` for retrieval context.

pub mod types;

use serde::Deserialize;
use serde_json::Value;

use omnigen_core::gateway::{AuthScheme, GatewayRequest};
use omnigen_core::provider::adapter::ProviderAdapter;
use omnigen_core::provider::base::AdapterBase;
use omnigen_types::config::{AdapterSettings, ResilienceConfig};
use omnigen_types::error::ProviderError;
use omnigen_types::provider::{
    Capabilities, Category, Completion, Document, GenerationContext, ResolvedOptions, UsageMeta,
    VendorType,
};

use self::types::{AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse};
use super::{
    AdapterContext, AdapterDefaults, build_base, encode_body, invalid_response, merge_extensions,
    non_blank,
};

pub(crate) const DEFAULTS: AdapterDefaults = AdapterDefaults {
    id: "anthropic",
    name: "Anthropic",
    vendor: VendorType::Anthropic,
    category: Category::Chat,
    model: "claude-sonnet-4-20250514",
    base_url: "https://api.anthropic.com",
};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    base: AdapterBase,
}

impl AnthropicAdapter {
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

fn tag(name: &str, body: &str) -> String {
    format!("<{name}>\n{}\n</{name}>", body.trim())
}

fn attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

impl ProviderAdapter for AnthropicAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String {
        let mut blocks = Vec::new();
        if let Some(instruction) = non_blank(context.system_instruction.as_deref()) {
            blocks.push(tag("instructions", instruction));
        }
        if let Some(style) = non_blank(context.style.as_deref()) {
            blocks.push(tag("style", style));
        }
        if !context.modifiers.is_empty() {
            let list: Vec<String> = context.modifiers.iter().map(|m| format!("- {m}")).collect();
            blocks.push(tag("modifiers", &list.join("\n")));
        }
        if blocks.is_empty() {
            return prompt.to_string();
        }
        blocks.push(tag("prompt", prompt));
        blocks.join("\n\n")
    }

    fn prepare_rag_context(&self, documents: &[Document], query: &str) -> String {
        if documents.is_empty() {
            return query.to_string();
        }
        let mut out = String::from("<documents>\n");
        for (i, doc) in documents.iter().enumerate() {
            out.push_str(&format!("<document index=\"{}\"", i + 1));
            if let Some(source) = &doc.metadata.source {
                out.push_str(&format!(" source=\"{}\"", attribute(source)));
            }
            out.push_str(">\n");
            out.push_str(doc.content.trim());
            out.push_str("\n</document>\n");
        }
        out.push_str("</documents>\n\n");
        out.push_str(&tag("question", query));
        out
    }

    fn text_request(
        &self,
        prompt: &str,
        options: &ResolvedOptions,
    ) -> Result<GatewayRequest, ProviderError> {
        let mut body = encode_body(&AnthropicRequest {
            model: &options.model,
            max_tokens: options.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
        })?;
        merge_extensions(&mut body, &options.extensions);
        Ok(GatewayRequest::post(
            VendorType::Anthropic,
            "chat",
            self.base.endpoint("v1/messages"),
            AuthScheme::Header("x-api-key"),
            body,
        )
        .with_header("anthropic-version", API_VERSION))
    }

    fn parse_text(&self, body: &Value, options: &ResolvedOptions) -> Result<Completion, ProviderError> {
        let response = AnthropicResponse::deserialize(body)
            .map_err(|_| invalid_response(VendorType::Anthropic, "is not a message"))?;
        let text: String = response
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect();

        Ok(Completion {
            text,
            model: response.model.unwrap_or_else(|| options.model.clone()),
            usage: UsageMeta {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
            finish_reason: response.stop_reason,
        })
    }
}
