//! OpenAI adapter: chat completions, DALL-E images, text-to-speech, code.

pub mod types;

use serde::Deserialize;
use serde_json::Value;

use omnigen_core::gateway::{AuthScheme, GatewayRequest, ResponseBody};
use omnigen_core::provider::adapter::ProviderAdapter;
use omnigen_core::provider::base::AdapterBase;
use omnigen_types::config::{AdapterSettings, ResilienceConfig};
use omnigen_types::error::ProviderError;
use omnigen_types::provider::{
    Capabilities, Category, Completion, GenerationContext, ImageOutput, ImageQuality,
    ImageRequest, ResolvedOptions, UsageMeta, VendorType, VoiceOutput, VoiceRequest,
};

use self::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ImageGenerationRequest,
    ImageGenerationResponse, SpeechRequest,
};
use super::{
    AdapterContext, AdapterDefaults, build_base, encode_body, invalid_response, merge_extensions,
    non_blank,
};

pub(crate) const DEFAULTS: AdapterDefaults = AdapterDefaults {
    id: "openai",
    name: "OpenAI",
    vendor: VendorType::OpenAi,
    category: Category::Chat,
    model: "gpt-4o-mini",
    base_url: "https://api.openai.com/v1",
};

pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
const DALL_E_2_SIZES: &[&str] = &["256x256", "512x512", "1024x1024"];
const DALL_E_3_SIZES: &[&str] = &["1024x1024", "1792x1024", "1024x1792"];
const DALL_E_2_MAX_IMAGES: u32 = 10;

pub const DEFAULT_VOICE_MODEL: &str = "tts-1";
const VOICE_MODELS: &[&str] = &["tts-1", "tts-1-hd"];
const VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];
const AUDIO_FORMATS: &[&str] = &["mp3", "opus", "aac", "flac"];
const MIN_SPEED: f64 = 0.25;
const MAX_SPEED: f64 = 4.0;

pub struct OpenAiAdapter {
    base: AdapterBase,
}

impl OpenAiAdapter {
    pub fn new(ctx: &AdapterContext, settings: &AdapterSettings, resilience: &ResilienceConfig) -> Self {
        let capabilities = Capabilities {
            chat: true,
            image: true,
            dev: true,
            voice: true,
            streaming: false,
            rag: true,
        };
        Self {
            base: build_base(ctx, &DEFAULTS, capabilities, settings, resilience),
        }
    }
}

/// Single-turn chat request in the OpenAI shape. Also used by Mistral.
pub(crate) fn chat_request(
    vendor: VendorType,
    url: String,
    prompt: &str,
    options: &ResolvedOptions,
) -> Result<GatewayRequest, ProviderError> {
    let mut body = encode_body(&ChatCompletionRequest {
        model: &options.model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    })?;
    merge_extensions(&mut body, &options.extensions);
    Ok(GatewayRequest::post(vendor, "chat", url, AuthScheme::Bearer, body))
}

pub(crate) fn parse_chat_completion(
    vendor: VendorType,
    body: &Value,
    options: &ResolvedOptions,
) -> Result<Completion, ProviderError> {
    let response = ChatCompletionResponse::deserialize(body)
        .map_err(|_| invalid_response(vendor, "is not a chat completion"))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| invalid_response(vendor, "has no choices"))?;
    let usage = response.usage.unwrap_or_default();

    Ok(Completion {
        text: choice.message.content.unwrap_or_default(),
        model: response.model.unwrap_or_else(|| options.model.clone()),
        usage: UsageMeta {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        },
        finish_reason: choice.finish_reason,
    })
}

fn image_model(request: &ImageRequest) -> &str {
    non_blank(request.model.as_deref()).unwrap_or(DEFAULT_IMAGE_MODEL)
}

/// Check model, size, quality and count against what DALL-E accepts.
fn validate_image(request: &ImageRequest) -> Result<(&str, &str), ProviderError> {
    let model = image_model(request);
    let sizes = match model {
        "dall-e-2" => DALL_E_2_SIZES,
        "dall-e-3" => DALL_E_3_SIZES,
        other => {
            return Err(ProviderError::validation(format!(
                "unsupported image model '{other}' (expected dall-e-2 or dall-e-3)"
            )));
        }
    };

    let size = non_blank(request.size.as_deref()).unwrap_or(DEFAULT_IMAGE_SIZE);
    if !sizes.contains(&size) {
        return Err(ProviderError::validation(format!(
            "size '{size}' is not supported by {model} (expected one of {})",
            sizes.join(", ")
        )));
    }

    if request.quality == ImageQuality::Hd && model != "dall-e-3" {
        return Err(ProviderError::validation(format!(
            "quality 'hd' is only supported by dall-e-3, not {model}"
        )));
    }

    let max_images = if model == "dall-e-3" { 1 } else { DALL_E_2_MAX_IMAGES };
    if request.count == 0 || request.count > max_images {
        return Err(ProviderError::validation(format!(
            "{model} generates between 1 and {max_images} images per request, got {}",
            request.count
        )));
    }

    Ok((model, size))
}

fn pick<'a>(
    value: Option<&'a str>,
    default: &'a str,
    allowed: &[&str],
    what: &str,
) -> Result<&'a str, ProviderError> {
    let value = non_blank(value).unwrap_or(default);
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(ProviderError::validation(format!(
            "unsupported {what} '{value}' (expected one of {})",
            allowed.join(", ")
        )))
    }
}

fn clamp_speed(speed: Option<f64>) -> Result<f64, ProviderError> {
    match speed {
        None => Ok(1.0),
        Some(s) if s.is_nan() => Err(ProviderError::validation("speed must be a number")),
        Some(s) => Ok(s.clamp(MIN_SPEED, MAX_SPEED)),
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    /// Instruction, prompt, then `Style:` and `Modifiers:` lines, separated by
    /// blank lines.
    fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String {
        let mut blocks: Vec<String> = Vec::new();
        if let Some(instruction) = non_blank(context.system_instruction.as_deref()) {
            blocks.push(instruction.to_string());
        }
        blocks.push(prompt.to_string());
        if let Some(style) = non_blank(context.style.as_deref()) {
            blocks.push(format!("Style: {style}"));
        }
        if !context.modifiers.is_empty() {
            blocks.push(format!("Modifiers: {}", context.modifiers.join(", ")));
        }
        blocks.join("\n\n")
    }

    fn text_request(
        &self,
        prompt: &str,
        options: &ResolvedOptions,
    ) -> Result<GatewayRequest, ProviderError> {
        chat_request(
            VendorType::OpenAi,
            self.base.endpoint("chat/completions"),
            prompt,
            options,
        )
    }

    fn parse_text(&self, body: &Value, options: &ResolvedOptions) -> Result<Completion, ProviderError> {
        parse_chat_completion(VendorType::OpenAi, body, options)
    }

    fn image_request(&self, request: &ImageRequest) -> Result<GatewayRequest, ProviderError> {
        let (model, size) = validate_image(request)?;
        let body = encode_body(&ImageGenerationRequest {
            model,
            prompt: &request.prompt,
            n: request.count,
            size,
            quality: (model == "dall-e-3").then(|| match request.quality {
                ImageQuality::Standard => "standard",
                ImageQuality::Hd => "hd",
            }),
        })?;
        Ok(GatewayRequest::post(
            VendorType::OpenAi,
            "image",
            self.base.endpoint("images/generations"),
            AuthScheme::Bearer,
            body,
        ))
    }

    fn parse_image(
        &self,
        body: ResponseBody,
        request: &ImageRequest,
    ) -> Result<ImageOutput, ProviderError> {
        let ResponseBody::Json(value) = body else {
            return Err(invalid_response(VendorType::OpenAi, "is not JSON"));
        };
        let response = ImageGenerationResponse::deserialize(&value)
            .map_err(|_| invalid_response(VendorType::OpenAi, "is not an image result"))?;

        let revised_prompt = response.data.iter().find_map(|d| d.revised_prompt.clone());
        let images: Vec<String> = response
            .data
            .into_iter()
            .filter_map(|d| {
                d.url
                    .or_else(|| d.b64_json.map(|b64| format!("data:image/png;base64,{b64}")))
            })
            .collect();
        if images.is_empty() {
            return Err(invalid_response(VendorType::OpenAi, "contains no images"));
        }

        Ok(ImageOutput {
            images,
            model: image_model(request).to_string(),
            revised_prompt,
        })
    }

    fn voice_request(&self, request: &VoiceRequest) -> Result<GatewayRequest, ProviderError> {
        let model = pick(request.model.as_deref(), DEFAULT_VOICE_MODEL, VOICE_MODELS, "voice model")?;
        let voice = pick(request.voice.as_deref(), "alloy", VOICES, "voice")?;
        let format = pick(request.format.as_deref(), "mp3", AUDIO_FORMATS, "audio format")?;
        let speed = clamp_speed(request.speed)?;

        let body = encode_body(&SpeechRequest {
            model,
            input: &request.text,
            voice,
            response_format: format,
            speed,
        })?;
        Ok(GatewayRequest::post(
            VendorType::OpenAi,
            "voice",
            self.base.endpoint("audio/speech"),
            AuthScheme::Bearer,
            body,
        ))
    }

    fn parse_voice(
        &self,
        body: ResponseBody,
        request: &VoiceRequest,
    ) -> Result<VoiceOutput, ProviderError> {
        match body {
            ResponseBody::Binary { data, .. } if !data.is_empty() => Ok(VoiceOutput {
                audio: data,
                format: non_blank(request.format.as_deref()).unwrap_or("mp3").to_string(),
                model: non_blank(request.model.as_deref())
                    .unwrap_or(DEFAULT_VOICE_MODEL)
                    .to_string(),
            }),
            _ => Err(invalid_response(VendorType::OpenAi, "contains no audio")),
        }
    }
}
