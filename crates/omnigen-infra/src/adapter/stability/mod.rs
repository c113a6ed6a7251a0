//! Stability AI adapter: image generation only.
//!
//! Has no text endpoint, so connectivity is checked with an authenticated
//! `GET /v1/user/account` instead of a short generation.

pub mod types;

use serde::Deserialize;

use omnigen_core::gateway::{AuthScheme, GatewayRequest, ResponseBody};
use omnigen_core::provider::adapter::ProviderAdapter;
use omnigen_core::provider::base::AdapterBase;
use omnigen_types::config::{AdapterSettings, ResilienceConfig};
use omnigen_types::error::ProviderError;
use omnigen_types::provider::{
    Capabilities, Category, GenerationContext, ImageOutput, ImageQuality, ImageRequest, VendorType,
};

use self::types::{TextPrompt, TextToImageRequest, TextToImageResponse};
use super::{
    AdapterContext, AdapterDefaults, build_base, encode_body, invalid_response, non_blank,
    parse_size,
};

pub(crate) const DEFAULTS: AdapterDefaults = AdapterDefaults {
    id: "stability",
    name: "Stability AI",
    vendor: VendorType::Stability,
    category: Category::Image,
    model: SDXL,
    base_url: "https://api.stability.ai",
};

const SDXL: &str = "stable-diffusion-xl-1024-v1-0";
const SD_V1_6: &str = "stable-diffusion-v1-6";

/// The resolutions SDXL was trained on; anything else is rejected upstream.
const SDXL_SIZES: &[(u32, u32)] = &[
    (1024, 1024),
    (1152, 896),
    (896, 1152),
    (1216, 832),
    (832, 1216),
    (1344, 768),
    (768, 1344),
    (1536, 640),
    (640, 1536),
];
const V1_6_MIN_SIDE: u32 = 320;
const V1_6_MAX_SIDE: u32 = 1536;
const V1_6_SIDE_STEP: u32 = 64;

const STANDARD_STEPS: u32 = 30;
const HD_STEPS: u32 = 50;
const CFG_SCALE: f64 = 7.0;
const MAX_SAMPLES: u32 = 10;

pub struct StabilityAdapter {
    base: AdapterBase,
}

struct ImageCall<'a> {
    engine: &'a str,
    width: u32,
    height: u32,
    steps: u32,
}

impl StabilityAdapter {
    pub fn new(ctx: &AdapterContext, settings: &AdapterSettings, resilience: &ResilienceConfig) -> Self {
        let capabilities = Capabilities {
            image: true,
            ..Default::default()
        };
        Self {
            base: build_base(ctx, &DEFAULTS, capabilities, settings, resilience),
        }
    }

    fn engine<'a>(&'a self, request: &'a ImageRequest) -> &'a str {
        non_blank(request.model.as_deref()).unwrap_or(self.base.config().model.as_str())
    }

    fn validate<'a>(&'a self, request: &'a ImageRequest) -> Result<ImageCall<'a>, ProviderError> {
        let engine = self.engine(request);
        let (width, height) = match non_blank(request.size.as_deref()) {
            Some(size) => parse_size(size).ok_or_else(|| {
                ProviderError::validation(format!("size '{size}' is not WIDTHxHEIGHT"))
            })?,
            None if engine == SD_V1_6 => (512, 512),
            None => (1024, 1024),
        };

        match engine {
            SDXL => {
                if !SDXL_SIZES.contains(&(width, height)) {
                    let allowed: Vec<String> =
                        SDXL_SIZES.iter().map(|(w, h)| format!("{w}x{h}")).collect();
                    return Err(ProviderError::validation(format!(
                        "size {width}x{height} is not supported by {engine} (expected one of {})",
                        allowed.join(", ")
                    )));
                }
            }
            SD_V1_6 => {
                let valid = |side: u32| {
                    (V1_6_MIN_SIDE..=V1_6_MAX_SIDE).contains(&side) && side % V1_6_SIDE_STEP == 0
                };
                if !valid(width) || !valid(height) {
                    return Err(ProviderError::validation(format!(
                        "{engine} needs width and height between {V1_6_MIN_SIDE} and \
                         {V1_6_MAX_SIDE} in steps of {V1_6_SIDE_STEP}, got {width}x{height}"
                    )));
                }
            }
            other => {
                return Err(ProviderError::validation(format!(
                    "unsupported engine '{other}' (expected {SDXL} or {SD_V1_6})"
                )));
            }
        }

        if request.count == 0 || request.count > MAX_SAMPLES {
            return Err(ProviderError::validation(format!(
                "{engine} generates between 1 and {MAX_SAMPLES} images per request, got {}",
                request.count
            )));
        }

        let steps = match request.quality {
            ImageQuality::Standard => STANDARD_STEPS,
            ImageQuality::Hd => HD_STEPS,
        };
        Ok(ImageCall {
            engine,
            width,
            height,
            steps,
        })
    }
}

impl ProviderAdapter for StabilityAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    /// Diffusion prompts are comma-separated descriptors.
    fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String {
        let mut parts = vec![prompt.trim()];
        if let Some(style) = non_blank(context.style.as_deref()) {
            parts.push(style);
        }
        parts.extend(context.modifiers.iter().map(|m| m.trim()).filter(|m| !m.is_empty()));
        parts.join(", ")
    }

    fn image_request(&self, request: &ImageRequest) -> Result<GatewayRequest, ProviderError> {
        let call = self.validate(request)?;
        let body = encode_body(&TextToImageRequest {
            text_prompts: vec![TextPrompt {
                text: &request.prompt,
                weight: 1.0,
            }],
            cfg_scale: CFG_SCALE,
            width: call.width,
            height: call.height,
            steps: call.steps,
            samples: request.count,
        })?;
        let path = format!("v1/generation/{}/text-to-image", call.engine);
        Ok(GatewayRequest::post(
            VendorType::Stability,
            "image",
            self.base.endpoint(&path),
            AuthScheme::Bearer,
            body,
        )
        .with_header("accept", "application/json"))
    }

    fn parse_image(
        &self,
        body: ResponseBody,
        request: &ImageRequest,
    ) -> Result<ImageOutput, ProviderError> {
        let ResponseBody::Json(value) = body else {
            return Err(invalid_response(VendorType::Stability, "is not JSON"));
        };
        let response = TextToImageResponse::deserialize(&value)
            .map_err(|_| invalid_response(VendorType::Stability, "has no artifacts list"))?;

        let images: Vec<String> = response
            .artifacts
            .into_iter()
            .filter(|a| a.finish_reason.as_deref() != Some("ERROR"))
            .filter_map(|a| a.base64)
            .map(|b64| format!("data:image/png;base64,{b64}"))
            .collect();
        if images.is_empty() {
            return Err(invalid_response(VendorType::Stability, "contains no images"));
        }

        Ok(ImageOutput {
            images,
            model: self.engine(request).to_string(),
            revised_prompt: None,
        })
    }

    fn probe_request(&self) -> Option<GatewayRequest> {
        Some(GatewayRequest::get(
            VendorType::Stability,
            "probe",
            self.base.endpoint("v1/user/account"),
            AuthScheme::Bearer,
        ))
    }
}
