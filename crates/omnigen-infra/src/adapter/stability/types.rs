//! Stability AI v1 text-to-image wire types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct TextToImageRequest<'a> {
    pub text_prompts: Vec<TextPrompt<'a>>,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub samples: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPrompt<'a> {
    pub text: &'a str,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextToImageResponse {
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub base64: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}
