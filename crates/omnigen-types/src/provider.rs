//! Provider adapter data model.
//!
//! These types describe an adapter (identity, capabilities, status, usage) and
//! the inputs/outputs of its operations: generation options and context,
//! RAG documents, image/code/voice requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Backend vendor behind an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorType {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    Mistral,
    Stability,
}

impl VendorType {
    pub const ALL: [VendorType; 5] = [
        VendorType::OpenAi,
        VendorType::Anthropic,
        VendorType::Gemini,
        VendorType::Mistral,
        VendorType::Stability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorType::OpenAi => "openai",
            VendorType::Anthropic => "anthropic",
            VendorType::Gemini => "gemini",
            VendorType::Mistral => "mistral",
            VendorType::Stability => "stability",
        }
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(VendorType::OpenAi),
            "anthropic" => Ok(VendorType::Anthropic),
            "gemini" => Ok(VendorType::Gemini),
            "mistral" => Ok(VendorType::Mistral),
            "stability" => Ok(VendorType::Stability),
            other => Err(format!("invalid vendor type: '{other}'")),
        }
    }
}

/// Primary use of an adapter, used for default-provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Chat,
    Image,
    Code,
    Voice,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Chat => write!(f, "chat"),
            Category::Image => write!(f, "image"),
            Category::Code => write!(f, "code"),
            Category::Voice => write!(f, "voice"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(Category::Chat),
            "image" => Ok(Category::Image),
            "code" => Ok(Category::Code),
            "voice" => Ok(Category::Voice),
            other => Err(format!("invalid category: '{other}'")),
        }
    }
}

/// Kind of credential requested from a key resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Chat,
    Image,
    Code,
    Voice,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Chat => write!(f, "chat"),
            KeyKind::Image => write!(f, "image"),
            KeyKind::Code => write!(f, "code"),
            KeyKind::Voice => write!(f, "voice"),
        }
    }
}

/// Who an adapter is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterIdentity {
    pub id: String,
    pub name: String,
    pub vendor: VendorType,
    pub category: Category,
}

/// A named operation an adapter may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Chat,
    Image,
    Dev,
    Voice,
    Streaming,
    Rag,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Chat => write!(f, "text generation"),
            Capability::Image => write!(f, "image generation"),
            Capability::Dev => write!(f, "code generation"),
            Capability::Voice => write!(f, "voice generation"),
            Capability::Streaming => write!(f, "streaming"),
            Capability::Rag => write!(f, "retrieval-augmented generation"),
        }
    }
}

/// Capability table checked before invoking any optional operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub chat: bool,
    pub image: bool,
    pub dev: bool,
    pub voice: bool,
    pub streaming: bool,
    pub rag: bool,
}

impl Capabilities {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Chat => self.chat,
            Capability::Image => self.image,
            Capability::Dev => self.dev,
            Capability::Voice => self.voice,
            Capability::Streaming => self.streaming,
            Capability::Rag => self.rag,
        }
    }
}

/// Caller-supplied generation options, before clamping.
///
/// `temperature` and `max_tokens` accept out-of-range values; they are clamped
/// (not rejected) during validation. Unknown fields are kept as vendor-specific
/// extensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    /// Deadline for the whole call, retries included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl GenerationOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Options after validation: every field is concrete and in range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOptions {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_ms: Option<u64>,
    pub extensions: Map<String, Value>,
}

/// Context fed into prompt enhancement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// Metadata attached to a retrieved document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// A retrieved document injected into a RAG prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }
}

/// Token usage reported by a vendor for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMeta {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl UsageMeta {
    pub fn total(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// Normalized text generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    #[serde(default)]
    pub usage: UsageMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Static per-adapter settings. The credential is held separately and
/// resolved lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Cumulative usage for an adapter. Every field only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub tokens_used: u64,
    pub cost: f64,
    pub request_count: u64,
    pub last_request_timestamp: Option<DateTime<Utc>>,
}

/// Lifecycle state of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Uninitialized,
    /// Credential fetch in flight.
    Initializing,
    Ready,
    /// Consecutive failures or vendor throttling.
    Degraded,
    Unavailable,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterState::Uninitialized => write!(f, "uninitialized"),
            AdapterState::Initializing => write!(f, "initializing"),
            AdapterState::Ready => write!(f, "ready"),
            AdapterState::Degraded => write!(f, "degraded"),
            AdapterState::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Point-in-time status of an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterStatus {
    pub state: AdapterState,
    pub is_connected: bool,
    pub last_connected: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub is_rate_limited: bool,
    pub rate_limit_reset_time: Option<DateTime<Utc>>,
}

impl Default for AdapterStatus {
    fn default() -> Self {
        Self {
            state: AdapterState::Uninitialized,
            is_connected: false,
            last_connected: None,
            error: None,
            is_rate_limited: false,
            rate_limit_reset_time: None,
        }
    }
}

/// Status record for dashboards and health endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterStatusInfo {
    pub id: String,
    pub vendor: VendorType,
    pub category: Category,
    /// One of "uninitialized", "initializing", "ready", "degraded", "unavailable".
    pub state: String,
    pub last_error: Option<String>,
    /// ISO 8601 timestamp of the last successful vendor call.
    pub last_connected: Option<String>,
    pub rate_limit_reset: Option<String>,
    pub request_count: u64,
    pub tokens_used: u64,
    pub cost: f64,
    /// Vendor attempts, retries included.
    pub total_calls: u64,
    pub total_failures: u64,
}

/// Quality tier for image generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageQuality::Standard => write!(f, "standard"),
            ImageQuality::Hd => write!(f, "hd"),
        }
    }
}

/// Image generation request. Unset fields fall back to vendor defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// `WIDTHxHEIGHT`, e.g. `1024x1024`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub quality: ImageQuality,
    #[serde(default = "default_image_count")]
    pub count: u32,
}

fn default_image_count() -> u32 {
    1
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            count: 1,
            ..Default::default()
        }
    }
}

/// Generated images, each either an `https://` URL or a `data:` URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOutput {
    pub images: Vec<String>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

impl ImageOutput {
    /// The first image, which is what single-image callers want.
    pub fn image_url(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Code generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeRequest {
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Existing code the instruction refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Text-to-speech request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Audio container, e.g. `mp3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Synthesized audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceOutput {
    pub audio: Vec<u8>,
    pub format: String,
    pub model: String,
}
