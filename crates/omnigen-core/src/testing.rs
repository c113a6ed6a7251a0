//! Test doubles shared by the core unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::time::Instant;

use omnigen_types::config::ResilienceConfig;
use omnigen_types::error::ProviderError;
use omnigen_types::provider::{
    AdapterConfig, AdapterIdentity, Capabilities, Category, Completion, KeyKind, ResolvedOptions,
    UsageMeta, VendorType,
};

use crate::credential::{KeyResolver, KeyResolverError};
use crate::gateway::{
    AuthScheme, GatewayError, GatewayRequest, GatewayResponse, NetworkGateway,
};
use crate::provider::adapter::ProviderAdapter;
use crate::provider::base::AdapterBase;

pub struct MockResolver {
    key: Option<String>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockResolver {
    pub fn with_key(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            key: None,
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::empty()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeyResolver for MockResolver {
    async fn resolve(
        &self,
        _vendor: VendorType,
        _kind: KeyKind,
    ) -> Result<Option<SecretString>, KeyResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(KeyResolverError::Lookup(message.clone()));
        }
        Ok(self.key.as_deref().map(|k| SecretString::from(k.to_string())))
    }
}

/// Scripted gateway. Replays queued outcomes in order, then answers 200 with a
/// canned completion. Records every request and the instant it was sent.
pub struct MockGateway {
    script: Mutex<VecDeque<Result<GatewayResponse, GatewayError>>>,
    requests: Mutex<Vec<GatewayRequest>>,
    stamps: Mutex<Vec<Instant>>,
    delay: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            stamps: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, response: GatewayResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: GatewayError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.stamps.lock().unwrap().clone()
    }
}

impl NetworkGateway for MockGateway {
    async fn send(
        &self,
        request: &GatewayRequest,
        _credential: &SecretString,
    ) -> Result<GatewayResponse, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        self.stamps.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(GatewayResponse::json(
                200,
                json!({"output": "ok", "tokens": 2}),
            ))
        })
    }
}

fn mock_resilience() -> ResilienceConfig {
    ResilienceConfig {
        max_retries: 3,
        retry_delay_ms: 1_000,
        rate_limit_interval_ms: 100,
    }
}

fn mock_base(
    id: &str,
    category: Category,
    capabilities: Capabilities,
    resolver: Arc<MockResolver>,
    gateway: Arc<MockGateway>,
) -> AdapterBase {
    AdapterBase::new(
        AdapterIdentity {
            id: id.to_string(),
            name: format!("Mock {id}"),
            vendor: VendorType::OpenAi,
            category,
        },
        capabilities,
        AdapterConfig {
            model: "mock-model".to_string(),
            base_url: "https://mock.invalid/v1/".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            timeout_ms: None,
        },
        &mock_resilience(),
        resolver,
        gateway,
    )
}

pub fn test_base(resolver: Arc<MockResolver>, gateway: Arc<MockGateway>) -> AdapterBase {
    mock_base(
        "mock",
        Category::Chat,
        Capabilities {
            chat: true,
            rag: true,
            ..Default::default()
        },
        resolver,
        gateway,
    )
}

pub fn test_request() -> GatewayRequest {
    GatewayRequest::post(
        VendorType::OpenAi,
        "chat",
        "https://mock.invalid/v1/chat",
        AuthScheme::Bearer,
        json!({}),
    )
}

/// Minimal adapter with a made-up wire format:
/// `{model, prompt, temperature, max_tokens}` -> `{output, tokens}`.
pub struct MockAdapter {
    base: AdapterBase,
}

impl MockAdapter {
    pub fn chat(resolver: Arc<MockResolver>, gateway: Arc<MockGateway>) -> Self {
        Self::with_id("mock", resolver, gateway)
    }

    pub fn with_id(id: &str, resolver: Arc<MockResolver>, gateway: Arc<MockGateway>) -> Self {
        let capabilities = Capabilities {
            chat: true,
            dev: true,
            rag: true,
            ..Default::default()
        };
        Self {
            base: mock_base(id, Category::Chat, capabilities, resolver, gateway),
        }
    }

    pub fn image_only(resolver: Arc<MockResolver>, gateway: Arc<MockGateway>) -> Self {
        let capabilities = Capabilities {
            image: true,
            ..Default::default()
        };
        Self {
            base: mock_base("mock-image", Category::Image, capabilities, resolver, gateway),
        }
    }
}

impl ProviderAdapter for MockAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn text_request(
        &self,
        prompt: &str,
        options: &ResolvedOptions,
    ) -> Result<GatewayRequest, ProviderError> {
        Ok(GatewayRequest::post(
            VendorType::OpenAi,
            "chat",
            self.base.endpoint("chat"),
            AuthScheme::Bearer,
            json!({
                "model": options.model,
                "prompt": prompt,
                "temperature": options.temperature,
                "max_tokens": options.max_tokens,
            }),
        ))
    }

    fn parse_text(&self, body: &Value, options: &ResolvedOptions) -> Result<Completion, ProviderError> {
        let text = body
            .get("output")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::vendor("invalid_response", "missing output"))?;
        let tokens = body.get("tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
        Ok(Completion {
            text: text.to_string(),
            model: options.model.clone(),
            usage: UsageMeta {
                input_tokens: 0,
                output_tokens: tokens,
            },
            finish_reason: None,
        })
    }

    fn code_model(&self) -> Option<&str> {
        Some("mock-coder")
    }

    fn probe_request(&self) -> Option<GatewayRequest> {
        Some(GatewayRequest::get(
            VendorType::OpenAi,
            "probe",
            self.base.endpoint("account"),
            AuthScheme::Bearer,
        ))
    }
}
