//! ProviderAdapter trait definition.
//!
//! Vendors implement the synchronous wire-mapping hooks (`text_request`,
//! `parse_text`, and optionally image/voice/code/probe). The async operations
//! callers use (`generate_text`, `generate_image`, ...) are provided methods
//! that run every vendor through the same pipeline: capability gate,
//! validation, dispatch through `AdapterBase`, parse, usage tracking.
//!
//! Uses native async fn in traits (RPITIT). For runtime selection wrap
//! adapters in [`BoxProviderAdapter`](super::box_adapter::BoxProviderAdapter).

use std::future::Future;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use omnigen_types::error::ProviderError;
use omnigen_types::guards;
use omnigen_types::provider::{
    AdapterIdentity, AdapterStatus, AdapterStatusInfo, Capabilities, Capability, CodeRequest,
    Completion, Document, GenerationContext, GenerationOptions, ImageOutput, ImageRequest,
    ResolvedOptions, UsageMeta, UsageMetrics, VoiceOutput, VoiceRequest,
};

use super::base::{AdapterBase, normalized_completion};
use super::prompt;
use crate::gateway::{GatewayRequest, ResponseBody};
use crate::validation;

/// Trait for vendor adapters (OpenAI, Anthropic, ...).
pub trait ProviderAdapter: Send + Sync {
    /// Shared state: identity, config, credential, limiter, status, usage.
    fn base(&self) -> &AdapterBase;

    fn identity(&self) -> &AdapterIdentity {
        self.base().identity()
    }

    fn capabilities(&self) -> &Capabilities {
        self.base().capabilities()
    }

    /// Apply the vendor's prompt convention to a prompt and its context.
    fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String {
        prompt::default_enhance_prompt(prompt, context)
    }

    /// Inject retrieved documents ahead of the question. Must return `query`
    /// unchanged when `documents` is empty.
    fn prepare_rag_context(&self, documents: &[Document], query: &str) -> String {
        prompt::default_rag_context(documents, query)
    }

    /// Build the vendor request for text generation.
    fn text_request(
        &self,
        prompt: &str,
        options: &ResolvedOptions,
    ) -> Result<GatewayRequest, ProviderError> {
        let _ = (prompt, options);
        Err(ProviderError::unsupported(
            &self.identity().id,
            &Capability::Chat.to_string(),
        ))
    }

    /// Read the vendor's text response.
    fn parse_text(&self, body: &Value, options: &ResolvedOptions) -> Result<Completion, ProviderError> {
        let _ = (body, options);
        Err(ProviderError::unsupported(
            &self.identity().id,
            &Capability::Chat.to_string(),
        ))
    }

    /// Validate an image request and build the vendor call. Invalid
    /// model/size/quality combinations fail here, before any I/O.
    fn image_request(&self, request: &ImageRequest) -> Result<GatewayRequest, ProviderError> {
        let _ = request;
        Err(ProviderError::unsupported(
            &self.identity().id,
            &Capability::Image.to_string(),
        ))
    }

    fn parse_image(
        &self,
        body: ResponseBody,
        request: &ImageRequest,
    ) -> Result<ImageOutput, ProviderError> {
        let _ = (body, request);
        Err(ProviderError::unsupported(
            &self.identity().id,
            &Capability::Image.to_string(),
        ))
    }

    fn voice_request(&self, request: &VoiceRequest) -> Result<GatewayRequest, ProviderError> {
        let _ = request;
        Err(ProviderError::unsupported(
            &self.identity().id,
            &Capability::Voice.to_string(),
        ))
    }

    fn parse_voice(
        &self,
        body: ResponseBody,
        request: &VoiceRequest,
    ) -> Result<VoiceOutput, ProviderError> {
        let _ = (body, request);
        Err(ProviderError::unsupported(
            &self.identity().id,
            &Capability::Voice.to_string(),
        ))
    }

    fn code_prompt(&self, request: &CodeRequest) -> String {
        prompt::default_code_prompt(request)
    }

    /// Model used for code generation when the caller does not pick one.
    fn code_model(&self) -> Option<&str> {
        None
    }

    /// Cheap authenticated request used to check connectivity on adapters
    /// without text generation.
    fn probe_request(&self) -> Option<GatewayRequest> {
        None
    }

    fn status(&self) -> AdapterStatus {
        self.base().status()
    }

    fn usage(&self) -> UsageMetrics {
        self.base().usage()
    }

    fn status_info(&self) -> AdapterStatusInfo {
        self.base().status_info()
    }

    fn track_usage(&self, operation: &str, tokens: u64, cost: f64) {
        self.base().track_usage(operation, tokens, cost);
    }

    /// Resolve the credential up front.
    ///
    /// A failure leaves the adapter usable: the next call re-attempts the fetch.
    fn initialize(&self) -> impl Future<Output = Result<(), ProviderError>> + Send {
        async move { self.base().credential().await.map(|_| ()) }
    }

    fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send {
        async move {
            if !self.capabilities().chat {
                return Err(ProviderError::unsupported(
                    &self.identity().id,
                    &Capability::Chat.to_string(),
                ));
            }
            run_completion(self, "chat", prompt, options, cancel).await
        }
    }

    fn generate_code(
        &self,
        request: &CodeRequest,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        async move {
            if !self.capabilities().dev {
                return Err(ProviderError::unsupported(
                    &self.identity().id,
                    &Capability::Dev.to_string(),
                ));
            }
            validation::validate_prompt(&request.instruction)?;

            let code_prompt = self.code_prompt(request);
            let mut options = options.clone();
            if options.model.is_none() {
                options.model = self.code_model().map(str::to_string);
            }
            let completion = run_completion(self, "code", &code_prompt, &options, cancel).await?;
            Ok(prompt::strip_code_fence(&completion.text))
        }
    }

    fn generate_image(
        &self,
        request: &ImageRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ImageOutput, ProviderError>> + Send {
        async move {
            let base = self.base();
            if !self.capabilities().image {
                return Err(ProviderError::unsupported(
                    &self.identity().id,
                    &Capability::Image.to_string(),
                ));
            }
            validation::validate_prompt(&request.prompt)?;
            let call = self.image_request(request)?;

            let span = tracing::info_span!(
                "gen_ai.image",
                gen_ai.system = %self.identity().vendor,
                gen_ai.request.model = request.model.as_deref().unwrap_or_default(),
                adapter = %self.identity().id,
                image.count = request.count,
            );
            async {
                let body = base.dispatch(&call, cancel, base.config().timeout_ms).await?;
                let output = self
                    .parse_image(body, request)
                    .inspect_err(|err| base.status_tracker().record_invalid_response(err))?;
                let items = u32::try_from(output.images.len()).unwrap_or(u32::MAX);
                base.track_usage("image", 0, base.item_cost(&output.model, items));
                Ok::<_, ProviderError>(output)
            }
            .instrument(span)
            .await
        }
    }

    fn generate_voice(
        &self,
        request: &VoiceRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<VoiceOutput, ProviderError>> + Send {
        async move {
            let base = self.base();
            if !self.capabilities().voice {
                return Err(ProviderError::unsupported(
                    &self.identity().id,
                    &Capability::Voice.to_string(),
                ));
            }
            validation::validate_prompt(&request.text)?;
            let call = self.voice_request(request)?;

            let span = tracing::info_span!(
                "gen_ai.voice",
                gen_ai.system = %self.identity().vendor,
                adapter = %self.identity().id,
                voice.characters = request.text.chars().count(),
            );
            async {
                let body = base.dispatch(&call, cancel, base.config().timeout_ms).await?;
                let output = self
                    .parse_voice(body, request)
                    .inspect_err(|err| base.status_tracker().record_invalid_response(err))?;
                // Speech is priced per character, billed as input tokens.
                let characters = u32::try_from(request.text.chars().count()).unwrap_or(u32::MAX);
                let usage = UsageMeta {
                    input_tokens: characters,
                    output_tokens: 0,
                };
                base.track_usage("voice", 0, base.token_cost(&output.model, &usage));
                Ok::<_, ProviderError>(output)
            }
            .instrument(span)
            .await
        }
    }

    /// One real round trip: a short text generation on chat adapters, the
    /// vendor probe otherwise. The outcome lands in `status()`.
    fn test_connection(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        async move {
            if self.capabilities().chat {
                let options = GenerationOptions::default().with_max_tokens(10);
                return self.generate_text("Hello", &options, cancel).await.map(|_| ());
            }
            match self.probe_request() {
                Some(call) => {
                    let base = self.base();
                    base.dispatch(&call, cancel, base.config().timeout_ms)
                        .await
                        .map(|_| ())
                }
                None => Err(ProviderError::unsupported(
                    &self.identity().id,
                    "connection testing",
                )),
            }
        }
    }
}

/// The text pipeline shared by chat and code generation.
async fn run_completion<A: ProviderAdapter + ?Sized>(
    adapter: &A,
    operation: &'static str,
    prompt: &str,
    options: &GenerationOptions,
    cancel: &CancellationToken,
) -> Result<Completion, ProviderError> {
    let base = adapter.base();
    validation::validate_prompt(prompt)?;
    let resolved = validation::resolve_options(options, base.config())?;
    let call = adapter.text_request(prompt, &resolved)?;

    let span = tracing::info_span!(
        "gen_ai.complete",
        gen_ai.operation.name = operation,
        gen_ai.system = %base.identity().vendor,
        gen_ai.request.model = %resolved.model,
        gen_ai.request.temperature = resolved.temperature,
        gen_ai.request.max_tokens = resolved.max_tokens,
        adapter = %base.id(),
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
    );

    async {
        let body = base.dispatch(&call, cancel, resolved.timeout_ms).await?;
        let completion = read_completion(adapter, body, &resolved)
            .inspect_err(|err| base.status_tracker().record_invalid_response(err))?;

        let span = tracing::Span::current();
        span.record("gen_ai.usage.input_tokens", completion.usage.input_tokens);
        span.record("gen_ai.usage.output_tokens", completion.usage.output_tokens);

        base.track_usage(
            operation,
            completion.usage.total(),
            base.token_cost(&completion.model, &completion.usage),
        );
        Ok::<_, ProviderError>(completion)
    }
    .instrument(span)
    .await
}

fn read_completion<A: ProviderAdapter + ?Sized>(
    adapter: &A,
    body: ResponseBody,
    resolved: &ResolvedOptions,
) -> Result<Completion, ProviderError> {
    match body {
        ResponseBody::Json(value) if guards::is_provider_response(&value) => {
            Ok(normalized_completion(&value, &resolved.model))
        }
        ResponseBody::Json(value) => adapter.parse_text(&value, resolved),
        _ => Err(ProviderError::vendor(
            "invalid_response",
            "expected a JSON body from a text generation call",
        )
        .permanent()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use omnigen_types::error::ProviderErrorCode;
    use omnigen_types::provider::AdapterState;
    use serde_json::json;
    use tokio::time::Instant;

    use crate::gateway::{GatewayError, GatewayResponse};
    use crate::testing::{MockAdapter, MockGateway, MockResolver};

    fn chat_adapter(gateway: Arc<MockGateway>) -> MockAdapter {
        MockAdapter::chat(Arc::new(MockResolver::with_key("k")), gateway)
    }

    #[tokio::test]
    async fn test_generate_text_happy_path() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push(GatewayResponse::json(200, json!({"output": "hello there", "tokens": 12})));
        let adapter = chat_adapter(gateway.clone());

        let completion = adapter
            .generate_text("hi", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(completion.text, "hello there");
        assert_eq!(adapter.usage().tokens_used, 12);
        assert_eq!(adapter.usage().request_count, 1);
        assert_eq!(adapter.status().state, AdapterState::Ready);
    }

    #[tokio::test]
    async fn test_options_are_clamped_before_dispatch() {
        let gateway = Arc::new(MockGateway::new());
        let adapter = chat_adapter(gateway.clone());
        let options = GenerationOptions::default()
            .with_temperature(-0.5)
            .with_max_tokens(-3);

        adapter
            .generate_text("hi", &options, &CancellationToken::new())
            .await
            .unwrap();
        let body = gateway.requests()[0].body.clone().unwrap();
        assert_eq!(body["temperature"], json!(0.0));
        assert_eq!(body["max_tokens"], json!(1));
    }

    #[tokio::test]
    async fn test_empty_prompt_never_reaches_network() {
        let gateway = Arc::new(MockGateway::new());
        let adapter = chat_adapter(gateway.clone());
        let err = adapter
            .generate_text("  ", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::ValidationError);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_image_without_capability_rejects_without_io() {
        let gateway = Arc::new(MockGateway::new());
        let resolver = Arc::new(MockResolver::with_key("k"));
        let adapter = MockAdapter::chat(resolver.clone(), gateway.clone());

        let err = adapter
            .generate_image(&ImageRequest::new("a fox"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::UnsupportedOperation);
        assert_eq!(gateway.calls(), 0);
        assert_eq!(resolver.calls(), 0);

        let err = adapter
            .generate_voice(
                &VoiceRequest {
                    text: "hi".into(),
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::UnsupportedOperation);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_flag_gates_generate_text() {
        let gateway = Arc::new(MockGateway::new());
        let adapter = MockAdapter::image_only(Arc::new(MockResolver::with_key("k")), gateway.clone());
        let err = adapter
            .generate_text("hi", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::UnsupportedOperation);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_retry_tracks_usage_once() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_error(GatewayError::Timeout);
        gateway.push(GatewayResponse::json(502, json!({})));
        gateway.push(GatewayResponse::json(200, json!({"output": "third time", "tokens": 4})));
        let adapter = chat_adapter(gateway.clone());

        let completion = adapter
            .generate_text("hi", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(completion.text, "third time");
        assert_eq!(gateway.calls(), 3);
        assert_eq!(adapter.usage().request_count, 1);
        assert_eq!(adapter.usage().tokens_used, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_on_every_attempt_records_no_usage() {
        let gateway = Arc::new(MockGateway::new());
        for _ in 0..3 {
            gateway.push(GatewayResponse::json(500, json!({"error": {"message": "nope"}})));
        }
        let adapter = chat_adapter(gateway.clone());

        let err = adapter
            .generate_text("hi", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::VendorError);
        assert_eq!(err.details.unwrap()["cause"]["message"], json!("nope"));
        assert_eq!(adapter.usage().request_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_is_not_retried_and_records_no_usage() {
        let gateway = Arc::new(MockGateway::new().delayed(Duration::from_secs(2)));
        let adapter = chat_adapter(gateway.clone());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = adapter
            .generate_text("hi", &GenerationOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::Cancelled);
        assert_eq!(gateway.calls(), 1);
        assert_eq!(adapter.usage().request_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_calls_respect_rate_limit() {
        let gateway = Arc::new(MockGateway::new());
        let adapter = chat_adapter(gateway.clone());
        let cancel = CancellationToken::new();

        adapter
            .generate_text("one", &GenerationOptions::default(), &cancel)
            .await
            .unwrap();
        adapter
            .generate_text("two", &GenerationOptions::default(), &cancel)
            .await
            .unwrap();

        let stamps = gateway.timestamps();
        assert!(stamps[1] - stamps[0] >= adapter.base().rate_limit_interval());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_respect_rate_limit() {
        let gateway = Arc::new(MockGateway::new());
        let adapter = Arc::new(chat_adapter(gateway.clone()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let adapter = Arc::clone(&adapter);
            handles.push(tokio::spawn(async move {
                adapter
                    .generate_text(&format!("q{i}"), &GenerationOptions::default(), &CancellationToken::new())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut stamps: Vec<Instant> = gateway.timestamps();
        stamps.sort();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= adapter.base().rate_limit_interval());
        }
        assert_eq!(adapter.usage().request_count, 4);
    }

    #[tokio::test]
    async fn test_normalized_gateway_response_is_accepted() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push(GatewayResponse::json(
            200,
            json!({"text": "from proxy", "usage": {"input_tokens": 2, "output_tokens": 3}}),
        ));
        let adapter = chat_adapter(gateway);
        let completion = adapter
            .generate_text("hi", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(completion.text, "from proxy");
        assert_eq!(adapter.usage().tokens_used, 5);
    }

    #[tokio::test]
    async fn test_generate_code_uses_code_model_and_strips_fence() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push(GatewayResponse::json(
            200,
            json!({"output": "```python\nprint('hi')\n```", "tokens": 9}),
        ));
        let adapter = chat_adapter(gateway.clone());
        let request = CodeRequest {
            instruction: "print hi".into(),
            language: Some("python".into()),
            snippet: None,
        };

        let code = adapter
            .generate_code(&request, &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(code, "print('hi')");
        let body = gateway.requests()[0].body.clone().unwrap();
        assert_eq!(body["model"], json!("mock-coder"));
        assert!(body["prompt"].as_str().unwrap().contains("Task: print hi"));
    }

    #[tokio::test]
    async fn test_missing_credential_surfaces_before_io() {
        let gateway = Arc::new(MockGateway::new());
        let adapter = MockAdapter::chat(Arc::new(MockResolver::empty()), gateway.clone());
        let err = adapter
            .generate_text("hi", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::CredentialMissing);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_initialize_moves_to_ready() {
        let adapter = chat_adapter(Arc::new(MockGateway::new()));
        assert_eq!(adapter.status().state, AdapterState::Uninitialized);
        adapter.initialize().await.unwrap();
        assert_eq!(adapter.status().state, AdapterState::Ready);
    }

    #[tokio::test]
    async fn test_connection_uses_probe_for_image_only_adapter() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push(GatewayResponse::json(200, json!({"id": "acct"})));
        let adapter = MockAdapter::image_only(Arc::new(MockResolver::with_key("k")), gateway.clone());

        adapter.test_connection(&CancellationToken::new()).await.unwrap();
        assert_eq!(gateway.requests()[0].operation, "probe");
        assert!(adapter.status().is_connected);
        assert_eq!(adapter.usage().request_count, 0);
    }

    #[tokio::test]
    async fn test_rag_empty_documents_is_identity() {
        let adapter = chat_adapter(Arc::new(MockGateway::new()));
        assert_eq!(adapter.prepare_rag_context(&[], "why?"), "why?");
    }
}
