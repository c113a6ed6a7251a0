//! BoxProviderAdapter -- object-safe dynamic dispatch wrapper for ProviderAdapter.
//!
//! 1. Define an object-safe `ProviderAdapterDyn` trait with boxed futures
//! 2. Blanket-impl `ProviderAdapterDyn` for all `T: ProviderAdapter`
//! 3. `BoxProviderAdapter` wraps `Box<dyn ProviderAdapterDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use omnigen_types::error::ProviderError;
use omnigen_types::guards;
use omnigen_types::provider::{
    AdapterIdentity, AdapterStatus, AdapterStatusInfo, Capabilities, CodeRequest, Completion,
    Document, GenerationContext, GenerationOptions, ImageOutput, ImageRequest, UsageMetrics,
    VoiceOutput, VoiceRequest,
};

use super::adapter::ProviderAdapter;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Object-safe version of [`ProviderAdapter`] with boxed futures.
///
/// A blanket implementation is provided for all types implementing
/// `ProviderAdapter`.
pub trait ProviderAdapterDyn: Send + Sync {
    fn identity(&self) -> &AdapterIdentity;

    fn capabilities(&self) -> &Capabilities;

    fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String;

    fn prepare_rag_context(&self, documents: &[Document], query: &str) -> String;

    fn status(&self) -> AdapterStatus;

    fn usage(&self) -> UsageMetrics;

    fn status_info(&self) -> AdapterStatusInfo;

    fn initialize_boxed(&self) -> BoxFuture<'_, ()>;

    fn generate_text_boxed<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerationOptions,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Completion>;

    fn generate_code_boxed<'a>(
        &'a self,
        request: &'a CodeRequest,
        options: &'a GenerationOptions,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, String>;

    fn generate_image_boxed<'a>(
        &'a self,
        request: &'a ImageRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ImageOutput>;

    fn generate_voice_boxed<'a>(
        &'a self,
        request: &'a VoiceRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, VoiceOutput>;

    fn test_connection_boxed<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, ()>;
}

/// Blanket implementation: any `ProviderAdapter` automatically implements `ProviderAdapterDyn`.
impl<T: ProviderAdapter> ProviderAdapterDyn for T {
    fn identity(&self) -> &AdapterIdentity {
        ProviderAdapter::identity(self)
    }

    fn capabilities(&self) -> &Capabilities {
        ProviderAdapter::capabilities(self)
    }

    fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String {
        ProviderAdapter::enhance_prompt(self, prompt, context)
    }

    fn prepare_rag_context(&self, documents: &[Document], query: &str) -> String {
        ProviderAdapter::prepare_rag_context(self, documents, query)
    }

    fn status(&self) -> AdapterStatus {
        ProviderAdapter::status(self)
    }

    fn usage(&self) -> UsageMetrics {
        ProviderAdapter::usage(self)
    }

    fn status_info(&self) -> AdapterStatusInfo {
        ProviderAdapter::status_info(self)
    }

    fn initialize_boxed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.initialize())
    }

    fn generate_text_boxed<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerationOptions,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Completion> {
        Box::pin(self.generate_text(prompt, options, cancel))
    }

    fn generate_code_boxed<'a>(
        &'a self,
        request: &'a CodeRequest,
        options: &'a GenerationOptions,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, String> {
        Box::pin(self.generate_code(request, options, cancel))
    }

    fn generate_image_boxed<'a>(
        &'a self,
        request: &'a ImageRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ImageOutput> {
        Box::pin(self.generate_image(request, cancel))
    }

    fn generate_voice_boxed<'a>(
        &'a self,
        request: &'a VoiceRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, VoiceOutput> {
        Box::pin(self.generate_voice(request, cancel))
    }

    fn test_connection_boxed<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, ()> {
        Box::pin(self.test_connection(cancel))
    }
}

/// Type-erased adapter for runtime selection.
///
/// Since `ProviderAdapter` uses RPITIT it cannot be a trait object directly;
/// this wrapper exposes the same operations through `ProviderAdapterDyn`.
/// The `*_json` variants accept untyped payloads and run them through the
/// validation guards first.
pub struct BoxProviderAdapter {
    inner: Box<dyn ProviderAdapterDyn + Send + Sync>,
}

impl BoxProviderAdapter {
    pub fn new<T: ProviderAdapter + 'static>(adapter: T) -> Self {
        Self {
            inner: Box::new(adapter),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.identity().id
    }

    pub fn identity(&self) -> &AdapterIdentity {
        self.inner.identity()
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.inner.capabilities()
    }

    pub fn enhance_prompt(&self, prompt: &str, context: &GenerationContext) -> String {
        self.inner.enhance_prompt(prompt, context)
    }

    pub fn prepare_rag_context(&self, documents: &[Document], query: &str) -> String {
        self.inner.prepare_rag_context(documents, query)
    }

    pub fn status(&self) -> AdapterStatus {
        self.inner.status()
    }

    pub fn usage(&self) -> UsageMetrics {
        self.inner.usage()
    }

    pub fn status_info(&self) -> AdapterStatusInfo {
        self.inner.status_info()
    }

    pub async fn initialize(&self) -> Result<(), ProviderError> {
        self.inner.initialize_boxed().await
    }

    pub async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<Completion, ProviderError> {
        self.inner.generate_text_boxed(prompt, options, cancel).await
    }

    pub async fn generate_code(
        &self,
        request: &CodeRequest,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        self.inner.generate_code_boxed(request, options, cancel).await
    }

    pub async fn generate_image(
        &self,
        request: &ImageRequest,
        cancel: &CancellationToken,
    ) -> Result<ImageOutput, ProviderError> {
        self.inner.generate_image_boxed(request, cancel).await
    }

    pub async fn generate_voice(
        &self,
        request: &VoiceRequest,
        cancel: &CancellationToken,
    ) -> Result<VoiceOutput, ProviderError> {
        self.inner.generate_voice_boxed(request, cancel).await
    }

    pub async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        self.inner.test_connection_boxed(cancel).await
    }

    /// `generate_text` with options given as raw JSON.
    pub async fn generate_text_json(
        &self,
        prompt: &str,
        options: &Value,
        cancel: &CancellationToken,
    ) -> Result<Completion, ProviderError> {
        let options = guards::parse_generation_options(options)?;
        self.generate_text(prompt, &options, cancel).await
    }

    /// `enhance_prompt` with the context given as raw JSON.
    pub fn enhance_prompt_json(&self, prompt: &str, context: &Value) -> Result<String, ProviderError> {
        let context = guards::parse_generation_context(context)?;
        Ok(self.enhance_prompt(prompt, &context))
    }

    /// `prepare_rag_context` with documents given as a raw JSON array.
    pub fn prepare_rag_context_json(
        &self,
        documents: &Value,
        query: &str,
    ) -> Result<String, ProviderError> {
        let documents = guards::parse_documents(documents)?;
        Ok(self.prepare_rag_context(&documents, query))
    }
}

impl std::fmt::Debug for BoxProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxProviderAdapter")
            .field("id", &self.id())
            .field("vendor", &self.identity().vendor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use omnigen_types::error::ProviderErrorCode;
    use serde_json::json;

    use crate::testing::{MockAdapter, MockGateway, MockResolver};

    fn boxed(gateway: Arc<MockGateway>) -> BoxProviderAdapter {
        BoxProviderAdapter::new(MockAdapter::chat(Arc::new(MockResolver::with_key("k")), gateway))
    }

    #[tokio::test]
    async fn test_box_delegates_generation() {
        let gateway = Arc::new(MockGateway::new());
        let adapter = boxed(gateway.clone());
        assert_eq!(adapter.id(), "mock");
        assert!(adapter.capabilities().chat);

        let completion = adapter
            .generate_text("hi", &GenerationOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(completion.text, "ok");
        assert_eq!(adapter.usage().request_count, 1);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_json_options_are_guarded_before_io() {
        let gateway = Arc::new(MockGateway::new());
        let adapter = boxed(gateway.clone());

        let err = adapter
            .generate_text_json("hi", &json!({"temperature": "warm"}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::ValidationError);
        assert_eq!(gateway.calls(), 0);

        adapter
            .generate_text_json("hi", &json!({"temperature": 7, "max_tokens": 0}), &CancellationToken::new())
            .await
            .unwrap();
        let body = gateway.requests()[0].body.clone().unwrap();
        assert_eq!(body["temperature"], json!(1.0));
        assert_eq!(body["max_tokens"], json!(1));
    }

    #[test]
    fn test_json_context_and_documents() {
        let adapter = boxed(Arc::new(MockGateway::new()));

        let enhanced = adapter
            .enhance_prompt_json("hi", &json!({"system_instruction": "Be kind."}))
            .unwrap();
        assert_eq!(enhanced, "Be kind.\n\nhi");
        assert!(adapter.enhance_prompt_json("hi", &json!({"modifiers": "x"})).is_err());

        assert_eq!(adapter.prepare_rag_context_json(&json!([]), "q").unwrap(), "q");
        let err = adapter
            .prepare_rag_context_json(&json!([{"text": "wrong field"}]), "q")
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::ValidationError);
    }
}
