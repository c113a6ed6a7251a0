//! Shared adapter state and the dispatch pipeline.
//!
//! Every vendor adapter embeds one `AdapterBase`. It owns the pieces that must
//! behave identically across vendors: lazy single-flight credential
//! resolution, the fixed-window limiter, fixed-backoff retry with
//! cancellation, status transitions and usage metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use omnigen_types::config::ResilienceConfig;
use omnigen_types::error::{ProviderError, ProviderErrorCode};
use omnigen_types::provider::{
    AdapterConfig, AdapterIdentity, AdapterStatus, AdapterStatusInfo, Capabilities, Completion,
    KeyKind, UsageMeta, UsageMetrics,
};

use super::cost::{DynCostEstimator, NoCost};
use super::resilience::{FixedWindowLimiter, RetryPolicy};
use super::status::StatusTracker;
use crate::credential::DynKeyResolver;
use crate::gateway::{DynNetworkGateway, GatewayRequest, ResponseBody, is_auth_failure};

#[derive(Default)]
struct CredentialSlot {
    key: Option<SecretString>,
    last_error: Option<ProviderError>,
}

pub struct AdapterBase {
    identity: AdapterIdentity,
    capabilities: Capabilities,
    config: AdapterConfig,
    retry: RetryPolicy,
    limiter: FixedWindowLimiter,
    resolver: DynKeyResolver,
    gateway: DynNetworkGateway,
    pricing: DynCostEstimator,
    credential: tokio::sync::Mutex<CredentialSlot>,
    /// Completed resolver fetches. Lets callers that queued behind an
    /// in-flight fetch reuse its outcome instead of fetching again.
    fetches: AtomicU64,
    status: StatusTracker,
    usage: Mutex<UsageMetrics>,
}

impl AdapterBase {
    pub fn new(
        identity: AdapterIdentity,
        capabilities: Capabilities,
        config: AdapterConfig,
        resilience: &ResilienceConfig,
        resolver: DynKeyResolver,
        gateway: DynNetworkGateway,
    ) -> Self {
        Self {
            identity,
            capabilities,
            config,
            retry: RetryPolicy::from_config(resilience),
            limiter: FixedWindowLimiter::new(resilience.rate_limit_interval()),
            resolver,
            gateway,
            pricing: std::sync::Arc::new(NoCost),
            credential: tokio::sync::Mutex::new(CredentialSlot::default()),
            fetches: AtomicU64::new(0),
            status: StatusTracker::new(),
            usage: Mutex::new(UsageMetrics::default()),
        }
    }

    pub fn with_pricing(mut self, pricing: DynCostEstimator) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn identity(&self) -> &AdapterIdentity {
        &self.identity
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn rate_limit_interval(&self) -> Duration {
        self.limiter.interval()
    }

    /// Join a path onto the configured base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn status(&self) -> AdapterStatus {
        self.status.snapshot()
    }

    pub fn status_tracker(&self) -> &StatusTracker {
        &self.status
    }

    fn usage_lock(&self) -> MutexGuard<'_, UsageMetrics> {
        self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn usage(&self) -> UsageMetrics {
        self.usage_lock().clone()
    }

    pub fn has_credential(&self) -> bool {
        self.credential
            .try_lock()
            .map(|slot| slot.key.is_some())
            .unwrap_or(false)
    }

    /// Return the cached credential, fetching it if absent.
    ///
    /// Concurrent callers collapse into one resolver call: the first one
    /// fetches while holding the slot lock; the rest wait and reuse the
    /// result, success or failure.
    pub async fn credential(&self) -> Result<SecretString, ProviderError> {
        let seen = self.fetches.load(Ordering::Acquire);
        let mut slot = self.credential.lock().await;

        if let Some(key) = &slot.key {
            return Ok(key.clone());
        }
        if self.fetches.load(Ordering::Acquire) != seen {
            if let Some(err) = &slot.last_error {
                return Err(err.clone());
            }
        }

        let vendor = self.identity.vendor;
        self.status.begin_initializing();
        tracing::debug!(adapter = %self.identity.id, "resolving credential");

        let outcome = match self.resolver.resolve_boxed(vendor, KeyKind::Chat).await {
            Ok(Some(key)) => Ok(key),
            Ok(None) => Err(ProviderError::credential_missing(vendor)),
            Err(err) => Err(err.into_provider_error(vendor)),
        };
        self.fetches.fetch_add(1, Ordering::Release);

        match outcome {
            Ok(key) => {
                slot.key = Some(key.clone());
                slot.last_error = None;
                self.status.credential_ready();
                Ok(key)
            }
            Err(err) => {
                tracing::warn!(adapter = %self.identity.id, error = %err, "credential resolution failed");
                slot.last_error = Some(err.clone());
                self.status.credential_failed(&err);
                Err(err)
            }
        }
    }

    /// Drop the cached credential so the next call re-resolves it.
    pub async fn invalidate_credential(&self) {
        let mut slot = self.credential.lock().await;
        slot.key = None;
    }

    /// Send a request through the limiter and gateway, retrying transient
    /// failures with a fixed delay. Returns the successful response body.
    ///
    /// `timeout_ms` bounds the whole call, retries included, and surfaces as
    /// `CANCELLED`.
    pub async fn dispatch(
        &self,
        request: &GatewayRequest,
        cancel: &CancellationToken,
        timeout_ms: Option<u64>,
    ) -> Result<ResponseBody, ProviderError> {
        match timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(
                    Duration::from_millis(ms),
                    self.dispatch_with_retry(request, cancel),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(adapter = %self.identity.id, timeout_ms = ms, "vendor call timed out");
                        Err(ProviderError::cancelled("timed out"))
                    }
                }
            }
            None => self.dispatch_with_retry(request, cancel).await,
        }
    }

    async fn dispatch_with_retry(
        &self,
        request: &GatewayRequest,
        cancel: &CancellationToken,
    ) -> Result<ResponseBody, ProviderError> {
        let credential = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::cancelled("cancelled")),
            key = self.credential() => key?,
        };

        let max_attempts = self.retry.max_attempts;
        let mut attempt = 0;
        let cause = loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(ProviderError::cancelled("cancelled"));
            }
            self.limiter.acquire(cancel).await?;

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::cancelled("cancelled")),
                sent = self.gateway.send_boxed(request, &credential) => sent,
            };

            let err = match sent.map_err(ProviderError::from).and_then(|r| r.into_result()) {
                Ok(body) => {
                    self.status.record_success();
                    return Ok(body);
                }
                Err(err) => err,
            };

            self.status.record_failure(&err);
            if is_auth_failure(&err) {
                self.invalidate_credential().await;
            }
            if !err.is_transient() {
                tracing::error!(
                    adapter = %self.identity.id,
                    operation = request.operation,
                    error = %err,
                    "vendor call failed"
                );
                return Err(err);
            }

            match self.retry.delay_after(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        adapter = %self.identity.id,
                        operation = request.operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "vendor call failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ProviderError::cancelled("cancelled")),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => break err,
            }
        };

        self.status.mark_unavailable(&cause);
        tracing::error!(
            adapter = %self.identity.id,
            operation = request.operation,
            attempts = attempt,
            error = %cause,
            "vendor call failed after all retries"
        );
        Err(ProviderError::new(
            ProviderErrorCode::VendorError,
            format!(
                "{} failed after {attempt} attempts: {}",
                self.identity.vendor, cause.message
            ),
        )
        .with_details(json!({
            "attempts": attempt,
            "cause": {
                "code": cause.code,
                "message": cause.message,
                "details": cause.details,
            },
        })))
    }

    /// Record one successful generation. Metrics only ever grow.
    pub fn track_usage(&self, operation: &str, tokens: u64, cost: f64) {
        let cost = if cost.is_finite() { cost.max(0.0) } else { 0.0 };
        let snapshot = {
            let mut usage = self.usage_lock();
            usage.tokens_used = usage.tokens_used.saturating_add(tokens);
            usage.cost += cost;
            usage.request_count += 1;
            let now = Utc::now();
            usage.last_request_timestamp = Some(match usage.last_request_timestamp {
                Some(previous) if previous > now => previous,
                _ => now,
            });
            usage.clone()
        };
        tracing::info!(
            target: "omnigen::usage",
            adapter = %self.identity.id,
            operation,
            tokens,
            cost,
            request_count = snapshot.request_count,
            total_tokens = snapshot.tokens_used,
            "usage recorded"
        );
    }

    pub fn token_cost(&self, model: &str, usage: &UsageMeta) -> f64 {
        self.pricing.token_cost(self.identity.vendor, model, usage)
    }

    pub fn item_cost(&self, model: &str, items: u32) -> f64 {
        self.pricing.item_cost(self.identity.vendor, model, items)
    }

    /// Display record for dashboards.
    pub fn status_info(&self) -> AdapterStatusInfo {
        let status = self.status();
        let usage = self.usage();
        let (total_calls, total_failures) = self.status.counters();
        AdapterStatusInfo {
            id: self.identity.id.clone(),
            vendor: self.identity.vendor,
            category: self.identity.category,
            state: status.state.to_string(),
            last_error: status.error,
            last_connected: status.last_connected.map(|t| t.to_rfc3339()),
            rate_limit_reset: status.rate_limit_reset_time.map(|t| t.to_rfc3339()),
            request_count: usage.request_count,
            tokens_used: usage.tokens_used,
            cost: usage.cost,
            total_calls,
            total_failures,
        }
    }
}

/// Read a gateway response that is already in normalized
/// `{text, usage: {input_tokens, output_tokens}}` form.
pub fn normalized_completion(body: &Value, model: &str) -> Completion {
    let tokens = |key: &str| {
        body.get("usage")
            .and_then(|u| u.get(key))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    Completion {
        text: body
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        model: body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_string(),
        usage: UsageMeta {
            input_tokens: tokens("input_tokens"),
            output_tokens: tokens("output_tokens"),
        },
        finish_reason: None,
    }
}
