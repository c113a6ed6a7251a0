//! Adapter status state machine.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready | Unavailable
//! Ready -> Degraded (consecutive failures or throttling) -> Ready (success)
//! any -> Unavailable (retries exhausted)
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration as ChronoDuration, Utc};

use omnigen_types::error::{ProviderError, ProviderErrorCode};
use omnigen_types::provider::{AdapterState, AdapterStatus};

/// Consecutive failed attempts before a Ready adapter is marked Degraded.
pub const DEGRADED_THRESHOLD: u32 = 2;

#[derive(Debug, Default)]
struct Inner {
    status: AdapterStatus,
    consecutive_failures: u32,
    total_calls: u64,
    total_failures: u64,
}

/// Thread-safe status tracker for one adapter.
#[derive(Debug, Default)]
pub struct StatusTracker {
    inner: Mutex<Inner>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> AdapterStatus {
        self.lock().status.clone()
    }

    pub fn state(&self) -> AdapterState {
        self.lock().status.state
    }

    /// `(total_calls, total_failures)` across all attempts.
    pub fn counters(&self) -> (u64, u64) {
        let inner = self.lock();
        (inner.total_calls, inner.total_failures)
    }

    pub fn begin_initializing(&self) {
        let mut inner = self.lock();
        // A fetch triggered by a running adapter (e.g. after a 401) does not
        // knock it back to Initializing.
        if matches!(
            inner.status.state,
            AdapterState::Uninitialized | AdapterState::Unavailable
        ) {
            inner.status.state = AdapterState::Initializing;
        }
    }

    pub fn credential_ready(&self) {
        let mut inner = self.lock();
        if matches!(
            inner.status.state,
            AdapterState::Uninitialized | AdapterState::Initializing | AdapterState::Unavailable
        ) {
            inner.status.state = AdapterState::Ready;
            inner.status.error = None;
        }
    }

    pub fn credential_failed(&self, error: &ProviderError) {
        let mut inner = self.lock();
        inner.status.state = AdapterState::Unavailable;
        inner.status.is_connected = false;
        inner.status.error = Some(error.to_string());
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_calls += 1;
        inner.consecutive_failures = 0;
        let status = &mut inner.status;
        status.state = AdapterState::Ready;
        status.is_connected = true;
        status.last_connected = Some(Utc::now());
        status.error = None;
        status.is_rate_limited = false;
        status.rate_limit_reset_time = None;
    }

    /// Record one failed attempt. Only transient failures count toward
    /// degradation; a rejected request says nothing about vendor health.
    pub fn record_failure(&self, error: &ProviderError) {
        let mut inner = self.lock();
        inner.total_calls += 1;
        inner.total_failures += 1;
        inner.status.error = Some(error.to_string());
        if !error.is_transient() {
            return;
        }
        inner.consecutive_failures += 1;

        if error.code == ProviderErrorCode::RateLimited {
            let retry_after_ms = error
                .details
                .as_ref()
                .and_then(|d| d.get("retry_after_ms"))
                .and_then(serde_json::Value::as_u64);
            inner.status.is_rate_limited = true;
            inner.status.rate_limit_reset_time = retry_after_ms
                .and_then(|ms| i64::try_from(ms).ok())
                .map(|ms| Utc::now() + ChronoDuration::milliseconds(ms));
        }

        let throttled = inner.status.is_rate_limited;
        if inner.status.state == AdapterState::Ready
            && (throttled || inner.consecutive_failures >= DEGRADED_THRESHOLD)
        {
            inner.status.state = AdapterState::Degraded;
        }
    }

    /// A success reply whose body could not be read. The attempt was already
    /// counted by `record_success`.
    pub fn record_invalid_response(&self, error: &ProviderError) {
        let mut inner = self.lock();
        inner.total_failures += 1;
        inner.consecutive_failures += 1;
        inner.status.is_connected = false;
        inner.status.error = Some(error.to_string());
        if inner.status.state == AdapterState::Ready
            && inner.consecutive_failures >= DEGRADED_THRESHOLD
        {
            inner.status.state = AdapterState::Degraded;
        }
    }

    /// Retries exhausted with no recovery.
    pub fn mark_unavailable(&self, error: &ProviderError) {
        let mut inner = self.lock();
        inner.status.state = AdapterState::Unavailable;
        inner.status.is_connected = false;
        inner.status.error = Some(error.to_string());
    }
}
