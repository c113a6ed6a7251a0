//! Fixed-backoff retry policy and fixed-window rate limiter.
//!
//! Both are deliberately simple: the delay between attempts never grows, and
//! the limiter only remembers the last dispatch instant. Each adapter owns its
//! own instances, so throttling one vendor never delays another.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use omnigen_types::config::ResilienceConfig;
use omnigen_types::error::ProviderError;

/// Constant-delay retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Never zero.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }

    /// Delay before attempt `attempt + 1`, or `None` when `attempt` was the last.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.delay)
    }
}

/// Client-side fixed-window limiter.
///
/// Tracks the instant of the last dispatch and makes the next caller sleep out
/// the remainder of the interval. The lock is held across the sleep, so
/// concurrent callers queue up and each computes its wait from the instant the
/// previous caller actually dispatched.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl FixedWindowLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for a dispatch slot and claim it.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        let mut last = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::cancelled("cancelled")),
            guard = self.last_dispatch.lock() => guard,
        };

        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                tracing::debug!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "rate limit window not elapsed, waiting"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ProviderError::cancelled("cancelled")),
                    _ = tokio::time::sleep_until(ready_at) => {}
                }
            }
        }

        *last = Some(Instant::now());
        Ok(())
    }

    pub async fn last_dispatch(&self) -> Option<Instant> {
        *self.last_dispatch.lock().await
    }
}
