use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::errors::CoreError;

/// Classification for retry policy.
///
/// | Class | Retried? |
/// |-------|----------|
/// | `WithBackoff` | Yes, after an exponentially growing delay |
/// | `Never` | No, the first failure is final |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Timeout, connection failure, rate limit or 5xx: worth another attempt.
    WithBackoff,
    /// Bad credentials, bad symbol, malformed payload: retrying won't help.
    Never,
}

/// Serializable retry knobs, part of [`crate::models::settings::Settings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

/// Exponential backoff shared by every network call site.
///
/// Attempt `k` (1-based) that fails with a retryable error is followed by a
/// sleep of `base_delay * 2^(k-1)`; after `max_attempts` the last error is
/// returned. Non-retryable errors return immediately.
///
/// Dropping the returned future cancels both the in-flight request and any
/// pending backoff sleep.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    classify: fn(&CoreError) -> RetryClass,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            classify: CoreError::retry_class,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
        )
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Replace the retryability classifier.
    pub fn with_classifier(mut self, classify: fn(&CoreError) -> RetryClass) -> Self {
        self.classify = classify;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Run `op` until it succeeds, fails terminally, or the attempt ceiling is hit.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if (self.classify)(&e) == RetryClass::Never {
                        log::debug!("{label}: terminal error on attempt {attempt}: {e}");
                        return Err(e);
                    }
                    if attempt >= self.max_attempts {
                        log::warn!("{label}: giving up after {attempt} attempts: {e}");
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    log::info!(
                        "{label}: attempt {attempt}/{} failed ({e}), retrying in {}ms",
                        self.max_attempts,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}
