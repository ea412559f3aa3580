//! Per-chunk retry: bounded exponential backoff over a retryable-status set.
//!
//! This implements the scheduler's retry policy: a chunk is retried up to
//! `max_tries` times, each attempt bounded by `attempt_timeout`
//! (`UploadTryTimeout`), with the delay between attempts growing
//! exponentially up to `max_delay`. Retries are per chunk, not per
//! transfer — the caller is expected to call `with_retry` once per chunk
//! and handle the sibling bookkeeping (marking the transfer `Failed`,
//! letting in-flight siblings finish) itself.

use super::error::ResilienceError;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// The HTTP status codes retried by default, per spec: 408 (timeout), 429
/// (throttled), and the 5xx family commonly returned by storage services
/// under transient load.
pub const DEFAULT_RETRYABLE_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// A chunk-level retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts before the chunk is marked `Failed`.
    pub max_tries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling on the exponential backoff delay.
    pub max_delay: Duration,
    /// Per-attempt timeout (`UploadTryTimeout`), default 10-15 minutes.
    pub attempt_timeout: Duration,
    /// HTTP status codes considered transient, beyond the default set.
    pub retryable_status_codes: HashSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(12 * 60),
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.iter().copied().collect(),
        }
    }
}

impl RetryPolicy {
    /// Extend the default retryable set with user-supplied codes from
    /// `--retry-status-codes`.
    pub fn with_extra_status_codes(mut self, extra: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes.extend(extra);
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        exp.min(self.max_delay)
    }
}

/// Runs `op` under `policy`, retrying transient failures with exponential
/// backoff until `max_tries` is exhausted or `cancelled` is observed
/// between attempts.
///
/// `op` is handed the 1-indexed attempt number and must return
/// `Err(ResilienceError::Retryable(..))` for a transient failure (the loop
/// retries) or `Err(ResilienceError::Permanent(..))` for anything else
/// (the loop gives up immediately).
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    cancelled: &AtomicBool,
    mut op: F,
) -> Result<T, ResilienceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ResilienceError>>,
{
    let mut last_error = String::new();

    for attempt in 1..=policy.max_tries {
        if cancelled.load(Ordering::Acquire) {
            return Err(ResilienceError::Cancelled);
        }

        let attempt_result = tokio::time::timeout(policy.attempt_timeout, op(attempt)).await;

        let outcome = match attempt_result {
            Ok(result) => result,
            Err(_) => Err(ResilienceError::AttemptTimeout(policy.attempt_timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                last_error = err.to_string();
                if attempt == policy.max_tries {
                    break;
                }
                let delay = policy.delay_for_attempt(attempt - 1);
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }

    Err(ResilienceError::RetriesExhausted {
        attempts: policy.max_tries,
        last_error,
    })
}
