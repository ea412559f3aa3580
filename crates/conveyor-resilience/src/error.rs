//! Error type shared by this crate's fault-tolerance primitives.

use thiserror::Error;

/// Errors produced by rate limiting, backpressure, and retry primitives.
///
/// This crate stays pure logic, so `ResilienceError` carries no I/O
/// variant of its own — callers wrap the underlying transfer error (an
/// `EngineError` from the root crate) in `Retryable`/`Permanent` to mark
/// whether the scheduler's retry loop should try again.
#[derive(Error, Debug)]
pub enum ResilienceError {
    /// The operation failed in a way its caller judged retryable, carrying
    /// the last underlying error message.
    #[error("retryable failure: {0}")]
    Retryable(String),

    /// The operation failed in a way that must not be retried.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// A chunk exhausted `MaxTries` without succeeding.
    #[error("retry budget exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// A single attempt ran past `UploadTryTimeout`.
    #[error("attempt timed out after {0:?}")]
    AttemptTimeout(std::time::Duration),

    /// The rate limiter's non-blocking `try_execute` found no token
    /// available.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// The operation was cancelled via a cancellation token before it
    /// could complete or retry.
    #[error("operation cancelled")]
    Cancelled,

    /// The circuit breaker is open and is failing fast without attempting
    /// the call.
    #[error("circuit breaker is open")]
    CircuitOpen,
}

impl ResilienceError {
    /// Whether this error reflects a condition the caller's retry loop
    /// should keep trying against, as opposed to one that should fail the
    /// transfer immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResilienceError::Retryable(_) | ResilienceError::AttemptTimeout(_))
    }

    /// Whether a circuit breaker's own internal retry loop (`execute`)
    /// should keep retrying this error.
    pub fn is_transient(&self) -> bool {
        self.is_retryable()
    }

    /// Whether this error must never be retried, by the circuit breaker or
    /// anything above it.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ResilienceError::Permanent(_))
    }

    /// Whether this error should count against the circuit breaker's
    /// failure threshold. Cancellation is the caller giving up, not the
    /// downstream service misbehaving, so it does not trip the breaker.
    pub fn should_trip_breaker(&self) -> bool {
        !matches!(self, ResilienceError::Cancelled)
    }
}
