//! Token-bucket throughput cap, backing the CLI's `--cap-mbps` flag.
//!
//! Unlike a request-rate limiter, the unit here is bytes: each chunk asks
//! for `until_n_ready(bytes)` before it starts writing, so the bucket
//! throttles aggregate throughput rather than request count.

use super::error::ResilienceError;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

/// Token-bucket rate limiter over a byte budget.
///
/// # Example
/// ```
/// use conveyor_resilience::RateLimiter;
///
/// // Cap throughput at roughly 50 MB/s with bursts up to one second's worth.
/// let limiter = RateLimiter::from_bytes_per_second(50 * 1024 * 1024).unwrap();
/// assert!(limiter.max_units_per_period() > 0);
/// ```
pub struct RateLimiter {
    inner: GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>,
    max_units_per_period: u32,
    period: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_units_per_period", &self.max_units_per_period)
            .field("period", &self.period)
            .finish()
    }
}

impl RateLimiter {
    /// Build a limiter admitting `max_units` per `period`, with bursts up
    /// to `max_units` in one go.
    pub fn new(max_units: u32, period: Duration) -> Result<Self, ResilienceError> {
        let nonzero = NonZeroU32::new(max_units)
            .ok_or_else(|| ResilienceError::Permanent("max_units must be > 0".to_string()))?;
        let quota = Quota::with_period(period)
            .ok_or_else(|| ResilienceError::Permanent("invalid rate limiter period".to_string()))?
            .allow_burst(nonzero);

        Ok(Self {
            inner: GovernorLimiter::direct(quota),
            max_units_per_period: max_units,
            period,
        })
    }

    /// Build a limiter matching the engine's `--cap-mbps` flag, interpreting
    /// `mbps` as megabits per second (the convention `azcopy`-style tools
    /// use for this flag).
    pub fn from_cap_mbps(mbps: f64) -> Result<Self, ResilienceError> {
        if mbps <= 0.0 {
            return Err(ResilienceError::Permanent(
                "cap_mbps must be positive".to_string(),
            ));
        }
        let bytes_per_second = (mbps * 1_000_000.0 / 8.0).round() as u64;
        Self::from_bytes_per_second(bytes_per_second)
    }

    pub fn from_bytes_per_second(bytes_per_second: u64) -> Result<Self, ResilienceError> {
        let capped = bytes_per_second.min(u32::MAX as u64).max(1) as u32;
        Self::new(capped, Duration::from_secs(1))
    }

    pub fn max_units_per_period(&self) -> u32 {
        self.max_units_per_period
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Block until `units` tokens (typically bytes) are available, then
    /// run `op`. Cooperative with cancellation: callers that need to honor
    /// a cancellation token should race this against it with `tokio::select!`.
    pub async fn execute<F, Fut, T>(&self, units: u32, op: F) -> Result<T, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ResilienceError>>,
    {
        let nonzero = NonZeroU32::new(units.max(1)).unwrap();
        self.inner
            .until_n_ready(nonzero)
            .await
            .map_err(|e| ResilienceError::Permanent(format!("rate limiter quota too small: {}", e)))?;
        op().await
    }

    /// Non-blocking variant: fails immediately with `RateLimitExceeded` if
    /// `units` tokens are not already available.
    pub fn try_acquire(&self, units: u32) -> Result<(), ResilienceError> {
        let nonzero = NonZeroU32::new(units.max(1)).unwrap();
        self.inner
            .check_n(nonzero)
            .map_err(|_| ResilienceError::RateLimitExceeded)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cap_mbps_computes_byte_budget() {
        // 8 mbps == 1,000,000 bytes/sec
        let limiter = RateLimiter::from_cap_mbps(8.0).unwrap();
        assert_eq!(limiter.max_units_per_period(), 1_000_000);
    }

    #[test]
    fn rejects_non_positive_cap() {
        assert!(RateLimiter::from_cap_mbps(0.0).is_err());
        assert!(RateLimiter::from_cap_mbps(-5.0).is_err());
    }

    #[tokio::test]
    async fn execute_runs_operation_once_admitted() {
        let limiter = RateLimiter::new(1_000_000, Duration::from_secs(1)).unwrap();
        let result = limiter
            .execute(1024, || async { Ok::<_, ResilienceError>(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn try_acquire_succeeds_within_burst() {
        let limiter = RateLimiter::new(4096, Duration::from_secs(1)).unwrap();
        assert!(limiter.try_acquire(1024).is_ok());
    }
}
