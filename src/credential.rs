//! Credential capability: the one collaborator the engine calls into for
//! re-auth without ever touching a cloud SDK's token store itself.
//!
//! Modeled as a trait rather than a process-wide login/logout cache
//! (`src/credentials.rs`, which still owns the CLI's token file) so the
//! Scheduler can hold an `Option<Arc<dyn CredentialProvider>>` and stay
//! agnostic to how a given deployment actually refreshes a token.
//! `try_refresh` is a first-class optional method rather than something
//! callers have to downcast for.

use std::sync::atomic::{AtomicU32, Ordering};

/// An opaque bearer credential handed to the Resource-Client layer.
/// The engine never inspects its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueToken(pub String);

/// A source of bearer tokens the engine can call into on an auth challenge,
/// with an optional proactive-refresh hook.
pub trait CredentialProvider: Send + Sync {
    /// Fetches (and caches, per-process) a token for `scope`.
    fn get_token(&self, scope: &str) -> Option<OpaqueToken>;

    /// Forces a refresh after the Resource-Client layer reports an auth
    /// challenge. Returns `None` if this provider has no way to refresh
    /// (e.g. a static token with no backing identity service), in which
    /// case the caller should not retry and should count the failure
    /// toward job-fatal escalation.
    fn refresh_on_challenge(&self, scope: &str) -> Option<OpaqueToken> {
        let _ = scope;
        None
    }

    /// Attempts a proactive refresh without waiting for a fresh challenge.
    /// Kept distinct from `refresh_on_challenge` so a provider with a
    /// cheaper background-renewal path can implement just this one.
    fn try_refresh(&self) -> Option<OpaqueToken> {
        None
    }
}

/// A fixed bearer token with no refresh capability: `try_refresh` always
/// returns `None`, so a widespread auth failure against this provider
/// escalates the job to failed on the first occurrence past the threshold
/// rather than looping on retries.
pub struct StaticCredentialProvider {
    token: OpaqueToken,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        StaticCredentialProvider {
            token: OpaqueToken(token.into()),
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_token(&self, _scope: &str) -> Option<OpaqueToken> {
        Some(self.token.clone())
    }
}

/// Tracks auth failures against the first `WINDOW` transfers of a job so a
/// widespread credential problem can fail the whole job instead of burning
/// through every remaining transfer one at a time.
pub struct AuthFailureTracker {
    window_seen: AtomicU32,
    window_failed: AtomicU32,
}

const WINDOW: u32 = 20;

impl AuthFailureTracker {
    pub fn new() -> Self {
        AuthFailureTracker {
            window_seen: AtomicU32::new(0),
            window_failed: AtomicU32::new(0),
        }
    }

    /// Call once per transfer attempt, success or failure, so the window
    /// denominator only ever counts the first `WINDOW` transfers of the
    /// job.
    pub fn record_attempt(&self, was_auth_failure: bool) {
        let seen = self.window_seen.fetch_add(1, Ordering::AcqRel);
        if seen < WINDOW {
            if was_auth_failure {
                self.window_failed.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// `true` once more than half of the first `WINDOW` observed transfers
    /// failed on auth.
    pub fn is_auth_fatal(&self) -> bool {
        let seen = self.window_seen.load(Ordering::Acquire).min(WINDOW);
        let failed = self.window_failed.load(Ordering::Acquire);
        seen >= WINDOW && (failed as f64) > (seen as f64) * 0.5
    }
}

impl Default for AuthFailureTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_past_half_of_first_window() {
        let tracker = AuthFailureTracker::new();
        for _ in 0..11 {
            tracker.record_attempt(true);
        }
        for _ in 0..9 {
            tracker.record_attempt(false);
        }
        assert!(tracker.is_auth_fatal());
    }

    #[test]
    fn does_not_escalate_under_half() {
        let tracker = AuthFailureTracker::new();
        for _ in 0..9 {
            tracker.record_attempt(true);
        }
        for _ in 0..11 {
            tracker.record_attempt(false);
        }
        assert!(!tracker.is_auth_fatal());
    }

    #[test]
    fn does_not_escalate_before_window_fills() {
        let tracker = AuthFailureTracker::new();
        for _ in 0..5 {
            tracker.record_attempt(true);
        }
        assert!(!tracker.is_auth_fatal());
    }

    #[test]
    fn static_provider_never_refreshes() {
        let provider = StaticCredentialProvider::new("tok");
        assert!(provider.get_token("blob").is_some());
        assert!(provider.try_refresh().is_none());
    }
}
