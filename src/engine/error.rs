//! The engine-wide error taxonomy.
//!
//! Every subsystem above the leaf crates (Scheduler, Sync Orchestrator,
//! Job Lifecycle, Progress Manager) reports failures through this single
//! enum so that propagation policy (retry locally / escalate a transfer /
//! escalate a job) can be decided in one place by [`EngineError::category`]
//! rather than re-derived per call site.

use std::fmt;
use std::io;

use crate::backend::BackendError;

/// Error category, independent of the concrete variant, used to drive the
/// propagation policy below: retry locally, escalate a transfer, or fail
/// the job outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retryable network/service failure.
    Transient,
    /// Invalid or expired credential.
    Auth,
    /// Source object disappeared between enumeration and transfer.
    NotFound,
    /// Destination state disallows the requested operation.
    Conflict,
    /// Overwrite policy or filter mismatch; surfaced as `Skipped`, never
    /// job-fatal.
    Policy,
    /// Hard service limit (destination quota, throttling with no budget
    /// left).
    Quota,
    /// Checksum mismatch on verify or plan-file load.
    Corruption,
    /// Local disk/permission failure.
    LocalIo,
    /// Plan-file unreadable, impossible `FromTo`, or a programmer error —
    /// stops admission of new work for the job.
    Fatal,
}

impl ErrorKind {
    /// Whether this kind is retried locally at the chunk level before any
    /// escalation.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    /// Whether this kind stops admission of new work and marks the whole
    /// job `Failed` once observed.
    pub fn is_job_fatal(self) -> bool {
        matches!(self, ErrorKind::Quota | ErrorKind::Fatal)
    }

    /// Whether this kind resolves to a per-transfer `Skipped` rather than
    /// `Failed`.
    pub fn is_policy_skip(self) -> bool {
        matches!(self, ErrorKind::Policy)
    }
}

/// The engine's top-level error type.
#[derive(Debug)]
pub enum EngineError {
    Transient(String),
    Auth(String),
    NotFound(String),
    Conflict(String),
    Policy(String),
    Quota(String),
    Corruption(String),
    LocalIo(io::Error),
    Fatal(String),
}

impl EngineError {
    pub fn category(&self) -> ErrorKind {
        match self {
            EngineError::Transient(_) => ErrorKind::Transient,
            EngineError::Auth(_) => ErrorKind::Auth,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Policy(_) => ErrorKind::Policy,
            EngineError::Quota(_) => ErrorKind::Quota,
            EngineError::Corruption(_) => ErrorKind::Corruption,
            EngineError::LocalIo(_) => ErrorKind::LocalIo,
            EngineError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }

    pub fn is_fatal(&self) -> bool {
        self.category().is_job_fatal()
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        EngineError::Fatal(message.into())
    }

    pub fn policy(message: impl Into<String>) -> Self {
        EngineError::Policy(message.into())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Transient(m) => write!(f, "transient error: {m}"),
            EngineError::Auth(m) => write!(f, "authentication error: {m}"),
            EngineError::NotFound(m) => write!(f, "not found: {m}"),
            EngineError::Conflict(m) => write!(f, "conflict: {m}"),
            EngineError::Policy(m) => write!(f, "policy: {m}"),
            EngineError::Quota(m) => write!(f, "quota exceeded: {m}"),
            EngineError::Corruption(m) => write!(f, "corruption: {m}"),
            EngineError::LocalIo(e) => write!(f, "local I/O error: {e}"),
            EngineError::Fatal(m) => write!(f, "fatal: {m}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::LocalIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::LocalIo(e)
    }
}

impl From<conveyor_manifest::Error> for EngineError {
    fn from(e: conveyor_manifest::Error) -> Self {
        EngineError::Fatal(e.to_string())
    }
}

impl From<conveyor_planfile::Error> for EngineError {
    fn from(e: conveyor_planfile::Error) -> Self {
        EngineError::Fatal(e.to_string())
    }
}

impl From<conveyor_resilience::ResilienceError> for EngineError {
    fn from(e: conveyor_resilience::ResilienceError) -> Self {
        match &e {
            conveyor_resilience::ResilienceError::Retryable(m) => EngineError::Transient(m.clone()),
            conveyor_resilience::ResilienceError::RetriesExhausted { last_error, .. } => {
                EngineError::Transient(last_error.clone())
            }
            conveyor_resilience::ResilienceError::AttemptTimeout(_) => {
                EngineError::Transient(e.to_string())
            }
            conveyor_resilience::ResilienceError::RateLimitExceeded => {
                EngineError::Transient(e.to_string())
            }
            conveyor_resilience::ResilienceError::Cancelled => EngineError::Fatal(e.to_string()),
            conveyor_resilience::ResilienceError::CircuitOpen => EngineError::Transient(e.to_string()),
            conveyor_resilience::ResilienceError::Permanent(m) => EngineError::Conflict(m.clone()),
        }
    }
}

impl From<BackendError> for EngineError {
    fn from(e: BackendError) -> Self {
        match &e {
            BackendError::NotFound { .. } => EngineError::NotFound(e.to_string()),
            BackendError::PermissionDenied { .. } => EngineError::LocalIo(io::Error::new(
                io::ErrorKind::PermissionDenied,
                e.to_string(),
            )),
            BackendError::AuthenticationFailed { .. } => EngineError::Auth(e.to_string()),
            BackendError::QuotaExceeded { .. } => EngineError::Quota(e.to_string()),
            BackendError::AlreadyExists { .. } | BackendError::DirectoryNotEmpty { .. } => {
                EngineError::Conflict(e.to_string())
            }
            BackendError::InvalidConfig { .. }
            | BackendError::Unsupported { .. }
            | BackendError::InvalidPath { .. }
            | BackendError::Serialization { .. } => EngineError::Fatal(e.to_string()),
            _ if e.is_retriable() => EngineError::Transient(e.to_string()),
            _ => EngineError::Conflict(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_and_fatal_are_job_fatal() {
        assert!(EngineError::Quota("x".into()).is_fatal());
        assert!(EngineError::Fatal("x".into()).is_fatal());
        assert!(!EngineError::Transient("x".into()).is_fatal());
    }

    #[test]
    fn transient_is_retried_locally() {
        assert!(EngineError::Transient("x".into()).is_transient());
        assert!(!EngineError::Policy("x".into()).is_transient());
    }
}
