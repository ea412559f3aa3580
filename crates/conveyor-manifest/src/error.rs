//! Error types for job/part/transfer manifest operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, persisting, or validating job manifests
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest validation failed
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    /// Invalid path provided
    #[error("Invalid path: {path}")]
    InvalidPath { path: PathBuf },

    /// Manifest file not found
    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    /// Malformed JobID string
    #[error("invalid JobID '{raw}': {reason}")]
    InvalidJobId { raw: String, reason: String },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// `CreateOrAppendPart` submitted a part number that conflicts with an
    /// already-persisted part for the same job (different content hash).
    #[error("part {part_num} of job {job_id} conflicts with an already-persisted part")]
    PlanConflict { job_id: String, part_num: u32 },

    /// Part 0 carries zero transfers and `IsFinalPart=true`.
    #[error("no transfers scheduled: part 0 is final and empty")]
    NoTransfersScheduled,

    /// `Job.Parts` failed the dense-numbering invariant.
    #[error("part numbering is not dense: expected {expected}, found {found}")]
    NonDensePartNumbering { expected: u32, found: u32 },

    /// More than one part claims `IsFinalPart=true`.
    #[error("more than one part is marked IsFinalPart for job {0}")]
    MultipleFinalParts(String),

    /// Invalid policy configuration
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Invalid endpoint / FromTo combination
    #[error("Invalid endpoint type: {0}")]
    InvalidEndpointType(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error with a message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Create a version mismatch error
    pub fn version_mismatch<S: Into<String>>(expected: S, found: S) -> Self {
        Error::VersionMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid path error
    pub fn invalid_path<P: Into<PathBuf>>(path: P) -> Self {
        Error::InvalidPath { path: path.into() }
    }

    /// Create a manifest not found error
    pub fn manifest_not_found<P: Into<PathBuf>>(path: P) -> Self {
        Error::ManifestNotFound { path: path.into() }
    }

    /// Create a missing field error
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Error::MissingField {
            field: field.into(),
        }
    }
}
