//! Error types for plan file operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for plan file operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, mapping, or reading a plan file
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Plan file not found
    #[error("plan file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid plan file format
    #[error("invalid plan file format: {reason}")]
    InvalidFormat { reason: String },

    /// Version mismatch
    #[error("plan file version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u16, found: u16 },

    /// Invalid magic number (file is not a plan file)
    #[error("invalid magic number: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: Vec<u8>, found: Vec<u8> },

    /// Transfer index out of bounds
    #[error("transfer index out of bounds: {index} >= {count}")]
    TransferIndexOutOfBounds { index: u32, count: u32 },

    /// A read into the variable zone fell outside the mapped region
    #[error("variable zone read out of bounds: offset {offset}, length {length}, zone size {zone_size}")]
    VariableZoneOutOfBounds {
        offset: u32,
        length: u32,
        zone_size: u32,
    },

    /// Memory mapping failed
    #[error("memory mapping failed: {0}")]
    MemoryMapFailed(String),

    /// Bitmap error
    #[error("bitmap error: {0}")]
    Bitmap(String),

    /// Header checksum did not match the recomputed value. Per the job
    /// lifecycle's failure semantics, this marks the owning job `Failed`
    /// rather than attempting a partial recovery.
    #[error("plan file checksum mismatch: recorded {recorded:08x}, computed {computed:08x}")]
    ChecksumMismatch { recorded: u32, computed: u32 },

    /// Empty plan file (no transfers scheduled for a non-empty part)
    #[error("empty plan file: must contain at least one transfer")]
    Empty,

    /// Part 0 carries zero transfers and is also marked final. Mirrors
    /// `conveyor_manifest::Error::NoTransfersScheduled` at the byte layer.
    #[error("no transfers scheduled: part 0 is final and empty")]
    NoTransfersScheduled,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_format<S: Into<String>>(reason: S) -> Self {
        Error::InvalidFormat {
            reason: reason.into(),
        }
    }

    pub fn version_mismatch(expected: u16, found: u16) -> Self {
        Error::VersionMismatch { expected, found }
    }

    pub fn not_found<P: Into<PathBuf>>(path: P) -> Self {
        Error::NotFound { path: path.into() }
    }

    pub fn transfer_index_out_of_bounds(index: u32, count: u32) -> Self {
        Error::TransferIndexOutOfBounds { index, count }
    }

    pub fn variable_zone_out_of_bounds(offset: u32, length: u32, zone_size: u32) -> Self {
        Error::VariableZoneOutOfBounds {
            offset,
            length,
            zone_size,
        }
    }

    pub fn memory_map_failed<S: Into<String>>(message: S) -> Self {
        Error::MemoryMapFailed(message.into())
    }

    pub fn bitmap<S: Into<String>>(message: S) -> Self {
        Error::Bitmap(message.into())
    }

    pub fn checksum_mismatch(recorded: u32, computed: u32) -> Self {
        Error::ChecksumMismatch { recorded, computed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_format_error() {
        let err = Error::invalid_format("bad magic number");
        assert!(matches!(err, Error::InvalidFormat { .. }));
        assert_eq!(err.to_string(), "invalid plan file format: bad magic number");
    }

    #[test]
    fn test_version_mismatch_error() {
        let err = Error::version_mismatch(1, 2);
        assert!(matches!(err, Error::VersionMismatch { .. }));
        assert!(err.to_string().contains("expected 1"));
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_transfer_index_out_of_bounds() {
        let err = Error::transfer_index_out_of_bounds(100, 50);
        assert!(matches!(err, Error::TransferIndexOutOfBounds { .. }));
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_checksum_mismatch() {
        let err = Error::checksum_mismatch(0xdead_beef, 0x0000_0001);
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(err.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_empty_error() {
        let err = Error::Empty;
        assert!(err.to_string().contains("at least one"));
    }
}
