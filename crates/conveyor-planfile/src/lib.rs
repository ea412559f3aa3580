//! Plan file: the durable, memory-mapped representation of one job part.
//!
//! A plan file is a flat binary region with three zones laid out back to
//! back, built once at part-create time and then mutated in place for the
//! rest of the part's life:
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ Header (fixed, HEADER_LEN bytes)           │
//! ├───────────────────────────────────────────┤
//! │ Transfer records (TotalTransfers ×         │
//! │ TRANSFER_RECORD_LEN bytes, fixed-size)     │
//! ├───────────────────────────────────────────┤
//! │ Variable zone (append-only, written once   │
//! │ at creation: relative paths, metadata,     │
//! │ tags, blob tier strings)                   │
//! └───────────────────────────────────────────┘
//! ```
//!
//! The header and the per-transfer status byte are the only fields mutated
//! after creation, and both are updated with release-ordered stores /
//! acquire-ordered loads directly against the mapped bytes — there is no
//! lock on this path. The variable zone is read-only once the builder
//! finishes writing it, so readers need no synchronization to walk it.
//!
//! `PlanFileBuilder` produces the bytes; `PlanFileReader` opens and
//! memory-maps them back. Neither type owns file naming or directory
//! placement (`<jobID>--<partNum>.steV<version>`) — that belongs to the
//! job lifecycle layer above this crate.

pub mod bitmap;
pub mod builder;
pub mod error;
pub mod layout;
pub mod reader;

pub use bitmap::RankSelectBitmap;
pub use builder::PlanFileBuilder;
pub use error::{Error, Result};
pub use layout::{EntityTypeCode, JobStatusCode, TransferStatusCode};
pub use reader::PlanFileReader;

/// Current plan file format version.
pub const PLAN_FILE_VERSION: u16 = 1;

/// Magic number identifying a plan file.
pub const PLAN_FILE_MAGIC: &[u8; 4] = b"AZP1";
