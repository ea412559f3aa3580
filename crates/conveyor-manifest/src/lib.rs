//! Job/Part/Transfer/Chunk data model for the Conveyor transfer engine.
//!
//! This crate defines the data types in the engine's data model: `JobId`,
//! `Job`, `FromTo`, `Policy`, `Transfer`, `Chunk`, and the transient
//! `StoredObject` the sync scanners produce. It has no knowledge of disk
//! layout (see `conveyor-planfile`) or scheduling (see the root crate).
//!
//! # Example
//!
//! ```
//! use conveyor_manifest::job::{Job, FromTo, Policy};
//!
//! let job = Job::new(
//!     FromTo::LocalBlob,
//!     "/data/source".to_string(),
//!     "https://account.blob.core.windows.net/container/prefix".to_string(),
//!     Policy::default(),
//! );
//! assert_eq!(job.next_part_num(), 0);
//! ```

pub mod error;
pub mod job;
pub mod transfer;
pub mod validate;

pub use error::{Error, Result};
pub use job::{
    AggregateState, DeleteDestination, FilterSpec, FolderPropertiesOption, FromTo, Job, JobId,
    JobPartDescriptor, JobStatus, Md5ValidationMode, OverwriteMode, Policy, SymlinkMode,
};
pub use transfer::{Chunk, ChunkKind, EntityType, StoredObject, Transfer, TransferStatus};
pub use validate::validate_job;

/// Schema version tag carried in the RPC Bridge's `JobOrder` envelope.
pub const JOB_ORDER_SCHEMA_VERSION: &str = "conveyor.joborder.v1";
