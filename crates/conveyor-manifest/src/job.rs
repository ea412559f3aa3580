//! Job / JobPart aggregate and the `JobID` / `FromTo` identifiers
//!
//! A [`Job`] is the durable aggregate exposed to operators (`jobs list`,
//! `jobs show`, `cancel`, `resume`...). It owns a dense `0..K` run of
//! [`JobPart`]s; each part is persisted as its own plan file by
//! `conveyor-planfile` and is immutable once written except for the
//! per-transfer status bytes.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 128-bit job identifier, stringified as a UUID-like token.
///
/// Parsing is case-insensitive and tolerates missing hyphens, since
/// front-ends sometimes pass the bare hex form on from a resume script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        JobId(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Filename-safe plan-file stem: `<jobID>--<partNum>.steV<version>`.
    pub fn plan_file_name(&self, part_num: u32, version: u16) -> String {
        format!("{}--{}.steV{}", self, part_num, version)
    }

    pub fn log_file_name(&self) -> String {
        format!("{}.log", self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Accept with or without hyphens, case-insensitively.
        let normalized = s.trim().to_ascii_lowercase();
        let candidate = if normalized.contains('-') {
            normalized
        } else if normalized.len() == 32 {
            format!(
                "{}-{}-{}-{}-{}",
                &normalized[0..8],
                &normalized[8..12],
                &normalized[12..16],
                &normalized[16..20],
                &normalized[20..32]
            )
        } else {
            normalized
        };
        Uuid::parse_str(&candidate)
            .map(JobId)
            .map_err(|e| Error::InvalidJobId {
                raw: s.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Enumerated pair describing source and destination resource kinds.
///
/// Used both to select a `Backend` pair from the provider registry and to
/// key the Sync Orchestrator's `CrawlParallelism` multiplier (local vs S3
/// vs other).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FromTo {
    LocalBlob,
    BlobLocal,
    BlobBlob,
    LocalS3,
    S3Local,
    S3Blob,
    BlobS3,
    LocalLocal,
    FileFile,
}

impl FromTo {
    /// `CrawlParallelism` base multiplier per §4.3: local=4, S3=8, other=2.
    pub fn crawl_multiplier(self) -> usize {
        match self {
            FromTo::LocalBlob | FromTo::LocalS3 | FromTo::LocalLocal | FromTo::FileFile => 4,
            FromTo::S3Blob | FromTo::S3Local => 8,
            FromTo::BlobLocal | FromTo::BlobBlob | FromTo::BlobS3 => 2,
        }
    }

    /// Parallelism hard ceiling per §4.3: 64 for S3, 48 otherwise.
    pub fn parallelism_ceiling(self) -> usize {
        match self {
            FromTo::S3Blob | FromTo::S3Local => 64,
            _ => 48,
        }
    }
}

impl fmt::Display for FromTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FromTo::LocalBlob => "LocalBlob",
            FromTo::BlobLocal => "BlobLocal",
            FromTo::BlobBlob => "BlobBlob",
            FromTo::LocalS3 => "LocalS3",
            FromTo::S3Local => "S3Local",
            FromTo::S3Blob => "S3Blob",
            FromTo::BlobS3 => "BlobS3",
            FromTo::LocalLocal => "LocalLocal",
            FromTo::FileFile => "FileFile",
        };
        write!(f, "{}", s)
    }
}

/// Overwrite policy for existing destination objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverwriteMode {
    True,
    False,
    Prompt,
    IfSourceNewer,
}

/// Whether/how sync deletes destination objects absent from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteDestination {
    True,
    False,
    Prompt,
}

/// Folder property preservation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderPropertiesOption {
    NoFolders,
    AllFolders,
    AllFoldersExceptRoot,
}

/// Symlink handling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymlinkMode {
    Skip,
    Follow,
    Preserve,
}

/// Include/exclude filter bundle, evaluated in the order specified by §4.3:
/// `list_of_files ∩ include_glob ∩ ¬exclude_glob ∩ date window ∩ attributes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    pub list_of_files: Option<Vec<String>>,
    pub include_glob: Vec<String>,
    pub exclude_glob: Vec<String>,
    /// Directory-scoped include (`--include-path`). Intersected with
    /// `include_glob`, not unioned.
    pub include_path: Vec<String>,
    pub exclude_path: Vec<String>,
    pub include_after: Option<DateTime<Utc>>,
    pub include_before: Option<DateTime<Utc>>,
    pub include_attributes: Vec<String>,
}

/// The policy bundle attached to a `JobOrder`: filters, overwrite mode,
/// and the transfer-shaping knobs that don't belong to `ConcurrencySettings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub overwrite: OverwriteMode,
    pub delete_destination: DeleteDestination,
    pub recursive: bool,
    pub preserve_info: bool,
    pub preserve_permissions: bool,
    pub follow_symlinks: SymlinkMode,
    pub folder_properties: FolderPropertiesOption,
    pub filters: FilterSpec,
    pub cap_mbps: Option<f64>,
    pub md5_validation: Md5ValidationMode,
    /// Opaque, pass-through customer-provided-key / client-side-encryption
    /// metadata. The engine never inspects or transforms this.
    pub cpk_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Md5ValidationMode {
    NoCheck,
    LogOnly,
    FailIfDifferent,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            overwrite: OverwriteMode::True,
            delete_destination: DeleteDestination::False,
            recursive: true,
            preserve_info: true,
            preserve_permissions: false,
            follow_symlinks: SymlinkMode::Skip,
            folder_properties: FolderPropertiesOption::AllFolders,
            filters: FilterSpec::default(),
            cap_mbps: None,
            md5_validation: Md5ValidationMode::NoCheck,
            cpk_metadata: None,
        }
    }
}

/// Monotone job-level status, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    InProgress,
    Cancelling,
    Cancelled,
    Paused,
    Completed,
    CompletedWithErrors,
    CompletedWithSkipped,
    CompletedWithErrorsAndSkipped,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled
                | JobStatus::Completed
                | JobStatus::CompletedWithErrors
                | JobStatus::CompletedWithSkipped
                | JobStatus::CompletedWithErrorsAndSkipped
                | JobStatus::Failed
        )
    }

    /// Whether a resume is permitted from this status (see §4.1 `ResumeJob`).
    pub fn resumable(self) -> bool {
        matches!(
            self,
            JobStatus::InProgress | JobStatus::Cancelling | JobStatus::Cancelled | JobStatus::Paused
        )
    }
}

/// A single JobPart's aggregate counters, mirrored from the plan file header
/// so `GetJobSummary` does not need to mmap the file on every poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateState {
    pub total_transfers: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
    pub bytes_over_wire: u64,
    pub total_bytes_enumerated: u64,
}

impl AggregateState {
    pub fn pending(&self) -> u64 {
        self.total_transfers
            .saturating_sub(self.completed + self.failed + self.skipped + self.cancelled)
    }
}

/// The durable job aggregate: `{ JobID, FromTo, Source, Destination, Policy,
/// Status, Parts[] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub from_to: FromTo,
    pub source: String,
    pub destination: String,
    pub policy: Policy,
    pub status: JobStatus,
    pub created_utc: DateTime<Utc>,
    /// `PartNum -> descriptor`. Densely numbered `0..K`.
    pub parts: Vec<JobPartDescriptor>,
}

/// Lightweight descriptor of a part kept in the `Job` aggregate; the full
/// transfer array lives only in the plan file (`conveyor-planfile`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPartDescriptor {
    pub part_num: u32,
    pub is_final_part: bool,
    pub aggregate: AggregateState,
}

impl Job {
    pub fn new(from_to: FromTo, source: String, destination: String, policy: Policy) -> Self {
        Job {
            job_id: JobId::new(),
            from_to,
            source,
            destination,
            policy,
            status: JobStatus::InProgress,
            created_utc: Utc::now(),
            parts: Vec::new(),
        }
    }

    /// Validate the `Parts` dense-numbering and single-final-part invariants
    /// from §3.
    pub fn validate_parts(&self) -> Result<()> {
        for (i, p) in self.parts.iter().enumerate() {
            if p.part_num != i as u32 {
                return Err(Error::NonDensePartNumbering {
                    expected: i as u32,
                    found: p.part_num,
                });
            }
        }
        let final_count = self.parts.iter().filter(|p| p.is_final_part).count();
        if final_count > 1 {
            return Err(Error::MultipleFinalParts(self.job_id.to_string()));
        }
        if let Some(last) = self.parts.last() {
            if final_count == 1 && !last.is_final_part {
                return Err(Error::validation(
                    "IsFinalPart must be the last created part",
                ));
            }
        }
        Ok(())
    }

    pub fn is_final_part_created(&self) -> bool {
        self.parts.iter().any(|p| p.is_final_part)
    }

    pub fn next_part_num(&self) -> u32 {
        self.parts.len() as u32
    }
}
