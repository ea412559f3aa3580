//! Job Lifecycle & Plan Store.
//!
//! Accepts `CreateOrAppendPart` requests, persists each part as a plan file
//! via `conveyor_planfile`, and answers the read/write accessors
//! (`GetJobSummary`, `CancelJob`, `ResumeJob`, ...) that sit above it. The
//! durable `Job` aggregate (as opposed to the per-part plan file) is kept
//! in memory and mirrored to a JSON sidecar through a small write-behind
//! queue: dirty job IDs are sent over an unbounded channel and flushed in
//! a batch every 500ms, so a burst of `CreateOrAppendPart`/status-update
//! calls costs one `fs::write` instead of one per call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use conveyor_audit::TelemetryLogger;
use conveyor_manifest::{
    AggregateState, FromTo, Job, JobId, JobPartDescriptor, JobStatus, Policy, Transfer,
};
use conveyor_planfile::builder::{PlanFileBuilder, PlanFileHeader, TransferInput};
use conveyor_planfile::layout::{EntityTypeCode, JobStatusCode, TransferStatusCode};
use conveyor_planfile::{PlanFileReader, PLAN_FILE_VERSION};

use crate::engine::error::{EngineError, Result};

/// One freshly submitted part, not yet written to disk.
#[derive(Debug, Clone)]
pub struct CreateOrAppendPartRequest {
    /// `None` to start a new job; `Some` to append a part to an existing one.
    pub job_id: Option<JobId>,
    pub from_to: FromTo,
    pub source: String,
    pub destination: String,
    pub policy: Policy,
    pub part_num: u32,
    pub is_final_part: bool,
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Clone)]
pub struct CreateOrAppendPartResponse {
    pub job_id: JobId,
    pub job_started: bool,
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job_id: JobId,
    pub job_status: JobStatus,
    pub total_transfers: u64,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    pub transfers_skipped: u64,
    pub bytes_over_wire: u64,
    pub total_bytes_enumerated: u64,
    pub complete_job_ordered: bool,
}

/// Per-entity-type totals and folder/symlink status breakdowns for the
/// end-of-job summary (spec.md §6). `conveyor_manifest::EntityType` has no
/// special-file variant, so there is nothing to count toward
/// `SkippedSpecialFileCount` — it is always reported as 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityBreakdown {
    pub file_transfers: u64,
    pub folder_property_transfers: u64,
    pub symlink_transfers: u64,
    pub folders_completed: u64,
    pub folders_failed: u64,
    pub folders_skipped: u64,
    pub skipped_symlink_count: u64,
}

#[derive(Debug, Clone)]
pub struct JobDetails {
    pub source: String,
    pub destination: String,
    pub from_to: FromTo,
    pub trailing_dot: bool,
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResumeJobRequest {
    pub job_id: JobId,
    pub include_filter: Option<Vec<String>>,
    pub exclude_filter: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ResumeJobResponse {
    pub cancelled_pause_resumed: bool,
    pub error_msg: Option<String>,
}

/// One in-memory part: the lightweight descriptor plus the live mmap
/// handle used for status reads/writes. `None` once the part has been
/// removed (`RemoveJob`).
struct PartHandle {
    reader: Arc<PlanFileReader>,
    content_hash: blake3::Hash,
}

struct JobRecord {
    job: Job,
    parts: HashMap<u32, PartHandle>,
}

/// Durable record of every transfer order, partitioned into parts.
pub struct JobLifecycle {
    plan_dir: PathBuf,
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    dirty_tx: mpsc::UnboundedSender<JobId>,
    shutdown: Arc<AtomicBool>,
}

impl JobLifecycle {
    /// Opens (creating if needed) the plan directory and spawns the
    /// write-behind flush task. The returned `JoinHandle` should be awaited
    /// after calling `shutdown()`.
    pub async fn open(plan_dir: impl Into<PathBuf>) -> Result<(Arc<Self>, JoinHandle<()>)> {
        let plan_dir = plan_dir.into();
        tokio::fs::create_dir_all(&plan_dir).await?;

        let (dirty_tx, mut dirty_rx) = mpsc::unbounded_channel::<JobId>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let lifecycle = Arc::new(JobLifecycle {
            plan_dir: plan_dir.clone(),
            jobs: RwLock::new(HashMap::new()),
            dirty_tx,
            shutdown: shutdown.clone(),
        });

        lifecycle.recover().await?;

        let flush_target = lifecycle.clone();
        let handle = tokio::spawn(async move {
            let mut pending: std::collections::HashSet<JobId> = std::collections::HashSet::new();
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(500));
            loop {
                tokio::select! {
                    maybe_id = dirty_rx.recv() => {
                        match maybe_id {
                            Some(id) => { pending.insert(id); }
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        for id in pending.drain() {
                            if let Err(e) = flush_target.flush_job_metadata(id).await {
                                warn!(job_id = %id, error = %e, "failed to flush job metadata");
                            }
                        }
                        if flush_target.shutdown.load(Ordering::Acquire) {
                            break;
                        }
                    }
                }
            }
            for id in pending.drain() {
                let _ = flush_target.flush_job_metadata(id).await;
            }
        });

        Ok((lifecycle, handle))
    }

    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn job_metadata_path(&self, job_id: JobId) -> PathBuf {
        self.plan_dir.join(format!("{job_id}.job.json"))
    }

    async fn flush_job_metadata(&self, job_id: JobId) -> Result<()> {
        let jobs = self.jobs.read().await;
        if let Some(record) = jobs.get(&job_id) {
            let bytes = serde_json::to_vec_pretty(&record.job)
                .map_err(|e| EngineError::Fatal(e.to_string()))?;
            tokio::fs::write(self.job_metadata_path(job_id), bytes).await?;
        }
        Ok(())
    }

    fn mark_dirty(&self, job_id: JobId) {
        let _ = self.dirty_tx.send(job_id);
    }

    /// On startup, scan the plan directory and rebuild `Job` objects from
    /// the JSON sidecars and the plan files they reference. Rehydrating the
    /// Scheduler with `Pending`/`Failed` transfers only happens under an
    /// explicit `ResumeJob` call.
    async fn recover(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.plan_dir).await?;
        let mut sidecars = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(".job.json"))
                    .unwrap_or(false)
            {
                sidecars.push(path);
            }
        }

        let mut jobs = self.jobs.write().await;
        for path in sidecars {
            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read job sidecar");
                    continue;
                }
            };
            let job: Job = match serde_json::from_slice(&bytes) {
                Ok(j) => j,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt job sidecar, skipping");
                    continue;
                }
            };

            let mut parts = HashMap::new();
            for descriptor in &job.parts {
                let part_path = self
                    .plan_dir
                    .join(job.job_id.plan_file_name(descriptor.part_num, PLAN_FILE_VERSION));
                if !part_path.exists() {
                    continue;
                }
                match PlanFileReader::open(&part_path) {
                    Ok(reader) => {
                        if reader.verify_checksum().is_err() {
                            warn!(job_id = %job.job_id, part = descriptor.part_num, "plan file checksum mismatch on recovery");
                            continue;
                        }
                        parts.insert(
                            descriptor.part_num,
                            PartHandle {
                                reader: Arc::new(reader),
                                content_hash: blake3::hash(&[]),
                            },
                        );
                    }
                    Err(e) => {
                        warn!(job_id = %job.job_id, part = descriptor.part_num, error = %e, "failed to reopen plan file on recovery");
                    }
                }
            }

            info!(job_id = %job.job_id, parts = parts.len(), "recovered job from disk");
            jobs.insert(job.job_id, JobRecord { job, parts });
        }
        Ok(())
    }

    /// `CreateOrAppendPart`. Idempotent on `(JobID, PartNum,
    /// content_hash)`: resubmitting an identical part is a no-op returning
    /// success; a conflicting resubmission for the same slot fails with
    /// `PlanConflict`.
    pub async fn create_or_append_part(
        &self,
        req: CreateOrAppendPartRequest,
    ) -> Result<CreateOrAppendPartResponse> {
        if req.part_num == 0 && req.transfers.is_empty() && req.is_final_part {
            return Err(EngineError::Policy(
                "NoTransfersScheduledErr: part 0 carries zero transfers and IsFinalPart=true"
                    .to_string(),
            ));
        }

        let job_id = req.job_id.unwrap_or_default();
        let content_hash = hash_transfers(&req.transfers);

        let mut jobs = self.jobs.write().await;
        let is_new_job = !jobs.contains_key(&job_id);

        if is_new_job && req.part_num != 0 {
            return Err(EngineError::Fatal(format!(
                "job {job_id} does not exist and the first part submitted is not part 0"
            )));
        }

        if is_new_job {
            jobs.insert(
                job_id,
                JobRecord {
                    job: Job::new(
                        req.from_to,
                        req.source.clone(),
                        req.destination.clone(),
                        req.policy.clone(),
                    ),
                    parts: HashMap::new(),
                },
            );
            // `Job::new` generates its own random JobId; overwrite with the
            // caller-supplied one if present so resubmission is keyed
            // consistently.
            if let Some(record) = jobs.get_mut(&job_id) {
                record.job.job_id = job_id;
            }
        }

        let record = jobs.get_mut(&job_id).expect("just inserted or pre-existing");

        if let Some(existing) = record.parts.get(&req.part_num) {
            if existing.content_hash == content_hash {
                debug!(%job_id, part = req.part_num, "CreateOrAppendPart idempotent no-op");
                return Ok(CreateOrAppendPartResponse {
                    job_id,
                    job_started: false,
                    error_msg: None,
                });
            }
            return Err(EngineError::Conflict(format!(
                "part {} of job {} conflicts with an already-persisted part",
                req.part_num, job_id
            )));
        }

        if req.part_num != record.job.next_part_num() {
            return Err(EngineError::Fatal(format!(
                "part {} submitted out of order; expected {}",
                req.part_num,
                record.job.next_part_num()
            )));
        }

        let header = PlanFileHeader {
            job_id: job_id.as_uuid().as_u128(),
            from_to: from_to_code(req.from_to),
            part_num: req.part_num,
            is_final_part: req.is_final_part,
            created_utc_millis: chrono::Utc::now().timestamp_millis(),
            source_root: req.source.clone(),
            destination_root: req.destination.clone(),
        };

        let mut builder = PlanFileBuilder::new(header);
        let mut total_bytes = 0u64;
        for transfer in &req.transfers {
            total_bytes += transfer.size;
            builder.add_transfer(transfer_to_input(transfer)?);
        }

        let bytes = builder
            .build()
            .map_err(|e| EngineError::Fatal(e.to_string()))?;

        let part_path = self
            .plan_dir
            .join(job_id.plan_file_name(req.part_num, PLAN_FILE_VERSION));
        tokio::fs::write(&part_path, &bytes).await?;

        let reader =
            PlanFileReader::open(&part_path).map_err(|e| EngineError::Fatal(e.to_string()))?;

        record.parts.insert(
            req.part_num,
            PartHandle {
                reader: Arc::new(reader),
                content_hash,
            },
        );
        record.job.parts.push(JobPartDescriptor {
            part_num: req.part_num,
            is_final_part: req.is_final_part,
            aggregate: AggregateState {
                total_transfers: req.transfers.len() as u64,
                total_bytes_enumerated: total_bytes,
                ..Default::default()
            },
        });
        record
            .job
            .validate_parts()
            .map_err(|e| EngineError::Fatal(e.to_string()))?;

        drop(jobs);
        self.mark_dirty(job_id);

        if let Ok(mut logger) = self.telemetry(job_id) {
            if is_new_job {
                let _ = logger.log_job_start(&job_id.to_string(), req.transfers.len() as u32, total_bytes);
            } else {
                let _ = logger.log_plan(&job_id.to_string(), req.transfers.len() as u32, total_bytes);
            }
        }

        Ok(CreateOrAppendPartResponse {
            job_id,
            job_started: is_new_job,
            error_msg: None,
        })
    }

    /// Opens (creating if absent) the per-job append-only telemetry log
    /// named by the `<jobID>.log` filename convention. Per-transfer detail
    /// (`file_start`/`window_ok`/`window_fail`) is appended by the
    /// Scheduler as it executes chunks; `job_complete` is appended once the
    /// job reaches a terminal status.
    pub fn telemetry(&self, job_id: JobId) -> std::result::Result<TelemetryLogger, conveyor_audit::Error> {
        TelemetryLogger::new(self.plan_dir.join(job_id.log_file_name()))
    }

    pub async fn get_job_summary(&self, job_id: JobId) -> Result<JobSummary> {
        let jobs = self.jobs.read().await;
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;

        let mut completed = 0u64;
        let mut failed = 0u64;
        let mut skipped = 0u64;
        let mut total = 0u64;
        let mut bytes_over_wire = 0u64;
        let mut total_bytes_enumerated = 0u64;

        for part in record.parts.values() {
            completed += part.reader.completed_count() as u64;
            failed += part.reader.failed_count() as u64;
            skipped += part.reader.skipped_count() as u64;
            total += part.reader.total_transfers() as u64;
        }
        for descriptor in &record.job.parts {
            total_bytes_enumerated += descriptor.aggregate.total_bytes_enumerated;
            bytes_over_wire += descriptor.aggregate.bytes_over_wire;
        }

        Ok(JobSummary {
            job_id,
            job_status: record.job.status,
            total_transfers: total,
            transfers_completed: completed,
            transfers_failed: failed,
            transfers_skipped: skipped,
            bytes_over_wire,
            total_bytes_enumerated,
            complete_job_ordered: record.job.is_final_part_created(),
        })
    }

    /// Scans every part's decoded transfer records to build the end-of-job
    /// entity-type and folder/symlink breakdown (spec.md §6). More expensive
    /// than `get_job_summary`'s aggregate counters, so callers should only
    /// invoke this once a job reaches a terminal state.
    pub async fn entity_breakdown(&self, job_id: JobId) -> Result<EntityBreakdown> {
        let jobs = self.jobs.read().await;
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;

        let mut breakdown = EntityBreakdown::default();
        for part in record.parts.values() {
            for index in 0..part.reader.total_transfers() {
                let Ok(view) = part.reader.transfer(index) else {
                    continue;
                };
                match view.entity_type {
                    EntityTypeCode::File => breakdown.file_transfers += 1,
                    EntityTypeCode::Folder => {
                        breakdown.folder_property_transfers += 1;
                        match view.status {
                            TransferStatusCode::Completed => breakdown.folders_completed += 1,
                            TransferStatusCode::Failed => breakdown.folders_failed += 1,
                            TransferStatusCode::Skipped => breakdown.folders_skipped += 1,
                            _ => {}
                        }
                    }
                    EntityTypeCode::Symlink => {
                        breakdown.symlink_transfers += 1;
                        if view.status == TransferStatusCode::Skipped {
                            breakdown.skipped_symlink_count += 1;
                        }
                    }
                }
            }
        }
        Ok(breakdown)
    }

    /// Destination-relative paths of every `Failed`/`Skipped` transfer
    /// across all parts, for the live and end-of-job `FailedTransfers[]` /
    /// `SkippedTransfers[]` fields (spec.md §6).
    pub async fn failed_and_skipped_transfers(
        &self,
        job_id: JobId,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let jobs = self.jobs.read().await;
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;

        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        for part in record.parts.values() {
            for index in 0..part.reader.total_transfers() {
                let Ok(view) = part.reader.transfer(index) else {
                    continue;
                };
                match view.status {
                    TransferStatusCode::Failed => failed.push(view.destination_relative),
                    TransferStatusCode::Skipped => skipped.push(view.destination_relative),
                    _ => {}
                }
            }
        }
        Ok((failed, skipped))
    }

    /// Sets a job's final terminal status once the Scheduler has observed
    /// every transfer across every part resolve. Only the Scheduler calls
    /// this; `CancelJob`/`PauseJob` manage the non-terminal transitions
    /// above.
    pub async fn set_terminal_status(&self, job_id: JobId, status: JobStatus) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get_mut(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;

        record.job.status = status;
        let code = match status {
            JobStatus::Completed => JobStatusCode::Completed,
            JobStatus::CompletedWithErrors => JobStatusCode::CompletedWithErrors,
            JobStatus::CompletedWithSkipped => JobStatusCode::CompletedWithSkipped,
            JobStatus::CompletedWithErrorsAndSkipped => JobStatusCode::CompletedWithErrorsAndSkipped,
            _ => {
                return Err(EngineError::Fatal(format!(
                    "set_terminal_status called with non-terminal status {status:?}"
                )))
            }
        };
        for part in record.parts.values() {
            part.reader.set_job_status(code);
        }
        drop(jobs);
        self.mark_dirty(job_id);
        Ok(())
    }

    /// Marks a job outright `Failed`, bypassing the normal
    /// completed/failed/skipped tally used by `set_terminal_status`. Used
    /// when a fatal condition (quota exhaustion, widespread auth failure)
    /// means in-flight transfers should finish but no new work should be
    /// admitted.
    pub async fn mark_failed(&self, job_id: JobId, reason: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get_mut(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;

        record.job.status = JobStatus::Failed;
        for part in record.parts.values() {
            part.reader.set_job_status(JobStatusCode::Failed);
        }
        drop(jobs);
        self.mark_dirty(job_id);
        warn!(%job_id, reason, "job marked Failed");
        Ok(())
    }

    pub async fn get_job_details(&self, job_id: JobId) -> Result<JobDetails> {
        let jobs = self.jobs.read().await;
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;
        Ok(JobDetails {
            source: record.job.source.clone(),
            destination: record.job.destination.clone(),
            from_to: record.job.from_to,
            trailing_dot: record.job.source.ends_with('.'),
            error_msg: None,
        })
    }

    /// `CancelJob`. Transitions status to `Cancelling`; chunks already
    /// in flight are left to the Scheduler to run to their cancellation
    /// point.
    pub async fn cancel_job(&self, job_id: JobId) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get_mut(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;

        if record.job.status.is_terminal() {
            // Idempotence law: cancel of a terminal job is a no-op.
            return Ok(());
        }

        record.job.status = JobStatus::Cancelling;
        for part in record.parts.values() {
            part.reader.set_job_status(JobStatusCode::Cancelling);
        }
        drop(jobs);
        self.mark_dirty(job_id);
        Ok(())
    }

    pub async fn pause_job(&self, job_id: JobId) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get_mut(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;
        record.job.status = JobStatus::Paused;
        for part in record.parts.values() {
            part.reader.set_job_status(JobStatusCode::Paused);
        }
        drop(jobs);
        self.mark_dirty(job_id);
        Ok(())
    }

    /// `ResumeJob`. Re-scans persisted parts, resets `Failed` transfers to
    /// `Pending` (never `Skipped`, which is a terminal state), and restarts
    /// scheduling.
    pub async fn resume_job(&self, req: ResumeJobRequest) -> Result<ResumeJobResponse> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get_mut(&req.job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {} not found", req.job_id)))?;

        if record.job.status == JobStatus::Completed
            || record.job.status == JobStatus::CompletedWithErrors
            || record.job.status == JobStatus::CompletedWithSkipped
            || record.job.status == JobStatus::CompletedWithErrorsAndSkipped
        {
            // Idempotence law: resume of a completed job is a no-op.
            return Ok(ResumeJobResponse {
                cancelled_pause_resumed: false,
                error_msg: None,
            });
        }

        if !record.job.status.resumable() {
            return Err(EngineError::Conflict(format!(
                "job {} is in status {:?} and cannot be resumed",
                req.job_id, record.job.status
            )));
        }

        for part in record.parts.values() {
            for index in part.reader.resumable_indices().unwrap_or_default() {
                if let Ok(TransferStatusCode::Failed) = part.reader.transfer_status(index) {
                    let _ = part.reader.set_transfer_status(index, TransferStatusCode::Pending);
                }
            }
            part.reader.set_job_status(JobStatusCode::InProgress);
        }
        record.job.status = JobStatus::InProgress;
        drop(jobs);
        self.mark_dirty(req.job_id);

        Ok(ResumeJobResponse {
            cancelled_pause_resumed: true,
            error_msg: None,
        })
    }

    /// `RemoveJob`. Allowed only when terminal; deletes plan and log files.
    pub async fn remove_job(&self, job_id: JobId) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;
        if !record.job.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "job {job_id} is not terminal and cannot be removed"
            )));
        }

        for part_num in record.parts.keys() {
            let part_path = self
                .plan_dir
                .join(job_id.plan_file_name(*part_num, PLAN_FILE_VERSION));
            let _ = tokio::fs::remove_file(part_path).await;
        }
        let _ = tokio::fs::remove_file(self.plan_dir.join(job_id.log_file_name())).await;
        let _ = tokio::fs::remove_file(self.job_metadata_path(job_id)).await;

        jobs.remove(&job_id);
        Ok(())
    }

    pub async fn list_jobs(&self) -> Vec<JobId> {
        self.jobs.read().await.keys().copied().collect()
    }

    /// Part numbers persisted for `job_id`, in ascending order.
    pub async fn part_numbers(&self, job_id: JobId) -> Result<Vec<u32>> {
        let jobs = self.jobs.read().await;
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;
        let mut nums: Vec<u32> = record.parts.keys().copied().collect();
        nums.sort_unstable();
        Ok(nums)
    }

    pub async fn from_to(&self, job_id: JobId) -> Result<FromTo> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id)
            .map(|r| r.job.from_to)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))
    }

    pub async fn part_reader(&self, job_id: JobId, part_num: u32) -> Result<Arc<PlanFileReader>> {
        let jobs = self.jobs.read().await;
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id} not found")))?;
        record
            .parts
            .get(&part_num)
            .map(|p| p.reader.clone())
            .ok_or_else(|| EngineError::NotFound(format!("part {part_num} not found")))
    }

    pub fn plan_dir(&self) -> &Path {
        &self.plan_dir
    }
}

fn hash_transfers(transfers: &[Transfer]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for t in transfers {
        hasher.update(t.source_relative.as_bytes());
        hasher.update(t.destination_relative.as_bytes());
        hasher.update(&t.size.to_le_bytes());
    }
    hasher.finalize()
}

fn from_to_code(from_to: FromTo) -> u8 {
    match from_to {
        FromTo::LocalBlob => 0,
        FromTo::BlobLocal => 1,
        FromTo::BlobBlob => 2,
        FromTo::LocalS3 => 3,
        FromTo::S3Local => 4,
        FromTo::S3Blob => 5,
        FromTo::BlobS3 => 6,
        FromTo::LocalLocal => 7,
        FromTo::FileFile => 8,
    }
}

fn transfer_to_input(transfer: &Transfer) -> Result<TransferInput> {
    let entity_type = match transfer.entity_type {
        conveyor_manifest::EntityType::File => EntityTypeCode::File,
        conveyor_manifest::EntityType::Folder => EntityTypeCode::Folder,
        conveyor_manifest::EntityType::Symlink => EntityTypeCode::Symlink,
    };
    let last_modified_millis = transfer
        .last_modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    Ok(TransferInput {
        index: transfer.index,
        source_relative: transfer.source_relative.clone(),
        destination_relative: transfer.destination_relative.clone(),
        size: transfer.size,
        last_modified_millis,
        content_md5: transfer.content_md5,
        entity_type,
        chunk_count: transfer.chunk_count,
        blob_tier: transfer.blob_tier.clone(),
        metadata: transfer.metadata.clone(),
    })
}
