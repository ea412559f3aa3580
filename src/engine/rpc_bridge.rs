//! RPC Bridge: the front-end ↔ engine submission boundary.
//!
//! A front-end (the `conveyor` binary's CLI, or any future embedder) builds
//! a [`JobOrder`] and hands it to [`EngineHandle::submit`]. The bridge
//! resolves both endpoints to `Backend`s, materializes the transfer plan —
//! either the caller-supplied list (`copy`) or a freshly reconciled one
//! (`sync`, via the Sync Orchestrator) — partitions it into `JobPart`s, and
//! dispatches part 0 before returning, so the caller's first await point
//! already observes the job as `Started`: part 0 must begin before part
//! k>0 is even created.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use conveyor_manifest::{FilterSpec, FromTo, JobId, Policy, Transfer};

use crate::backend::{Backend, BackendRegistry};
use crate::engine::error::{EngineError, Result};
use crate::engine::job_lifecycle::{CreateOrAppendPartRequest, JobLifecycle, ResumeJobRequest};
use crate::engine::progress_manager::{
    EndOfJobExtras, OutputFormat, OutputLevel, PollOutcome, ProgressManager,
};
use crate::engine::scheduler::Scheduler;
use crate::engine::sync_orchestrator::{FilterEvaluator, SyncOrchestrator};

/// Transfers are partitioned into parts capped at this many entries each,
/// so no single plan file's variable zone (and no single in-memory
/// enumeration buffer) grows unbounded for very large trees.
pub const MAX_TRANSFERS_PER_PART: usize = 10_000;

/// What a front-end wants done: the two endpoints, the policy bundle, and
/// either an explicit transfer list (`copy`) or nothing, which signals
/// "reconcile the trees yourself" (`sync`).
pub struct JobOrder {
    pub source_uri: String,
    pub destination_uri: String,
    pub from_to: FromTo,
    pub policy: Policy,
    pub filter: Option<FilterSpec>,
    /// `Some` for `copy` (caller already enumerated); `None` for `sync`
    /// (the bridge runs the Sync Orchestrator itself).
    pub transfers: Option<Vec<Transfer>>,
}

/// Outcome of submitting a `JobOrder`: the assigned job ID and a handle to
/// the background task driving it to completion.
pub struct SubmittedJob {
    pub job_id: JobId,
    pub driver: JoinHandle<()>,
}

/// Threads the engine's context handles from the front-end entry point
/// rather than relying on process-wide Scheduler/Lifecycle singletons —
/// except the Progress Manager, which stays a singleton because
/// exactly-once stdout ownership requires it.
pub struct EngineHandle {
    lifecycle: Arc<JobLifecycle>,
    scheduler: Arc<Scheduler>,
    backends: Arc<BackendRegistry>,
    progress: ProgressManager,
}

impl EngineHandle {
    pub fn new(
        lifecycle: Arc<JobLifecycle>,
        scheduler: Arc<Scheduler>,
        backends: Arc<BackendRegistry>,
        progress: ProgressManager,
    ) -> Self {
        EngineHandle {
            lifecycle,
            scheduler,
            backends,
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressManager {
        &self.progress
    }

    pub fn lifecycle(&self) -> &Arc<JobLifecycle> {
        &self.lifecycle
    }

    /// Resolves both endpoints, materializes the plan (reconciling via the
    /// Sync Orchestrator when `order.transfers` is `None`), writes every
    /// part through the Job Lifecycle, and spawns the Scheduler's driver
    /// task for the job.
    pub async fn submit(&self, order: JobOrder) -> Result<SubmittedJob> {
        let (source, _source_root) = self
            .backends
            .create_from_uri(&order.source_uri)
            .await
            .map_err(EngineError::from)?;
        let (destination, _dest_root) = self
            .backends
            .create_from_uri(&order.destination_uri)
            .await
            .map_err(EngineError::from)?;
        let source: Arc<dyn Backend> = Arc::from(source);
        let destination: Arc<dyn Backend> = Arc::from(destination);

        let transfers = match order.transfers {
            Some(transfers) => transfers,
            None => {
                let spec = order.filter.clone().unwrap_or_default();
                let evaluator = FilterEvaluator::new(&spec).map_err(|e| EngineError::Fatal(e.to_string()))?;
                let orchestrator = SyncOrchestrator::new(
                    source.clone(),
                    destination.clone(),
                    order.from_to,
                    order.policy.clone(),
                    evaluator,
                );
                let result = orchestrator.reconcile().await?;
                info!(count = result.transfers.len(), bytes = result.total_bytes, "sync reconciliation complete");
                result.transfers
            }
        };

        if transfers.is_empty() {
            return Err(EngineError::Policy("NothingToDo: no transfers were scheduled".into()));
        }

        // Part 0 must begin before part k>0 is even created; since each
        // `create_or_append_part` call is awaited in
        // turn before the next is issued, that ordering falls out of this
        // loop's own sequencing — the Scheduler only starts once every part
        // is admitted, below.
        let mut job_id: Option<JobId> = None;
        let parts: Vec<&[Transfer]> = transfers.chunks(MAX_TRANSFERS_PER_PART).collect();
        let last_index = parts.len().saturating_sub(1);

        for (part_num, chunk) in parts.into_iter().enumerate() {
            let response = self
                .lifecycle
                .create_or_append_part(CreateOrAppendPartRequest {
                    job_id,
                    from_to: order.from_to,
                    source: order.source_uri.clone(),
                    destination: order.destination_uri.clone(),
                    policy: order.policy.clone(),
                    part_num: part_num as u32,
                    is_final_part: part_num == last_index,
                    transfers: chunk.to_vec(),
                })
                .await?;
            job_id = Some(response.job_id);
        }

        let job_id = job_id.ok_or_else(|| EngineError::Fatal("no parts were created".into()))?;
        let driver = self.spawn_driver(job_id, source, destination);
        Ok(SubmittedJob { job_id, driver })
    }

    /// Resumes a previously paused/cancelled/partially-failed job and
    /// spawns a fresh driver task for it.
    pub async fn resume(
        &self,
        job_id: JobId,
        source_uri: &str,
        destination_uri: &str,
    ) -> Result<SubmittedJob> {
        self.lifecycle
            .resume_job(ResumeJobRequest {
                job_id,
                include_filter: None,
                exclude_filter: None,
            })
            .await?;

        let (source, _) = self.backends.create_from_uri(source_uri).await.map_err(EngineError::from)?;
        let (destination, _) = self
            .backends
            .create_from_uri(destination_uri)
            .await
            .map_err(EngineError::from)?;

        let driver = self.spawn_driver(job_id, Arc::from(source), Arc::from(destination));
        Ok(SubmittedJob { job_id, driver })
    }

    pub async fn cancel(&self, job_id: JobId) -> Result<()> {
        self.scheduler.cancel(job_id).await;
        self.lifecycle.cancel_job(job_id).await
    }

    pub async fn pause(&self, job_id: JobId) -> Result<()> {
        self.scheduler.cancel(job_id).await;
        self.lifecycle.pause_job(job_id).await
    }

    fn spawn_driver(
        &self,
        job_id: JobId,
        source: Arc<dyn Backend>,
        destination: Arc<dyn Backend>,
    ) -> JoinHandle<()> {
        let lifecycle = self.lifecycle.clone();
        let scheduler = self.scheduler.clone();
        let progress = self.progress.clone();

        let reporter = progress.initiate_progress_reporting(job_id, {
            let lifecycle = lifecycle.clone();
            let scheduler = scheduler.clone();
            move |job_id| {
                let lifecycle = lifecycle.clone();
                let scheduler = scheduler.clone();
                async move {
                    let summary = lifecycle.get_job_summary(job_id).await.ok()?;
                    let (failed_transfers, skipped_transfers) = lifecycle
                        .failed_and_skipped_transfers(job_id)
                        .await
                        .unwrap_or_default();
                    let is_final = summary.job_status.is_terminal();

                    let extras = if is_final {
                        let transfers_finalized = summary.transfers_completed
                            + summary.transfers_failed
                            + summary.transfers_skipped;
                        let breakdown = lifecycle.entity_breakdown(job_id).await.unwrap_or_default();
                        let metrics = scheduler.metrics_for(job_id).await.unwrap_or_default();
                        Some(EndOfJobExtras {
                            file_transfers: breakdown.file_transfers,
                            folder_property_transfers: breakdown.folder_property_transfers,
                            symlink_transfers: breakdown.symlink_transfers,
                            folders_completed: breakdown.folders_completed,
                            folders_failed: breakdown.folders_failed,
                            folders_skipped: breakdown.folders_skipped,
                            skipped_symlink_count: breakdown.skipped_symlink_count,
                            hardlinks_converted_count: 0,
                            average_iops: metrics.average_iops(transfers_finalized),
                            average_e2e_milliseconds: metrics.average_e2e_milliseconds(),
                            network_error_percentage: metrics.network_error_percentage(transfers_finalized),
                            server_busy_percentage: metrics.server_busy_percentage(),
                        })
                    } else {
                        None
                    };

                    Some(PollOutcome {
                        summary,
                        failed_transfers,
                        skipped_transfers,
                        is_final,
                        extras,
                    })
                }
            }
        });

        tokio::spawn(async move {
            let outcome = scheduler.run_job(&lifecycle, job_id, source, destination).await;
            if let Err(e) = outcome {
                error!(%job_id, error = %e, "job driver failed");
                progress.error(format!("job {job_id} failed: {e}"));
            }
            // Let the reporter's own terminal-status check end the ticker;
            // just make sure it isn't orphaned past the driver's own exit.
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), reporter).await;
        })
    }
}

/// Convenience constructor mirroring the CLI's `--output-type`/
/// `--output-level` flags, used by the binary's entry point.
pub fn default_progress_manager(format: OutputFormat, level: OutputLevel) -> (ProgressManager, JoinHandle<()>) {
    ProgressManager::spawn(format, level)
}
