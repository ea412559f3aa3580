//! Transfer Scheduler / Storage Transfer Engine.
//!
//! Drives one job to completion: for each part, dispatches its resumable
//! transfers across a bounded worker pool, retries chunk failures through
//! `conveyor_resilience::with_retry`, and folds every outcome back into the
//! part's plan file via `set_transfer_status`/`increment_*`. The pool size
//! auto-tunes within `ConcurrencySettings`' floor/ceiling the same way the
//! legacy tool's `core::concurrency` module adjusts its worker count, just
//! keyed off `FromTo` instead of a fixed constant.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use conveyor_audit::TelemetryLogger;
use conveyor_manifest::{Chunk, ChunkKind, FromTo, JobId, JobStatus};
use conveyor_planfile::layout::{EntityTypeCode, TransferStatusCode};
use conveyor_planfile::reader::TransferView;
use conveyor_planfile::PlanFileReader;
use conveyor_resilience::{with_retry, RateLimiter, ResilienceError, RetryPolicy};
use conveyor_semantic::prioritizer::{ComposablePrioritizer, TransferItem};
use conveyor_semantic::SemanticRegistry;

use crate::backend::{Backend, WriteOptions};
use crate::credential::{AuthFailureTracker, CredentialProvider};
use crate::engine::error::{EngineError, Result};
use crate::engine::job_lifecycle::JobLifecycle;

/// Worker-pool sizing for one job, derived from `FromTo`'s crawl multiplier
/// and ceiling (§4.2/§4.3 share the same table: local pairs run a smaller
/// pool than object-store-to-object-store pairs, which tolerate far more
/// concurrent connections).
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencySettings {
    pub initial_pool_size: usize,
    pub max_pool_size: usize,
    pub auto_tune: bool,
}

impl ConcurrencySettings {
    pub fn for_from_to(from_to: FromTo) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let ceiling = from_to.parallelism_ceiling();
        let initial = (cpus * from_to.crawl_multiplier() / 2).clamp(4, ceiling);
        ConcurrencySettings {
            initial_pool_size: initial,
            max_pool_size: ceiling,
            auto_tune: true,
        }
    }
}

/// Outcome of running a job (or resuming it) to the point where no more
/// resumable transfers remain across its parts.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
}

/// Per-job mutable scheduling state: the live pool size (subject to
/// auto-tune), the cooperative cancellation flag `CancelJob` flips, and the
/// counters the end-of-job summary (spec.md §6) is built from.
struct JobRuntime {
    cancel: Arc<AtomicBool>,
    pool_size: Arc<AtomicU64>,
    recent_failures: Arc<AtomicU64>,
    auth_tracker: Arc<AuthFailureTracker>,
    chunk_stats: Arc<ChunkAttemptStats>,
    network_error_transfers: Arc<AtomicU64>,
    e2e_nanos_sum: Arc<AtomicU64>,
    e2e_samples: Arc<AtomicU64>,
    started_at: Instant,
}

/// Per-chunk attempt counters feeding `ServerBusyPercentage`: every
/// `with_retry` closure invocation counts as an attempt, and every
/// invocation past the first (i.e. a retry) counts as a "busy" attempt —
/// verified against spec.md §8 scenario 4 (two 503s then a 200 per chunk
/// gives 2 busy attempts out of 3, ≈66%).
#[derive(Default)]
struct ChunkAttemptStats {
    attempts: AtomicU64,
    busy_attempts: AtomicU64,
}

impl ChunkAttemptStats {
    fn record(&self, attempt: u32) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if attempt > 1 {
            self.busy_attempts.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Snapshot of a job's runtime counters, read by the Progress Manager's
/// end-of-job summary (spec.md §6). Distinct from `JobSummary`, which comes
/// from the durable plan file and survives a process restart; these
/// counters are in-memory only and reset to zero on resume.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobRuntimeMetrics {
    pub chunk_attempts: u64,
    pub chunk_busy_attempts: u64,
    pub network_error_transfers: u64,
    pub e2e_nanos_sum: u64,
    pub e2e_samples: u64,
    pub elapsed_secs: f64,
}

impl JobRuntimeMetrics {
    pub fn server_busy_percentage(&self) -> f64 {
        if self.chunk_attempts == 0 {
            0.0
        } else {
            100.0 * self.chunk_busy_attempts as f64 / self.chunk_attempts as f64
        }
    }

    pub fn average_e2e_milliseconds(&self) -> f64 {
        if self.e2e_samples == 0 {
            0.0
        } else {
            (self.e2e_nanos_sum as f64 / self.e2e_samples as f64) / 1_000_000.0
        }
    }

    pub fn average_iops(&self, transfers_finalized: u64) -> f64 {
        if self.elapsed_secs <= 0.0 {
            0.0
        } else {
            transfers_finalized as f64 / self.elapsed_secs
        }
    }

    pub fn network_error_percentage(&self, transfers_finalized: u64) -> f64 {
        if transfers_finalized == 0 {
            0.0
        } else {
            100.0 * self.network_error_transfers as f64 / transfers_finalized as f64
        }
    }
}

/// The bounded worker pool and chunk dispatch policy described by §4.2.
pub struct Scheduler {
    retry_policy: RetryPolicy,
    rate_limiter: Option<Arc<RateLimiter>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    runtimes: RwLock<HashMap<JobId, Arc<JobRuntime>>>,
}

impl Scheduler {
    pub fn new(retry_policy: RetryPolicy, rate_limiter: Option<Arc<RateLimiter>>) -> Self {
        Scheduler {
            retry_policy,
            rate_limiter,
            credentials: None,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Installs the credential capability consulted on an auth failure for
    /// a single silent refresh-and-retry before the transfer gives up.
    /// Without one, every auth failure counts toward the job's fatal
    /// escalation window with no retry attempted.
    pub fn with_credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Signals cooperative cancellation for `job_id`. In-flight chunks run
    /// to their next checkpoint; not-yet-dispatched transfers are left
    /// `Pending` so a later `ResumeJob` picks them back up.
    pub async fn cancel(&self, job_id: JobId) {
        if let Some(runtime) = self.runtimes.read().await.get(&job_id) {
            runtime.cancel.store(true, Ordering::Release);
        }
    }

    async fn runtime_for(&self, job_id: JobId, settings: ConcurrencySettings) -> Arc<JobRuntime> {
        let mut runtimes = self.runtimes.write().await;
        runtimes
            .entry(job_id)
            .or_insert_with(|| {
                Arc::new(JobRuntime {
                    cancel: Arc::new(AtomicBool::new(false)),
                    pool_size: Arc::new(AtomicU64::new(settings.initial_pool_size as u64)),
                    recent_failures: Arc::new(AtomicU64::new(0)),
                    auth_tracker: Arc::new(AuthFailureTracker::new()),
                    chunk_stats: Arc::new(ChunkAttemptStats::default()),
                    network_error_transfers: Arc::new(AtomicU64::new(0)),
                    e2e_nanos_sum: Arc::new(AtomicU64::new(0)),
                    e2e_samples: Arc::new(AtomicU64::new(0)),
                    started_at: Instant::now(),
                })
            })
            .clone()
    }

    /// Reads back `job_id`'s in-memory runtime counters for the Progress
    /// Manager's end-of-job summary. `None` once the job hasn't started (or
    /// the process has restarted since) — callers should report zeros.
    pub async fn metrics_for(&self, job_id: JobId) -> Option<JobRuntimeMetrics> {
        let runtimes = self.runtimes.read().await;
        let runtime = runtimes.get(&job_id)?;
        Some(JobRuntimeMetrics {
            chunk_attempts: runtime.chunk_stats.attempts.load(Ordering::Relaxed),
            chunk_busy_attempts: runtime.chunk_stats.busy_attempts.load(Ordering::Relaxed),
            network_error_transfers: runtime.network_error_transfers.load(Ordering::Relaxed),
            e2e_nanos_sum: runtime.e2e_nanos_sum.load(Ordering::Relaxed),
            e2e_samples: runtime.e2e_samples.load(Ordering::Relaxed),
            elapsed_secs: runtime.started_at.elapsed().as_secs_f64(),
        })
    }

    /// Runs every resumable transfer in every part of `job_id` to
    /// completion (or until cancelled/exhausted), updating the job's
    /// terminal status in the Job Lifecycle once done.
    pub async fn run_job(
        &self,
        lifecycle: &Arc<JobLifecycle>,
        job_id: JobId,
        source: Arc<dyn Backend>,
        dest: Arc<dyn Backend>,
    ) -> Result<JobOutcome> {
        let from_to = lifecycle.from_to(job_id).await?;
        let settings = ConcurrencySettings::for_from_to(from_to);
        let runtime = self.runtime_for(job_id, settings).await;
        let telemetry = lifecycle.telemetry(job_id).ok();

        let mut outcome = JobOutcome::default();

        for part_num in lifecycle.part_numbers(job_id).await? {
            if runtime.cancel.load(Ordering::Acquire) {
                break;
            }
            let reader = lifecycle.part_reader(job_id, part_num).await?;
            let part_outcome = self
                .run_part(job_id, &reader, &runtime, settings, source.clone(), dest.clone(), telemetry.clone())
                .await?;
            outcome.completed += part_outcome.completed;
            outcome.failed += part_outcome.failed;
            outcome.skipped += part_outcome.skipped;
            outcome.cancelled += part_outcome.cancelled;

            if runtime.auth_tracker.is_auth_fatal() {
                runtime.cancel.store(true, Ordering::Release);
                lifecycle
                    .mark_failed(job_id, "AuthFatal: more than half of the first 20 transfers failed authentication")
                    .await?;
                return Ok(outcome);
            }
        }

        self.finalize_job_status(lifecycle, job_id, &outcome, runtime.cancel.load(Ordering::Acquire), telemetry)
            .await?;

        Ok(outcome)
    }

    async fn run_part(
        &self,
        job_id: JobId,
        reader: &Arc<PlanFileReader>,
        runtime: &Arc<JobRuntime>,
        settings: ConcurrencySettings,
        source: Arc<dyn Backend>,
        dest: Arc<dyn Backend>,
        telemetry: Option<TelemetryLogger>,
    ) -> Result<JobOutcome> {
        let resumable = reader
            .resumable_indices()
            .map_err(|e| EngineError::Fatal(e.to_string()))?;

        let source_root = reader
            .source_root()
            .map_err(|e| EngineError::Fatal(e.to_string()))?;
        let dest_root = reader
            .destination_root()
            .map_err(|e| EngineError::Fatal(e.to_string()))?;

        let pool_size = runtime.pool_size.load(Ordering::Relaxed).max(1) as usize;
        let dispatch_order = self.order_by_priority(reader, resumable);

        let results: Vec<TransferResult> = stream::iter(dispatch_order.into_iter())
            .map(|index| {
                let reader = reader.clone();
                let source = source.clone();
                let dest = dest.clone();
                let source_root = source_root.clone();
                let dest_root = dest_root.clone();
                let cancel = runtime.cancel.clone();
                let recent_failures = runtime.recent_failures.clone();
                let auth_tracker = runtime.auth_tracker.clone();
                let chunk_stats = runtime.chunk_stats.clone();
                let network_error_transfers = runtime.network_error_transfers.clone();
                let e2e_nanos_sum = runtime.e2e_nanos_sum.clone();
                let e2e_samples = runtime.e2e_samples.clone();
                let telemetry = telemetry.clone();
                async move {
                    if cancel.load(Ordering::Acquire) {
                        return TransferResult::Cancelled;
                    }
                    self_execute_transfer(
                        job_id,
                        &self.retry_policy,
                        self.rate_limiter.as_deref(),
                        self.credentials.as_ref(),
                        &reader,
                        index,
                        &*source,
                        &*dest,
                        &source_root,
                        &dest_root,
                        &cancel,
                        &recent_failures,
                        &auth_tracker,
                        &chunk_stats,
                        &network_error_transfers,
                        &e2e_nanos_sum,
                        &e2e_samples,
                        telemetry,
                    )
                    .await
                }
            })
            .buffer_unordered(pool_size)
            .collect()
            .await;

        let mut outcome = JobOutcome::default();
        for result in results {
            match result {
                TransferResult::Completed => outcome.completed += 1,
                TransferResult::Failed => outcome.failed += 1,
                TransferResult::Skipped => outcome.skipped += 1,
                TransferResult::Cancelled => outcome.cancelled += 1,
            }
        }

        if settings.auto_tune {
            self.auto_tune(runtime, settings, &outcome);
        }

        Ok(outcome)
    }

    /// Orders a part's resumable transfer indices with the composable
    /// prioritizer chain (§4.2 supplement): semantic tier first (critical
    /// config/boot files ahead of bulk data), then smallest-first, then
    /// oldest-queued-first. This governs dispatch order into the bounded
    /// pool, not completion order, which `buffer_unordered` leaves
    /// unspecified per §5.
    fn order_by_priority(&self, reader: &Arc<PlanFileReader>, resumable: Vec<u32>) -> Vec<u32> {
        let registry = SemanticRegistry::default();
        let prioritizer = ComposablePrioritizer::default();
        let now = std::time::SystemTime::now();

        let mut items: Vec<(u32, TransferItem)> = resumable
            .into_iter()
            .map(|index| {
                let (path, size) = match reader.transfer(index) {
                    Ok(view) => (view.source_relative.clone(), view.size),
                    Err(_) => (String::new(), 0),
                };
                let intent = registry.determine_intent(Path::new(&path), &[]);
                (index, TransferItem::new(&path, intent.priority, size, now))
            })
            .collect();

        items.sort_by(|(_, a), (_, b)| prioritizer.compare(a, b));
        items.into_iter().map(|(index, _)| index).collect()
    }

    /// Simple additive-increase/multiplicative-decrease auto-tune: a part
    /// with no failures nudges the pool toward the ceiling; any failure
    /// halves it back down, floored at the configured initial size.
    fn auto_tune(&self, runtime: &Arc<JobRuntime>, settings: ConcurrencySettings, outcome: &JobOutcome) {
        let current = runtime.pool_size.load(Ordering::Relaxed);
        let next = if outcome.failed == 0 {
            (current + 2).min(settings.max_pool_size as u64)
        } else {
            (current / 2).max(settings.initial_pool_size as u64 / 2).max(1)
        };
        runtime.pool_size.store(next, Ordering::Relaxed);
    }

    async fn finalize_job_status(
        &self,
        lifecycle: &Arc<JobLifecycle>,
        job_id: JobId,
        outcome: &JobOutcome,
        was_cancelled: bool,
        mut telemetry: Option<TelemetryLogger>,
    ) -> Result<()> {
        if was_cancelled {
            return Ok(());
        }

        let summary = lifecycle.get_job_summary(job_id).await?;
        if summary.transfers_completed + summary.transfers_failed + summary.transfers_skipped
            < summary.total_transfers
            || !summary.complete_job_ordered
        {
            // Still more parts/transfers pending (or the final part hasn't
            // arrived yet) — not our place to set a terminal status.
            return Ok(());
        }

        let status = match (summary.transfers_failed > 0, summary.transfers_skipped > 0) {
            (false, false) => JobStatus::Completed,
            (true, false) => JobStatus::CompletedWithErrors,
            (false, true) => JobStatus::CompletedWithSkipped,
            (true, true) => JobStatus::CompletedWithErrorsAndSkipped,
        };

        info!(%job_id, ?status, completed = outcome.completed, failed = outcome.failed, "job reached terminal state");
        if let Some(logger) = telemetry.as_mut() {
            let digest = format!("blake3:{}", blake3::hash(job_id.to_string().as_bytes()).to_hex());
            let _ = logger.log_job_complete(
                &job_id.to_string(),
                &digest,
                summary.transfers_completed as u32,
                summary.bytes_over_wire,
            );
        }
        lifecycle.set_terminal_status(job_id, status).await
    }
}

enum TransferResult {
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

/// Free function (not a method, to sidestep borrowing `&self` across the
/// `buffer_unordered` future) executing one transfer's retry loop and
/// folding the outcome back into the plan file.
#[allow(clippy::too_many_arguments)]
async fn self_execute_transfer(
    job_id: JobId,
    retry_policy: &RetryPolicy,
    rate_limiter: Option<&RateLimiter>,
    credential_provider: Option<&Arc<dyn CredentialProvider>>,
    reader: &Arc<PlanFileReader>,
    index: u32,
    source: &dyn Backend,
    dest: &dyn Backend,
    source_root: &str,
    dest_root: &str,
    cancel: &Arc<AtomicBool>,
    recent_failures: &Arc<AtomicU64>,
    auth_tracker: &AuthFailureTracker,
    chunk_stats: &Arc<ChunkAttemptStats>,
    network_error_transfers: &Arc<AtomicU64>,
    e2e_nanos_sum: &Arc<AtomicU64>,
    e2e_samples: &Arc<AtomicU64>,
    mut telemetry: Option<TelemetryLogger>,
) -> TransferResult {
    let started = Instant::now();
    if reader
        .set_transfer_status(index, TransferStatusCode::Started)
        .is_err()
    {
        return TransferResult::Failed;
    }

    let view = match reader.transfer(index) {
        Ok(v) => v,
        Err(e) => {
            warn!(index, error = %e, "failed to decode transfer record");
            let _ = reader.set_transfer_status(index, TransferStatusCode::Failed);
            reader.increment_failed();
            return TransferResult::Failed;
        }
    };

    let job_id_str = format!("{:032x}", reader.job_id());
    if let Some(logger) = telemetry.as_mut() {
        let _ = logger.log_file_start(&job_id_str, &view.source_relative, view.size);
    }

    let part_num = reader.part_num();

    let mut outcome = execute_transfer_chunks(
        retry_policy,
        rate_limiter,
        source,
        dest,
        source_root,
        dest_root,
        job_id,
        part_num,
        index,
        &view,
        cancel,
        chunk_stats,
    )
    .await;

    let mut was_auth_failure = false;
    if let Err(conveyor_resilience::ResilienceError::Permanent(msg)) = &outcome {
        if msg.starts_with("authentication error:") {
            was_auth_failure = true;
            if let Some(provider) = credential_provider {
                if provider.try_refresh().is_some() {
                    debug!(index, path = %view.source_relative, "got a fresh token, retrying transfer once");
                    outcome = execute_transfer_chunks(
                        retry_policy,
                        rate_limiter,
                        source,
                        dest,
                        source_root,
                        dest_root,
                        job_id,
                        part_num,
                        index,
                        &view,
                        cancel,
                        chunk_stats,
                    )
                    .await;
                    was_auth_failure = outcome.is_err();
                }
            }
        }
    }
    auth_tracker.record_attempt(was_auth_failure);

    let record_e2e = || {
        e2e_nanos_sum.fetch_add(started.elapsed().as_nanos().min(u64::MAX as u128) as u64, Ordering::Relaxed);
        e2e_samples.fetch_add(1, Ordering::Relaxed);
    };

    match outcome {
        Ok(()) => {
            let _ = reader.set_transfer_status(index, TransferStatusCode::Completed);
            reader.increment_completed();
            record_e2e();
            if let Some(logger) = telemetry.as_mut() {
                let _ = logger.log_window_ok(&job_id_str, &view.source_relative, 0, view.size, 0);
            }
            TransferResult::Completed
        }
        Err(conveyor_resilience::ResilienceError::Cancelled) => {
            // Leave the transfer `Started`; a future resume scan only picks
            // up `Pending`/`Failed`, so a restarted process should mark it
            // back to `Pending` during recovery instead. For simplicity,
            // this scheduler resets it here so resume always finds it.
            let _ = reader.set_transfer_status(index, TransferStatusCode::Pending);
            TransferResult::Cancelled
        }
        Err(conveyor_resilience::ResilienceError::Permanent(msg)) if msg.starts_with("policy:") => {
            let _ = reader.set_transfer_status(index, TransferStatusCode::Skipped);
            reader.increment_skipped();
            TransferResult::Skipped
        }
        Err(e) => {
            warn!(index, error = %e, path = %view.source_relative, "transfer failed after retries");
            recent_failures.fetch_add(1, Ordering::Relaxed);
            if matches!(e, conveyor_resilience::ResilienceError::RetriesExhausted { .. }) {
                // Exhausted retries on a `Retryable` classification means
                // every attempt failed transient/network-wise, as opposed
                // to `Permanent` (auth/policy/fatal) giving up immediately.
                network_error_transfers.fetch_add(1, Ordering::Relaxed);
            }
            let _ = reader.set_transfer_status(index, TransferStatusCode::Failed);
            reader.increment_failed();
            record_e2e();
            if let Some(logger) = telemetry.as_mut() {
                let _ = logger.log_window_fail(&job_id_str, &view.source_relative, 0, &e.to_string());
            }
            TransferResult::Failed
        }
    }
}

/// Runs one transfer's chunks: a single `Delete`/`CreateFolder`/`WholeFile`
/// chunk for non-chunked transfers, or a `Head` → `Body`* → `Tail` sequence
/// for a multi-chunk file. Each chunk carries its own `with_retry` call, so
/// a destination service returning `503` on one body chunk (§8 scenario 4)
/// only re-sends that chunk — its siblings are untouched, matching §4.2's
/// "retries are per chunk, not per transfer" and
/// `conveyor_resilience::retry`'s own contract.
#[allow(clippy::too_many_arguments)]
async fn execute_transfer_chunks(
    retry_policy: &RetryPolicy,
    rate_limiter: Option<&RateLimiter>,
    source: &dyn Backend,
    dest: &dyn Backend,
    source_root: &str,
    dest_root: &str,
    job_id: JobId,
    part_num: u32,
    transfer_index: u32,
    view: &TransferView,
    cancel: &AtomicBool,
    chunk_stats: &Arc<ChunkAttemptStats>,
) -> std::result::Result<(), ResilienceError> {
    let source_path = Path::new(source_root).join(&view.source_relative);
    let dest_path = Path::new(dest_root).join(&view.destination_relative);

    // A delete transfer carries no source object to read; an empty
    // `source_relative` marks a destination entry absent from source.
    if view.source_relative.is_empty() {
        let recursive = matches!(view.entity_type, EntityTypeCode::Folder);
        let chunk = Chunk {
            job_id,
            part_num,
            transfer_index,
            chunk_id: 0,
            offset: 0,
            length: 0,
            kind: ChunkKind::Delete,
        };
        return with_retry(retry_policy, cancel, |attempt| {
            chunk_stats.record(attempt);
            debug!(transfer_index, attempt, chunk_id = chunk.chunk_id, kind = ?chunk.kind, "chunk attempt");
            async { dest.delete(&dest_path, recursive).await.map(|_| ()).map_err(EngineError::from).map_err(engine_error_to_resilience) }
        })
        .await;
    }

    if matches!(view.entity_type, EntityTypeCode::Folder) {
        let chunk = Chunk {
            job_id,
            part_num,
            transfer_index,
            chunk_id: 0,
            offset: 0,
            length: 0,
            kind: ChunkKind::CreateFolder,
        };
        return with_retry(retry_policy, cancel, |attempt| {
            chunk_stats.record(attempt);
            debug!(transfer_index, attempt, chunk_id = chunk.chunk_id, kind = ?chunk.kind, "chunk attempt");
            async { dest.mkdir(&dest_path, true).await.map(|_| ()).map_err(EngineError::from).map_err(engine_error_to_resilience) }
        })
        .await;
    }

    let options = WriteOptions {
        create_parents: true,
        overwrite: true,
        content_type: None,
        metadata: view.metadata.clone(),
        permissions: None,
    };

    if view.chunk_count <= 1 {
        // Zero-byte files and anything below the single-chunk threshold
        // schedule exactly one chunk (§8 boundary behavior).
        let chunk = Chunk {
            job_id,
            part_num,
            transfer_index,
            chunk_id: 0,
            offset: 0,
            length: view.size,
            kind: ChunkKind::WholeFile,
        };
        let run = |attempt: u32| {
            let options = options.clone();
            let dest_path = dest_path.clone();
            let source_path = source_path.clone();
            chunk_stats.record(attempt);
            debug!(transfer_index, attempt, chunk_id = chunk.chunk_id, kind = ?chunk.kind, "chunk attempt");
            async move {
                let result: Result<()> = async {
                    let read_stream = source.read(&source_path).await.map_err(EngineError::from)?;
                    let handle = dest
                        .initiate_write(&dest_path, Some(view.size))
                        .await
                        .map_err(EngineError::from)?;
                    write_stream_to_staged(&handle, read_stream).await?;
                    dest.finalize_write(&dest_path, &handle, options)
                        .await
                        .map(|_| ())
                        .map_err(EngineError::from)
                }
                .await;
                result.map_err(engine_error_to_resilience)
            }
        };
        return match rate_limiter {
            Some(limiter) => {
                limiter
                    .execute(view.size.min(u32::MAX as u64) as u32, || with_retry(retry_policy, cancel, |attempt| run(attempt)))
                    .await
            }
            None => with_retry(retry_policy, cancel, |attempt| run(attempt)).await,
        };
    }

    // Multi-chunk file: Head opens the source stream and stages the
    // destination write; Body chunks stage one block each, independently
    // retryable; Tail commits the assembled staging file once every body
    // chunk has reported a terminal status.
    let mut read_stream = with_retry(retry_policy, cancel, |attempt| {
        chunk_stats.record(attempt);
        let head = Chunk { job_id, part_num, transfer_index, chunk_id: 0, offset: 0, length: 0, kind: ChunkKind::Head };
        debug!(transfer_index, attempt, chunk_id = head.chunk_id, kind = ?head.kind, "chunk attempt");
        async { source.read(&source_path).await.map_err(EngineError::from).map_err(engine_error_to_resilience) }
    })
    .await?;

    let handle = with_retry(retry_policy, cancel, |attempt| {
        chunk_stats.record(attempt);
        debug!(transfer_index, attempt, "staging destination write (head)");
        async { dest.initiate_write(&dest_path, Some(view.size)).await.map_err(EngineError::from).map_err(engine_error_to_resilience) }
    })
    .await?;

    let block_size = (view.size + view.chunk_count as u64 - 1) / view.chunk_count as u64;
    let mut offset = 0u64;
    let mut chunk_id = 0u32;
    let mut pending = Bytes::new();

    while offset < view.size {
        let want = block_size.min(view.size - offset) as usize;
        let mut buf = Vec::with_capacity(want);
        while buf.len() < want {
            if pending.is_empty() {
                match read_stream.next().await {
                    Some(Ok(bytes)) => pending = bytes,
                    Some(Err(e)) => {
                        return Err(ResilienceError::Permanent(format!("source read error: {e}")));
                    }
                    None => break,
                }
            }
            let take = (want - buf.len()).min(pending.len());
            buf.extend_from_slice(&pending[..take]);
            pending = pending.slice(take..);
        }
        if buf.is_empty() {
            break;
        }

        let data = Bytes::from(buf);
        let chunk_offset = offset;
        let cid = chunk_id;
        let data_len = data.len() as u64;

        let body_chunk = Chunk { job_id, part_num, transfer_index, chunk_id: cid, offset: chunk_offset, length: data_len, kind: ChunkKind::Body };
        let put = |attempt: u32| {
            let data = data.clone();
            chunk_stats.record(attempt);
            debug!(transfer_index, attempt, chunk_id = body_chunk.chunk_id, offset = chunk_offset, kind = ?body_chunk.kind, "chunk attempt");
            async move { handle.put_chunk(chunk_offset, data).await.map_err(|e| ResilienceError::Retryable(e.to_string())) }
        };
        let result = match rate_limiter {
            Some(limiter) => limiter.execute(data_len.min(u32::MAX as u64) as u32, || with_retry(retry_policy, cancel, |attempt| put(attempt))).await,
            None => with_retry(retry_policy, cancel, |attempt| put(attempt)).await,
        };
        result?;

        offset += data_len;
        chunk_id += 1;
    }

    let result = with_retry(retry_policy, cancel, |attempt| {
        chunk_stats.record(attempt);
        let tail = Chunk { job_id, part_num, transfer_index, chunk_id, offset: 0, length: offset, kind: ChunkKind::Tail };
        debug!(transfer_index, attempt, chunk_id = tail.chunk_id, kind = ?tail.kind, "chunk attempt (commit)");
        let options = options.clone();
        let dest_path = dest_path.clone();
        let handle = &handle;
        async move {
            dest.finalize_write(&dest_path, handle, options)
                .await
                .map(|_| ())
                .map_err(EngineError::from)
                .map_err(engine_error_to_resilience)
        }
    })
    .await;
    drop(handle);
    result
}

async fn write_stream_to_staged(
    handle: &crate::backend::StagedWrite,
    mut stream: crate::backend::types::ReadStream,
) -> Result<()> {
    let mut offset = 0u64;
    while let Some(next) = stream.next().await {
        let bytes = next.map_err(EngineError::from)?;
        let len = bytes.len() as u64;
        if len == 0 {
            continue;
        }
        handle.put_chunk(offset, bytes).await.map_err(EngineError::from)?;
        offset += len;
    }
    Ok(())
}

fn engine_error_to_resilience(e: EngineError) -> conveyor_resilience::ResilienceError {
    if e.is_transient() {
        conveyor_resilience::ResilienceError::Retryable(e.to_string())
    } else if e.category() == crate::engine::error::ErrorKind::Policy {
        conveyor_resilience::ResilienceError::Permanent(format!("policy: {e}"))
    } else {
        conveyor_resilience::ResilienceError::Permanent(e.to_string())
    }
}
