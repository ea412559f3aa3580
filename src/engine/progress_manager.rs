//! Progress & Lifecycle Manager.
//!
//! The single serialized writer for all user-visible output and the single
//! source of truth for the process exit code. `tracing` carries developer
//! diagnostics to stderr/a log file; this module owns stdout exclusively,
//! the same separation of concerns the legacy tool's
//! `core::enhanced_progress::EnhancedProgressTracker` keeps between its
//! `indicatif` bars and the rest of the program's logging.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use conveyor_manifest::{JobId, JobStatus};

use crate::engine::job_lifecycle::JobSummary;

/// Runtime-selectable output format (§4.4, §6's `--output-type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    None,
}

/// `--output-level`: trims which messages reach the user without changing
/// what's logged via `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputLevel {
    Quiet,
    Essential,
    Default,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum MessageType {
    Init,
    Info,
    Progress,
    Prompt,
    Response,
    EndOfJob,
    Error,
    Dryrun,
}

#[derive(Debug, Serialize)]
struct JsonMessage<'a> {
    #[serde(rename = "TimeStamp")]
    timestamp_millis: u64,
    #[serde(rename = "MessageType")]
    message_type: MessageType,
    #[serde(rename = "MessageContent")]
    message_content: &'a str,
}

/// The live-progress JSON payload (§6's schema).
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    #[serde(rename = "JobID")]
    pub job_id: String,
    #[serde(rename = "JobStatus")]
    pub job_status: JobStatus,
    #[serde(rename = "PercentComplete")]
    pub percent_complete: f64,
    #[serde(rename = "TotalTransfers")]
    pub total_transfers: u64,
    #[serde(rename = "TransfersCompleted")]
    pub transfers_completed: u64,
    #[serde(rename = "TransfersFailed")]
    pub transfers_failed: u64,
    #[serde(rename = "TransfersSkipped")]
    pub transfers_skipped: u64,
    #[serde(rename = "FailedTransfers")]
    pub failed_transfers: Vec<String>,
    #[serde(rename = "SkippedTransfers")]
    pub skipped_transfers: Vec<String>,
    #[serde(rename = "BytesOverWire")]
    pub bytes_over_wire: u64,
    #[serde(rename = "TotalBytesTransferred")]
    pub total_bytes_transferred: u64,
    #[serde(rename = "TotalBytesEnumerated")]
    pub total_bytes_enumerated: u64,
    #[serde(rename = "Throughput")]
    pub throughput_bps: f64,
    #[serde(rename = "ElapsedTime")]
    pub elapsed_ns: u128,
    #[serde(rename = "CompleteJobOrdered")]
    pub complete_job_ordered: bool,
}

impl ProgressSnapshot {
    pub fn from_summary(
        summary: &JobSummary,
        elapsed: Duration,
        failed_transfers: Vec<String>,
        skipped_transfers: Vec<String>,
    ) -> Self {
        let percent_complete = if summary.total_transfers == 0 {
            0.0
        } else {
            100.0
                * (summary.transfers_completed + summary.transfers_failed + summary.transfers_skipped) as f64
                / summary.total_transfers as f64
        };
        let throughput_bps = if elapsed.as_secs_f64() > 0.0 {
            summary.bytes_over_wire as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        ProgressSnapshot {
            job_id: summary.job_id.to_string(),
            job_status: summary.job_status,
            percent_complete,
            total_transfers: summary.total_transfers,
            transfers_completed: summary.transfers_completed,
            transfers_failed: summary.transfers_failed,
            transfers_skipped: summary.transfers_skipped,
            failed_transfers,
            skipped_transfers,
            bytes_over_wire: summary.bytes_over_wire,
            total_bytes_transferred: summary.bytes_over_wire,
            total_bytes_enumerated: summary.total_bytes_enumerated,
            throughput_bps,
            elapsed_ns: elapsed.as_nanos(),
            complete_job_ordered: summary.complete_job_ordered,
        }
    }
}

/// Runtime counters and plan-file-derived breakdowns available only once a
/// job reaches a terminal state — assembled by the caller of
/// `initiate_progress_reporting`'s `poll` closure from `Scheduler::metrics_for`
/// and `JobLifecycle::entity_breakdown` (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct EndOfJobExtras {
    pub file_transfers: u64,
    pub folder_property_transfers: u64,
    pub symlink_transfers: u64,
    pub folders_completed: u64,
    pub folders_failed: u64,
    pub folders_skipped: u64,
    pub skipped_symlink_count: u64,
    pub hardlinks_converted_count: u64,
    pub average_iops: f64,
    pub average_e2e_milliseconds: f64,
    pub network_error_percentage: f64,
    pub server_busy_percentage: f64,
}

/// The end-of-job JSON payload (spec.md §6): every live-progress field plus
/// the counters that only make sense once a job is done. `EntityType` has no
/// special-file variant in this implementation, so `SkippedSpecialFileCount`
/// is always 0; there's no plumbing from the local backend's hardlink
/// fast path up to a job-level aggregate, so `HardlinksConvertedCount` is
/// always 0 too.
#[derive(Debug, Clone, Serialize)]
pub struct EndOfJobSummary {
    #[serde(flatten)]
    pub base: ProgressSnapshot,
    #[serde(rename = "FileTransfers")]
    pub file_transfers: u64,
    #[serde(rename = "FolderPropertyTransfers")]
    pub folder_property_transfers: u64,
    #[serde(rename = "SymlinkTransfers")]
    pub symlink_transfers: u64,
    #[serde(rename = "FoldersCompleted")]
    pub folders_completed: u64,
    #[serde(rename = "FoldersFailed")]
    pub folders_failed: u64,
    #[serde(rename = "FoldersSkipped")]
    pub folders_skipped: u64,
    #[serde(rename = "SkippedSymlinkCount")]
    pub skipped_symlink_count: u64,
    #[serde(rename = "SkippedSpecialFileCount")]
    pub skipped_special_file_count: u64,
    #[serde(rename = "HardlinksConvertedCount")]
    pub hardlinks_converted_count: u64,
    #[serde(rename = "AverageIOPS")]
    pub average_iops: f64,
    #[serde(rename = "AverageE2EMilliseconds")]
    pub average_e2e_milliseconds: f64,
    #[serde(rename = "NetworkErrorPercentage")]
    pub network_error_percentage: f64,
    #[serde(rename = "ServerBusyPercentage")]
    pub server_busy_percentage: f64,
    #[serde(rename = "PerformanceAdvice")]
    pub performance_advice: Vec<String>,
}

impl EndOfJobSummary {
    pub fn build(base: ProgressSnapshot, extras: EndOfJobExtras) -> Self {
        let performance_advice = build_performance_advice(&base, &extras);
        EndOfJobSummary {
            file_transfers: extras.file_transfers,
            folder_property_transfers: extras.folder_property_transfers,
            symlink_transfers: extras.symlink_transfers,
            folders_completed: extras.folders_completed,
            folders_failed: extras.folders_failed,
            folders_skipped: extras.folders_skipped,
            skipped_symlink_count: extras.skipped_symlink_count,
            skipped_special_file_count: 0,
            hardlinks_converted_count: extras.hardlinks_converted_count,
            average_iops: extras.average_iops,
            average_e2e_milliseconds: extras.average_e2e_milliseconds,
            network_error_percentage: extras.network_error_percentage,
            server_busy_percentage: extras.server_busy_percentage,
            performance_advice,
            base,
        }
    }
}

/// A handful of threshold-based heuristics — not a general diagnostics
/// engine, just the obvious calls a human reviewing the end-of-job summary
/// would make.
fn build_performance_advice(base: &ProgressSnapshot, extras: &EndOfJobExtras) -> Vec<String> {
    let mut advice = Vec::new();
    if extras.server_busy_percentage >= 20.0 {
        advice.push(format!(
            "destination returned busy/throttling responses on {:.1}% of chunk attempts; consider lowering concurrency",
            extras.server_busy_percentage
        ));
    }
    if extras.network_error_percentage >= 5.0 {
        advice.push(format!(
            "{:.1}% of transfers failed after exhausting retries on transient errors; check network stability to the destination",
            extras.network_error_percentage
        ));
    }
    if base.total_transfers > 0 && base.transfers_skipped * 100 / base.total_transfers.max(1) >= 10 {
        advice.push(
            "more than 10% of transfers were skipped by the overwrite policy; review --overwrite settings if this is unexpected"
                .to_string(),
        );
    }
    advice
}

/// One poll of `initiate_progress_reporting`'s ticker: the durable job
/// summary, the failed/skipped destination paths accumulated so far, and
/// (only when `is_final`) the runtime extras needed for the end-of-job
/// payload.
pub struct PollOutcome {
    pub summary: JobSummary,
    pub failed_transfers: Vec<String>,
    pub skipped_transfers: Vec<String>,
    pub is_final: bool,
    pub extras: Option<EndOfJobExtras>,
}

/// A yes/no/choice request serialized against all other output.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub message: String,
    pub options: Vec<String>,
}

enum Message {
    Info(String),
    Warn(String),
    Progress(ProgressSnapshot),
    Prompt(PromptRequest, oneshot::Sender<String>),
    EndOfJob(EndOfJobSummary),
    Error(String),
}

/// The process's single owner of stdout. Cloneable; every clone shares the
/// same channel into the writer task, so output from any caller is
/// serialized without an explicit lock on the hot path.
#[derive(Clone)]
pub struct ProgressManager {
    tx: mpsc::UnboundedSender<Message>,
    cancelled: Arc<AtomicBool>,
    exit_code: Arc<AtomicU64>,
    format: OutputFormat,
    level: OutputLevel,
}

impl ProgressManager {
    /// Spawns the writer task and returns the handle plus its `JoinHandle`,
    /// which should be awaited after the last `Exit` to guarantee the
    /// final line is flushed.
    pub fn spawn(format: OutputFormat, level: OutputLevel) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ProgressManager {
            tx,
            cancelled: Arc::new(AtomicBool::new(false)),
            exit_code: Arc::new(AtomicU64::new(0)),
            format,
            level,
        };
        let handle = tokio::spawn(Self::run_writer(rx, format, level));
        (manager, handle)
    }

    pub fn info(&self, msg: impl Into<String>) {
        let _ = self.tx.send(Message::Info(msg.into()));
    }

    pub fn warn(&self, msg: impl Into<String>) {
        let _ = self.tx.send(Message::Warn(msg.into()));
    }

    pub fn progress(&self, snapshot: ProgressSnapshot) {
        let _ = self.tx.send(Message::Progress(snapshot));
    }

    pub fn end_of_job(&self, summary: EndOfJobSummary) {
        let _ = self.tx.send(Message::EndOfJob(summary));
    }

    pub fn error(&self, msg: impl Into<String>) {
        let _ = self.tx.send(Message::Error(msg.into()));
    }

    /// Serialized prompt/response. The writer task renders the prompt and
    /// blocks that one message slot until `respond` answers it, but other
    /// callers' `info`/`warn`/`progress` messages still queue up behind it
    /// in order.
    pub async fn prompt(&self, request: PromptRequest) -> Option<String> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx.send(Message::Prompt(request, resp_tx)).ok()?;
        resp_rx.await.ok()
    }

    /// Exactly-once cancellation (§4.4). Returns `true` the first time it's
    /// called for this manager; subsequent calls are no-ops, matching the
    /// "call `controller.Cancel` exactly once" contract.
    pub fn request_cancel(&self) -> bool {
        self.cancelled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Sets the process exit code (§6: 0/1/2/3); the last writer wins, same
    /// as `Exit(builder, exitCode)` in the source design.
    pub fn set_exit_code(&self, code: u64) {
        self.exit_code.store(code, Ordering::Release);
    }

    pub fn exit_code(&self) -> u64 {
        self.exit_code.load(Ordering::Acquire)
    }

    /// Spawns the §4.4 ticker: every 2s (widening to 2min past one million
    /// transfers counted) it asks `poll` for the job's current state and
    /// renders it. On `request_cancel`, the next tick prints the final
    /// status and the loop exits. `poll` only needs to populate `extras`
    /// when it reports `is_final`; it's ignored otherwise.
    pub fn initiate_progress_reporting<F, Fut>(&self, job_id: JobId, mut poll: F) -> JoinHandle<()>
    where
        F: FnMut(JobId) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Option<PollOutcome>> + Send,
    {
        let manager = self.clone();
        let start = Instant::now();
        tokio::spawn(async move {
            let mut interval = Duration::from_secs(2);
            loop {
                tokio::time::sleep(interval).await;
                let outcome = match poll(job_id).await {
                    Some(v) => v,
                    None => break,
                };
                if outcome.summary.total_transfers > 1_000_000 {
                    interval = Duration::from_secs(120);
                }
                let snapshot = ProgressSnapshot::from_summary(
                    &outcome.summary,
                    start.elapsed(),
                    outcome.failed_transfers,
                    outcome.skipped_transfers,
                );
                if outcome.is_final || manager.is_cancelled() {
                    let eoj = EndOfJobSummary::build(snapshot, outcome.extras.unwrap_or_default());
                    manager.end_of_job(eoj);
                    break;
                }
                manager.progress(snapshot);
            }
        })
    }

    async fn run_writer(mut rx: mpsc::UnboundedReceiver<Message>, format: OutputFormat, level: OutputLevel) {
        let bar = if format == OutputFormat::Text {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent}%")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(bar)
        } else {
            None
        };

        let stdout = io::stdout();

        while let Some(message) = rx.recv().await {
            if format == OutputFormat::None {
                if let Message::Prompt(_, resp) = message {
                    let _ = resp.send(String::new());
                }
                continue;
            }

            match message {
                Message::Info(msg) => {
                    if level >= OutputLevel::Default {
                        write_line(&stdout, format, MessageType::Info, &msg, &bar);
                    }
                }
                Message::Warn(msg) => {
                    if level >= OutputLevel::Essential {
                        write_line(&stdout, format, MessageType::Info, &format!("WARNING: {msg}"), &bar);
                    }
                }
                Message::Progress(snapshot) => {
                    if level >= OutputLevel::Default {
                        write_progress(format, &snapshot, &bar);
                    }
                }
                Message::EndOfJob(summary) => {
                    write_progress(format, &summary.base, &bar);
                    if let Some(bar) = &bar {
                        bar.finish_and_clear();
                    }
                    let body = serde_json::to_string(&summary).unwrap_or_default();
                    write_line(&stdout, format, MessageType::EndOfJob, &body, &None);
                }
                Message::Error(msg) => {
                    write_line(&stdout, format, MessageType::Error, &msg, &bar);
                }
                Message::Prompt(request, resp) => {
                    let answer = render_prompt(format, &request);
                    if resp.send(answer).is_err() {
                        warn!("prompt response channel dropped before an answer arrived");
                    }
                }
            }
        }
    }
}

fn write_line(
    stdout: &io::Stdout,
    format: OutputFormat,
    message_type: MessageType,
    content: &str,
    bar: &Option<ProgressBar>,
) {
    match format {
        OutputFormat::Json => {
            let envelope = JsonMessage {
                timestamp_millis: 0,
                message_type,
                message_content: content,
            };
            if let Ok(line) = serde_json::to_string(&envelope) {
                println!("{line}");
            }
        }
        OutputFormat::Text => {
            if let Some(bar) = bar {
                bar.println(content);
            } else {
                let mut lock = stdout.lock();
                let _ = writeln!(lock, "{content}");
            }
        }
        OutputFormat::None => {}
    }
}

fn write_progress(format: OutputFormat, snapshot: &ProgressSnapshot, bar: &Option<ProgressBar>) {
    match format {
        OutputFormat::Json => {
            if let Ok(body) = serde_json::to_string(snapshot) {
                let envelope = JsonMessage {
                    timestamp_millis: 0,
                    message_type: MessageType::Progress,
                    message_content: &body,
                };
                if let Ok(line) = serde_json::to_string(&envelope) {
                    println!("{line}");
                }
            }
        }
        OutputFormat::Text => {
            if let Some(bar) = bar {
                bar.set_position(snapshot.percent_complete.round() as u64);
                bar.set_message(format!(
                    "{}/{} transfers",
                    snapshot.transfers_completed, snapshot.total_transfers
                ));
            }
        }
        OutputFormat::None => {}
    }
}

fn render_prompt(format: OutputFormat, request: &PromptRequest) -> String {
    match format {
        OutputFormat::Text => {
            use dialoguer::{theme::ColorfulTheme, Select};
            if request.options.is_empty() {
                return String::new();
            }
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(request.message.as_str())
                .items(&request.options)
                .default(0)
                .interact_opt()
                .ok()
                .flatten()
                .and_then(|i| request.options.get(i).cloned())
                .unwrap_or_default()
        }
        OutputFormat::Json => {
            let envelope = JsonMessage {
                timestamp_millis: 0,
                message_type: MessageType::Prompt,
                message_content: &request.message,
            };
            if let Ok(line) = serde_json::to_string(&envelope) {
                println!("{line}");
            }
            request.options.first().cloned().unwrap_or_default()
        }
        OutputFormat::None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_exactly_once() {
        let (manager, _handle) = ProgressManager::spawn(OutputFormat::None, OutputLevel::Default);
        assert!(manager.request_cancel());
        assert!(!manager.request_cancel());
        assert!(manager.is_cancelled());
    }

    #[test]
    fn output_level_ordering_matches_verbosity() {
        assert!(OutputLevel::Default > OutputLevel::Essential);
        assert!(OutputLevel::Essential > OutputLevel::Quiet);
    }
}
