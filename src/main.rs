//! `conveyor` — thin CLI front-end over the engine: parses arguments into a
//! [`JobOrder`], submits it through an [`EngineHandle`], and maps the job's
//! terminal state to a process exit code.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, info, warn};

use conveyor::backend::{parse_uri, BackendRegistry, ListOptions};
use conveyor::credential::StaticCredentialProvider;
use conveyor::engine::{
    default_progress_manager, EngineHandle, JobLifecycle, JobOrder, OutputFormat, OutputLevel,
    Scheduler,
};
use conveyor::logging::{self, LogLevel};
use conveyor::manifest::{
    DeleteDestination, FilterSpec, FolderPropertiesOption, FromTo, JobId, JobStatus,
    OverwriteMode, Policy, SymlinkMode,
};
use conveyor::resilience::{RateLimiter, RetryPolicy};

mod credentials;

#[derive(Parser, Debug)]
#[command(
    name = "conveyor",
    version,
    about = "High-throughput bulk object-storage transfer engine"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Caps aggregate throughput across the job; unset means unlimited.
    #[arg(long)]
    cap_mbps: Option<f64>,

    #[arg(long, value_enum, default_value = "text")]
    output_type: OutputTypeArg,

    #[arg(long, value_enum, default_value = "default")]
    output_level: OutputLevelArg,

    #[arg(long, default_value = "INFO")]
    log_level: LogLevel,

    /// Read lines from stdin; any line cancels the running job.
    #[arg(long)]
    cancel_from_stdin: bool,

    #[arg(long)]
    skip_version_check: bool,

    /// Extra HTTP status codes to treat as retryable, beyond the built-in set.
    #[arg(long, value_delimiter = ',')]
    retry_status_codes: Vec<u16>,

    /// Directory holding plan files and job sidecars. Defaults to
    /// `~/.conveyor/plans`.
    #[arg(long)]
    plan_location: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy objects from source to destination.
    Copy(TransferArgs),
    /// Reconcile destination to match source, optionally deleting extras.
    Sync(SyncArgs),
    /// Delete every object under a destination.
    Remove(RemoveArgs),
    /// Cancel a running or queued job.
    Cancel { job_id: String },
    /// Resume a paused, cancelled, or partially failed job.
    Resume { job_id: String },
    /// Pause a running job.
    Pause { job_id: String },
    /// Inspect and manage persisted jobs.
    Jobs(JobsArgs),
    /// Log in and cache a credential for subsequent commands.
    Login,
    /// Forget the cached credential.
    Logout,
    /// List the objects under a source or destination URI.
    List {
        resource: String,
        #[arg(long)]
        recursive: bool,
    },
}

#[derive(Args, Debug)]
struct JobsArgs {
    #[command(subcommand)]
    action: JobsCommand,
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
    List,
    Show { job_id: String },
    Remove { job_id: String },
    /// Remove every job in a terminal state.
    Clean,
}

#[derive(Args, Debug, Clone)]
struct TransferArgs {
    source: String,
    destination: String,

    #[arg(long, default_value_t = true)]
    recursive: bool,

    #[arg(long, value_enum, default_value = "true")]
    overwrite: OverwriteArg,

    #[arg(long)]
    preserve_info: bool,

    #[arg(long)]
    preserve_permissions: bool,

    #[arg(long)]
    follow_symlinks: bool,

    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Args, Debug, Clone)]
struct SyncArgs {
    #[command(flatten)]
    transfer: TransferArgs,

    #[arg(long, value_enum, default_value = "false")]
    delete_destination: DeleteDestinationArg,
}

#[derive(Args, Debug, Clone)]
struct RemoveArgs {
    destination: String,

    #[arg(long)]
    recursive: bool,

    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Glob(s) an object's relative path must match to be included.
    #[arg(long = "include", alias = "include-pattern")]
    include: Vec<String>,

    #[arg(long = "exclude", alias = "exclude-pattern")]
    exclude: Vec<String>,

    #[arg(long = "include-path")]
    include_path: Vec<String>,

    #[arg(long = "exclude-path")]
    exclude_path: Vec<String>,

    /// Only objects modified before this date (RFC3339 or `YYYY-MM-DD`).
    #[arg(long = "include-before")]
    include_before: Option<String>,

    #[arg(long = "include-after")]
    include_after: Option<String>,

    /// Path to a newline-delimited list of relative paths to include.
    #[arg(long = "list-of-files")]
    list_of_files: Option<PathBuf>,

    #[arg(long = "include-attributes", value_delimiter = ',')]
    include_attributes: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "camelCase")]
enum OverwriteArg {
    True,
    False,
    Prompt,
    IfSourceNewer,
}

impl From<OverwriteArg> for OverwriteMode {
    fn from(value: OverwriteArg) -> Self {
        match value {
            OverwriteArg::True => OverwriteMode::True,
            OverwriteArg::False => OverwriteMode::False,
            OverwriteArg::Prompt => OverwriteMode::Prompt,
            OverwriteArg::IfSourceNewer => OverwriteMode::IfSourceNewer,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DeleteDestinationArg {
    True,
    False,
    Prompt,
}

impl From<DeleteDestinationArg> for DeleteDestination {
    fn from(value: DeleteDestinationArg) -> Self {
        match value {
            DeleteDestinationArg::True => DeleteDestination::True,
            DeleteDestinationArg::False => DeleteDestination::False,
            DeleteDestinationArg::Prompt => DeleteDestination::Prompt,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputTypeArg {
    Text,
    Json,
    None,
}

impl From<OutputTypeArg> for OutputFormat {
    fn from(value: OutputTypeArg) -> Self {
        match value {
            OutputTypeArg::Text => OutputFormat::Text,
            OutputTypeArg::Json => OutputFormat::Json,
            OutputTypeArg::None => OutputFormat::None,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputLevelArg {
    Default,
    Essential,
    Quiet,
}

impl From<OutputLevelArg> for OutputLevel {
    fn from(value: OutputLevelArg) -> Self {
        match value {
            OutputLevelArg::Default => OutputLevel::Default,
            OutputLevelArg::Essential => OutputLevel::Essential,
            OutputLevelArg::Quiet => OutputLevel::Quiet,
        }
    }
}

/// Exit codes per the CLI contract: `0` success, `1` error, `2` nothing to
/// do, `3` cancelled by the operator.
const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_NOTHING_TO_DO: u8 = 2;
const EXIT_CANCELLED: u8 = 3;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let log_level = cli.global.log_level;
    if let Err(e) = logging::init_logging(log_level, None) {
        eprintln!("conveyor: failed to initialize logging: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("conveyor: failed to start async runtime: {e}");
            return std::process::ExitCode::from(EXIT_ERROR);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => std::process::ExitCode::from(code),
        Err(e) => {
            eprintln!("conveyor: {e:#}");
            std::process::ExitCode::from(EXIT_ERROR)
        }
    }
}

struct EngineContext {
    engine: EngineHandle,
    lifecycle: Arc<JobLifecycle>,
    lifecycle_driver: tokio::task::JoinHandle<()>,
    progress_writer: tokio::task::JoinHandle<()>,
}

impl EngineContext {
    async fn shut_down(self) {
        self.lifecycle.shutdown().await;
        drop(self.engine);
        let _ = tokio::time::timeout(Duration::from_secs(2), self.progress_writer).await;
        let _ = tokio::time::timeout(Duration::from_secs(2), self.lifecycle_driver).await;
    }
}

async fn build_engine(global: &GlobalArgs) -> Result<EngineContext> {
    let plan_dir = match &global.plan_location {
        Some(dir) => dir.clone(),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".conveyor")
            .join("plans"),
    };

    let (lifecycle, lifecycle_driver) = JobLifecycle::open(plan_dir)
        .await
        .context("failed to open the job plan directory")?;

    let retry_policy =
        RetryPolicy::default().with_extra_status_codes(global.retry_status_codes.clone());
    let rate_limiter = match global.cap_mbps {
        Some(mbps) if mbps > 0.0 => {
            Some(Arc::new(RateLimiter::from_cap_mbps(mbps).context("invalid --cap-mbps value")?))
        }
        _ => None,
    };
    let mut scheduler = Scheduler::new(retry_policy, rate_limiter);
    if let Some(token) = credentials::load_cached_token().await {
        scheduler = scheduler.with_credentials(Arc::new(StaticCredentialProvider::new(token)));
    }
    let scheduler = Arc::new(scheduler);

    let backends = Arc::new(BackendRegistry::new());

    let (progress, progress_writer) =
        default_progress_manager(global.output_type.into(), global.output_level.into());

    let engine = EngineHandle::new(lifecycle.clone(), scheduler, backends, progress);

    Ok(EngineContext {
        engine,
        lifecycle,
        lifecycle_driver,
        progress_writer,
    })
}

async fn run(cli: Cli) -> Result<u8> {
    if cli.global.skip_version_check {
        debug!("version check skipped: conveyor has no update channel to check");
    }

    match cli.command {
        Command::Copy(args) => run_transfer(&cli.global, args, Policy::default()).await,
        Command::Sync(args) => {
            let mut policy = Policy::default();
            policy.delete_destination = args.delete_destination.into();
            run_transfer(&cli.global, args.transfer, policy).await
        }
        Command::Remove(args) => run_remove(&cli.global, args).await,
        Command::Cancel { job_id } => run_cancel(&cli.global, &job_id).await,
        Command::Resume { job_id } => run_resume(&cli.global, &job_id).await,
        Command::Pause { job_id } => run_pause(&cli.global, &job_id).await,
        Command::Jobs(args) => run_jobs(&cli.global, args.action).await,
        Command::Login => credentials::login().await,
        Command::Logout => credentials::logout().await,
        Command::List { resource, recursive } => run_list(&resource, recursive).await,
    }
}

/// Shared by `copy` and `sync`: both submit a `JobOrder` with
/// `transfers: None`, so the bridge always runs the Sync Orchestrator's
/// reconciliation. The two verbs differ only in `Policy` — `sync` sets
/// `delete_destination`, `copy` leaves it `False` — since an empty or
/// nonexistent destination naturally reconciles to "every source object is
/// new," which is exactly a copy.
async fn run_transfer(global: &GlobalArgs, args: TransferArgs, mut policy: Policy) -> Result<u8> {
    policy.overwrite = args.overwrite.into();
    policy.recursive = args.recursive;
    policy.preserve_info = args.preserve_info;
    policy.preserve_permissions = args.preserve_permissions;
    policy.follow_symlinks = if args.follow_symlinks {
        SymlinkMode::Follow
    } else {
        SymlinkMode::Skip
    };
    policy.folder_properties = FolderPropertiesOption::AllFolders;
    policy.cap_mbps = global.cap_mbps;
    let filter = build_filter_spec(&args.filters).await?;
    policy.filters = filter.clone();

    let from_to = infer_from_to(&args.source, &args.destination)?;

    let ctx = build_engine(global).await?;
    let order = JobOrder {
        source_uri: args.source,
        destination_uri: args.destination,
        from_to,
        policy,
        filter: Some(filter),
        transfers: None,
    };

    let code = submit_and_drive(&ctx, global, order).await?;
    ctx.shut_down().await;
    Ok(code)
}

/// `remove` reuses the same reconciliation path as `copy`/`sync`: a
/// throwaway empty directory stands in for "source," so every destination
/// object is seen as absent from source and scheduled for deletion,
/// provided `DeleteDestination=True`.
async fn run_remove(global: &GlobalArgs, args: RemoveArgs) -> Result<u8> {
    let null_source =
        tempfile::tempdir().context("failed to create a scratch directory for remove")?;

    let mut policy = Policy::default();
    policy.delete_destination = DeleteDestination::True;
    policy.recursive = args.recursive;
    policy.cap_mbps = global.cap_mbps;
    let filter = build_filter_spec(&args.filters).await?;
    policy.filters = filter.clone();

    let source_uri = null_source.path().display().to_string();
    let from_to = infer_from_to(&source_uri, &args.destination)?;

    let ctx = build_engine(global).await?;
    let order = JobOrder {
        source_uri,
        destination_uri: args.destination,
        from_to,
        policy,
        filter: Some(filter),
        transfers: None,
    };

    let code = submit_and_drive(&ctx, global, order).await?;
    ctx.shut_down().await;
    Ok(code)
}

async fn submit_and_drive(ctx: &EngineContext, global: &GlobalArgs, order: JobOrder) -> Result<u8> {
    let submitted = match ctx.engine.submit(order).await {
        Ok(s) => s,
        Err(e) => {
            let message = e.to_string();
            if message.contains("NothingToDo") {
                ctx.engine
                    .progress()
                    .info("nothing to do: source and destination already match");
                return Ok(EXIT_NOTHING_TO_DO);
            }
            ctx.engine.progress().error(message.clone());
            bail!(message);
        }
    };

    let job_id = submitted.job_id;
    info!(%job_id, "job submitted");

    let cancelled = drive_to_completion(ctx, global, job_id, submitted.driver).await?;
    if cancelled {
        return Ok(EXIT_CANCELLED);
    }

    let summary = ctx.lifecycle.get_job_summary(job_id).await?;
    Ok(exit_code_for_status(summary.job_status))
}

/// Races the job's driver task against Ctrl+C and, if requested, a cancel
/// signal read from stdin. Returns whether the job was cancelled by the
/// operator rather than running to its own terminal state.
async fn drive_to_completion(
    ctx: &EngineContext,
    global: &GlobalArgs,
    job_id: JobId,
    driver: tokio::task::JoinHandle<()>,
) -> Result<bool> {
    tokio::pin!(driver);

    let stdin_cancel = wait_for_stdin_cancel(global.cancel_from_stdin);
    tokio::pin!(stdin_cancel);

    tokio::select! {
        result = &mut driver => {
            result.context("job driver task panicked")?;
            Ok(false)
        }
        _ = tokio::signal::ctrl_c() => {
            warn!(%job_id, "cancellation requested via Ctrl+C");
            ctx.engine.progress().request_cancel();
            ctx.engine.cancel(job_id).await?;
            let _ = (&mut driver).await;
            Ok(true)
        }
        _ = &mut stdin_cancel => {
            warn!(%job_id, "cancellation requested via stdin");
            ctx.engine.progress().request_cancel();
            ctx.engine.cancel(job_id).await?;
            let _ = (&mut driver).await;
            Ok(true)
        }
    }
}

fn wait_for_stdin_cancel(enabled: bool) -> impl Future<Output = ()> {
    async move {
        if !enabled {
            return std::future::pending::<()>().await;
        }
        let stdin = tokio::io::stdin();
        let mut lines = tokio::io::BufReader::new(stdin).lines();
        let _ = lines.next_line().await;
    }
}

fn exit_code_for_status(status: JobStatus) -> u8 {
    match status {
        JobStatus::Completed | JobStatus::CompletedWithSkipped => EXIT_SUCCESS,
        JobStatus::Cancelled | JobStatus::Cancelling => EXIT_CANCELLED,
        JobStatus::CompletedWithErrors
        | JobStatus::CompletedWithErrorsAndSkipped
        | JobStatus::Failed => EXIT_ERROR,
        JobStatus::InProgress | JobStatus::Paused => EXIT_ERROR,
    }
}

async fn run_cancel(global: &GlobalArgs, job_id: &str) -> Result<u8> {
    let job_id: JobId = job_id.parse().context("invalid job ID")?;
    let ctx = build_engine(global).await?;
    ctx.engine.cancel(job_id).await?;
    ctx.engine.progress().info(format!("job {job_id} cancelled"));
    ctx.shut_down().await;
    Ok(EXIT_SUCCESS)
}

async fn run_pause(global: &GlobalArgs, job_id: &str) -> Result<u8> {
    let job_id: JobId = job_id.parse().context("invalid job ID")?;
    let ctx = build_engine(global).await?;
    ctx.engine.pause(job_id).await?;
    ctx.engine.progress().info(format!("job {job_id} paused"));
    ctx.shut_down().await;
    Ok(EXIT_SUCCESS)
}

async fn run_resume(global: &GlobalArgs, job_id: &str) -> Result<u8> {
    let job_id: JobId = job_id.parse().context("invalid job ID")?;
    let ctx = build_engine(global).await?;
    let details = ctx.lifecycle.get_job_details(job_id).await?;
    let submitted = ctx.engine.resume(job_id, &details.source, &details.destination).await?;

    let cancelled = drive_to_completion(&ctx, global, job_id, submitted.driver).await?;
    let code = if cancelled {
        EXIT_CANCELLED
    } else {
        let summary = ctx.lifecycle.get_job_summary(job_id).await?;
        exit_code_for_status(summary.job_status)
    };
    ctx.shut_down().await;
    Ok(code)
}

async fn run_jobs(global: &GlobalArgs, action: JobsCommand) -> Result<u8> {
    let ctx = build_engine(global).await?;
    let code = match action {
        JobsCommand::List => {
            for job_id in ctx.lifecycle.list_jobs().await {
                if let Ok(summary) = ctx.lifecycle.get_job_summary(job_id).await {
                    ctx.engine.progress().info(format!(
                        "{job_id}  {:?}  {}/{} transfers",
                        summary.job_status, summary.transfers_completed, summary.total_transfers
                    ));
                }
            }
            EXIT_SUCCESS
        }
        JobsCommand::Show { job_id } => {
            let job_id: JobId = job_id.parse().context("invalid job ID")?;
            let details = ctx.lifecycle.get_job_details(job_id).await?;
            let summary = ctx.lifecycle.get_job_summary(job_id).await?;
            ctx.engine.progress().info(format!(
                "{job_id}  {:?}\n  source: {}\n  destination: {}\n  status: {:?}\n  transfers: {} total, {} completed, {} failed, {} skipped\n  bytes over wire: {}",
                details.from_to,
                details.source,
                details.destination,
                summary.job_status,
                summary.total_transfers,
                summary.transfers_completed,
                summary.transfers_failed,
                summary.transfers_skipped,
                summary.bytes_over_wire,
            ));
            EXIT_SUCCESS
        }
        JobsCommand::Remove { job_id } => {
            let job_id: JobId = job_id.parse().context("invalid job ID")?;
            ctx.lifecycle.remove_job(job_id).await?;
            ctx.engine.progress().info(format!("job {job_id} removed"));
            EXIT_SUCCESS
        }
        JobsCommand::Clean => {
            let mut removed = 0u32;
            for job_id in ctx.lifecycle.list_jobs().await {
                if let Ok(summary) = ctx.lifecycle.get_job_summary(job_id).await {
                    if summary.job_status.is_terminal() && ctx.lifecycle.remove_job(job_id).await.is_ok() {
                        removed += 1;
                    }
                }
            }
            ctx.engine.progress().info(format!("removed {removed} terminal job(s)"));
            EXIT_SUCCESS
        }
    };
    ctx.shut_down().await;
    Ok(code)
}

async fn run_list(resource: &str, recursive: bool) -> Result<u8> {
    let registry = BackendRegistry::new();
    let (backend, _root) = registry
        .create_from_uri(resource)
        .await
        .context("failed to resolve the resource URI")?;

    let options = if recursive { ListOptions::recursive() } else { ListOptions::shallow() };

    let mut stream = backend
        .list(Path::new(""), options)
        .await
        .context("failed to list the resource")?;

    let mut count = 0u64;
    while let Some(entry) = stream.next().await {
        let entry = entry.context("error while listing the resource")?;
        println!("{}\t{}", entry.metadata.size, entry.path.display());
        count += 1;
    }
    if count == 0 {
        println!("(empty)");
    }
    Ok(EXIT_SUCCESS)
}

/// Matches two resolved backend kinds to the `FromTo` tag the engine keys
/// its concurrency and crawl-parallelism tuning on.
fn infer_from_to(source_uri: &str, destination_uri: &str) -> Result<FromTo> {
    let (source_config, _) = parse_uri(source_uri).context("invalid source URI")?;
    let (dest_config, _) = parse_uri(destination_uri).context("invalid destination URI")?;

    match (source_config.backend_type(), dest_config.backend_type()) {
        ("local", "local") => Ok(FromTo::LocalLocal),
        ("local", "azure") => Ok(FromTo::LocalBlob),
        ("azure", "local") => Ok(FromTo::BlobLocal),
        ("azure", "azure") => Ok(FromTo::BlobBlob),
        ("local", "s3") => Ok(FromTo::LocalS3),
        ("s3", "local") => Ok(FromTo::S3Local),
        ("s3", "azure") => Ok(FromTo::S3Blob),
        ("azure", "s3") => Ok(FromTo::BlobS3),
        (from, to) => bail!("unsupported transfer direction: {from} -> {to}"),
    }
}

async fn build_filter_spec(args: &FilterArgs) -> Result<FilterSpec> {
    let list_of_files = match &args.list_of_files {
        Some(path) => {
            let contents = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read --list-of-files {}", path.display()))?;
            Some(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        }
        None => None,
    };

    let include_before = args.include_before.as_deref().map(parse_date_filter).transpose()?;
    let include_after = args.include_after.as_deref().map(parse_date_filter).transpose()?;

    Ok(FilterSpec {
        list_of_files,
        include_glob: args.include.clone(),
        exclude_glob: args.exclude.clone(),
        include_path: args.include_path.clone(),
        exclude_path: args.exclude_path.clone(),
        include_after,
        include_before,
        include_attributes: args.include_attributes.clone(),
    })
}

fn parse_date_filter(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("'{s}' is neither RFC3339 nor YYYY-MM-DD"))?;
    Ok(date.and_hms_opt(0, 0, 0).expect("midnight is always a valid time").and_utc())
}
