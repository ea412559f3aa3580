//! The job execution engine: Job Lifecycle & Plan Store, Transfer
//! Scheduler, Sync Orchestrator, Progress & Lifecycle Manager, and the RPC
//! Bridge front-end boundary that ties them together as [`EngineHandle`].

pub mod error;
pub mod job_lifecycle;
pub mod progress_manager;
pub mod rpc_bridge;
pub mod scheduler;
pub mod sync_orchestrator;

pub use error::{EngineError, ErrorKind, Result};
pub use job_lifecycle::JobLifecycle;
pub use progress_manager::{OutputFormat, OutputLevel, ProgressManager};
pub use rpc_bridge::{default_progress_manager, EngineHandle, JobOrder, SubmittedJob, MAX_TRANSFERS_PER_PART};
pub use scheduler::{ConcurrencySettings, Scheduler};
pub use sync_orchestrator::{FilterEvaluator, SyncOrchestrator};
