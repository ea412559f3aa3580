//! Sync Orchestrator.
//!
//! Runs two concurrent traversal pipelines — source into the Indexer,
//! destination against it — and reconciles them into the minimal set of
//! `Copy`/`Delete` transfers needed to make the destination equal the
//! source under the active comparator. Throttling uses a simplified
//! hysteresis table rather than a fuller multi-state control system.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::StreamExt;
use sysinfo::System;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, warn};

use conveyor_manifest::job::{DeleteDestination, FilterSpec, FromTo, Md5ValidationMode, Policy};
use conveyor_manifest::transfer::{EntityType, StoredObject, Transfer, TransferStatus};

use crate::backend::{Backend, ListOptions};
use crate::core::filter::{FilterAction, FilterList, FilterType};
use crate::engine::error::{EngineError, Result};

const SHARD_COUNT: usize = 16;
const MEMORY_MULTIPLIER: f64 = 0.7;
const FILES_PER_GB: u64 = 1_000_000;
const MAX_DIRECTORY_CHILD_COUNT: usize = 100_000;
const THROTTLE_POLL: Duration = Duration::from_millis(50);

/// Concurrency and resource-budget knobs the Sync Orchestrator derives at
/// startup.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub max_active_files: usize,
    pub crawl_parallelism: usize,
    pub target_parallelism: usize,
    pub max_active_tasks: usize,
    pub enumerating_dir_limit: usize,
}

impl OrchestratorSettings {
    pub fn compute(from_to: FromTo) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let physical_ram_gb = (sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0)).max(1.0);
        let max_active_files =
            (physical_ram_gb * MEMORY_MULTIPLIER * FILES_PER_GB as f64).floor() as usize;

        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let multiplier = from_to.crawl_multiplier();
        let ceiling = from_to.parallelism_ceiling();

        let mut crawl_parallelism = cpus * multiplier;
        let dir_cap = (max_active_files / MAX_DIRECTORY_CHILD_COUNT).max(1);
        crawl_parallelism = crawl_parallelism.min(dir_cap).min(ceiling).max(1);

        let target_parallelism = ((crawl_parallelism as f64 * 0.25).ceil() as usize).max(1);

        OrchestratorSettings {
            max_active_files,
            crawl_parallelism,
            target_parallelism,
            max_active_tasks: max_active_files,
            enumerating_dir_limit: crawl_parallelism,
        }
    }
}

/// In-memory mapping from relative path to `StoredObject`, written by the
/// source traverser and read/drained by the destination traverser.
/// Sharded the way the legacy tool's concurrent structures are, to keep
/// lock contention down without pulling in an external concurrent-map
/// crate the rest of the corpus doesn't use.
struct Indexer {
    shards: Vec<RwLock<HashMap<String, StoredObject>>>,
    cardinality: AtomicUsize,
}

impl Indexer {
    fn new() -> Self {
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for _ in 0..SHARD_COUNT {
            shards.push(RwLock::new(HashMap::new()));
        }
        Indexer {
            shards,
            cardinality: AtomicUsize::new(0),
        }
    }

    fn shard_for(&self, key: &str) -> &RwLock<HashMap<String, StoredObject>> {
        let mut hash: u64 = 1469598103934665603;
        for b in key.as_bytes() {
            hash ^= *b as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        &self.shards[(hash as usize) % SHARD_COUNT]
    }

    async fn insert(&self, obj: StoredObject) {
        let shard = self.shard_for(&obj.relative_path);
        let mut guard = shard.write().await;
        if guard.insert(obj.relative_path.clone(), obj).is_none() {
            self.cardinality.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn remove(&self, key: &str) -> Option<StoredObject> {
        let shard = self.shard_for(key);
        let mut guard = shard.write().await;
        let removed = guard.remove(key);
        if removed.is_some() {
            self.cardinality.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    fn len(&self) -> usize {
        self.cardinality.load(Ordering::Relaxed)
    }

    /// Every Indexer entry still present once destination traversal ends
    /// is new at source.
    async fn drain_remaining(&self) -> Vec<StoredObject> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let mut guard = shard.write().await;
            out.extend(guard.drain().map(|(_, v)| v));
        }
        self.cardinality.store(0, Ordering::Relaxed);
        out
    }
}

/// Hysteresis state for one throttle signal: `engage_at`/`release_at`
/// bound the ratio of current to limit that flips `engaged`.
struct Throttle {
    engaged: AtomicBool,
}

impl Throttle {
    fn new() -> Self {
        Throttle {
            engaged: AtomicBool::new(false),
        }
    }

    fn update(&self, current: f64, limit: f64, engage_ratio: f64, release_ratio: f64) -> bool {
        if limit <= 0.0 {
            return false;
        }
        let ratio = current / limit;
        let was_engaged = self.engaged.load(Ordering::Relaxed);
        let now_engaged = if was_engaged {
            ratio > release_ratio
        } else {
            ratio >= engage_ratio
        };
        self.engaged.store(now_engaged, Ordering::Relaxed);
        now_engaged
    }
}

/// Two independently-sized permit pools plus a file-count throttle
/// condition. A traversal thread holds the relevant
/// permit for the duration of one top-level directory listing call; since
/// `Backend::list`'s recursive mode performs the whole traversal behind a
/// single stream, that's one permit held for the pipeline's entire run
/// rather than one per subdirectory — the concurrently-enumerating-dirs
/// and goroutine-count signals from the same table collapse to this one
/// permit and aren't tracked separately.
struct ThrottleSemaphore {
    source_permits: Semaphore,
    target_permits: Semaphore,
    file_count: Throttle,
    /// Resident-memory signal: engages at 80% of total physical RAM used,
    /// releases at 70%, same hysteresis shape as `file_count` but against
    /// `sysinfo`'s live reading rather than the Indexer's cardinality.
    memory: Throttle,
    sys: Mutex<System>,
    settings: OrchestratorSettings,
}

impl ThrottleSemaphore {
    fn new(settings: OrchestratorSettings) -> Self {
        ThrottleSemaphore {
            source_permits: Semaphore::new(settings.crawl_parallelism),
            target_permits: Semaphore::new(settings.target_parallelism),
            file_count: Throttle::new(),
            memory: Throttle::new(),
            sys: Mutex::new(System::new()),
            settings,
        }
    }

    async fn acquire_source(&self, indexer: &Indexer, cancel: &AtomicBool) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.acquire(&self.source_permits, indexer, cancel).await
    }

    async fn acquire_target(&self, indexer: &Indexer, cancel: &AtomicBool) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.acquire(&self.target_permits, indexer, cancel).await
    }

    async fn acquire<'a>(
        &'a self,
        pool: &'a Semaphore,
        indexer: &Indexer,
        cancel: &AtomicBool,
    ) -> Result<tokio::sync::SemaphorePermit<'a>> {
        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(EngineError::Fatal("sync cancelled".into()));
            }

            let file_throttled = self.file_count.update(
                indexer.len() as f64,
                self.settings.max_active_files as f64,
                1.0,
                0.85,
            );

            let memory_throttled = {
                let mut sys = self.sys.lock().await;
                sys.refresh_memory();
                let total = sys.total_memory();
                self.memory.update(sys.used_memory() as f64, total as f64, 0.80, 0.70)
            };

            if file_throttled || memory_throttled {
                tokio::time::sleep(THROTTLE_POLL).await;
                continue;
            }

            match pool.try_acquire() {
                Ok(permit) => return Ok(permit),
                Err(_) => tokio::time::sleep(THROTTLE_POLL).await,
            }
        }
    }
}

/// Compiled filter set for one job, grounded on the legacy tool's
/// `core::filter::FilterList` for glob/regex/path matching, extended with
/// date-window, attribute-mask, and list-of-files predicates that
/// `FilterList` alone doesn't express.
pub struct FilterEvaluator {
    include_glob: Option<FilterList>,
    exclude_glob: Option<FilterList>,
    include_path: Option<FilterList>,
    include_after: Option<SystemTime>,
    include_before: Option<SystemTime>,
    include_attributes: Vec<String>,
    list_of_files: Option<std::collections::HashSet<String>>,
}

impl FilterEvaluator {
    pub fn new(spec: &FilterSpec) -> std::result::Result<Self, crate::core::filter::FilterError> {
        let include_glob = if spec.include_glob.is_empty() {
            None
        } else {
            let mut list = FilterList::with_default(FilterAction::Exclude);
            for pattern in &spec.include_glob {
                list.add_rule(crate::core::filter::FilterRule::new(
                    FilterAction::Include,
                    FilterType::Glob(pattern.clone()),
                )?);
            }
            Some(list)
        };

        let exclude_glob = if spec.exclude_glob.is_empty() {
            None
        } else {
            let mut list = FilterList::with_default(FilterAction::Include);
            for pattern in &spec.exclude_glob {
                list.add_rule(crate::core::filter::FilterRule::new(
                    FilterAction::Exclude,
                    FilterType::Glob(pattern.clone()),
                )?);
            }
            Some(list)
        };

        let include_path = if spec.include_path.is_empty() {
            None
        } else {
            let mut list = FilterList::with_default(FilterAction::Exclude);
            for prefix in &spec.include_path {
                list.add_rule(crate::core::filter::FilterRule::new(
                    FilterAction::Include,
                    FilterType::Glob(format!("{}/**", prefix.trim_end_matches('/'))),
                )?);
            }
            Some(list)
        };

        Ok(FilterEvaluator {
            include_glob,
            exclude_glob,
            include_path,
            include_after: spec.include_after.map(Into::into),
            include_before: spec.include_before.map(Into::into),
            include_attributes: spec.include_attributes.clone(),
            list_of_files: spec
                .list_of_files
                .as_ref()
                .map(|v| v.iter().cloned().collect()),
        })
    }

    /// Filter evaluation order: list-of-files (if any) ∩ glob include ∩
    /// ¬glob exclude ∩ date window ∩ attribute mask. `include-path`
    /// intersects with `include-glob` rather than unioning with it.
    pub fn admits(&self, obj: &StoredObject) -> bool {
        let path = std::path::Path::new(&obj.relative_path);

        if let Some(files) = &self.list_of_files {
            if !files.contains(&obj.relative_path) {
                return false;
            }
        }

        if let Some(list) = &self.include_glob {
            if !list.should_include(path) {
                return false;
            }
        }

        if let Some(list) = &self.include_path {
            if !list.should_include(path) {
                return false;
            }
        }

        if let Some(list) = &self.exclude_glob {
            if list.should_exclude(path) {
                return false;
            }
        }

        if let Some(after) = self.include_after {
            if obj.last_modified < after {
                return false;
            }
        }
        if let Some(before) = self.include_before {
            if obj.last_modified > before {
                return false;
            }
        }

        if !self.include_attributes.is_empty() {
            match &obj.attributes {
                Some(attrs) if self.include_attributes.iter().any(|a| attrs.contains(a)) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Outcome of one reconciliation pass: the transfers that need to run, in
/// enumeration order, not yet partitioned into `JobPart`s.
#[derive(Debug, Default)]
pub struct ReconciliationResult {
    pub transfers: Vec<Transfer>,
    pub total_bytes: u64,
}

pub struct SyncOrchestrator {
    source: Arc<dyn Backend>,
    destination: Arc<dyn Backend>,
    from_to: FromTo,
    policy: Policy,
    filter: FilterEvaluator,
    cancel: Arc<AtomicBool>,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn Backend>,
        destination: Arc<dyn Backend>,
        from_to: FromTo,
        policy: Policy,
        filter: FilterEvaluator,
    ) -> Self {
        SyncOrchestrator {
            source,
            destination,
            from_to,
            policy,
            filter,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs both traversal pipelines and returns the reconciled transfer
    /// set. The two pipelines execute concurrently (`tokio::join!`); the
    /// destination side only sees what the source side has indexed so far,
    /// matching the Indexer's single-writer, single-reader contract.
    pub async fn reconcile(&self) -> Result<ReconciliationResult> {
        let settings = OrchestratorSettings::compute(self.from_to);
        let throttle = Arc::new(ThrottleSemaphore::new(settings));
        let indexer = Arc::new(Indexer::new());

        let source_task = self.traverse_source(indexer.clone(), throttle.clone());
        let dest_task = self.traverse_destination(indexer.clone(), throttle.clone());

        let (source_result, dest_transfers) = tokio::join!(source_task, dest_task);
        source_result?;
        let mut transfers = dest_transfers?;

        // Every remaining Indexer entry at end of destination traversal is
        // new at source.
        let remaining = indexer.drain_remaining().await;
        debug!(count = remaining.len(), "new-at-source entries after destination traversal");
        for obj in remaining {
            transfers.push(self.build_transfer(transfers.len() as u32, &obj, None));
        }

        let total_bytes = transfers.iter().map(|t| t.size).sum();
        for (i, t) in transfers.iter_mut().enumerate() {
            t.index = i as u32;
        }

        Ok(ReconciliationResult {
            transfers,
            total_bytes,
        })
    }

    async fn traverse_source(&self, indexer: Arc<Indexer>, throttle: Arc<ThrottleSemaphore>) -> Result<()> {
        let _permit = throttle.acquire_source(&indexer, &self.cancel).await?;
        let mut stream = self
            .source
            .list(std::path::Path::new(""), ListOptions::recursive())
            .await
            .map_err(EngineError::from)?;

        while let Some(entry) = stream.next().await {
            if self.cancel.load(Ordering::Acquire) {
                warn!("source traversal cancelled mid-stream");
                return Err(EngineError::Fatal("sync cancelled".into()));
            }
            let entry = entry.map_err(EngineError::from)?;
            let obj = dir_entry_to_stored_object(&entry);
            if !self.filter.admits(&obj) {
                continue;
            }
            indexer.insert(obj).await;
        }
        Ok(())
    }

    async fn traverse_destination(
        &self,
        indexer: Arc<Indexer>,
        throttle: Arc<ThrottleSemaphore>,
    ) -> Result<Vec<Transfer>> {
        let _permit = throttle.acquire_target(&indexer, &self.cancel).await?;
        let mut stream = self
            .destination
            .list(std::path::Path::new(""), ListOptions::recursive())
            .await
            .map_err(EngineError::from)?;

        let mut transfers = Vec::new();

        while let Some(entry) = stream.next().await {
            if self.cancel.load(Ordering::Acquire) {
                return Err(EngineError::Fatal("sync cancelled".into()));
            }
            let entry = entry.map_err(EngineError::from)?;
            let dest_obj = dir_entry_to_stored_object(&entry);

            match indexer.remove(&dest_obj.relative_path).await {
                Some(source_obj) => {
                    if !self.objects_equal(&source_obj, &dest_obj) {
                        transfers.push(self.build_transfer(
                            transfers.len() as u32,
                            &source_obj,
                            Some(&dest_obj),
                        ));
                    }
                    // Equal: skip, already removed from the Indexer.
                }
                None => {
                    if matches!(
                        self.policy.delete_destination,
                        DeleteDestination::True | DeleteDestination::Prompt
                    ) {
                        transfers.push(self.build_delete_transfer(transfers.len() as u32, &dest_obj));
                    }
                }
            }
        }

        Ok(transfers)
    }

    /// An object whose destination LMT ≥ source LMT and whose size (and
    /// MD5, if enabled) equal source is never scheduled.
    /// `Overwrite` gates this comparison: `True` forces every existing
    /// destination object to be treated as different (plain copy always
    /// overwrites), `False` forces every one to be treated as equal (never
    /// clobber an existing object), and `IfSourceNewer`/`Prompt` fall back
    /// to the LMT/size/MD5 comparison — `Prompt` without an interactive
    /// enumeration-time prompt degrades to the same comparison.
    fn objects_equal(&self, source: &StoredObject, dest: &StoredObject) -> bool {
        match self.policy.overwrite {
            conveyor_manifest::job::OverwriteMode::True => return false,
            conveyor_manifest::job::OverwriteMode::False => return true,
            conveyor_manifest::job::OverwriteMode::IfSourceNewer
            | conveyor_manifest::job::OverwriteMode::Prompt => {}
        }

        if dest.last_modified < source.last_modified {
            return false;
        }
        if source.size != dest.size {
            return false;
        }
        match self.policy.md5_validation {
            Md5ValidationMode::NoCheck => true,
            Md5ValidationMode::LogOnly | Md5ValidationMode::FailIfDifferent => {
                match (source.md5, dest.md5) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
            }
        }
    }

    fn build_transfer(&self, index: u32, source: &StoredObject, _dest: Option<&StoredObject>) -> Transfer {
        let block_size = 1024 * 1024;
        Transfer {
            index,
            source_relative: source.relative_path.clone(),
            destination_relative: source.relative_path.clone(),
            size: source.size,
            last_modified: source.last_modified,
            content_md5: source.md5,
            entity_type: source.entity_type,
            status: TransferStatus::Pending,
            chunk_count: Transfer::chunk_count_for_size(source.size, block_size),
            blob_tier: None,
            metadata: source.source_metadata.clone(),
            tags: None,
        }
    }

    fn build_delete_transfer(&self, index: u32, dest: &StoredObject) -> Transfer {
        Transfer {
            index,
            source_relative: String::new(),
            destination_relative: dest.relative_path.clone(),
            size: 0,
            last_modified: dest.last_modified,
            content_md5: None,
            entity_type: dest.entity_type,
            status: TransferStatus::Pending,
            chunk_count: 1,
            blob_tier: None,
            metadata: None,
            tags: None,
        }
    }
}

fn dir_entry_to_stored_object(entry: &crate::backend::DirEntry) -> StoredObject {
    let entity_type = if entry.metadata.is_dir {
        EntityType::Folder
    } else if entry.metadata.is_symlink {
        EntityType::Symlink
    } else {
        EntityType::File
    };

    StoredObject {
        relative_path: entry.path.to_string_lossy().replace('\\', "/"),
        entity_type,
        size: entry.metadata.size,
        last_modified: entry.metadata.modified.unwrap_or(SystemTime::UNIX_EPOCH),
        md5: None,
        source_metadata: None,
        attributes: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_engages_and_releases_with_hysteresis() {
        let throttle = Throttle::new();
        assert!(!throttle.update(50.0, 100.0, 1.0, 0.85));
        assert!(throttle.update(100.0, 100.0, 1.0, 0.85));
        // Still engaged above the release threshold.
        assert!(throttle.update(90.0, 100.0, 1.0, 0.85));
        // Drops below release threshold: disengages.
        assert!(!throttle.update(80.0, 100.0, 1.0, 0.85));
    }

    #[test]
    fn crawl_parallelism_respects_ceiling() {
        let s3 = OrchestratorSettings::compute(FromTo::S3Blob);
        let local = OrchestratorSettings::compute(FromTo::LocalLocal);
        assert!(s3.crawl_parallelism <= 64);
        assert!(local.crawl_parallelism <= 48);
        assert!(s3.target_parallelism >= 1);
        assert!(local.target_parallelism >= 1);
    }
}
