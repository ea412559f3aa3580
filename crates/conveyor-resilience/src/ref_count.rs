//! Reference-Counted GC: WAL-gated safe garbage collection for shared chunks
//!
//! When chunks are deduplicated across multiple jobs, reference counting
//! determines when a chunk can be safely garbage collected. The key invariant:
//! chunks are only marked as deletable AFTER the Magnetar WAL has committed
//! the removal — preventing the catastrophic case where a crash between
//! deleting content and updating the index leaves dangling references.
//!
//! # Design
//!
//! This module provides the pure-logic reference counting. The actual
//! deletion is deferred to the caller (who knows about storage). The
//! `RefCountMap` tracks counts in memory, and the `GarbageCollector`
//! enforces the WAL-sync gating rule.
//!
//! # Example
//!
//! ```
//! use conveyor_resilience::ref_count::{RefCountMap, GarbageCollector};
//!
//! let mut refs = RefCountMap::new();
//!
//! // Job 1 and Job 2 both reference the same chunk
//! refs.increment("chunk_abc123");
//! refs.increment("chunk_abc123");
//! assert_eq!(refs.count("chunk_abc123"), 2);
//!
//! // Job 1 completes, decrements reference
//! refs.decrement("chunk_abc123");
//! assert_eq!(refs.count("chunk_abc123"), 1);
//!
//! // Job 2 completes, chunk is now unreferenced
//! refs.decrement("chunk_abc123");
//! assert_eq!(refs.count("chunk_abc123"), 0);
//!
//! // GC identifies it as reclaimable
//! let mut gc = GarbageCollector::new();
//! gc.mark_reclaimable("chunk_abc123");
//!
//! // Only collect AFTER WAL has synced
//! gc.confirm_wal_synced();
//! let reclaimable = gc.collect();
//! assert_eq!(reclaimable, vec!["chunk_abc123"]);
//! ```

use std::collections::{HashMap, HashSet};

/// Tracks reference counts for shared chunks.
///
/// Each chunk is identified by a string key (typically a hex-encoded BLAKE3 hash).
/// The count represents how many active jobs/locations reference this chunk.
#[derive(Debug, Default)]
pub struct RefCountMap {
    counts: HashMap<String, u64>,
}

impl RefCountMap {
    /// Create a new empty reference count map
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the reference count for a chunk
    pub fn increment(&mut self, chunk_key: &str) {
        *self.counts.entry(chunk_key.to_string()).or_insert(0) += 1;
    }

    /// Decrement the reference count for a chunk.
    ///
    /// Returns the new count. If the count reaches zero, the entry is kept
    /// (not removed) so the GC can identify it as reclaimable.
    pub fn decrement(&mut self, chunk_key: &str) -> u64 {
        if let Some(count) = self.counts.get_mut(chunk_key) {
            *count = count.saturating_sub(1);
            *count
        } else {
            0
        }
    }

    /// Get the current reference count for a chunk
    pub fn count(&self, chunk_key: &str) -> u64 {
        self.counts.get(chunk_key).copied().unwrap_or(0)
    }

    /// Get all chunks with zero references (candidates for GC)
    pub fn zero_ref_chunks(&self) -> Vec<&str> {
        self.counts
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Remove a chunk from tracking (after it has been garbage collected)
    pub fn remove(&mut self, chunk_key: &str) {
        self.counts.remove(chunk_key);
    }

    /// Bulk-load reference counts (e.g., from a database scan on startup)
    pub fn load(&mut self, key: String, count: u64) {
        self.counts.insert(key, count);
    }

    /// Get the total number of tracked chunks
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> RefCountStats {
        let total = self.counts.len();
        let zero_refs = self.counts.values().filter(|&&c| c == 0).count();
        let total_refs: u64 = self.counts.values().sum();

        RefCountStats {
            total_chunks: total,
            zero_ref_chunks: zero_refs,
            total_references: total_refs,
        }
    }
}

/// Statistics about reference counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefCountStats {
    /// Total chunks being tracked
    pub total_chunks: usize,
    /// Chunks with zero references (GC candidates)
    pub zero_ref_chunks: usize,
    /// Sum of all reference counts
    pub total_references: u64,
}

/// WAL-gated garbage collector.
///
/// Enforces the invariant that chunks are only deleted AFTER the WAL has
/// been synced. This prevents the crash scenario where content is deleted
/// but the index still references it.
///
/// # Lifecycle
///
/// 1. Caller identifies zero-ref chunks via `RefCountMap::zero_ref_chunks()`
/// 2. Caller calls `mark_reclaimable()` for each
/// 3. Caller writes the removal to Magnetar WAL and commits
/// 4. Caller calls `confirm_wal_synced()`
/// 5. Caller calls `collect()` to get the list of chunks safe to delete
/// 6. Caller deletes the actual content
/// 7. Caller calls `acknowledge()` to remove from tracking
#[derive(Debug, Default)]
pub struct GarbageCollector {
    /// Chunks marked as reclaimable (pending WAL sync)
    pending: HashSet<String>,

    /// Chunks confirmed safe to delete (WAL synced)
    ready: Vec<String>,

    /// Whether the WAL has been synced since the last batch of marks
    wal_synced: bool,

    /// Total chunks collected over lifetime
    total_collected: u64,
}

impl GarbageCollector {
    /// Create a new garbage collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a chunk as reclaimable (zero references).
    ///
    /// The chunk will NOT be returned by `collect()` until `confirm_wal_synced()`
    /// has been called — this is the WAL-gating invariant.
    pub fn mark_reclaimable(&mut self, chunk_key: &str) {
        self.pending.insert(chunk_key.to_string());
        self.wal_synced = false; // Reset WAL sync flag for new batch
    }

    /// Confirm that the Magnetar WAL has been synced.
    ///
    /// This moves all pending chunks to the "ready" state, making them
    /// available for collection.
    pub fn confirm_wal_synced(&mut self) {
        self.wal_synced = true;
        self.ready.extend(self.pending.drain());
    }

    /// Collect chunks that are safe to delete.
    ///
    /// Returns the list of chunk keys. The caller should delete the actual
    /// content, then call `acknowledge()`.
    ///
    /// Returns empty if WAL has not been synced.
    pub fn collect(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ready)
    }

    /// Acknowledge that chunks have been deleted.
    pub fn acknowledge(&mut self, count: u64) {
        self.total_collected += count;
    }

    /// Get the number of chunks pending WAL sync
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get the number of chunks ready for collection
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Get total chunks collected over lifetime
    pub fn total_collected(&self) -> u64 {
        self.total_collected
    }

    /// Check if WAL has been synced for current batch
    pub fn is_wal_synced(&self) -> bool {
        self.wal_synced
    }
}
