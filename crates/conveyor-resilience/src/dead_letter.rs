//! Dead-Letter Queue: Persistent storage for permanently-failed items
//!
//! When an item exhausts its maximum retry/penalty count, it is routed to
//! the dead-letter queue instead of failing the entire job. This enables
//! partial success — the job completes with most items transferred, and
//! dead-letter items can be retried manually or by the Sentinel healer.
//!
//! # Design
//!
//! The dead-letter queue is an in-memory structure that can be flushed to
//! persistent storage (Magnetar SQLite) by the caller. This keeps the
//! resilience crate pure-logic with no storage dependencies.
//!
//! # Example
//!
//! ```
//! use conveyor_resilience::dead_letter::{DeadLetterQueue, DeadLetterEntry, FailureReason};
//!
//! let mut dlq = DeadLetterQueue::new(1000); // max 1000 entries
//!
//! dlq.push(DeadLetterEntry {
//!     item_key: "chunk-42".to_string(),
//!     job_id: 1,
//!     failure_reason: FailureReason::RetriesExhausted { attempts: 5 },
//!     last_error: "connection refused".to_string(),
//!     first_failed_at: std::time::SystemTime::now(),
//!     last_failed_at: std::time::SystemTime::now(),
//!     source_path: Some("/data/file.bin".to_string()),
//!     dest_path: Some("/backup/file.bin".to_string()),
//! });
//!
//! assert_eq!(dlq.len(), 1);
//! let entries = dlq.drain();
//! assert_eq!(entries.len(), 1);
//! ```

use std::collections::VecDeque;
use std::time::SystemTime;

/// Reason an item was sent to the dead-letter queue
#[derive(Debug, Clone)]
pub enum FailureReason {
    /// Maximum retry/penalty count exceeded
    RetriesExhausted { attempts: u32 },

    /// Permanent error (non-transient, should not retry)
    PermanentError,

    /// Checksum mismatch after transfer
    ChecksumMismatch,

    /// Source file disappeared during transfer
    SourceMissing,

    /// Destination write failure (permissions, disk full, etc.)
    DestinationError,

    /// Compression or decompression failure (corrupt data)
    DataCorruption,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::RetriesExhausted { attempts } => {
                write!(f, "retries exhausted after {} attempts", attempts)
            }
            FailureReason::PermanentError => write!(f, "permanent error"),
            FailureReason::ChecksumMismatch => write!(f, "checksum mismatch"),
            FailureReason::SourceMissing => write!(f, "source missing"),
            FailureReason::DestinationError => write!(f, "destination error"),
            FailureReason::DataCorruption => write!(f, "data corruption"),
        }
    }
}

/// A single dead-letter entry
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    /// Unique key for this item (chunk hash, file path, etc.)
    pub item_key: String,

    /// Job ID this item belongs to
    pub job_id: i64,

    /// Why this item was dead-lettered
    pub failure_reason: FailureReason,

    /// Last error message
    pub last_error: String,

    /// When this item first failed
    pub first_failed_at: SystemTime,

    /// When this item was last attempted
    pub last_failed_at: SystemTime,

    /// Optional source path
    pub source_path: Option<String>,

    /// Optional destination path
    pub dest_path: Option<String>,
}

/// In-memory dead-letter queue with bounded capacity.
///
/// Items that exceed the capacity are dropped (oldest first) to prevent
/// unbounded memory growth. The caller should periodically flush to
/// persistent storage.
#[derive(Debug)]
pub struct DeadLetterQueue {
    entries: VecDeque<DeadLetterEntry>,
    max_capacity: usize,
    total_received: u64,
    total_dropped: u64,
}

impl DeadLetterQueue {
    /// Create a new dead-letter queue with the given maximum capacity
    pub fn new(max_capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_capacity.min(1024)),
            max_capacity,
            total_received: 0,
            total_dropped: 0,
        }
    }

    /// Push an entry into the dead-letter queue.
    ///
    /// If the queue is at capacity, the oldest entry is dropped.
    pub fn push(&mut self, entry: DeadLetterEntry) {
        self.total_received += 1;

        if self.entries.len() >= self.max_capacity {
            self.entries.pop_front();
            self.total_dropped += 1;
        }

        self.entries.push_back(entry);
    }

    /// Drain all entries from the queue (for flushing to persistent storage)
    pub fn drain(&mut self) -> Vec<DeadLetterEntry> {
        self.entries.drain(..).collect()
    }

    /// Peek at all entries without removing them
    pub fn entries(&self) -> &VecDeque<DeadLetterEntry> {
        &self.entries
    }

    /// Get entries for a specific job
    pub fn entries_for_job(&self, job_id: i64) -> Vec<&DeadLetterEntry> {
        self.entries.iter().filter(|e| e.job_id == job_id).collect()
    }

    /// Number of entries currently in the queue
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> DeadLetterStats {
        DeadLetterStats {
            current_count: self.entries.len(),
            max_capacity: self.max_capacity,
            total_received: self.total_received,
            total_dropped: self.total_dropped,
        }
    }
}

/// Statistics for the dead-letter queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterStats {
    /// Current number of entries
    pub current_count: usize,
    /// Maximum capacity
    pub max_capacity: usize,
    /// Total entries ever received
    pub total_received: u64,
    /// Total entries dropped due to capacity overflow
    pub total_dropped: u64,
}
