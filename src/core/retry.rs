/*!
 * Retry logic with exponential backoff
 */

use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::config::CopyConfig;
use crate::error::{OrbitError, Result};
use crate::instrumentation::OperationStats;
use super::CopyStats;

/// Execute a copy operation with retry logic and exponential backoff
pub fn with_retry<F>(
    config: &CopyConfig,
    mut operation: F,
) -> Result<CopyStats>
where
    F: FnMut() -> Result<CopyStats>,
{
    let mut attempt = 0;
    let mut last_error: Option<OrbitError> = None;

    while attempt <= config.retry_attempts {
        if attempt > 0 {
            let delay = if config.exponential_backoff {
                Duration::from_secs(config.retry_delay_secs * 2_u64.pow(attempt - 1))
            } else {
                Duration::from_secs(config.retry_delay_secs)
            };

            println!("Retry attempt {} of {} after {:?}...", attempt, config.retry_attempts, delay);
            thread::sleep(delay);
        }

        match operation() {
            Ok(stats) => return Ok(stats),
            Err(e) => {
                if e.is_fatal() {
                    return Err(e);
                }
                last_error = Some(e);
                attempt += 1;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| OrbitError::RetriesExhausted {
        attempts: config.retry_attempts
    }))
}

/// Execute a copy operation with retry logic, preserving metadata on success
pub fn with_retry_and_metadata<F>(
    source_path: &Path,
    dest_path: &Path,
    config: &CopyConfig,
    operation: F,
) -> Result<CopyStats>
where
    F: FnMut() -> Result<CopyStats>,
{
    let stats = with_retry(config, operation)?;

    // Preserve metadata if requested
    if config.preserve_metadata {
        if let Err(e) = super::metadata::preserve_metadata(source_path, dest_path) {
            eprintln!("Warning: Failed to preserve metadata: {}", e);
        }
    }

    Ok(stats)
}

/// Like `with_retry_and_metadata`, but also folds each attempt into an
/// `OperationStats` aggregate (retry count, success/failure tallies) when
/// the caller passes one in via `copy_file_with_stats`.
pub fn with_retry_and_metadata_stats<F>(
    source_path: &Path,
    dest_path: &Path,
    config: &CopyConfig,
    stats: Option<&OperationStats>,
    mut operation: F,
) -> Result<CopyStats>
where
    F: FnMut() -> Result<CopyStats>,
{
    let mut attempt = 0;
    let mut last_error: Option<OrbitError> = None;

    let result = loop {
        if attempt > 0 {
            if let Some(ops) = stats {
                ops.record_retry(attempt);
            }
            let delay = if config.exponential_backoff {
                Duration::from_secs(config.retry_delay_secs * 2_u64.pow(attempt - 1))
            } else {
                Duration::from_secs(config.retry_delay_secs)
            };
            println!("Retry attempt {} of {} after {:?}...", attempt, config.retry_attempts, delay);
            thread::sleep(delay);
        }

        match operation() {
            Ok(stats) => break Ok(stats),
            Err(e) if e.is_fatal() => break Err(e),
            Err(e) => {
                last_error = Some(e);
                attempt += 1;
                if attempt > config.retry_attempts {
                    break Err(last_error.take().unwrap_or_else(|| {
                        OrbitError::RetriesExhausted { attempts: config.retry_attempts }
                    }));
                }
            }
        }
    };

    if let Some(ops) = stats {
        match &result {
            Ok(_) => ops.record_success(),
            Err(e) => ops.record_failure(e),
        }
    }

    let result = result?;

    if config.preserve_metadata {
        if let Err(e) = super::metadata::preserve_metadata(source_path, dest_path) {
            eprintln!("Warning: Failed to preserve metadata: {}", e);
        }
    }

    Ok(result)
}
