/*!
 * Delta transfer support
 *
 * Decides, per file pair, whether a transfer is needed and whether it is
 * worth sending only the changed blocks (rsync-style) instead of the whole
 * file. The actual block-diff/patch application lives in the transfer
 * engine; this module only carries the comparison strategy and the
 * parameters that drive it.
 */

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How two files are compared to decide whether a transfer is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Compare modification times only (fast, default rsync-like behavior)
    ModTime,
    /// Compare file sizes only
    Size,
    /// Compare full-file checksums
    Checksum,
    /// Compare rolling block hashes and transfer only changed blocks
    Delta,
}

impl Default for CheckMode {
    fn default() -> Self {
        Self::ModTime
    }
}

/// Hash algorithm used for whole-block strong hashes during delta comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Blake3,
    Sha256,
}

/// Rolling (weak) hash used to find block boundaries cheaply before
/// confirming a match with the strong hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingHashAlgo {
    /// Adler-32 style rolling checksum, as used by classic rsync
    Adler32,
    /// Gear hash with a 64-byte window, cheaper to roll than Adler-32
    Gear64,
}

/// Configuration for a delta comparison/transfer pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaConfig {
    pub check_mode: CheckMode,
    pub block_size: usize,
    /// Skip delta comparison and always send the whole file
    pub whole_file: bool,
    pub update_manifest: bool,
    pub ignore_existing: bool,
    pub hash_algorithm: HashAlgorithm,
    pub rolling_hash_algo: RollingHashAlgo,
    pub parallel_hashing: bool,
    pub manifest_path: Option<std::path::PathBuf>,
    pub resume_enabled: bool,
    pub chunk_size: usize,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            check_mode: CheckMode::Delta,
            block_size: 128 * 1024,
            whole_file: false,
            update_manifest: false,
            ignore_existing: false,
            hash_algorithm: HashAlgorithm::Blake3,
            rolling_hash_algo: RollingHashAlgo::Gear64,
            parallel_hashing: true,
            manifest_path: None,
            resume_enabled: true,
            chunk_size: 128 * 1024,
        }
    }
}

/// Summary of a completed (or attempted) delta comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaStats {
    pub blocks_total: u64,
    pub blocks_matched: u64,
    pub blocks_changed: u64,
    pub bytes_sent: u64,
    pub bytes_saved: u64,
}

impl DeltaStats {
    /// Fraction of the file that was actually transferred, in `[0.0, 1.0]`.
    pub fn transferred_ratio(&self) -> f64 {
        if self.blocks_total == 0 {
            return 0.0;
        }
        self.blocks_changed as f64 / self.blocks_total as f64
    }
}

/// Whether block-level delta comparison is worth attempting for this file
/// pair, given its size and the configured block size.
///
/// Small files have too few blocks for a rolling-hash pass to pay off, so
/// delta mode falls back to a plain checksum comparison for them.
pub fn should_use_delta(source: &Path, dest: &Path, config: &DeltaConfig) -> Result<bool> {
    if config.whole_file {
        return Ok(false);
    }

    if !dest.exists() {
        return Ok(false);
    }

    let src_len = std::fs::metadata(source)?.len();

    // A file smaller than a handful of blocks gains nothing from diffing;
    // just compare/transfer it whole.
    const MIN_BLOCKS_FOR_DELTA: u64 = 4;
    Ok(src_len >= config.block_size as u64 * MIN_BLOCKS_FOR_DELTA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_check_mode_default() {
        assert_eq!(CheckMode::default(), CheckMode::ModTime);
    }

    #[test]
    fn test_should_use_delta_whole_file_forced() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        std::fs::write(&src, vec![0u8; 1024 * 1024]).unwrap();
        std::fs::write(&dest, vec![0u8; 1024 * 1024]).unwrap();

        let mut config = DeltaConfig::default();
        config.whole_file = true;
        assert!(!should_use_delta(&src, &dest, &config).unwrap());
    }

    #[test]
    fn test_should_use_delta_small_file_skipped() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        std::fs::write(&src, b"tiny").unwrap();
        std::fs::write(&dest, b"tiny").unwrap();

        let config = DeltaConfig::default();
        assert!(!should_use_delta(&src, &dest, &config).unwrap());
    }

    #[test]
    fn test_should_use_delta_large_file_eligible() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        let config = DeltaConfig::default();
        let big = vec![0u8; config.block_size * 8];
        std::fs::write(&src, &big).unwrap();
        std::fs::write(&dest, &big).unwrap();

        assert!(should_use_delta(&src, &dest, &config).unwrap());
    }

    #[test]
    fn test_should_use_delta_missing_dest() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        std::fs::write(&src, vec![0u8; 1024 * 1024]).unwrap();

        let config = DeltaConfig::default();
        assert!(!should_use_delta(&src, &dest, &config).unwrap());
    }

    #[test]
    fn test_delta_stats_ratio() {
        let stats = DeltaStats {
            blocks_total: 10,
            blocks_matched: 6,
            blocks_changed: 4,
            bytes_sent: 400,
            bytes_saved: 600,
        };
        assert!((stats.transferred_ratio() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delta_stats_ratio_empty() {
        let stats = DeltaStats::default();
        assert_eq!(stats.transferred_ratio(), 0.0);
    }
}
