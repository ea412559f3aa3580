//! Memory-mapped reader/writer over a plan file.

use crate::builder::checksum_of;
use crate::error::{Error, Result};
use crate::layout::{self, EntityTypeCode, JobStatusCode, TransferStatusCode};
use crate::{bitmap::RankSelectBitmap, PLAN_FILE_MAGIC, PLAN_FILE_VERSION};
use memmap2::MmapMut;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::Ordering;

/// A decoded transfer record, read out of the mapped bytes into owned data.
#[derive(Debug, Clone)]
pub struct TransferView {
    pub index: u32,
    pub status: TransferStatusCode,
    pub chunk_count: u32,
    pub entity_type: EntityTypeCode,
    pub size: u64,
    pub last_modified_millis: i64,
    pub content_md5: Option<[u8; 16]>,
    pub source_relative: String,
    pub destination_relative: String,
    pub metadata: Option<HashMap<String, String>>,
    pub blob_tier: Option<String>,
}

/// Opens and memory-maps a plan file for read and in-place status updates.
///
/// Status bytes (the per-part `job_status` and every transfer record's
/// `status`) are mutated with `Ordering::Release`; every load uses
/// `Ordering::Acquire`. This gives a resuming process a consistent view of
/// a part that was interrupted mid-flight without taking a lock on the hot
/// path. The variable zone is written once at creation and never touched
/// again, so reading it needs no synchronization at all.
#[derive(Debug)]
pub struct PlanFileReader {
    mmap: MmapMut,
}

impl PlanFileReader {
    /// Memory-map an existing plan file, validating its magic, version, and
    /// checksum. A checksum mismatch is reported as `Error::ChecksumMismatch`
    /// — the caller is expected to mark the owning job `Failed`, per the
    /// job lifecycle's recovery semantics.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::not_found(path));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let reader = Self { mmap };
        reader.validate()?;
        Ok(reader)
    }

    fn validate(&self) -> Result<()> {
        if self.mmap.len() < layout::HEADER_LEN {
            return Err(Error::invalid_format("file smaller than plan file header"));
        }

        if &self.mmap[0..4] != PLAN_FILE_MAGIC {
            return Err(Error::InvalidMagic {
                expected: PLAN_FILE_MAGIC.to_vec(),
                found: self.mmap[0..4].to_vec(),
            });
        }

        let version = layout::read_u16(&self.mmap, layout::OFF_VERSION);
        if version != PLAN_FILE_VERSION {
            return Err(Error::version_mismatch(PLAN_FILE_VERSION, version));
        }

        let total_transfers = self.total_transfers();
        let expected_len =
            layout::HEADER_LEN + total_transfers as usize * layout::TRANSFER_RECORD_LEN;
        if self.mmap.len() < expected_len {
            return Err(Error::invalid_format(
                "file too small for declared transfer count",
            ));
        }

        self.verify_checksum()
    }

    /// Recompute the creation-time checksum and compare it against the
    /// recorded one.
    pub fn verify_checksum(&self) -> Result<()> {
        let recorded = layout::read_u32(&self.mmap, layout::OFF_HEADER_CHECKSUM);
        let computed = checksum_of(&self.mmap);
        if recorded != computed {
            return Err(Error::checksum_mismatch(recorded, computed));
        }
        Ok(())
    }

    pub fn job_id(&self) -> u128 {
        let hi = layout::read_u64(&self.mmap, layout::OFF_JOB_ID_HI) as u128;
        let lo = layout::read_u64(&self.mmap, layout::OFF_JOB_ID_LO) as u128;
        (hi << 64) | lo
    }

    pub fn from_to(&self) -> u8 {
        self.mmap[layout::OFF_FROM_TO]
    }

    pub fn part_num(&self) -> u32 {
        layout::read_u32(&self.mmap, layout::OFF_PART_NUM)
    }

    pub fn is_final_part(&self) -> bool {
        self.mmap[layout::OFF_IS_FINAL_PART] != 0
    }

    pub fn total_transfers(&self) -> u32 {
        layout::read_u32(&self.mmap, layout::OFF_TOTAL_TRANSFERS)
    }

    pub fn created_utc_millis(&self) -> i64 {
        layout::read_i64(&self.mmap, layout::OFF_CREATED_UTC_MILLIS)
    }

    pub fn job_status(&self) -> Result<JobStatusCode> {
        JobStatusCode::try_from(
            layout::atomic_u8_at(&self.mmap, layout::OFF_JOB_STATUS).load(Ordering::Acquire),
        )
    }

    pub fn set_job_status(&self, status: JobStatusCode) {
        layout::atomic_u8_at(&self.mmap, layout::OFF_JOB_STATUS)
            .store(status as u8, Ordering::Release);
    }

    pub fn completed_count(&self) -> u32 {
        layout::atomic_u32_at(&self.mmap, layout::OFF_COMPLETED_COUNT).load(Ordering::Acquire)
    }

    pub fn failed_count(&self) -> u32 {
        layout::atomic_u32_at(&self.mmap, layout::OFF_FAILED_COUNT).load(Ordering::Acquire)
    }

    pub fn skipped_count(&self) -> u32 {
        layout::atomic_u32_at(&self.mmap, layout::OFF_SKIPPED_COUNT).load(Ordering::Acquire)
    }

    pub fn increment_completed(&self) -> u32 {
        layout::atomic_u32_at(&self.mmap, layout::OFF_COMPLETED_COUNT)
            .fetch_add(1, Ordering::Release)
            + 1
    }

    pub fn increment_failed(&self) -> u32 {
        layout::atomic_u32_at(&self.mmap, layout::OFF_FAILED_COUNT)
            .fetch_add(1, Ordering::Release)
            + 1
    }

    pub fn increment_skipped(&self) -> u32 {
        layout::atomic_u32_at(&self.mmap, layout::OFF_SKIPPED_COUNT)
            .fetch_add(1, Ordering::Release)
            + 1
    }

    pub fn source_root(&self) -> Result<String> {
        let offset = layout::read_u32(&self.mmap, layout::OFF_SOURCE_ROOT_OFFSET);
        let len = layout::read_u32(&self.mmap, layout::OFF_SOURCE_ROOT_LEN);
        self.read_variable_str(offset, len)
    }

    pub fn destination_root(&self) -> Result<String> {
        let offset = layout::read_u32(&self.mmap, layout::OFF_DESTINATION_ROOT_OFFSET);
        let len = layout::read_u32(&self.mmap, layout::OFF_DESTINATION_ROOT_LEN);
        self.read_variable_str(offset, len)
    }

    fn variable_zone_start(&self) -> usize {
        layout::HEADER_LEN + self.total_transfers() as usize * layout::TRANSFER_RECORD_LEN
    }

    fn read_variable_bytes(&self, offset: u32, len: u32) -> Result<&[u8]> {
        let start = self.variable_zone_start() + offset as usize;
        let end = start + len as usize;
        if end > self.mmap.len() {
            let zone_size = (self.mmap.len() - self.variable_zone_start()) as u32;
            return Err(Error::variable_zone_out_of_bounds(offset, len, zone_size));
        }
        Ok(&self.mmap[start..end])
    }

    fn read_variable_str(&self, offset: u32, len: u32) -> Result<String> {
        let bytes = self.read_variable_bytes(offset, len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::invalid_format(format!("non-UTF8 string in variable zone: {}", e)))
    }

    fn check_index(&self, index: u32) -> Result<()> {
        let count = self.total_transfers();
        if index >= count {
            return Err(Error::transfer_index_out_of_bounds(index, count));
        }
        Ok(())
    }

    pub fn transfer_status(&self, index: u32) -> Result<TransferStatusCode> {
        self.check_index(index)?;
        let off = layout::record_offset(index) + layout::REC_OFF_STATUS;
        TransferStatusCode::try_from(layout::atomic_u8_at(&self.mmap, off).load(Ordering::Acquire))
    }

    pub fn set_transfer_status(&self, index: u32, status: TransferStatusCode) -> Result<()> {
        self.check_index(index)?;
        let off = layout::record_offset(index) + layout::REC_OFF_STATUS;
        layout::atomic_u8_at(&self.mmap, off).store(status as u8, Ordering::Release);
        Ok(())
    }

    /// Full decoded view of a transfer record, including its variable-zone
    /// strings and maps. More expensive than `transfer_status` — use the
    /// narrower accessor on the scheduler's hot path.
    pub fn transfer(&self, index: u32) -> Result<TransferView> {
        self.check_index(index)?;
        let off = layout::record_offset(index);

        let entity_type = EntityTypeCode::try_from(self.mmap[off + layout::REC_OFF_ENTITY_TYPE])?;
        let has_md5 = self.mmap[off + layout::REC_OFF_HAS_MD5] != 0;
        let content_md5 = if has_md5 {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(
                &self.mmap[off + layout::REC_OFF_CONTENT_MD5..off + layout::REC_OFF_CONTENT_MD5 + 16],
            );
            Some(buf)
        } else {
            None
        };

        let source_rel_offset = layout::read_u32(&self.mmap, off + layout::REC_OFF_SOURCE_REL_OFFSET);
        let source_rel_len = layout::read_u32(&self.mmap, off + layout::REC_OFF_SOURCE_REL_LEN);
        let dest_rel_offset = layout::read_u32(&self.mmap, off + layout::REC_OFF_DEST_REL_OFFSET);
        let dest_rel_len = layout::read_u32(&self.mmap, off + layout::REC_OFF_DEST_REL_LEN);
        let metadata_offset = layout::read_u32(&self.mmap, off + layout::REC_OFF_METADATA_OFFSET);
        let metadata_len = layout::read_u32(&self.mmap, off + layout::REC_OFF_METADATA_LEN);
        let blob_tier_offset = layout::read_u32(&self.mmap, off + layout::REC_OFF_BLOB_TIER_OFFSET);
        let blob_tier_len = layout::read_u32(&self.mmap, off + layout::REC_OFF_BLOB_TIER_LEN);

        let metadata = if metadata_len > 0 {
            let bytes = self.read_variable_bytes(metadata_offset, metadata_len)?;
            Some(
                bincode::deserialize(bytes)
                    .map_err(|e| Error::invalid_format(format!("bad metadata bytes: {}", e)))?,
            )
        } else {
            None
        };

        let blob_tier = if blob_tier_len > 0 {
            Some(self.read_variable_str(blob_tier_offset, blob_tier_len)?)
        } else {
            None
        };

        Ok(TransferView {
            index: layout::read_u32(&self.mmap, off + layout::REC_OFF_INDEX),
            status: TransferStatusCode::try_from(self.mmap[off + layout::REC_OFF_STATUS])?,
            chunk_count: layout::read_u32(&self.mmap, off + layout::REC_OFF_CHUNK_COUNT),
            entity_type,
            size: layout::read_u64(&self.mmap, off + layout::REC_OFF_SIZE),
            last_modified_millis: layout::read_i64(
                &self.mmap,
                off + layout::REC_OFF_LAST_MODIFIED_MILLIS,
            ),
            content_md5,
            source_relative: self.read_variable_str(source_rel_offset, source_rel_len)?,
            destination_relative: self.read_variable_str(dest_rel_offset, dest_rel_len)?,
            metadata,
            blob_tier,
        })
    }

    /// Indices of transfers still eligible to run on a resume: `Pending` or
    /// `Failed`. `Skipped` transfers are never re-run.
    pub fn resumable_indices(&self) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        for index in 0..self.total_transfers() {
            let status = self.transfer_status(index)?;
            if matches!(status, TransferStatusCode::Pending | TransferStatusCode::Failed) {
                out.push(index);
            }
        }
        Ok(out)
    }

    /// A point-in-time snapshot of completion state as a rank-select
    /// bitmap, useful for the progress manager's percentage display. Not
    /// the canonical state — the per-record status byte is — so callers
    /// that need a live answer should use `transfer_status` directly.
    pub fn completion_snapshot(&self) -> Result<RankSelectBitmap> {
        let total = self.total_transfers() as usize;
        let mut bitmap = RankSelectBitmap::new(total);
        for index in 0..total as u32 {
            if self.transfer_status(index)? == TransferStatusCode::Completed {
                bitmap
                    .set(index as usize, true)
                    .map_err(|e| Error::bitmap(e.to_string()))?;
            }
        }
        Ok(bitmap)
    }
}

unsafe impl Send for PlanFileReader {}
unsafe impl Sync for PlanFileReader {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{PlanFileBuilder, PlanFileHeader, TransferInput};
    use crate::layout::EntityTypeCode;
    use tempfile::NamedTempFile;

    fn create_test_plan_file() -> NamedTempFile {
        let header = PlanFileHeader {
            job_id: 0xabcd_ef01_2345_6789_0000_0000_0000_0001,
            from_to: 0,
            part_num: 0,
            is_final_part: true,
            created_utc_millis: 1_700_000_000_000,
            source_root: "/data/source".into(),
            destination_root: "https://acct.blob.core.windows.net/c".into(),
        };
        let mut builder = PlanFileBuilder::new(header);
        builder
            .add_transfer(TransferInput {
                index: 0,
                source_relative: "a.txt".into(),
                destination_relative: "a.txt".into(),
                size: 4096,
                last_modified_millis: 0,
                content_md5: Some([1u8; 16]),
                entity_type: EntityTypeCode::File,
                chunk_count: 1,
                blob_tier: None,
                metadata: None,
            })
            .add_transfer(TransferInput {
                index: 1,
                source_relative: "b.txt".into(),
                destination_relative: "b.txt".into(),
                size: 8192,
                last_modified_millis: 0,
                content_md5: None,
                entity_type: EntityTypeCode::File,
                chunk_count: 2,
                blob_tier: Some("Cool".into()),
                metadata: None,
            });

        let bytes = builder.build().unwrap();
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), bytes).unwrap();
        temp_file
    }

    #[test]
    fn opens_and_validates_checksum() {
        let temp_file = create_test_plan_file();
        let reader = PlanFileReader::open(temp_file.path()).unwrap();
        assert_eq!(reader.total_transfers(), 2);
        assert!(reader.is_final_part());
    }

    #[test]
    fn rejects_bad_magic() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), b"BADMAGIC and then some padding....").unwrap();
        let result = PlanFileReader::open(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn reads_transfer_records() {
        let temp_file = create_test_plan_file();
        let reader = PlanFileReader::open(temp_file.path()).unwrap();

        let t0 = reader.transfer(0).unwrap();
        assert_eq!(t0.source_relative, "a.txt");
        assert_eq!(t0.size, 4096);
        assert_eq!(t0.content_md5, Some([1u8; 16]));

        let t1 = reader.transfer(1).unwrap();
        assert_eq!(t1.blob_tier.as_deref(), Some("Cool"));
        assert_eq!(t1.chunk_count, 2);
    }

    #[test]
    fn status_updates_round_trip_with_acquire_release() {
        let temp_file = create_test_plan_file();
        let reader = PlanFileReader::open(temp_file.path()).unwrap();

        assert_eq!(reader.transfer_status(0).unwrap(), TransferStatusCode::Pending);
        reader
            .set_transfer_status(0, TransferStatusCode::Completed)
            .unwrap();
        assert_eq!(
            reader.transfer_status(0).unwrap(),
            TransferStatusCode::Completed
        );
        assert_eq!(reader.increment_completed(), 1);
        assert_eq!(reader.completed_count(), 1);
    }

    #[test]
    fn resumable_indices_excludes_skipped() {
        let temp_file = create_test_plan_file();
        let reader = PlanFileReader::open(temp_file.path()).unwrap();

        reader
            .set_transfer_status(0, TransferStatusCode::Skipped)
            .unwrap();
        reader
            .set_transfer_status(1, TransferStatusCode::Failed)
            .unwrap();

        let resumable = reader.resumable_indices().unwrap();
        assert_eq!(resumable, vec![1]);
    }

    #[test]
    fn out_of_bounds_transfer_index_errors() {
        let temp_file = create_test_plan_file();
        let reader = PlanFileReader::open(temp_file.path()).unwrap();
        let result = reader.transfer_status(5);
        assert!(matches!(
            result,
            Err(Error::TransferIndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn source_and_destination_roots_round_trip() {
        let temp_file = create_test_plan_file();
        let reader = PlanFileReader::open(temp_file.path()).unwrap();
        assert_eq!(reader.source_root().unwrap(), "/data/source");
        assert_eq!(
            reader.destination_root().unwrap(),
            "https://acct.blob.core.windows.net/c"
        );
    }
}
