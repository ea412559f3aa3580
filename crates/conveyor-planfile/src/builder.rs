//! Builds the bytes of a new plan file.

use crate::error::{Error, Result};
use crate::layout::{self, EntityTypeCode, JobStatusCode, TransferStatusCode};
use crate::{PLAN_FILE_MAGIC, PLAN_FILE_VERSION};

/// One transfer to bake into the plan file at creation time. Mirrors
/// `conveyor_manifest::Transfer` without depending on that crate — see
/// `crate::layout` for the discriminant mapping.
#[derive(Debug, Clone)]
pub struct TransferInput {
    pub index: u32,
    pub source_relative: String,
    pub destination_relative: String,
    pub size: u64,
    pub last_modified_millis: i64,
    pub content_md5: Option<[u8; 16]>,
    pub entity_type: EntityTypeCode,
    pub chunk_count: u32,
    pub blob_tier: Option<String>,
    pub metadata: Option<std::collections::HashMap<String, String>>,
}

/// Header-level fields supplied once per part.
#[derive(Debug, Clone)]
pub struct PlanFileHeader {
    pub job_id: u128,
    pub from_to: u8,
    pub part_num: u32,
    pub is_final_part: bool,
    pub created_utc_millis: i64,
    pub source_root: String,
    pub destination_root: String,
}

/// Builder for a single job part's plan file.
///
/// # Example
/// ```
/// use conveyor_planfile::builder::{PlanFileBuilder, PlanFileHeader, TransferInput};
/// use conveyor_planfile::layout::EntityTypeCode;
///
/// let header = PlanFileHeader {
///     job_id: 0xdead_beef,
///     from_to: 0,
///     part_num: 0,
///     is_final_part: true,
///     created_utc_millis: 0,
///     source_root: "/data/source".into(),
///     destination_root: "https://acct.blob.core.windows.net/c".into(),
/// };
/// let mut builder = PlanFileBuilder::new(header);
/// builder.add_transfer(TransferInput {
///     index: 0,
///     source_relative: "a.txt".into(),
///     destination_relative: "a.txt".into(),
///     size: 10,
///     last_modified_millis: 0,
///     content_md5: None,
///     entity_type: EntityTypeCode::File,
///     chunk_count: 1,
///     blob_tier: None,
///     metadata: None,
/// });
/// let bytes = builder.build().unwrap();
/// assert_eq!(&bytes[0..4], b"AZP1");
/// ```
#[derive(Debug)]
pub struct PlanFileBuilder {
    header: PlanFileHeader,
    transfers: Vec<TransferInput>,
}

impl PlanFileBuilder {
    pub fn new(header: PlanFileHeader) -> Self {
        Self {
            header,
            transfers: Vec::new(),
        }
    }

    pub fn add_transfer(&mut self, transfer: TransferInput) -> &mut Self {
        self.transfers.push(transfer);
        self
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }

    /// Serialize the header, transfer record array, and variable zone into
    /// one contiguous buffer ready to be written to disk.
    pub fn build(mut self) -> Result<Vec<u8>> {
        if self.transfers.is_empty() && self.header.part_num == 0 && self.header.is_final_part {
            return Err(Error::NoTransfersScheduled);
        }

        self.transfers.sort_by_key(|t| t.index);

        let total_transfers = self.transfers.len() as u32;
        let record_zone_len = self.transfers.len() * layout::TRANSFER_RECORD_LEN;
        let body_len = layout::HEADER_LEN + record_zone_len;

        let mut buf = vec![0u8; body_len];
        let mut variable_zone: Vec<u8> = Vec::new();

        let source_root_offset = variable_zone.len() as u32;
        variable_zone.extend_from_slice(self.header.source_root.as_bytes());
        let source_root_len = self.header.source_root.len() as u32;

        let destination_root_offset = variable_zone.len() as u32;
        variable_zone.extend_from_slice(self.header.destination_root.as_bytes());
        let destination_root_len = self.header.destination_root.len() as u32;

        for (slot, transfer) in self.transfers.iter().enumerate() {
            let record_off = layout::record_offset(slot as u32);

            let source_rel_offset = variable_zone.len() as u32;
            variable_zone.extend_from_slice(transfer.source_relative.as_bytes());
            let source_rel_len = transfer.source_relative.len() as u32;

            let dest_rel_offset = variable_zone.len() as u32;
            variable_zone.extend_from_slice(transfer.destination_relative.as_bytes());
            let dest_rel_len = transfer.destination_relative.len() as u32;

            let (metadata_offset, metadata_len) = match &transfer.metadata {
                Some(map) => {
                    let encoded = bincode::serialize(map)
                        .map_err(|e| Error::Other(format!("metadata encode failed: {}", e)))?;
                    let off = variable_zone.len() as u32;
                    variable_zone.extend_from_slice(&encoded);
                    (off, encoded.len() as u32)
                }
                None => (0, 0),
            };

            let (blob_tier_offset, blob_tier_len) = match &transfer.blob_tier {
                Some(tier) => {
                    let off = variable_zone.len() as u32;
                    variable_zone.extend_from_slice(tier.as_bytes());
                    (off, tier.len() as u32)
                }
                None => (0, 0),
            };

            layout::write_u32(&mut buf, record_off + layout::REC_OFF_INDEX, transfer.index);
            buf[record_off + layout::REC_OFF_STATUS] = TransferStatusCode::Pending as u8;
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_CHUNK_COUNT,
                transfer.chunk_count,
            );
            buf[record_off + layout::REC_OFF_ENTITY_TYPE] = transfer.entity_type as u8;
            buf[record_off + layout::REC_OFF_HAS_MD5] = transfer.content_md5.is_some() as u8;
            layout::write_u64(&mut buf, record_off + layout::REC_OFF_SIZE, transfer.size);
            layout::write_i64(
                &mut buf,
                record_off + layout::REC_OFF_LAST_MODIFIED_MILLIS,
                transfer.last_modified_millis,
            );
            if let Some(md5) = transfer.content_md5 {
                buf[record_off + layout::REC_OFF_CONTENT_MD5
                    ..record_off + layout::REC_OFF_CONTENT_MD5 + 16]
                    .copy_from_slice(&md5);
            }
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_SOURCE_REL_OFFSET,
                source_rel_offset,
            );
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_SOURCE_REL_LEN,
                source_rel_len,
            );
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_DEST_REL_OFFSET,
                dest_rel_offset,
            );
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_DEST_REL_LEN,
                dest_rel_len,
            );
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_METADATA_OFFSET,
                metadata_offset,
            );
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_METADATA_LEN,
                metadata_len,
            );
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_BLOB_TIER_OFFSET,
                blob_tier_offset,
            );
            layout::write_u32(
                &mut buf,
                record_off + layout::REC_OFF_BLOB_TIER_LEN,
                blob_tier_len,
            );
        }

        buf[layout::OFF_MAGIC..layout::OFF_MAGIC + 4].copy_from_slice(PLAN_FILE_MAGIC);
        layout::write_u16(&mut buf, layout::OFF_VERSION, PLAN_FILE_VERSION);
        layout::write_u64(
            &mut buf,
            layout::OFF_JOB_ID_HI,
            (self.header.job_id >> 64) as u64,
        );
        layout::write_u64(&mut buf, layout::OFF_JOB_ID_LO, self.header.job_id as u64);
        buf[layout::OFF_FROM_TO] = self.header.from_to;
        buf[layout::OFF_IS_FINAL_PART] = self.header.is_final_part as u8;
        layout::write_u32(&mut buf, layout::OFF_PART_NUM, self.header.part_num);
        layout::write_u32(&mut buf, layout::OFF_TOTAL_TRANSFERS, total_transfers);
        buf[layout::OFF_JOB_STATUS] = JobStatusCode::InProgress as u8;
        layout::write_i64(
            &mut buf,
            layout::OFF_CREATED_UTC_MILLIS,
            self.header.created_utc_millis,
        );
        layout::write_u32(&mut buf, layout::OFF_COMPLETED_COUNT, 0);
        layout::write_u32(&mut buf, layout::OFF_FAILED_COUNT, 0);
        layout::write_u32(&mut buf, layout::OFF_SKIPPED_COUNT, 0);
        layout::write_u32(&mut buf, layout::OFF_SOURCE_ROOT_OFFSET, source_root_offset);
        layout::write_u32(&mut buf, layout::OFF_SOURCE_ROOT_LEN, source_root_len);
        layout::write_u32(
            &mut buf,
            layout::OFF_DESTINATION_ROOT_OFFSET,
            destination_root_offset,
        );
        layout::write_u32(
            &mut buf,
            layout::OFF_DESTINATION_ROOT_LEN,
            destination_root_len,
        );

        buf.extend_from_slice(&variable_zone);

        // Checksum covers everything but the checksum field itself and the
        // mutable counters, so a resume's in-place status writes never
        // invalidate it.
        let checksum = checksum_of(&buf);
        layout::write_u32(&mut buf, layout::OFF_HEADER_CHECKSUM, checksum);

        Ok(buf)
    }
}

/// Truncated BLAKE3 digest over the fixed, creation-time-immutable portion
/// of the plan file (everything except the mutable counters and the
/// checksum field itself).
pub(crate) fn checksum_of(buf: &[u8]) -> u32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&buf[..layout::OFF_JOB_STATUS]);
    hasher.update(&buf[layout::OFF_CREATED_UTC_MILLIS..layout::OFF_COMPLETED_COUNT]);
    hasher.update(&buf[layout::OFF_SOURCE_ROOT_OFFSET..layout::HEADER_LEN]);
    hasher.update(&buf[layout::HEADER_LEN..]);
    let digest = hasher.finalize();
    u32::from_le_bytes(digest.as_bytes()[0..4].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> PlanFileHeader {
        PlanFileHeader {
            job_id: 0x1234_5678_9abc_def0_0000_0000_0000_0001,
            from_to: 0,
            part_num: 0,
            is_final_part: true,
            created_utc_millis: 1_700_000_000_000,
            source_root: "/data/source".into(),
            destination_root: "https://acct.blob.core.windows.net/c".into(),
        }
    }

    #[test]
    fn builds_header_with_magic_and_version() {
        let mut builder = PlanFileBuilder::new(sample_header());
        builder.add_transfer(TransferInput {
            index: 0,
            source_relative: "a.txt".into(),
            destination_relative: "a.txt".into(),
            size: 1024,
            last_modified_millis: 0,
            content_md5: None,
            entity_type: EntityTypeCode::File,
            chunk_count: 1,
            blob_tier: None,
            metadata: None,
        });

        let bytes = builder.build().unwrap();
        assert_eq!(&bytes[0..4], b"AZP1");
        assert_eq!(layout::read_u16(&bytes, layout::OFF_VERSION), 1);
        assert_eq!(layout::read_u32(&bytes, layout::OFF_TOTAL_TRANSFERS), 1);
    }

    #[test]
    fn rejects_empty_final_part_zero() {
        let builder = PlanFileBuilder::new(sample_header());
        let result = builder.build();
        assert!(matches!(result, Err(Error::NoTransfersScheduled)));
    }

    #[test]
    fn allows_empty_non_final_part() {
        let mut header = sample_header();
        header.is_final_part = false;
        let builder = PlanFileBuilder::new(header);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn sorts_transfers_by_index_before_writing() {
        let mut builder = PlanFileBuilder::new(sample_header());
        builder.add_transfer(TransferInput {
            index: 1,
            source_relative: "b.txt".into(),
            destination_relative: "b.txt".into(),
            size: 1,
            last_modified_millis: 0,
            content_md5: None,
            entity_type: EntityTypeCode::File,
            chunk_count: 1,
            blob_tier: None,
            metadata: None,
        });
        builder.add_transfer(TransferInput {
            index: 0,
            source_relative: "a.txt".into(),
            destination_relative: "a.txt".into(),
            size: 1,
            last_modified_millis: 0,
            content_md5: None,
            entity_type: EntityTypeCode::File,
            chunk_count: 1,
            blob_tier: None,
            metadata: None,
        });

        let bytes = builder.build().unwrap();
        let first_record = layout::record_offset(0);
        assert_eq!(
            layout::read_u32(&bytes, first_record + layout::REC_OFF_INDEX),
            0
        );
    }
}
