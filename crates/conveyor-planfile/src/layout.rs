//! Byte-level layout of the plan file header and transfer records.
//!
//! Every offset below is a multiple of 4 so that the fields touched after
//! creation (`job_status`, `completed_count`, `failed_count`,
//! `skipped_count`, and each transfer record's `status`) can be reinterpreted
//! as `AtomicU8`/`AtomicU32` in place — `mmap` hands back page-aligned
//! memory, and a 4-aligned offset from a page-aligned base is itself
//! 4-aligned. Everything else is a plain little-endian integer read once at
//! open time.
//!
//! This module intentionally does not depend on `conveyor-manifest`: the
//! plan file only ever stores the numeric discriminant of a status or
//! entity kind, with the mapping documented here. Keeping the dependency
//! direction this way lets the plan file format be read and repaired by
//! tooling that doesn't want the rest of the data model.

use std::sync::atomic::{AtomicU32, AtomicU8};

/// Size in bytes of the fixed header.
pub const HEADER_LEN: usize = 96;

/// Size in bytes of a single fixed-size transfer record.
pub const TRANSFER_RECORD_LEN: usize = 80;

pub const OFF_MAGIC: usize = 0;
pub const OFF_VERSION: usize = 4;
pub const OFF_JOB_ID_HI: usize = 8;
pub const OFF_JOB_ID_LO: usize = 16;
pub const OFF_FROM_TO: usize = 24;
pub const OFF_IS_FINAL_PART: usize = 25;
pub const OFF_PART_NUM: usize = 28;
pub const OFF_TOTAL_TRANSFERS: usize = 32;
pub const OFF_JOB_STATUS: usize = 36;
pub const OFF_CREATED_UTC_MILLIS: usize = 40;
pub const OFF_COMPLETED_COUNT: usize = 48;
pub const OFF_FAILED_COUNT: usize = 52;
pub const OFF_SKIPPED_COUNT: usize = 56;
pub const OFF_SOURCE_ROOT_OFFSET: usize = 60;
pub const OFF_SOURCE_ROOT_LEN: usize = 64;
pub const OFF_DESTINATION_ROOT_OFFSET: usize = 68;
pub const OFF_DESTINATION_ROOT_LEN: usize = 72;
pub const OFF_HEADER_CHECKSUM: usize = 76;
// bytes 80..96 reserved for future header fields.

pub const REC_OFF_INDEX: usize = 0;
pub const REC_OFF_STATUS: usize = 4;
pub const REC_OFF_CHUNK_COUNT: usize = 8;
pub const REC_OFF_ENTITY_TYPE: usize = 12;
pub const REC_OFF_HAS_MD5: usize = 13;
pub const REC_OFF_SIZE: usize = 16;
pub const REC_OFF_LAST_MODIFIED_MILLIS: usize = 24;
pub const REC_OFF_CONTENT_MD5: usize = 32;
pub const REC_OFF_SOURCE_REL_OFFSET: usize = 48;
pub const REC_OFF_SOURCE_REL_LEN: usize = 52;
pub const REC_OFF_DEST_REL_OFFSET: usize = 56;
pub const REC_OFF_DEST_REL_LEN: usize = 60;
pub const REC_OFF_METADATA_OFFSET: usize = 64;
pub const REC_OFF_METADATA_LEN: usize = 68;
pub const REC_OFF_BLOB_TIER_OFFSET: usize = 72;
pub const REC_OFF_BLOB_TIER_LEN: usize = 76;

/// Numeric discriminant for `conveyor_manifest::JobStatus`, persisted in the
/// header's `job_status` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobStatusCode {
    InProgress = 0,
    Cancelling = 1,
    Cancelled = 2,
    Paused = 3,
    Completed = 4,
    CompletedWithErrors = 5,
    CompletedWithSkipped = 6,
    CompletedWithErrorsAndSkipped = 7,
    Failed = 8,
}

impl TryFrom<u8> for JobStatusCode {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use JobStatusCode::*;
        Ok(match value {
            0 => InProgress,
            1 => Cancelling,
            2 => Cancelled,
            3 => Paused,
            4 => Completed,
            5 => CompletedWithErrors,
            6 => CompletedWithSkipped,
            7 => CompletedWithErrorsAndSkipped,
            8 => Failed,
            other => {
                return Err(crate::error::Error::invalid_format(format!(
                    "unknown job status code {}",
                    other
                )))
            }
        })
    }
}

/// Numeric discriminant for `conveyor_manifest::TransferStatus`, persisted
/// in each transfer record's `status` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferStatusCode {
    Pending = 0,
    Started = 1,
    Completed = 2,
    Failed = 3,
    Skipped = 4,
    Cancelled = 5,
}

impl TryFrom<u8> for TransferStatusCode {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use TransferStatusCode::*;
        Ok(match value {
            0 => Pending,
            1 => Started,
            2 => Completed,
            3 => Failed,
            4 => Skipped,
            5 => Cancelled,
            other => {
                return Err(crate::error::Error::invalid_format(format!(
                    "unknown transfer status code {}",
                    other
                )))
            }
        })
    }
}

/// Numeric discriminant for `conveyor_manifest::EntityType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntityTypeCode {
    File = 0,
    Folder = 1,
    Symlink = 2,
}

impl TryFrom<u8> for EntityTypeCode {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use EntityTypeCode::*;
        Ok(match value {
            0 => File,
            1 => Folder,
            2 => Symlink,
            other => {
                return Err(crate::error::Error::invalid_format(format!(
                    "unknown entity type code {}",
                    other
                )))
            }
        })
    }
}

/// Reinterpret 1 byte at `offset` as an `AtomicU8`. `offset` has no
/// alignment requirement for a single byte.
pub fn atomic_u8_at(buf: &[u8], offset: usize) -> &AtomicU8 {
    let ptr = buf[offset..offset + 1].as_ptr() as *const AtomicU8;
    unsafe { &*ptr }
}

/// Reinterpret 4 bytes at `offset` as an `AtomicU32`. Caller must ensure
/// `offset` is 4-aligned relative to a page-aligned base (every layout
/// constant above satisfies this).
pub fn atomic_u32_at(buf: &[u8], offset: usize) -> &AtomicU32 {
    let ptr = buf[offset..offset + 4].as_ptr() as *const AtomicU32;
    unsafe { &*ptr }
}

pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())
}

pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

pub fn read_i64(buf: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

pub fn write_i64(buf: &mut [u8], offset: usize, value: i64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Transfer record byte offset within the record array, given its index.
pub fn record_offset(index: u32) -> usize {
    HEADER_LEN + index as usize * TRANSFER_RECORD_LEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn offsets_are_four_aligned() {
        for off in [
            OFF_VERSION,
            OFF_JOB_ID_HI,
            OFF_JOB_ID_LO,
            OFF_FROM_TO,
            OFF_PART_NUM,
            OFF_TOTAL_TRANSFERS,
            OFF_JOB_STATUS,
            OFF_CREATED_UTC_MILLIS,
            OFF_COMPLETED_COUNT,
            OFF_FAILED_COUNT,
            OFF_SKIPPED_COUNT,
            OFF_HEADER_CHECKSUM,
        ] {
            assert_eq!(off % 4, 0, "offset {} is not 4-aligned", off);
        }
        assert_eq!(HEADER_LEN % 4, 0);
        assert_eq!(TRANSFER_RECORD_LEN % 4, 0);
    }

    #[test]
    fn record_offset_advances_by_record_len() {
        assert_eq!(record_offset(0), HEADER_LEN);
        assert_eq!(record_offset(1), HEADER_LEN + TRANSFER_RECORD_LEN);
        assert_eq!(record_offset(2), HEADER_LEN + 2 * TRANSFER_RECORD_LEN);
    }

    #[test]
    fn atomic_accessors_round_trip() {
        let mut buf = vec![0u8; 16];
        atomic_u32_at(&buf, 0).store(42, Ordering::Release);
        assert_eq!(atomic_u32_at(&buf, 0).load(Ordering::Acquire), 42);

        atomic_u8_at(&buf, 4).store(7, Ordering::Release);
        assert_eq!(atomic_u8_at(&buf, 4).load(Ordering::Acquire), 7);
        let _ = &mut buf;
    }

    #[test]
    fn job_status_code_round_trips() {
        assert_eq!(
            JobStatusCode::try_from(4u8).unwrap(),
            JobStatusCode::Completed
        );
        assert!(JobStatusCode::try_from(200u8).is_err());
    }
}
