/*!
 * Metadata transformation
 *
 * Applies a filtering/rewriting pass to a [`FileMetadata`] snapshot between
 * extraction from the source and application to the destination, e.g. to
 * strip ownership when crossing a privilege boundary or cap permission
 * bits when copying onto a stricter filesystem.
 */

use crate::core::file_metadata::FileMetadata;
use serde::{Deserialize, Serialize};

/// Configuration for a metadata transformation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Drop owner UID/GID instead of carrying them to the destination
    pub strip_ownership: bool,
    /// Drop extended attributes instead of carrying them to the destination
    pub strip_xattrs: bool,
    /// Drop ACL entries instead of carrying them to the destination
    pub strip_acls: bool,
    /// If set, AND permission bits with this mask before applying them
    pub permission_mask: Option<u32>,
    /// If set, override owner UID unconditionally
    pub override_uid: Option<u32>,
    /// If set, override owner GID unconditionally
    pub override_gid: Option<u32>,
}

/// Apply a [`TransformConfig`] to a metadata snapshot in place.
pub fn transform_metadata(metadata: &mut FileMetadata, config: &TransformConfig) {
    if config.strip_ownership {
        metadata.owner_uid = None;
        metadata.owner_gid = None;
    }
    if let Some(uid) = config.override_uid {
        metadata.owner_uid = Some(uid);
    }
    if let Some(gid) = config.override_gid {
        metadata.owner_gid = Some(gid);
    }
    if config.strip_xattrs {
        metadata.xattrs = None;
    }
    if config.strip_acls {
        metadata.acls = None;
    }
    if let Some(mask) = config.permission_mask {
        if let Some(perm) = metadata.permissions {
            metadata.permissions = Some(perm & mask);
        }
    }
}
