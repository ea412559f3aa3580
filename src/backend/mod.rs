//! Resource-Client abstraction: the `Backend` trait and its concrete
//! implementations (local filesystem, Azure, S3), unified behind a single
//! async interface so the scheduler never special-cases a storage provider.
//!
//! # Examples
//!
//! ```no_run
//! use conveyor::backend::{Backend, LocalBackend};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = LocalBackend::new();
//!     let metadata = backend.stat(Path::new("/tmp/file.txt")).await?;
//!     println!("File size: {} bytes", metadata.size);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod types;

mod local;

#[cfg(feature = "s3-native")]
mod s3;

#[cfg(feature = "azure-native")]
mod azure;

mod config;

mod registry;

// Re-export main types
pub use error::{BackendError, BackendResult};
pub use types::{DirEntry, ListOptions, Metadata, StagedWrite, WriteOptions};

pub use local::LocalBackend;

#[cfg(feature = "s3-native")]
pub use s3::S3Backend;

#[cfg(feature = "azure-native")]
pub use azure::AzureBackend;

pub use config::{parse_uri, BackendConfig};

#[cfg(feature = "azure-native")]
pub use config::AzureConfig;

pub use registry::{BackendFactory, BackendRegistry};

use async_trait::async_trait;

use std::path::Path;

use types::{ListStream, ReadStream};

use tokio::io::AsyncRead;

/// Unified backend trait for all storage operations
///
/// This trait provides a common interface for interacting with different storage
/// backends including local filesystems, SSH/SFTP, and cloud storage (S3, etc.).
///
/// All operations are async and return `BackendResult<T>` for consistent error handling.
///
/// # Thread Safety
///
/// Implementors must be `Send + Sync` to support concurrent access in multi-threaded
/// environments.
///
/// # Example Implementation
///
/// ```ignore
/// use conveyor::backend::{Backend, BackendResult, Metadata, DirEntry};
/// use async_trait::async_trait;
/// use std::path::Path;
///
/// struct MyBackend;
///
/// #[async_trait]
/// impl Backend for MyBackend {
///     async fn stat(&self, path: &Path) -> BackendResult<Metadata> {
///         // Implementation
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get metadata for a file or directory
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file or directory
    ///
    /// # Returns
    ///
    /// Metadata including size, timestamps, permissions, etc.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the path doesn't exist.
    /// Returns `BackendError::PermissionDenied` if access is denied.
    async fn stat(&self, path: &Path) -> BackendResult<Metadata>;

    /// List contents of a directory as a stream
    ///
    /// This method returns a stream of directory entries, enabling efficient
    /// processing of large directories without loading all entries into memory.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path to list
    /// * `options` - Listing options (recursive, max_depth, etc.)
    ///
    /// # Returns
    ///
    /// Stream of directory entries with metadata
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the directory doesn't exist.
    /// Returns `BackendError::InvalidPath` if path is not a directory.
    ///
    /// # Performance Notes
    ///
    /// - Memory usage is constant regardless of directory size
    /// - For S3: entries are streamed as pages are fetched
    /// - Can process millions of entries without OOM
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    ///
    /// let mut stream = backend.list(path, options).await?;
    /// while let Some(entry) = stream.next().await {
    ///     let entry = entry?;
    ///     println!("{}", entry.path.display());
    /// }
    /// ```
    async fn list(&self, path: &Path, options: ListOptions) -> BackendResult<ListStream>;

    /// Open a file for reading as a stream
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file to read
    ///
    /// # Returns
    ///
    /// Async stream of bytes
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the file doesn't exist.
    /// Returns `BackendError::PermissionDenied` if read access is denied.
    async fn read(&self, path: &Path) -> BackendResult<ReadStream>;

    /// Write data to a file from a stream
    ///
    /// This method supports efficient streaming uploads for large files without
    /// loading the entire file into memory. Backends may use multipart uploads
    /// or other chunked transfer mechanisms based on the size hint.
    ///
    /// # Arguments
    ///
    /// * `path` - Path where to write the file
    /// * `reader` - Async reader providing the data to write
    /// * `size_hint` - Optional hint about the total size (enables optimizations)
    /// * `options` - Write options (overwrite, permissions, etc.)
    ///
    /// # Returns
    ///
    /// Number of bytes written
    ///
    /// # Errors
    ///
    /// Returns `BackendError::PermissionDenied` if write access is denied.
    /// Returns `BackendError::AlreadyExists` if file exists and overwrite is false.
    ///
    /// # Performance Notes
    ///
    /// - Providing `size_hint` enables backends to optimize transfer strategy
    /// - For S3: files >5MB use multipart upload, smaller files use PutObject
    /// - Memory usage is proportional to chunk size, not file size
    async fn write(
        &self,
        path: &Path,
        reader: Box<dyn AsyncRead + Unpin + Send>,
        size_hint: Option<u64>,
        options: WriteOptions,
    ) -> BackendResult<u64>;

    /// Begins a multi-stage `CreateDestination` (§4.5): allocates a local
    /// staging file that `StagedWrite::put_chunk` writes into independently
    /// for each body chunk, so one chunk's write can be retried without
    /// touching any other chunk. The default implementation is generic over
    /// every backend; override only if a backend can stage chunks more
    /// directly (e.g. a true range-addressable local write).
    async fn initiate_write(
        &self,
        path: &Path,
        _size_hint: Option<u64>,
    ) -> BackendResult<types::StagedWrite> {
        let staging_path = std::env::temp_dir().join(format!(
            "conveyor-chunk-{:016x}.part",
            rand::random::<u64>()
        ));
        types::StagedWrite::create(staging_path)
            .await
            .map_err(|e| BackendError::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))))
    }

    /// Commits a staged write (the Tail chunk): streams the assembled
    /// staging file through this backend's own `write`, which may itself
    /// multipart-upload the content on commit. Borrows `handle` so the Tail
    /// chunk can retry the commit independently of the body chunks that
    /// already landed in its staging file; the caller drops `handle` (which
    /// removes the staging file) once the commit succeeds.
    async fn finalize_write(
        &self,
        path: &Path,
        handle: &types::StagedWrite,
        options: WriteOptions,
    ) -> BackendResult<u64> {
        let size = handle.len();
        let file = tokio::fs::File::open(handle.staging_path())
            .await
            .map_err(BackendError::Io)?;
        self.write(path, Box::new(file), Some(size), options).await
    }

    /// Delete a file or directory
    ///
    /// # Arguments
    ///
    /// * `path` - Path to delete
    /// * `recursive` - If true, delete directories and their contents recursively
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the path doesn't exist.
    /// Returns `BackendError::DirectoryNotEmpty` if trying to delete non-empty dir without recursive.
    async fn delete(&self, path: &Path, recursive: bool) -> BackendResult<()>;

    /// Create a directory
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path to create
    /// * `recursive` - If true, create parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns `BackendError::AlreadyExists` if directory already exists.
    /// Returns `BackendError::NotFound` if parent doesn't exist and recursive is false.
    async fn mkdir(&self, path: &Path, recursive: bool) -> BackendResult<()>;

    /// Rename or move a file/directory
    ///
    /// # Arguments
    ///
    /// * `src` - Source path
    /// * `dest` - Destination path
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if source doesn't exist.
    /// Returns `BackendError::AlreadyExists` if destination already exists.
    /// Returns `BackendError::Unsupported` if cross-backend rename is attempted.
    async fn rename(&self, src: &Path, dest: &Path) -> BackendResult<()>;

    /// Set file permissions (Unix mode bits)
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `mode` - Unix permission bits (e.g., 0o755)
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the path doesn't exist.
    /// Returns `BackendError::Unsupported` if the backend doesn't support permissions.
    /// Returns `BackendError::PermissionDenied` if access is denied.
    async fn set_permissions(&self, path: &Path, mode: u32) -> BackendResult<()> {
        let _ = (path, mode);
        Err(BackendError::Unsupported {
            backend: self.backend_name().to_string(),
            operation: "set_permissions".to_string(),
        })
    }

    /// Set file timestamps (access and modification times)
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `atime` - Access time (None to keep current)
    /// * `mtime` - Modification time (None to keep current)
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the path doesn't exist.
    /// Returns `BackendError::Unsupported` if the backend doesn't support timestamps.
    async fn set_timestamps(
        &self,
        path: &Path,
        atime: Option<std::time::SystemTime>,
        mtime: Option<std::time::SystemTime>,
    ) -> BackendResult<()> {
        let _ = (path, atime, mtime);
        Err(BackendError::Unsupported {
            backend: self.backend_name().to_string(),
            operation: "set_timestamps".to_string(),
        })
    }

    /// Get extended attributes (xattrs) for a file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    ///
    /// # Returns
    ///
    /// HashMap of attribute names to values
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the path doesn't exist.
    /// Returns `BackendError::Unsupported` if the backend doesn't support xattrs.
    async fn get_xattrs(
        &self,
        path: &Path,
    ) -> BackendResult<std::collections::HashMap<String, Vec<u8>>> {
        let _ = path;
        Err(BackendError::Unsupported {
            backend: self.backend_name().to_string(),
            operation: "get_xattrs".to_string(),
        })
    }

    /// Set extended attributes (xattrs) for a file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `attrs` - HashMap of attribute names to values
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the path doesn't exist.
    /// Returns `BackendError::Unsupported` if the backend doesn't support xattrs.
    async fn set_xattrs(
        &self,
        path: &Path,
        attrs: &std::collections::HashMap<String, Vec<u8>>,
    ) -> BackendResult<()> {
        let _ = (path, attrs);
        Err(BackendError::Unsupported {
            backend: self.backend_name().to_string(),
            operation: "set_xattrs".to_string(),
        })
    }

    /// Set owner and group (Unix UID/GID)
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `uid` - User ID (None to keep current)
    /// * `gid` - Group ID (None to keep current)
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the path doesn't exist.
    /// Returns `BackendError::Unsupported` if the backend doesn't support ownership.
    /// Returns `BackendError::PermissionDenied` if access is denied (requires privileges).
    async fn set_ownership(
        &self,
        path: &Path,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> BackendResult<()> {
        let _ = (path, uid, gid);
        Err(BackendError::Unsupported {
            backend: self.backend_name().to_string(),
            operation: "set_ownership".to_string(),
        })
    }

    /// Check if a path exists
    ///
    /// # Arguments
    ///
    /// * `path` - Path to check
    ///
    /// # Returns
    ///
    /// `true` if the path exists, `false` otherwise
    async fn exists(&self, path: &Path) -> BackendResult<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(BackendError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the backend name/type
    ///
    /// # Returns
    ///
    /// String identifier for this backend (e.g., "local", "ssh", "s3")
    fn backend_name(&self) -> &str;

    /// Check if this backend supports the given operation
    ///
    /// # Arguments
    ///
    /// * `operation` - Operation name (e.g., "rename", "symlink", "set_permissions")
    ///
    /// # Returns
    ///
    /// `true` if the operation is supported
    fn supports(&self, operation: &str) -> bool {
        // Default implementations support all core operations
        // Metadata operations have default implementations that return Unsupported
        matches!(
            operation,
            "stat"
                | "list"
                | "read"
                | "write"
                | "delete"
                | "mkdir"
                | "rename"
                | "exists"
                | "set_permissions"
                | "set_timestamps"
                | "get_xattrs"
                | "set_xattrs"
                | "set_ownership"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_compiles() {
        // Basic test to ensure module compiles
        assert!(true);
    }

    /// Smoke test: Verify LocalBackend is available with default features
    #[test]
    fn test_local_backend_available() {
        let backend = LocalBackend::new();
        assert_eq!(backend.backend_name(), "local");
    }

    /// Smoke test: Verify S3Backend type is available with default features
    #[test]
    #[cfg(feature = "s3-native")]
    fn test_s3_backend_type_available() {
        // Just verify the type exists and can be referenced
        fn _assert_s3_backend_exists(_: &S3Backend) {}
    }

    /// Smoke test: Verify backend config can parse non-local URIs
    #[test]
    #[cfg(feature = "s3-native")]
    fn test_parse_s3_uri_config() {
        let uri = "s3://my-bucket/path/to/file";
        let result = parse_uri(uri);
        assert!(result.is_ok());
        let (config, path) = result.unwrap();
        match config {
            BackendConfig::S3 {
                config: s3_config, ..
            } => {
                assert_eq!(s3_config.bucket, "my-bucket");
            }
            _ => panic!("Expected S3 config"),
        }
        assert!(path.to_string_lossy().contains("path/to/file"));
    }

}
