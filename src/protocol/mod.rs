/*!
 * Protocol abstraction layer
 *
 * Supports multiple storage backends:
 * - Local filesystem
 * - S3 (feature-gated behind `s3-native`)
 */

pub mod local;
pub mod uri;

#[cfg(feature = "s3-native")]
pub mod s3;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use crate::error::Result;

/// File metadata across protocols
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub is_file: bool,
    pub is_dir: bool,
    pub modified: Option<std::time::SystemTime>,
    pub permissions: Option<u32>,
}

/// Storage backend trait - unified interface for all protocols
pub trait StorageBackend: Send + Sync {
    /// Open a file for reading
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;
    
    /// Open a file for writing
    fn open_write(&self, path: &Path, append: bool) -> Result<Box<dyn Write + Send>>;
    
    /// Get file metadata
    fn metadata(&self, path: &Path) -> Result<FileMetadata>;
    
    /// Check if path exists
    fn exists(&self, path: &Path) -> Result<bool>;
    
    /// Create directory
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    
    /// List directory contents
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    
    /// Remove file
    fn remove_file(&self, path: &Path) -> Result<()>;
    
    /// Flush/sync file to storage
    fn sync(&self, path: &Path) -> Result<()>;
    
    /// Get protocol name for logging
    fn protocol_name(&self) -> &'static str;
}

/// Protocol enum - represents different storage backends
#[derive(Debug, Clone)]
pub enum Protocol {
    Local,
    Smb {
        server: String,
        share: String,
        username: Option<String>,
        password: Option<String>,
        domain: Option<String>,
    },
}

impl Protocol {
    /// Create a backend instance from protocol configuration
    pub fn create_backend(&self) -> Result<Box<dyn StorageBackend>> {
        match self {
            Protocol::Local => Ok(Box::new(local::LocalBackend::new())),
            Protocol::Smb { .. } => Err(crate::error::OrbitError::Config(
                "SMB is not a supported backend; use local, azure, or s3".to_string(),
            )),
        }
    }
    
    /// Parse a URI into protocol and path
    pub fn from_uri(uri: &str) -> Result<(Protocol, PathBuf)> {
        uri::parse_uri(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_protocol() {
        let (protocol, path) = Protocol::from_uri("/tmp/test.txt").unwrap();
        assert!(matches!(protocol, Protocol::Local));
        assert_eq!(path, PathBuf::from("/tmp/test.txt"));
    }

    #[test]
    fn test_smb_protocol_parsing() {
        let (protocol, path) = Protocol::from_uri("smb://server/share/path/file.txt").unwrap();
        match protocol {
            Protocol::Smb { server, share, .. } => {
                assert_eq!(server, "server");
                assert_eq!(share, "share");
            }
            _ => panic!("Expected SMB protocol"),
        }
        assert_eq!(path, PathBuf::from("/path/file.txt"));
    }
    
    #[test]
    fn test_local_backend_creation() {
        let protocol = Protocol::Local;
        let backend = protocol.create_backend();
        assert!(backend.is_ok());
    }
}