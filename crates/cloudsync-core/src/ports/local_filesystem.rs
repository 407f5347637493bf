//! Local filesystem port (driven/secondary port)
//!
//! This module defines the interface for interacting with the local
//! filesystem: listing directories, writing and deleting files, computing
//! content hashes, and creating the directories the virtual roots resolve to.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Change notification is not part of this port; the sync crate's
//!   `FileWatcher` wraps the OS mechanism directly.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::entry::ContentHash;

// ============================================================================
// FileSystemState struct
// ============================================================================

/// Snapshot of a file's state on the local filesystem
///
/// Captures essential metadata about a file or directory at a point in time.
#[derive(Debug, Clone)]
pub struct FileSystemState {
    /// Whether the file/directory exists on disk
    pub exists: bool,
    /// Whether this is a regular file (false for directories and other types)
    pub is_file: bool,
    /// Size in bytes (0 for directories or non-existent files)
    pub size: u64,
    /// Last modification time (None if not available or file doesn't exist)
    pub modified: Option<DateTime<Utc>>,
}

impl FileSystemState {
    /// Returns a state representing a non-existent path
    pub fn not_found() -> Self {
        Self {
            exists: false,
            is_file: false,
            size: 0,
            modified: None,
        }
    }

    /// Returns true if the file exists and is a regular file
    pub fn is_regular_file(&self) -> bool {
        self.exists && self.is_file
    }

    /// Returns true if the file exists and is a directory
    pub fn is_directory(&self) -> bool {
        self.exists && !self.is_file
    }
}

// ============================================================================
// Directory listing
// ============================================================================

/// What a directory child is, judged without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    File,
    Directory,
    /// Symlinks, sockets, devices and the like
    Other,
}

/// One child of a listed directory
#[derive(Debug, Clone)]
pub struct DirectoryChild {
    pub name: String,
    pub kind: ChildKind,
    /// Size in bytes (meaningful for files only)
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

// ============================================================================
// ILocalFileSystem trait
// ============================================================================

/// Port trait for local filesystem operations
///
/// ## Implementation Notes
///
/// - All paths are absolute.
/// - `compute_hash` must produce the same digest the remote service reports
///   for identical content, so local and remote hashes compare directly.
/// - `create_directory` is idempotent.
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Lists the immediate children of a directory
    ///
    /// Symlinks are reported as [`ChildKind::Other`], never followed.
    /// Children with non UTF-8 names, or that vanish while being listed,
    /// are left out.
    ///
    /// # Errors
    /// Returns an error if the directory itself cannot be read
    async fn list_directory(&self, path: &Path) -> anyhow::Result<Vec<DirectoryChild>>;

    /// Writes data to a file, replacing any previous content
    ///
    /// Parent directories are created as needed.
    async fn write_file(&self, path: &Path, data: &[u8]) -> anyhow::Result<()>;

    /// Deletes a file (or a directory, recursively)
    ///
    /// # Errors
    /// Returns an error if the path doesn't exist or cannot be deleted
    async fn delete_file(&self, path: &Path) -> anyhow::Result<()>;

    /// Gets the current state of a file or directory
    ///
    /// Returns `FileSystemState::not_found()` if the path doesn't exist
    /// (does not return an error for missing paths).
    async fn get_state(&self, path: &Path) -> anyhow::Result<FileSystemState>;

    /// Computes the content hash of a file over its full body
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be read
    async fn compute_hash(&self, path: &Path) -> anyhow::Result<ContentHash>;

    /// Creates a directory and all parent directories as needed
    ///
    /// This is equivalent to `mkdir -p` behavior.
    async fn create_directory(&self, path: &Path) -> anyhow::Result<()>;
}
