//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: Uses write-to-temp + rename to avoid partial writes
//!   on crash or power loss.
//! - **SHA-1**: Hashes are lowercase hex SHA-1 over the full body, the digest
//!   the remote service reports, so local and remote hashes compare without
//!   downloading content. The body is streamed in fixed-size chunks.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use cloudsync_core::{
    domain::entry::ContentHash,
    ports::local_filesystem::{ChildKind, DirectoryChild, FileSystemState, ILocalFileSystem},
};
use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

/// Read buffer size used while hashing
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Suffix of the sibling file an atomic write goes through
///
/// Watchers and snapshots skip names ending with it.
pub const TEMP_SUFFIX: &str = ".cloudsync-tmp";

/// Whether `path` is an in-progress atomic write
pub fn is_temp_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
}

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the path arguments. The sync root lives at a higher layer.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Sibling temp path used for atomic replacement of `target`
fn temp_path_for(target: &Path) -> PathBuf {
    let mut p = target.as_os_str().to_owned();
    p.push(TEMP_SUFFIX);
    PathBuf::from(p)
}

fn modified_of(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().and_then(|st| {
        st.duration_since(std::time::UNIX_EPOCH)
            .ok()
            .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
    })
}

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn list_directory(&self, path: &Path) -> anyhow::Result<Vec<DirectoryChild>> {
        let mut listing = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("Failed to read directory: {}", path.display()))?;

        let mut children = Vec::new();
        while let Some(entry) = listing
            .next_entry()
            .await
            .with_context(|| format!("Failed to list directory: {}", path.display()))?
        {
            let child_path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = ?child_path, "Skipping entry with non UTF-8 name");
                continue;
            };

            // symlink_metadata so links are never followed
            let metadata = match tokio::fs::symlink_metadata(&child_path).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %child_path.display(), error = %e, "Entry vanished while listing");
                    continue;
                }
            };

            let kind = if metadata.is_dir() {
                ChildKind::Directory
            } else if metadata.is_file() {
                ChildKind::File
            } else {
                ChildKind::Other
            };
            children.push(DirectoryChild {
                name,
                kind,
                size: metadata.len(),
                modified: modified_of(&metadata),
            });
        }

        debug!(children = children.len(), "directory listed");
        Ok(children)
    }

    #[instrument(skip(self, data), fields(path = %path.display(), bytes = data.len()))]
    async fn write_file(&self, path: &Path, data: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Same directory, so the rename stays on one filesystem
        let tmp_path = temp_path_for(path);
        debug!(?tmp_path, "writing to temporary file");
        if let Err(e) = tokio::fs::write(&tmp_path, data).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tokio::fs::rename(&tmp_path, path).await?;
        debug!("write complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn delete_file(&self, path: &Path) -> anyhow::Result<()> {
        let metadata = tokio::fs::symlink_metadata(path).await?;

        if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(path).await?;
        } else {
            tokio::fs::remove_file(path).await?;
        }

        debug!("delete complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn get_state(&self, path: &Path) -> anyhow::Result<FileSystemState> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("path not found");
                return Ok(FileSystemState::not_found());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(FileSystemState {
            exists: true,
            is_file: metadata.is_file(),
            size: metadata.len(),
            modified: modified_of(&metadata),
        })
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn compute_hash(&self, path: &Path) -> anyhow::Result<ContentHash> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        let hash = ContentHash::new(hex::encode(hasher.finalize()));
        debug!(hash = %hash, "hash computed");
        Ok(hash)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_directory(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
