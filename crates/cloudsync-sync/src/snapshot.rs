//! Local directory snapshotting
//!
//! Walks a directory subtree in pre-order and flattens it into a
//! [`Snapshot`]: a `dir` entry for every subdirectory (emitted before its
//! contents) and a `file` entry with size, mtime and content hash for every
//! regular file. Sibling order is whatever the filesystem returns.
//!
//! Symlinks and special files are skipped with a warning. A file that
//! disappears or cannot be hashed while the walk is running is skipped the
//! same way, and so is a subdirectory that cannot be listed; only an
//! unreadable snapshot root fails the whole snapshot.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use cloudsync_core::{
    domain::entry::{DirEntry, Entry, FileEntry, Snapshot},
    ports::local_filesystem::{ChildKind, ILocalFileSystem},
};
use tracing::{debug, instrument, warn};

use crate::filesystem::is_temp_path;

/// Produces local snapshots through the filesystem port
pub struct Snapshotter {
    local_filesystem: Arc<dyn ILocalFileSystem>,
}

impl Snapshotter {
    pub fn new(local_filesystem: Arc<dyn ILocalFileSystem>) -> Self {
        Self { local_filesystem }
    }

    /// Snapshots the subtree rooted at `root`
    ///
    /// Entry paths are relative to `root`; `root` itself is not listed.
    ///
    /// # Errors
    /// Returns an error if `root` itself cannot be listed.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub async fn snapshot(&self, root: &Path) -> Result<Snapshot> {
        let mut entries = Vec::new();
        self.walk(root, Vec::new(), &mut entries).await?;
        debug!(entries = entries.len(), "snapshot complete");
        Ok(entries)
    }

    fn walk<'a>(
        &'a self,
        dir: &'a Path,
        ancestors: Vec<String>,
        out: &'a mut Snapshot,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let children = self.local_filesystem.list_directory(dir).await?;

            for child in children {
                let child_path = dir.join(&child.name);
                if is_temp_path(&child_path) {
                    continue;
                }

                match child.kind {
                    ChildKind::Directory => {
                        out.push(Entry::Dir(DirEntry {
                            name: child.name.clone(),
                            path: ancestors.clone(),
                        }));
                        let mut nested = ancestors.clone();
                        nested.push(child.name);
                        if let Err(e) = self.walk(&child_path, nested, out).await {
                            warn!(
                                path = %child_path.display(),
                                error = %format!("{e:#}"),
                                "Skipping unreadable directory"
                            );
                        }
                    }
                    ChildKind::File => {
                        let hash = match self.local_filesystem.compute_hash(&child_path).await {
                            Ok(h) => h,
                            Err(e) => {
                                warn!(path = %child_path.display(), error = %e, "Failed to hash file, skipping");
                                continue;
                            }
                        };

                        out.push(Entry::File(FileEntry {
                            name: child.name,
                            path: ancestors.clone(),
                            size: child.size,
                            mtime: child.modified.map(|t| t.timestamp()).unwrap_or(0),
                            hash,
                        }));
                    }
                    ChildKind::Other => {
                        warn!(path = %child_path.display(), "Skipping symlink or special file");
                    }
                }
            }

            Ok(())
        })
    }
}
