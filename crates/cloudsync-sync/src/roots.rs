//! SyncRoot registry
//!
//! Each cycle derives the roots to reconcile from the freshly fetched
//! [`RemoteTree`]: the personal root first, then one root per project, then
//! one per shared folder, in descriptor order.

use std::path::{Path, PathBuf};

use cloudsync_core::domain::{
    entry::Snapshot,
    errors::DomainError,
    path_mapper::VirtualRootNames,
    tree::{RemoteDirId, RemoteTree},
};
use tracing::warn;

/// Which virtual root a [`SyncRoot`] lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Personal,
    Project,
    Shared,
}

/// One local directory paired with one remote directory namespace
#[derive(Debug, Clone)]
pub struct SyncRoot {
    /// Display label, only used in logs
    pub title: String,
    pub kind: RootKind,
    /// Project or shared folder name; empty for the personal root
    pub subdir: String,
    pub remote_dir_id: RemoteDirId,
    pub remote_snapshot: Snapshot,
    local_root: PathBuf,
}

impl SyncRoot {
    /// Absolute local directory this root reconciles
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Resolves a snapshot location (ancestor segments + name) to an
    /// absolute local path inside this root
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidPath`] when a segment would escape the
    /// root (`..`, `.`, empty, or containing a separator).
    pub fn resolve(&self, path: &[String], name: &str) -> Result<PathBuf, DomainError> {
        let mut resolved = self.local_root.clone();
        for segment in path.iter().map(String::as_str).chain(std::iter::once(name)) {
            if !is_safe_segment(segment) {
                return Err(DomainError::InvalidPath(format!(
                    "{}/{}",
                    path.join("/"),
                    name
                )));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

/// A single path component that stays inside its parent
pub(crate) fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.contains('\\')
}

/// Builds the ordered list of roots for one cycle
///
/// Project and shared folders whose name is not a safe single path segment
/// are skipped with a warning.
pub fn roots_from_tree(
    tree: &RemoteTree,
    sync_root: &Path,
    names: &VirtualRootNames,
) -> Vec<SyncRoot> {
    let mut roots = Vec::with_capacity(1 + tree.projects.len() + tree.shared.len());

    roots.push(SyncRoot {
        title: "Personal folder".to_string(),
        kind: RootKind::Personal,
        subdir: String::new(),
        remote_dir_id: tree.own_dir_id.clone(),
        remote_snapshot: tree.own_dir.clone(),
        local_root: sync_root.join(&names.personal),
    });

    for project in &tree.projects {
        if !is_safe_segment(&project.name) {
            warn!(name = %project.name, "Skipping project with unusable folder name");
            continue;
        }
        roots.push(SyncRoot {
            title: format!("Project folder: {}", project.name),
            kind: RootKind::Project,
            subdir: project.name.clone(),
            remote_dir_id: project.folder_id.clone(),
            remote_snapshot: project.content.clone(),
            local_root: sync_root.join(&names.projects).join(&project.name),
        });
    }

    for shared in &tree.shared {
        if !is_safe_segment(&shared.name) {
            warn!(name = %shared.name, "Skipping shared folder with unusable name");
            continue;
        }
        roots.push(SyncRoot {
            title: format!("Shared folder: {}", shared.name),
            kind: RootKind::Shared,
            subdir: shared.name.clone(),
            remote_dir_id: shared.id.clone(),
            remote_snapshot: shared.content.clone(),
            local_root: sync_root.join(&names.shared).join(&shared.name),
        });
    }

    roots
}
