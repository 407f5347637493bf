//! Virtual-path mapping
//!
//! The synchronized directory holds three virtual roots side by side:
//!
//! ```text
//! <root>/Personal/<path>               -> (own_dir_id, <path>)
//! <root>/Projects/<project>/<path>     -> (project.folder_id, <path>)
//! <root>/Shared/<folder>/<path>        -> (shared.id, <path>)
//! ```
//!
//! [`PathMapper`] translates a root-relative local path into the remote
//! directory namespace it belongs to. Paths that fall outside every
//! namespace are *unmapped*; callers ignore them silently.

use serde::{Deserialize, Serialize};

use super::tree::{RemoteDirId, RemoteTree};

/// Local directory names of the three virtual roots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualRootNames {
    pub personal: String,
    pub projects: String,
    pub shared: String,
}

impl Default for VirtualRootNames {
    fn default() -> Self {
        Self {
            personal: "Personal".to_string(),
            projects: "Projects".to_string(),
            shared: "Shared".to_string(),
        }
    }
}

/// A local path resolved into a remote directory namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPath {
    pub dir_id: RemoteDirId,
    /// Path relative to the remote directory, `/`-separated
    pub path: String,
}

impl MappedPath {
    /// The remote path with its last segment dropped
    ///
    /// Uploads are addressed by the directory a file lands in, not by the
    /// file's own path.
    pub fn parent_path(&self) -> String {
        match self.path.rfind('/') {
            Some(idx) => self.path[..idx].to_string(),
            None => String::new(),
        }
    }
}

/// Translates local relative paths into remote (directory id, path) pairs
#[derive(Debug, Clone, Default)]
pub struct PathMapper {
    names: VirtualRootNames,
}

impl PathMapper {
    pub fn new(names: VirtualRootNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &VirtualRootNames {
        &self.names
    }

    /// Maps a root-relative path against the current remote tree
    ///
    /// Backslashes are treated as separators and leading/trailing slashes
    /// are ignored. Returns `None` when the path has fewer than two
    /// segments, starts with an unknown virtual root, or names a project or
    /// shared folder absent from `tree`. A path naming only a project or
    /// shared folder maps to that folder with an empty remote path.
    pub fn map(&self, tree: &RemoteTree, relative: &str) -> Option<MappedPath> {
        let normalized = relative.replace('\\', "/");
        let segments: Vec<&str> = normalized
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        if segments.len() < 2 {
            return None;
        }

        let (dir_id, rest) = if segments[0] == self.names.personal {
            (tree.own_dir_id.clone(), &segments[1..])
        } else if segments[0] == self.names.projects {
            let project = tree.project(segments[1])?;
            (project.folder_id.clone(), &segments[2..])
        } else if segments[0] == self.names.shared {
            let shared = tree.shared_folder(segments[1])?;
            (shared.id.clone(), &segments[2..])
        } else {
            return None;
        };

        Some(MappedPath {
            dir_id,
            path: rest.join("/"),
        })
    }
}
