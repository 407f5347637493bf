//! Snapshot entries
//!
//! A snapshot is a flat, point-in-time listing of a directory subtree. Local
//! snapshots are produced by walking the filesystem; remote snapshots arrive
//! inside the [`RemoteTree`](super::tree::RemoteTree) descriptor. Both share
//! the same wire shape:
//!
//! ```json
//! { "type": "file", "name": "q1.csv", "path": ["reports"], "size": 12, "date": 1700000000, "hash": "..." }
//! { "type": "dir",  "name": "reports", "path": [] }
//! ```

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// A flat listing of a directory subtree
pub type Snapshot = Vec<Entry>;

// ============================================================================
// ContentHash
// ============================================================================

/// Hex digest of a file's full content
///
/// Stored lowercase so that digests reported by the remote service compare
/// equal to locally computed ones regardless of the case they were sent in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new ContentHash, normalizing to lowercase
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into().to_ascii_lowercase())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContentHash {
    fn from(hash: String) -> Self {
        Self::new(hash)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// Entry
// ============================================================================

/// A directory inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    /// Ancestor segments, outermost first
    #[serde(default)]
    pub path: Vec<String>,
}

/// A regular file inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Ancestor segments, outermost first
    #[serde(default)]
    pub path: Vec<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Modification time in epoch seconds
    #[serde(rename = "date")]
    pub mtime: i64,
    pub hash: ContentHash,
}

/// One typed entry of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    Dir(DirEntry),
    File(FileEntry),
}

/// Builds the identity string `join(path, "/") + "/" + name`
///
/// Entries at the top of a snapshot have an empty path, so their identity
/// starts with a slash.
pub fn identity_of(path: &[String], name: &str) -> String {
    format!("{}/{}", path.join("/"), name)
}

impl FileEntry {
    /// Identity of this file within its snapshot
    pub fn identity(&self) -> String {
        identity_of(&self.path, &self.name)
    }

    /// Relative directory path (`a/b`) the file lives in
    pub fn dir_path(&self) -> String {
        self.path.join("/")
    }
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Dir(d) => &d.name,
            Entry::File(f) => &f.name,
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            Entry::Dir(d) => &d.path,
            Entry::File(f) => &f.path,
        }
    }

    /// Identity of this entry within its snapshot
    pub fn identity(&self) -> String {
        identity_of(self.path(), self.name())
    }

    /// Returns the file entry, or `None` for directories
    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(f) => Some(f),
            Entry::Dir(_) => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Dir(_))
    }
}
