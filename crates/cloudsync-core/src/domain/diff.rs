//! Snapshot diffing
//!
//! Partitions a local and a remote snapshot of the same root into three
//! disjoint sets of files:
//!
//! - **local only** - present locally, absent remotely
//! - **remote only** - present remotely, absent locally
//! - **common** - present on both sides, carrying both sides' date and hash
//!
//! Each side is indexed by identity once, so the partition costs O(n + m).
//! Directories only drive traversal and never appear in the output; a local
//! file whose identity matches a remote *directory* counts as local only.

use std::collections::HashMap;

use tracing::warn;

use super::entry::{ContentHash, Entry, FileEntry};

/// A file present in both snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonEntry {
    pub identity: String,
    pub name: String,
    /// Ancestor segments, outermost first
    pub path: Vec<String>,
    pub date_local: i64,
    pub hash_local: ContentHash,
    pub date_cloud: i64,
    pub hash_cloud: ContentHash,
}

impl CommonEntry {
    /// Whether both sides hold the same content
    pub fn in_sync(&self) -> bool {
        self.hash_local == self.hash_cloud
    }
}

/// The three-way partition of a local/remote snapshot pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub local_only: Vec<FileEntry>,
    pub remote_only: Vec<FileEntry>,
    pub common: Vec<CommonEntry>,
}

impl DiffResult {
    /// Total number of file identities across all three sets
    pub fn len(&self) -> usize {
        self.local_only.len() + self.remote_only.len() + self.common.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Indexes the file entries of a snapshot by identity
///
/// Snapshots must not repeat an identity; if one does, the later entry
/// replaces the earlier one.
fn index_files<'a>(snapshot: &'a [Entry], side: &str) -> HashMap<String, &'a FileEntry> {
    let mut index = HashMap::with_capacity(snapshot.len());
    for file in snapshot.iter().filter_map(Entry::as_file) {
        let identity = file.identity();
        if index.insert(identity.clone(), file).is_some() {
            warn!(side, identity = %identity, "Duplicate identity in snapshot, keeping last");
        }
    }
    index
}

/// Partitions `local` and `remote` into local-only, remote-only, and common files
///
/// The result does not depend on the order of entries within either
/// snapshot; each output set follows the order of its source snapshot.
pub fn diff(local: &[Entry], remote: &[Entry]) -> DiffResult {
    let local_index = index_files(local, "local");
    let remote_index = index_files(remote, "remote");

    let mut result = DiffResult::default();

    for file in local.iter().filter_map(Entry::as_file) {
        let identity = file.identity();
        // Skip earlier duplicates so each identity is emitted once
        if !std::ptr::eq(local_index[&identity], file) {
            continue;
        }
        match remote_index.get(&identity) {
            None => result.local_only.push(file.clone()),
            Some(cloud) => result.common.push(CommonEntry {
                identity,
                name: file.name.clone(),
                path: file.path.clone(),
                date_local: file.mtime,
                hash_local: file.hash.clone(),
                date_cloud: cloud.mtime,
                hash_cloud: cloud.hash.clone(),
            }),
        }
    }

    for file in remote.iter().filter_map(Entry::as_file) {
        let identity = file.identity();
        if !std::ptr::eq(remote_index[&identity], file) {
            continue;
        }
        if !local_index.contains_key(&identity) {
            result.remote_only.push(file.clone());
        }
    }

    result
}
