//! Per-root reconciliation state machine
//!
//! A root moves through three phases, each exhausted before the next begins:
//!
//! ```text
//! DownloadRemoteOnly ──→ ResolveLocalOnly ──→ ResolveCommon ──→ Done
//! ```
//!
//! - **DownloadRemoteOnly**: every remote-only file is downloaded, on every pass.
//! - **ResolveLocalOnly**: an upload pass uploads local-only files; a deletion
//!   pass removes local-only files older than the grace window instead.
//! - **ResolveCommon**: divergent files are resolved by strictly newer
//!   timestamp on an upload pass and left alone on a deletion pass.
//!
//! Actions run one at a time. A failed action is logged, recorded in the
//! [`CycleReport`] and skipped; it never stops the root.
//!
//! The decision rules are plain functions ([`decide_local_only`],
//! [`decide_common`]) so they can be tested without any I/O.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use cloudsync_core::{
    domain::{
        diff::{CommonEntry, DiffResult},
        entry::{ContentHash, FileEntry},
    },
    ports::{
        local_filesystem::ILocalFileSystem,
        remote_storage::{CredentialToken, IRemoteStorage},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::engine::CycleReport;
use crate::roots::SyncRoot;

// ============================================================================
// Policy
// ============================================================================

/// Cycle-independent knobs of the reconciliation rules
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    /// Minimum local age before a deletion pass may remove a local-only file
    pub grace_window: Duration,
    /// Name prefix marking editor lock files
    pub lock_file_prefix: String,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_secs(60),
            lock_file_prefix: "~$".to_string(),
        }
    }
}

impl ReconcilePolicy {
    /// Whether `name` is an editor lock file that must never be transferred
    pub fn is_lock_file(&self, name: &str) -> bool {
        !self.lock_file_prefix.is_empty() && name.starts_with(&self.lock_file_prefix)
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// Reconciliation phase of one root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    DownloadRemoteOnly,
    ResolveLocalOnly,
    ResolveCommon,
    Done,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::DownloadRemoteOnly => Phase::ResolveLocalOnly,
            Phase::ResolveLocalOnly => Phase::ResolveCommon,
            Phase::ResolveCommon | Phase::Done => Phase::Done,
        }
    }
}

/// What to do with a file that only exists locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOnlyDecision {
    Upload,
    DeleteLocal,
    /// Editor lock file; handled by doing nothing
    SkipLockFile,
    /// Too young to delete on this deletion pass
    WithinGrace,
}

/// Decides the fate of a local-only file
///
/// `now` and `entry.mtime` are epoch seconds. A file is old enough to delete
/// once `now - mtime >= grace_window`.
pub fn decide_local_only(
    entry: &FileEntry,
    deletion_pass: bool,
    now: i64,
    policy: &ReconcilePolicy,
) -> LocalOnlyDecision {
    if policy.is_lock_file(&entry.name) {
        return LocalOnlyDecision::SkipLockFile;
    }
    if !deletion_pass {
        return LocalOnlyDecision::Upload;
    }

    let grace = i64::try_from(policy.grace_window.as_secs()).unwrap_or(i64::MAX);
    if now.saturating_sub(entry.mtime) >= grace {
        LocalOnlyDecision::DeleteLocal
    } else {
        LocalOnlyDecision::WithinGrace
    }
}

/// What to do with a file present on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonDecision {
    InSync,
    /// Local copy is strictly newer
    Upload,
    /// Remote copy is strictly newer
    Download,
    /// Divergent, but deletion passes never resolve content
    Deferred,
    /// Divergent with identical timestamps; left unresolved
    Ambiguous,
}

/// Decides how to resolve a file present on both sides
pub fn decide_common(entry: &CommonEntry, deletion_pass: bool) -> CommonDecision {
    if entry.in_sync() {
        return CommonDecision::InSync;
    }
    if deletion_pass {
        return CommonDecision::Deferred;
    }
    match entry.date_local.cmp(&entry.date_cloud) {
        std::cmp::Ordering::Greater => CommonDecision::Upload,
        std::cmp::Ordering::Less => CommonDecision::Download,
        std::cmp::Ordering::Equal => CommonDecision::Ambiguous,
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Executes the decisions for one root against the two collaborators
pub struct Reconciler<'a> {
    remote: &'a dyn IRemoteStorage,
    local_filesystem: &'a dyn ILocalFileSystem,
    token: &'a CredentialToken,
    policy: &'a ReconcilePolicy,
    cancel: &'a CancellationToken,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        remote: &'a dyn IRemoteStorage,
        local_filesystem: &'a dyn ILocalFileSystem,
        token: &'a CredentialToken,
        policy: &'a ReconcilePolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            remote,
            local_filesystem,
            token,
            policy,
            cancel,
        }
    }

    /// Runs every phase for `root`, accumulating outcomes into `report`
    ///
    /// Stops between actions if cancellation is requested; an action already
    /// started always completes.
    #[instrument(skip_all, fields(root = %root.title, deletion_pass))]
    pub async fn reconcile(
        &self,
        root: &SyncRoot,
        diff: DiffResult,
        deletion_pass: bool,
        now: i64,
        report: &mut CycleReport,
    ) {
        let DiffResult {
            local_only,
            remote_only,
            common,
        } = diff;

        let mut phase = Phase::DownloadRemoteOnly;
        while phase != Phase::Done {
            debug!(?phase, "Entering phase");
            let completed = match phase {
                Phase::DownloadRemoteOnly => self.download_remote_only(root, &remote_only, report).await,
                Phase::ResolveLocalOnly => {
                    self.resolve_local_only(root, &local_only, deletion_pass, now, report)
                        .await
                }
                Phase::ResolveCommon => self.resolve_common(root, &common, deletion_pass, report).await,
                Phase::Done => true,
            };
            if !completed {
                info!(?phase, "Reconciliation interrupted by shutdown");
                report.interrupted = true;
                return;
            }
            phase = phase.next();
        }
    }

    async fn download_remote_only(
        &self,
        root: &SyncRoot,
        remote_only: &[FileEntry],
        report: &mut CycleReport,
    ) -> bool {
        for file in remote_only {
            if self.cancel.is_cancelled() {
                return false;
            }
            match self.download(root, &file.path, &file.name, &file.hash).await {
                Ok(path) => {
                    info!(path = %path.display(), "Downloaded");
                    report.downloaded += 1;
                }
                Err(e) => report.record_failure("download", &file.identity(), &e),
            }
        }
        true
    }

    async fn resolve_local_only(
        &self,
        root: &SyncRoot,
        local_only: &[FileEntry],
        deletion_pass: bool,
        now: i64,
        report: &mut CycleReport,
    ) -> bool {
        for file in local_only {
            if self.cancel.is_cancelled() {
                return false;
            }
            match decide_local_only(file, deletion_pass, now, self.policy) {
                LocalOnlyDecision::SkipLockFile => {
                    debug!(identity = %file.identity(), "Skipping lock file");
                    report.lock_files_skipped += 1;
                }
                LocalOnlyDecision::WithinGrace => {
                    debug!(identity = %file.identity(), mtime = file.mtime, "Local-only file within grace window");
                    report.within_grace += 1;
                }
                LocalOnlyDecision::Upload => match self.upload(root, &file.path, &file.name).await {
                    Ok(path) => {
                        info!(path = %path.display(), dir_id = %root.remote_dir_id, "Uploaded");
                        report.uploaded += 1;
                    }
                    Err(e) => report.record_failure("upload", &file.identity(), &e),
                },
                LocalOnlyDecision::DeleteLocal => match self.delete_local(root, file).await {
                    Ok(path) => {
                        info!(path = %path.display(), "Deleted local file absent remotely");
                        report.deleted_local += 1;
                    }
                    Err(e) => report.record_failure("local delete", &file.identity(), &e),
                },
            }
        }
        true
    }

    async fn resolve_common(
        &self,
        root: &SyncRoot,
        common: &[CommonEntry],
        deletion_pass: bool,
        report: &mut CycleReport,
    ) -> bool {
        for entry in common {
            if self.cancel.is_cancelled() {
                return false;
            }
            match decide_common(entry, deletion_pass) {
                CommonDecision::InSync => {}
                CommonDecision::Deferred => report.deferred += 1,
                CommonDecision::Ambiguous => {
                    warn!(
                        identity = %entry.identity,
                        date = entry.date_local,
                        "Content differs but timestamps are equal, leaving both copies"
                    );
                    report.ambiguous += 1;
                }
                CommonDecision::Upload if self.policy.is_lock_file(&entry.name) => {
                    debug!(identity = %entry.identity, "Skipping lock file");
                    report.lock_files_skipped += 1;
                }
                CommonDecision::Upload => match self.upload(root, &entry.path, &entry.name).await {
                    Ok(path) => {
                        info!(path = %path.display(), dir_id = %root.remote_dir_id, "Uploaded newer local copy");
                        report.uploaded += 1;
                    }
                    Err(e) => report.record_failure("upload", &entry.identity, &e),
                },
                CommonDecision::Download => {
                    match self
                        .download(root, &entry.path, &entry.name, &entry.hash_cloud)
                        .await
                    {
                        Ok(path) => {
                            info!(path = %path.display(), "Downloaded newer remote copy");
                            report.downloaded += 1;
                        }
                        Err(e) => report.record_failure("download", &entry.identity, &e),
                    }
                }
            }
        }
        true
    }

    async fn download(
        &self,
        root: &SyncRoot,
        path: &[String],
        name: &str,
        hash: &ContentHash,
    ) -> Result<PathBuf> {
        let target = root.resolve(path, name)?;
        if let Some(parent) = target.parent() {
            self.local_filesystem
                .create_directory(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = self
            .remote
            .download(self.token, hash)
            .await
            .with_context(|| format!("Failed to download content {hash}"))?;
        self.local_filesystem
            .write_file(&target, &data)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(target)
    }

    async fn upload(&self, root: &SyncRoot, path: &[String], name: &str) -> Result<PathBuf> {
        let source = root.resolve(path, name)?;
        self.remote
            .upload(self.token, &root.remote_dir_id, &path.join("/"), &source)
            .await
            .with_context(|| format!("Failed to upload {}", source.display()))?;
        Ok(source)
    }

    async fn delete_local(&self, root: &SyncRoot, file: &FileEntry) -> Result<PathBuf> {
        let target = root.resolve(&file.path, &file.name)?;
        self.local_filesystem
            .delete_file(&target)
            .await
            .with_context(|| format!("Failed to delete {}", target.display()))?;
        Ok(target)
    }
}
