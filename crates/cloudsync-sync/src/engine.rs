//! Reconciliation cycle engine
//!
//! The [`SyncEngine`] owns everything one cycle needs: both collaborators,
//! the credential token, the virtual-root layout, and the remote tree
//! descriptor fetched by the most recent cycle.
//!
//! ## Cycle Flow
//!
//! 1. **Fetch**: request the remote tree descriptor; failure aborts the cycle
//! 2. **Roots**: derive the personal, project and shared roots from it
//! 3. **Reconcile**: for each root in order, snapshot the local directory,
//!    diff it against the remote snapshot, and run the [`Reconciler`]
//! 4. **Report**: return a [`CycleReport`] with counts and per-file failures
//!
//! Nothing is cached between cycles except the descriptor, which the
//! watch fast path reads to map paths.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use cloudsync_core::{
    config::Config,
    domain::{
        diff::diff,
        path_mapper::{PathMapper, VirtualRootNames},
        tree::RemoteTree,
    },
    ports::{
        local_filesystem::ILocalFileSystem,
        remote_storage::{CredentialToken, IRemoteStorage},
    },
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::reconciler::{ReconcilePolicy, Reconciler};
use crate::roots::roots_from_tree;
use crate::snapshot::Snapshotter;
use crate::SyncError;

// ============================================================================
// CycleReport
// ============================================================================

/// Summary of a completed reconciliation cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Whether this was a deletion pass
    pub deletion_pass: bool,
    /// Number of roots visited
    pub roots: u32,
    /// Files written locally from remote content
    pub downloaded: u32,
    /// Files sent to the remote service
    pub uploaded: u32,
    /// Local-only files removed by a deletion pass
    pub deleted_local: u32,
    /// Editor lock files left alone
    pub lock_files_skipped: u32,
    /// Local-only files too young to delete
    pub within_grace: u32,
    /// Divergent common files left for the next upload pass
    pub deferred: u32,
    /// Divergent common files with equal timestamps
    pub ambiguous: u32,
    /// Per-file and per-root failures (non-fatal)
    pub failures: Vec<String>,
    /// Set when shutdown stopped the cycle between two actions
    pub interrupted: bool,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
}

impl CycleReport {
    fn new(deletion_pass: bool) -> Self {
        Self {
            deletion_pass,
            ..Self::default()
        }
    }

    /// Number of transfers and deletions actually performed
    pub fn actions(&self) -> u32 {
        self.downloaded + self.uploaded + self.deleted_local
    }

    pub(crate) fn record_failure(&mut self, action: &str, subject: &str, error: &anyhow::Error) {
        warn!(action, subject, error = %format!("{error:#}"), "Action failed, continuing");
        self.failures.push(format!("{action} {subject}: {error:#}"));
    }
}

// ============================================================================
// EngineSettings
// ============================================================================

/// Static settings of a [`SyncEngine`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Directory holding the three virtual roots
    pub sync_root: PathBuf,
    pub root_names: VirtualRootNames,
    pub policy: ReconcilePolicy,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sync_root: config.sync_root(),
            root_names: config.roots.clone(),
            policy: ReconcilePolicy {
                grace_window: config.sync.grace_window(),
                lock_file_prefix: config.sync.lock_file_prefix.clone(),
            },
        }
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Runs reconciliation cycles across every sync root
pub struct SyncEngine {
    remote: Arc<dyn IRemoteStorage>,
    local_filesystem: Arc<dyn ILocalFileSystem>,
    snapshotter: Snapshotter,
    token: CredentialToken,
    mapper: PathMapper,
    settings: EngineSettings,
    /// Descriptor fetched by the latest cycle; replaced only at cycle start
    current_tree: RwLock<Option<Arc<RemoteTree>>>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn IRemoteStorage>,
        local_filesystem: Arc<dyn ILocalFileSystem>,
        token: CredentialToken,
        settings: EngineSettings,
    ) -> Self {
        Self {
            snapshotter: Snapshotter::new(Arc::clone(&local_filesystem)),
            mapper: PathMapper::new(settings.root_names.clone()),
            remote,
            local_filesystem,
            token,
            settings,
            current_tree: RwLock::new(None),
        }
    }

    pub fn sync_root(&self) -> &Path {
        &self.settings.sync_root
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.settings.policy
    }

    pub fn token(&self) -> &CredentialToken {
        &self.token
    }

    pub fn remote(&self) -> &dyn IRemoteStorage {
        self.remote.as_ref()
    }

    pub fn local_filesystem(&self) -> &dyn ILocalFileSystem {
        self.local_filesystem.as_ref()
    }

    /// The descriptor fetched by the most recent successful cycle
    pub async fn current_tree(&self) -> Option<Arc<RemoteTree>> {
        self.current_tree.read().await.clone()
    }

    /// Runs one full reconciliation cycle
    ///
    /// Roots are processed one after another. Per-root and per-file failures
    /// are recorded in the report; only a failed tree fetch or an unusable
    /// sync root fails the cycle.
    ///
    /// # Errors
    /// Returns [`SyncError::TreeUnavailable`] or
    /// [`SyncError::SyncRootUnavailable`].
    #[instrument(skip(self, cancel))]
    pub async fn run_cycle(
        &self,
        deletion_pass: bool,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, SyncError> {
        let start = Instant::now();
        let mut report = CycleReport::new(deletion_pass);

        // Before the fetch, so the watcher has a directory even while offline
        self.ensure_virtual_roots().await?;

        let tree = self
            .remote
            .fetch_tree(&self.token)
            .await
            .map_err(SyncError::TreeUnavailable)?;
        let tree = Arc::new(tree);
        *self.current_tree.write().await = Some(Arc::clone(&tree));

        let roots = roots_from_tree(&tree, &self.settings.sync_root, &self.settings.root_names);
        info!(roots = roots.len(), deletion_pass, "Starting reconciliation cycle");

        let reconciler = Reconciler::new(
            self.remote.as_ref(),
            self.local_filesystem.as_ref(),
            &self.token,
            &self.settings.policy,
            cancel,
        );

        for root in &roots {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            report.roots += 1;

            if let Err(e) = self.local_filesystem.create_directory(root.local_root()).await {
                report.record_failure("create root", &root.title, &e);
                continue;
            }

            let local = match self.snapshotter.snapshot(root.local_root()).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    report.record_failure("snapshot", &root.title, &e);
                    continue;
                }
            };

            let partition = diff(&local, &root.remote_snapshot);
            debug!(
                root = %root.title,
                local_only = partition.local_only.len(),
                remote_only = partition.remote_only.len(),
                common = partition.common.len(),
                "Snapshots diffed"
            );

            let now = Utc::now().timestamp();
            reconciler
                .reconcile(root, partition, deletion_pass, now, &mut report)
                .await;
            if report.interrupted {
                break;
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            deletion_pass,
            downloaded = report.downloaded,
            uploaded = report.uploaded,
            deleted_local = report.deleted_local,
            deferred = report.deferred,
            ambiguous = report.ambiguous,
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "Reconciliation cycle complete"
        );
        Ok(report)
    }

    /// Creates the sync root and the three virtual root directories
    async fn ensure_virtual_roots(&self) -> Result<(), SyncError> {
        let names = &self.settings.root_names;
        for name in [&names.personal, &names.projects, &names.shared] {
            let path = self.settings.sync_root.join(name);
            self.local_filesystem
                .create_directory(&path)
                .await
                .map_err(|e| SyncError::SyncRootUnavailable {
                    path: path.clone(),
                    reason: format!("{e:#}"),
                })?;
        }
        Ok(())
    }
}
