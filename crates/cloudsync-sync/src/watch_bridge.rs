//! Filesystem-watch fast path
//!
//! The [`WatchBridge`] sits between the [`FileWatcher`] and the remote
//! service. It receives change events for the synchronized directory,
//! debounces them through a [`DebouncedChangeQueue`], and pushes each settled
//! change straight to the remote without waiting for the next cycle.
//!
//! ## Flow
//!
//! ```text
//! FileWatcher ──→ mpsc::Receiver ──→ DebouncedChangeQueue ──→ handle_event
//!                                                               │
//!                              PathMapper(current tree) ──→ upload / delete
//! ```
//!
//! The bridge runs alongside the [`SyncLoop`](crate::sync_loop::SyncLoop)
//! without any coordination; both may touch the same remote path at once.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cloudsync_core::config::SyncConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::SyncEngine;
use crate::filesystem::is_temp_path;
use crate::watcher::{is_file_stable, ChangeEvent, DebouncedChangeQueue, FileWatcher};
use crate::SyncError;

/// Bounds for how often the debounce queue is polled
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What handling one settled event amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    Uploaded,
    RemoteDeleted,
    /// Nothing to do: unmapped, directory, lock file, or vanished
    Ignored,
    /// The file is still growing; try again after another debounce window
    Unstable,
    /// The remote call failed; already logged
    Failed,
}

/// Pushes settled local changes to the remote service
pub struct WatchBridge {
    engine: Arc<SyncEngine>,
    debounce: Duration,
    stability_check: Duration,
}

impl WatchBridge {
    pub fn new(engine: Arc<SyncEngine>, debounce: Duration, stability_check: Duration) -> Self {
        Self {
            engine,
            debounce,
            stability_check,
        }
    }

    pub fn from_config(engine: Arc<SyncEngine>, config: &SyncConfig) -> Self {
        Self::new(engine, config.debounce(), config.stability_check())
    }

    fn poll_interval(&self) -> Duration {
        (self.debounce / 4).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }

    /// Watches the sync root until `cancel` fires or the watcher stops
    ///
    /// # Errors
    /// Returns [`SyncError::WatcherFailed`] if the watch cannot be set up.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), SyncError> {
        let (mut watcher, mut change_rx) = FileWatcher::new().map_err(SyncError::WatcherFailed)?;
        watcher
            .watch(self.engine.sync_root())
            .map_err(SyncError::WatcherFailed)?;

        let mut queue = DebouncedChangeQueue::new(self.debounce);
        let mut poll_timer = tokio::time::interval(self.poll_interval());
        info!(
            root = %self.engine.sync_root().display(),
            debounce_ms = self.debounce.as_millis() as u64,
            "Watch bridge started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                event = change_rx.recv() => match event {
                    Some(change) => queue.push(change),
                    None => {
                        warn!("Change channel closed, watch bridge stopping");
                        break;
                    }
                },

                _ = poll_timer.tick() => {
                    for event in queue.poll() {
                        if cancel.is_cancelled() {
                            break;
                        }
                        if self.handle_event(&event).await == BridgeOutcome::Unstable {
                            queue.push(event);
                        }
                    }
                }
            }
        }

        drop(watcher);
        info!("Watch bridge stopped");
        Ok(())
    }

    /// Applies one settled change to the remote service
    pub async fn handle_event(&self, event: &ChangeEvent) -> BridgeOutcome {
        let absolute = event.path();
        if is_temp_path(absolute) {
            return BridgeOutcome::Ignored;
        }
        let Some(relative) = relative_to(self.engine.sync_root(), absolute) else {
            debug!(path = %absolute.display(), "Event outside sync root");
            return BridgeOutcome::Ignored;
        };
        let Some(tree) = self.engine.current_tree().await else {
            debug!(path = %relative, "No remote tree yet, ignoring event");
            return BridgeOutcome::Ignored;
        };
        let Some(mapped) = self.engine.mapper().map(&tree, &relative) else {
            debug!(path = %relative, "Unmapped path, ignoring event");
            return BridgeOutcome::Ignored;
        };

        let remote = self.engine.remote();
        let token = self.engine.token();

        match event {
            ChangeEvent::Removed(_) => {
                match remote.delete(token, &mapped.dir_id, &mapped.path).await {
                    Ok(_) => {
                        info!(dir_id = %mapped.dir_id, path = %mapped.path, "Deleted remotely");
                        BridgeOutcome::RemoteDeleted
                    }
                    Err(e) => {
                        warn!(dir_id = %mapped.dir_id, path = %mapped.path, error = %format!("{e:#}"), "Remote delete failed");
                        BridgeOutcome::Failed
                    }
                }
            }
            ChangeEvent::Added(_) | ChangeEvent::Changed(_) => {
                let name = absolute
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if self.engine.policy().is_lock_file(&name) {
                    debug!(path = %relative, "Skipping lock file");
                    return BridgeOutcome::Ignored;
                }

                match self.engine.local_filesystem().get_state(absolute).await {
                    Ok(state) if state.is_regular_file() => {}
                    Ok(_) => return BridgeOutcome::Ignored,
                    Err(e) => {
                        warn!(path = %absolute.display(), error = %format!("{e:#}"), "Cannot stat changed path");
                        return BridgeOutcome::Failed;
                    }
                }
                if !is_file_stable(absolute, self.stability_check).await {
                    let still_there = tokio::fs::try_exists(absolute).await.unwrap_or(false);
                    return if still_there {
                        BridgeOutcome::Unstable
                    } else {
                        BridgeOutcome::Ignored
                    };
                }

                let parent = mapped.parent_path();
                match remote.upload(token, &mapped.dir_id, &parent, absolute).await {
                    Ok(receipt) => {
                        info!(
                            dir_id = %mapped.dir_id,
                            path = %mapped.path,
                            hash = %receipt.content_hash,
                            "Uploaded changed file"
                        );
                        BridgeOutcome::Uploaded
                    }
                    Err(e) => {
                        warn!(dir_id = %mapped.dir_id, path = %mapped.path, error = %format!("{e:#}"), "Upload failed");
                        BridgeOutcome::Failed
                    }
                }
            }
        }
    }
}

/// `/`-separated path of `absolute` below `root`, or `None` outside it
fn relative_to(root: &Path, absolute: &Path) -> Option<String> {
    let rest = absolute.strip_prefix(root).ok()?;
    let segments: Option<Vec<&str>> = rest.iter().map(|s| s.to_str()).collect();
    Some(segments?.join("/"))
}
