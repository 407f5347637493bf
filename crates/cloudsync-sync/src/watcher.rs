//! File watching and debounced change queue
//!
//! [`FileWatcher`] wraps the `notify` crate and turns raw OS events for the
//! synchronized directory into [`ChangeEvent`] values. A rename arrives as a
//! removal of the old path followed by an addition of the new one, so
//! consumers only ever see single-path events.
//!
//! [`DebouncedChangeQueue`] holds events until their path has been quiet for
//! the debounce window, so a file still being written is reported once, after
//! the writer is done.
//!
//! ```text
//! inotify / kqueue
//!       │
//!       ▼
//!  FileWatcher  ──→  mpsc::channel  ──→  DebouncedChangeQueue  ──→  WatchBridge
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacity of the channel between the OS watcher thread and the bridge
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A filesystem change under the watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A file or directory appeared at the path
    Added(PathBuf),
    /// The content of an existing file changed
    Changed(PathBuf),
    /// A file or directory was removed from the path
    Removed(PathBuf),
}

impl ChangeEvent {
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Added(p) | ChangeEvent::Changed(p) | ChangeEvent::Removed(p) => p,
        }
    }
}

// ============================================================================
// FileWatcher
// ============================================================================

/// Watches a directory tree using the OS-native mechanism
///
/// Dropping the watcher stops all watches and closes the event channel.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Creates a watcher and the receiver its events are delivered on
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new() -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (event_tx, event_rx) = mpsc::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for change in map_notify_event(&event) {
                        if let Err(e) = event_tx.blocking_send(change) {
                            warn!(error = %e, "Failed to send change event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, event_rx))
    }

    /// Starts watching `path` and everything below it
    ///
    /// # Errors
    /// Returns an error if the path cannot be watched (missing, permissions,
    /// or the inotify watch limit was reached)
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Starting recursive watch");
        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))
    }
}

/// Converts a `notify::Event` into zero or more [`ChangeEvent`]s
///
/// - `Create(*)` -> `Added`
/// - `Modify(Data(*))`, `Modify(Any)`, `Modify(Other)` -> `Changed`
/// - `Modify(Name(From))` -> `Removed`, `Modify(Name(To))` -> `Added`
/// - `Modify(Name(Both))` -> `Removed(old)` then `Added(new)`
/// - `Modify(Name(Any))` -> `Changed`; the consumer re-checks the path
/// - `Remove(*)` -> `Removed`
///
/// Metadata-only changes and access events are dropped.
fn map_notify_event(event: &notify::Event) -> Vec<ChangeEvent> {
    let paths = &event.paths;
    let Some(first) = paths.first() else {
        return Vec::new();
    };

    let mapped = match &event.kind {
        EventKind::Create(_) => vec![ChangeEvent::Added(first.clone())],

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths.get(1) {
            Some(second) => vec![
                ChangeEvent::Removed(first.clone()),
                ChangeEvent::Added(second.clone()),
            ],
            None => vec![ChangeEvent::Changed(first.clone())],
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            vec![ChangeEvent::Removed(first.clone())]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            vec![ChangeEvent::Added(first.clone())]
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => vec![ChangeEvent::Changed(first.clone())],

        EventKind::Remove(_) => vec![ChangeEvent::Removed(first.clone())],

        _ => Vec::new(),
    };

    if mapped.is_empty() {
        debug!(kind = ?event.kind, "Ignoring event kind");
    } else {
        debug!(kind = ?event.kind, events = ?mapped, "Mapped notify event");
    }
    mapped
}

// ============================================================================
// File stability check
// ============================================================================

/// Checks that a file is not still being written
///
/// Reads the size twice, `interval` apart; the file is stable when both
/// reads succeed and agree.
pub async fn is_file_stable(path: &Path, interval: Duration) -> bool {
    let size_first = match tokio::fs::metadata(path).await {
        Ok(m) => m.len(),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Cannot stat file for stability check");
            return false;
        }
    };

    tokio::time::sleep(interval).await;

    let size_second = match tokio::fs::metadata(path).await {
        Ok(m) => m.len(),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "File vanished during stability check");
            return false;
        }
    };

    let stable = size_first == size_second;
    debug!(path = %path.display(), size_first, size_second, stable, "File stability check");
    stable
}

// ============================================================================
// DebouncedChangeQueue
// ============================================================================

/// Coalesces rapid changes per path until the path goes quiet
///
/// A later event for a path replaces the pending one and restarts its
/// window, so the consumer sees only the final state of each path.
pub struct DebouncedChangeQueue {
    pending: HashMap<PathBuf, (ChangeEvent, Instant)>,
    debounce_delay: Duration,
}

impl DebouncedChangeQueue {
    pub fn new(debounce_delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            debounce_delay,
        }
    }

    /// Inserts or replaces the pending event for the event's path
    pub fn push(&mut self, event: ChangeEvent) {
        let path = event.path().to_path_buf();
        self.pending.insert(path, (event, Instant::now()));
    }

    /// Removes and returns every event quiet for at least the debounce delay
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        let now = Instant::now();
        let delay = self.debounce_delay;
        let settled_paths: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, stamp))| now.duration_since(*stamp) >= delay)
            .map(|(path, _)| path.clone())
            .collect();

        let settled: Vec<ChangeEvent> = settled_paths
            .iter()
            .filter_map(|path| self.pending.remove(path))
            .map(|(event, _)| event)
            .collect();

        if !settled.is_empty() {
            debug!(count = settled.len(), "Polled settled change events");
        }
        settled
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
