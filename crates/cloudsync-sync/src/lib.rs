//! CloudSync Sync - Reconciliation engine
//!
//! Provides:
//! - Periodic full reconciliation of every sync root against the remote tree
//! - Alternating upload and deletion passes chained by cycle completion
//! - A filesystem-watch fast path for single-file pushes between cycles
//!
//! ## Modules
//!
//! - [`filesystem`] - Local filesystem adapter (atomic writes, SHA-1)
//! - [`snapshot`] - Recursive local snapshotting
//! - [`roots`] - SyncRoot registry derived from the remote tree
//! - [`reconciler`] - Per-root download / local-only / common state machine
//! - [`engine`] - One reconciliation cycle across all roots
//! - [`sync_loop`] - Alternating cycle driver with the enable toggle
//! - [`watcher`] - `notify` wrapper and debounce queue
//! - [`watch_bridge`] - Incremental push/delete from watcher events

pub mod engine;
pub mod filesystem;
pub mod reconciler;
pub mod roots;
pub mod snapshot;
pub mod sync_loop;
pub mod watch_bridge;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole cycle or stop a background task
///
/// Per-file failures never surface here; they are logged and recorded in
/// the cycle report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote tree descriptor could not be fetched
    #[error("Remote tree unavailable: {0:#}")]
    TreeUnavailable(anyhow::Error),

    /// The synchronized directory could not be created or read
    #[error("Sync root unavailable: {path}: {reason}")]
    SyncRootUnavailable { path: PathBuf, reason: String },

    /// The filesystem watcher could not be started
    #[error("File watcher failed: {0:#}")]
    WatcherFailed(anyhow::Error),
}
