//! Remote storage port (driven/secondary port)
//!
//! This module defines the interface for the remote file-storage service.
//! The engine consumes exactly four operations: fetch the tree descriptor,
//! upload a file into a directory, download content by hash, and delete a
//! path.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification. Authentication failures and
//!   network failures are handled identically by the engine.
//! - Uses `#[async_trait]` for async trait methods.
//! - The credential token is passed on every call; the adapter holds no
//!   session state.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::entry::ContentHash;
use crate::domain::tree::{RemoteDirId, RemoteTree};

// ============================================================================
// CredentialToken
// ============================================================================

/// Opaque session token issued by the remote service
///
/// `Debug` output is redacted so the token never reaches the logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialToken(String);

impl CredentialToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token for placing on the wire
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialToken(***)")
    }
}

// ============================================================================
// Receipts
// ============================================================================

/// Confirmation of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Digest the service computed over the stored content
    pub content_hash: ContentHash,
}

/// Confirmation of a remote delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReceipt {
    pub done: bool,
}

// ============================================================================
// IRemoteStorage trait
// ============================================================================

/// Port trait for remote storage operations
///
/// ## Implementation Notes
///
/// - Implementations must not retry internally; the engine retries at cycle
///   granularity by running the next cycle.
/// - `upload` names the stored file after the local file's base name and
///   places it under `relative_dir` inside `dir_id`.
#[async_trait::async_trait]
pub trait IRemoteStorage: Send + Sync {
    /// Fetches the descriptor of every synchronizable remote directory
    async fn fetch_tree(&self, token: &CredentialToken) -> anyhow::Result<RemoteTree>;

    /// Uploads a local file into `relative_dir` of the remote directory `dir_id`
    ///
    /// An empty `relative_dir` targets the top of the remote directory.
    async fn upload(
        &self,
        token: &CredentialToken,
        dir_id: &RemoteDirId,
        relative_dir: &str,
        local_file: &Path,
    ) -> anyhow::Result<UploadReceipt>;

    /// Downloads the content addressed by `content_hash`
    async fn download(
        &self,
        token: &CredentialToken,
        content_hash: &ContentHash,
    ) -> anyhow::Result<Vec<u8>>;

    /// Deletes `relative_path` (a file or a directory) inside `dir_id`
    async fn delete(
        &self,
        token: &CredentialToken,
        dir_id: &RemoteDirId,
        relative_path: &str,
    ) -> anyhow::Result<DeleteReceipt>;
}
