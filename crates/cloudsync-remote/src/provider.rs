//! HttpRemoteStorage - IRemoteStorage implementation over the sync endpoints
//!
//! Wraps the [`RemoteClient`] to fulfil the [`IRemoteStorage`] port contract.
//!
//! ## Design Notes
//!
//! - Typed [`RemoteError`]s are carried inside the `anyhow::Error` with a
//!   context line, so callers can still `downcast_ref::<RemoteError>()`.
//! - A delete answered with `done != true` becomes [`RemoteError::Rejected`].
//! - No internal retries; the engine retries by running the next cycle.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use cloudsync_core::config::RemoteConfig;
use cloudsync_core::domain::entry::ContentHash;
use cloudsync_core::domain::tree::{RemoteDirId, RemoteTree};
use cloudsync_core::ports::remote_storage::{
    CredentialToken, DeleteReceipt, IRemoteStorage, UploadReceipt,
};

use crate::client::RemoteClient;
use crate::RemoteError;

/// Remote storage adapter speaking HTTP to the storage service
#[derive(Debug, Clone)]
pub struct HttpRemoteStorage {
    client: RemoteClient,
}

impl HttpRemoteStorage {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    /// Builds the adapter from the `remote` configuration section
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let client = RemoteClient::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
        .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for HttpRemoteStorage {
    async fn fetch_tree(&self, token: &CredentialToken) -> Result<RemoteTree> {
        self.client
            .fetch_tree(token.expose())
            .await
            .context("Failed to fetch remote tree")
    }

    async fn upload(
        &self,
        token: &CredentialToken,
        dir_id: &RemoteDirId,
        relative_dir: &str,
        local_file: &Path,
    ) -> Result<UploadReceipt> {
        let sha1 = self
            .client
            .upload(token.expose(), dir_id.as_str(), relative_dir, local_file)
            .await
            .with_context(|| format!("Failed to upload {}", local_file.display()))?;

        debug!(dir_id = %dir_id, path = relative_dir, sha1 = %sha1, "Upload accepted");
        Ok(UploadReceipt {
            content_hash: ContentHash::new(sha1),
        })
    }

    async fn download(
        &self,
        token: &CredentialToken,
        content_hash: &ContentHash,
    ) -> Result<Vec<u8>> {
        self.client
            .download(token.expose(), content_hash.as_str())
            .await
            .with_context(|| format!("Failed to download content {content_hash}"))
    }

    async fn delete(
        &self,
        token: &CredentialToken,
        dir_id: &RemoteDirId,
        relative_path: &str,
    ) -> Result<DeleteReceipt> {
        let done = self
            .client
            .delete(token.expose(), dir_id.as_str(), relative_path)
            .await
            .with_context(|| format!("Failed to delete {relative_path} in {dir_id}"))?;

        if !done {
            return Err(RemoteError::Rejected(format!(
                "delete of {relative_path} in {dir_id} not confirmed"
            ))
            .into());
        }
        Ok(DeleteReceipt { done })
    }
}
