//! Storage service HTTP client
//!
//! Typed client for the four synchronization endpoints. Every call carries
//! the credential token in its form, multipart body or query string; the
//! client itself holds no session state.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cloudsync_remote::client::RemoteClient;
//!
//! # async fn example() -> Result<(), cloudsync_remote::RemoteError> {
//! let client = RemoteClient::new("https://cloud.example.com", Duration::from_secs(120))?;
//! let tree = client.fetch_tree("token").await?;
//! println!("{} projects", tree.projects.len());
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use cloudsync_core::domain::tree::RemoteTree;
use reqwest::{multipart, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::RemoteError;

const TREE_ENDPOINT: &str = "/api/sync-tree";
const UPLOAD_ENDPOINT: &str = "/api/sync-upload";
const DOWNLOAD_ENDPOINT: &str = "/api/sync-download";
const DELETE_ENDPOINT: &str = "/api/sync-delete";

// ============================================================================
// Response types
// ============================================================================

/// Response from the upload endpoint
#[derive(Debug, Deserialize)]
struct UploadResponse {
    sha1: Option<String>,
}

/// Response from the delete endpoint
#[derive(Debug, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    done: bool,
}

// ============================================================================
// RemoteClient
// ============================================================================

/// HTTP client for the storage service's sync endpoints
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
}

impl RemoteClient {
    /// Creates a client with a per-request timeout
    ///
    /// # Errors
    /// Returns [`RemoteError::Network`] if the TLS backend cannot be initialized
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base(base_url.into()),
        })
    }

    /// Creates a client with default transport settings (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: normalize_base(base_url.into()),
        }
    }

    /// Returns the base URL requests are built against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a request builder for the given method and endpoint path
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Fetches the descriptor of every directory the account can synchronize
    pub async fn fetch_tree(&self, token: &str) -> Result<RemoteTree, RemoteError> {
        debug!("Fetching remote tree");
        let response = self
            .request(Method::POST, TREE_ENDPOINT)
            .form(&[("token", token)])
            .send()
            .await?;

        let tree: RemoteTree = parse_json(check_status(response).await?).await?;
        debug!(
            projects = tree.projects.len(),
            shared = tree.shared.len(),
            "Remote tree fetched"
        );
        Ok(tree)
    }

    /// Uploads `local_file` into `relative_dir` of remote directory `folder_id`
    ///
    /// The stored file is named after the local file's base name.
    ///
    /// # Returns
    /// The SHA-1 digest the service computed over the stored content
    pub async fn upload(
        &self,
        token: &str,
        folder_id: &str,
        relative_dir: &str,
        local_file: &Path,
    ) -> Result<String, RemoteError> {
        let filename = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                RemoteError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("no usable file name in {}", local_file.display()),
                ))
            })?
            .to_string();

        let data = tokio::fs::read(local_file).await?;
        debug!(
            file = %filename,
            folder_id,
            path = relative_dir,
            bytes = data.len(),
            "Uploading file"
        );

        let form = multipart::Form::new()
            .text("filename", filename.clone())
            .text("token", token.to_string())
            .text("folder_id", folder_id.to_string())
            .text("path", relative_dir.to_string())
            .part("data", multipart::Part::bytes(data).file_name(filename));

        let response = self
            .request(Method::POST, UPLOAD_ENDPOINT)
            .multipart(form)
            .send()
            .await?;

        let body: UploadResponse = parse_json(check_status(response).await?).await?;
        match body.sha1 {
            Some(sha1) if !sha1.trim().is_empty() => Ok(sha1),
            _ => Err(RemoteError::InvalidResponse(
                "upload response carries no sha1".to_string(),
            )),
        }
    }

    /// Downloads the content whose SHA-1 digest is `sha1`
    pub async fn download(&self, token: &str, sha1: &str) -> Result<Vec<u8>, RemoteError> {
        debug!(sha1, "Downloading content");
        let response = self
            .request(Method::GET, DOWNLOAD_ENDPOINT)
            .query(&[("token", token), ("sha1", sha1)])
            .send()
            .await?;

        let bytes = check_status(response).await?.bytes().await?;
        debug!(sha1, bytes = bytes.len(), "Downloaded content");
        Ok(bytes.to_vec())
    }

    /// Deletes `path` (a file or a directory) inside remote directory `folder_id`
    ///
    /// # Returns
    /// The service's `done` flag; a missing flag counts as `false`
    pub async fn delete(
        &self,
        token: &str,
        folder_id: &str,
        path: &str,
    ) -> Result<bool, RemoteError> {
        debug!(folder_id, path, "Deleting remote path");
        let response = self
            .request(Method::POST, DELETE_ENDPOINT)
            .form(&[("token", token), ("folder_id", folder_id), ("path", path)])
            .send()
            .await?;

        let body: DeleteResponse = parse_json(check_status(response).await?).await?;
        Ok(body.done)
    }
}

fn normalize_base(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Turns a non-success status into a classified [`RemoteError`]
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::from_status(status, &body))
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}
