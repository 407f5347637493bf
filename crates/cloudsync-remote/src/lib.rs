//! CloudSync Remote - HTTP transport for the storage service
//!
//! Provides an async client for the four synchronization endpoints:
//! - Tree descriptor fetch
//! - Multipart file upload
//! - Content download by SHA-1 digest
//! - Path deletion
//!
//! ## Modules
//!
//! - [`client`] - Typed HTTP client for the sync endpoints
//! - [`provider`] - `IRemoteStorage` adapter built on [`client::RemoteClient`]

pub mod client;
pub mod provider;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the storage service
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The credential token was refused
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be parsed or lacked a required field
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The service understood the request but declined it
    #[error("Rejected by service: {0}")]
    Rejected(String),

    /// Reading the local file for an upload failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Classifies a non-success HTTP status
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", body.trim())
        };
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(detail),
            StatusCode::NOT_FOUND => Self::NotFound(detail),
            s if s.is_server_error() => Self::ServerError(detail),
            _ => Self::Rejected(detail),
        }
    }

    /// Whether the failure means the credential token is no longer valid
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
