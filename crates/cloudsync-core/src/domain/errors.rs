//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! unsafe local paths and malformed remote directory ids.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Remote directory identifier is empty or malformed
    #[error("Invalid remote directory id: {0}")]
    InvalidDirId(String),
}
