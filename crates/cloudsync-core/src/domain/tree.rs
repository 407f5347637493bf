//! Remote tree descriptor
//!
//! The remote service describes everything the account can see in one
//! document: the personal folder, every project folder, and every folder
//! shared by other users, each with its full snapshot. The descriptor is
//! fetched fresh at the start of every reconciliation cycle.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};

use super::entry::Snapshot;
use super::errors::DomainError;

// ============================================================================
// RemoteDirId
// ============================================================================

/// Identifier of a remote directory namespace
///
/// The service sends these as JSON numbers for some roots and strings for
/// others; both forms are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RemoteDirId(String);

impl RemoteDirId {
    /// Create a new RemoteDirId
    ///
    /// # Errors
    /// Returns error if the id is empty
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidDirId(id));
        }
        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteDirId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RemoteDirId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        let raw = match RawId::deserialize(deserializer)? {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        };
        RemoteDirId::new(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// RemoteTree
// ============================================================================

/// A project folder shared with every project member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFolder {
    pub folder_id: RemoteDirId,
    pub name: String,
    #[serde(default)]
    pub content: Snapshot,
}

/// A folder another user shared with this account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFolder {
    pub id: RemoteDirId,
    pub name: String,
    #[serde(default)]
    pub content: Snapshot,
}

/// Everything the account can synchronize, as reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTree {
    pub own_dir_id: RemoteDirId,
    pub own_dir: Snapshot,
    #[serde(default)]
    pub projects: Vec<ProjectFolder>,
    #[serde(default)]
    pub shared: Vec<SharedFolder>,
}

impl RemoteTree {
    /// Looks up a project by exact name
    pub fn project(&self, name: &str) -> Option<&ProjectFolder> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Looks up a shared folder by exact name
    pub fn shared_folder(&self, name: &str) -> Option<&SharedFolder> {
        self.shared.iter().find(|s| s.name == name)
    }
}
