//! Domain entities and business logic
//!
//! This module contains the core domain types for CloudSync:
//! - Snapshot entries and content hashes
//! - The remote tree descriptor with its three virtual roots
//! - Virtual-path mapping between local paths and remote directories
//! - Snapshot diffing
//! - Domain-specific error types

pub mod diff;
pub mod entry;
pub mod errors;
pub mod path_mapper;
pub mod tree;

// Re-export commonly used types
pub use diff::{diff, CommonEntry, DiffResult};
pub use entry::{ContentHash, DirEntry, Entry, FileEntry, Snapshot};
pub use errors::DomainError;
pub use path_mapper::{MappedPath, PathMapper, VirtualRootNames};
pub use tree::{ProjectFolder, RemoteDirId, RemoteTree, SharedFolder};
