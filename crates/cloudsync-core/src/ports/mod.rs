//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStorage`] - The four remote storage operations
//! - [`ILocalFileSystem`] - Local filesystem operations

pub mod local_filesystem;
pub mod remote_storage;

pub use local_filesystem::{ChildKind, DirectoryChild, FileSystemState, ILocalFileSystem};
pub use remote_storage::{CredentialToken, DeleteReceipt, IRemoteStorage, UploadReceipt};
