//! CloudSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Entry`, `RemoteTree`, `DiffResult`, `CommonEntry`
//! - **Pure algorithms** - [`domain::path_mapper::PathMapper`] and [`domain::diff::diff`]
//! - **Port definitions** - Traits for adapters: `IRemoteStorage`, `ILocalFileSystem`
//! - **Configuration** - YAML settings and the credentials record
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement; the
//! reconciliation engine in `cloudsync-sync` drives domain types through them.

pub mod config;
pub mod domain;
pub mod ports;
