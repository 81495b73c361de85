//! # docsync core
//!
//! Pure logic for content-addressable folder synchronization: manifests and
//! snapshots, manifest diffing, content splitting with stable chunk
//! identity, the store and embedding traits the reconciliation engine talks
//! to, and the error taxonomy.
//!
//! This crate does no filesystem I/O and pulls in no async runtime or SQL
//! driver; fingerprinting, SQLite stores and the orchestrator live in the
//! `docsync` crate.

pub mod chunk;
pub mod diff;
pub mod embedding;
pub mod error;
pub mod models;
pub mod store;

pub use error::{Result, SyncError};
