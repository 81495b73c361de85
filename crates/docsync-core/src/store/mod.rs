//! Storage abstractions for snapshots and indexed chunks.
//!
//! The reconciliation engine talks to two external stores:
//!
//! | Trait | Holds | Key operation |
//! |-------|-------|---------------|
//! | [`MetadataStore`] | last committed [`StoredSnapshot`] per folder | atomic [`commit_snapshot`](MetadataStore::commit_snapshot) |
//! | [`IndexStore`] | [`IndexChunk`]s grouped in per-folder collections | idempotent [`remove_by_source`](IndexStore::remove_by_source) |
//!
//! Both are authoritative external stores with their own consistency
//! guarantees; the engine's only crash-consistency mechanism is committing
//! the snapshot after every index operation has succeeded.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexChunk, StoredSnapshot};

/// Persistence for folder snapshots.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Load the last committed snapshot, or `None` if the folder has never
    /// completed a reconciliation.
    async fn load_snapshot(&self, folder_id: &str) -> Result<Option<StoredSnapshot>>;

    /// Replace the folder's snapshot wholesale.
    ///
    /// Readers must never observe a partially replaced file list.
    async fn commit_snapshot(&self, snapshot: &StoredSnapshot) -> Result<()>;

    /// Forget the folder's snapshot. Deleting a missing snapshot succeeds.
    async fn delete_snapshot(&self, folder_id: &str) -> Result<()>;
}

/// Chunk storage scoped by a caller-supplied collection name.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Remove every chunk in `collection` whose source is `source`.
    ///
    /// Returns the number of chunks removed; zero matches is success.
    async fn remove_by_source(&self, collection: &str, source: &str) -> Result<u64>;

    /// Insert chunks. Either all chunks become visible or none do.
    async fn insert(&self, collection: &str, chunks: &[IndexChunk]) -> Result<()>;

    /// Number of chunks held in `collection`.
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Remove an entire collection, returning the number of chunks dropped.
    async fn drop_collection(&self, collection: &str) -> Result<u64>;
}
