//! In-memory store implementations for tests and embedding in other tools.
//!
//! Both stores keep their state behind `std::sync::RwLock`. The index store
//! also counts every call made against it, which lets callers assert that a
//! run performed no index work at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{IndexChunk, StoredSnapshot};

use super::{IndexStore, MetadataStore};

/// In-memory [`MetadataStore`].
#[derive(Default)]
pub struct InMemoryMetadataStore {
    snapshots: RwLock<HashMap<String, StoredSnapshot>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn load_snapshot(&self, folder_id: &str) -> Result<Option<StoredSnapshot>> {
        let snapshots = self.snapshots.read().map_err(|_| poisoned())?;
        Ok(snapshots.get(folder_id).cloned())
    }

    async fn commit_snapshot(&self, snapshot: &StoredSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(|_| poisoned())?;
        snapshots.insert(snapshot.folder_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete_snapshot(&self, folder_id: &str) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(|_| poisoned())?;
        snapshots.remove(folder_id);
        Ok(())
    }
}

/// In-memory [`IndexStore`], one ordered map of chunks per collection.
#[derive(Default)]
pub struct InMemoryIndexStore {
    collections: RwLock<HashMap<String, BTreeMap<String, IndexChunk>>>,
    calls: AtomicU64,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of trait calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sorted chunk ids currently held in `collection`.
    pub fn chunk_ids(&self, collection: &str) -> Vec<String> {
        self.collections
            .read()
            .map(|c| {
                c.get(collection)
                    .map(|chunks| chunks.keys().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Look up a single chunk.
    pub fn get(&self, collection: &str, id: &str) -> Option<IndexChunk> {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(collection).and_then(|chunks| chunks.get(id).cloned()))
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn remove_by_source(&self, collection: &str, source: &str) -> Result<u64> {
        self.record_call();
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let Some(chunks) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = chunks.len();
        chunks.retain(|_, c| c.source != source);
        Ok((before - chunks.len()) as u64)
    }

    async fn insert(&self, collection: &str, chunks: &[IndexChunk]) -> Result<()> {
        self.record_call();
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let target = collections.entry(collection.to_string()).or_default();
        if let Some(dup) = chunks.iter().find(|c| target.contains_key(&c.id)) {
            return Err(anyhow!("duplicate chunk id '{}' in '{}'", dup.id, collection));
        }
        for chunk in chunks {
            target.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.record_call();
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(collection).map(|c| c.len() as u64).unwrap_or(0))
    }

    async fn drop_collection(&self, collection: &str) -> Result<u64> {
        self.record_call();
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        Ok(collections
            .remove(collection)
            .map(|c| c.len() as u64)
            .unwrap_or(0))
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}
