//! Incremental reconciliation of a folder against its index.
//!
//! One run walks the pipeline
//!
//! ```text
//! fingerprint ──▶ diff vs stored snapshot ──▶ index ops ──▶ commit snapshot
//! ```
//!
//! and commits the new snapshot only after every index operation has
//! succeeded. A run that fails or is cancelled before the commit leaves the
//! stored snapshot at its previous value, so the next run recomputes the
//! same diff and repeats the same operations. That repetition is safe
//! because every file is indexed as remove-by-source followed by insert, and
//! chunk identifiers are stable across re-chunking.
//!
//! Runs for the same folder never overlap: a second trigger while one is in
//! flight is rejected with [`SyncError::ReconcileInProgress`]. Within one
//! [`Reconciler`] this is an in-memory state check. A reconciler built with
//! [`Reconciler::with_lock_dir`] also holds an exclusive lock file per
//! folder for the whole run, which rejects runs from other processes
//! sharing the same directory. Different folders reconcile independently.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use serde::Serialize;
use sha2::{Digest, Sha256};

use docsync_core::chunk::{assign_chunk_ids, ContentSplitter};
use docsync_core::diff::diff;
use docsync_core::embedding::EmbeddingProvider;
use docsync_core::models::{ChangeSet, IndexChunk, StoredSnapshot};
use docsync_core::store::{IndexStore, MetadataStore};
use docsync_core::{Result, SyncError};

use crate::extract::load_document;
use crate::fingerprint::{fingerprint, resolve_folder, source_key};

/// Lifecycle of a folder as seen by one [`Reconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    /// No run has completed in this process, or the last run failed.
    Unindexed,
    /// A run is in flight.
    Reconciling,
    /// The last run completed and committed (or had nothing to commit).
    Indexed,
}

/// The two external stores a run mutates.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    pub index: &'a dyn IndexStore,
    pub metadata: &'a dyn MetadataStore,
}

/// How a file's content becomes index chunks.
#[derive(Clone, Copy)]
pub struct IndexPipeline<'a> {
    pub splitter: &'a dyn ContentSplitter,
    pub embedder: &'a dyn EmbeddingProvider,
    /// Texts per embedding request.
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Drop the collection and re-index every file regardless of the stored
    /// snapshot.
    pub full: bool,
    /// Fingerprint and diff only; no index or snapshot changes.
    pub dry_run: bool,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub folder_id: String,
    pub changes: ChangeSet,
    pub chunks_removed: u64,
    pub chunks_inserted: u64,
    /// The collection was dropped and rebuilt from scratch (full mode or
    /// the index configuration changed).
    pub rebuilt: bool,
    pub dry_run: bool,
}

/// Sequences fingerprint, diff, index operations and snapshot commit, and
/// tracks per-folder run state.
#[derive(Default)]
pub struct Reconciler {
    states: Mutex<HashMap<String, FolderState>>,
    lock_dir: Option<PathBuf>,
}

impl Reconciler {
    /// A reconciler that only guards against overlapping runs made through
    /// itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// A reconciler that additionally takes an exclusive lock on
    /// [`lock_path`]`(dir, folder_id)` for each run, so that runs started by
    /// other processes using the same `dir` are rejected as well.
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            states: Mutex::default(),
            lock_dir: Some(dir.into()),
        }
    }

    /// Current state of `folder_id` in this process.
    pub fn state(&self, folder_id: &str) -> FolderState {
        self.lock_states()
            .get(folder_id)
            .copied()
            .unwrap_or(FolderState::Unindexed)
    }

    /// Bring the index for `folder_id` into agreement with the folder at
    /// `folder_path`, building chunks with `pipeline` and recording
    /// `index_config` in the committed snapshot.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ReconcileInProgress`] if a run for the folder is in flight.
    /// - [`SyncError::NotADirectory`] if the folder path is invalid.
    /// - [`SyncError::IndexOperationFailed`] if a remove, embed or insert
    ///   failed; the snapshot is untouched and the call may be retried.
    /// - [`SyncError::MetadataCommitFailed`] if the index was updated but the
    ///   snapshot could not be committed.
    pub async fn reconcile(
        &self,
        folder_id: &str,
        folder_path: &Path,
        index_config: &str,
        options: ReconcileOptions,
        stores: Stores<'_>,
        pipeline: IndexPipeline<'_>,
    ) -> Result<ReconcileReport> {
        let guard = self.begin(folder_id)?;

        let root = resolve_folder(folder_path)?;
        let snapshot = stores
            .metadata
            .load_snapshot(folder_id)
            .await
            .map_err(SyncError::Metadata)?;

        let walk_root = root.clone();
        let current = tokio::task::spawn_blocking(move || fingerprint(&walk_root))
            .await
            .map_err(|e| SyncError::Interrupted(format!("fingerprint task: {}", e)))??;

        let config_changed = snapshot
            .as_ref()
            .is_some_and(|s| s.index_config != index_config);
        let rebuild = options.full || config_changed;
        if config_changed {
            tracing::info!(
                folder_id,
                from = snapshot.as_ref().map(|s| s.index_config.as_str()),
                to = index_config,
                "index configuration changed, rebuilding"
            );
        }

        let stored = if rebuild {
            None
        } else {
            snapshot.as_ref().map(|s| &s.manifest)
        };
        let changes = diff(current, stored);

        let mut report = ReconcileReport {
            folder_id: folder_id.to_string(),
            changes,
            chunks_removed: 0,
            chunks_inserted: 0,
            rebuilt: rebuild,
            dry_run: options.dry_run,
        };

        if options.dry_run {
            guard.restore();
            return Ok(report);
        }

        if !report.changes.folder_hash_changed {
            tracing::info!(folder_id, "folder hash unchanged, nothing to do");
            guard.finish(FolderState::Indexed);
            return Ok(report);
        }

        let run = Run {
            folder_id,
            collection: folder_id,
            root: &root,
            index: stores.index,
            pipeline,
        };

        if rebuild {
            report.chunks_removed += stores
                .index
                .drop_collection(run.collection)
                .await
                .map_err(|e| SyncError::index_op("drop", run.collection, e))?;
        }

        for file in &report.changes.removed {
            report.chunks_removed += run.remove(&file.relative_path).await?;
        }
        for file in &report.changes.modified {
            tracing::debug!(
                folder_id,
                path = %file.relative_path,
                old = %file.old_hash,
                new = %file.new_hash,
                "re-indexing modified file"
            );
            report.chunks_removed += run.remove(&file.relative_path).await?;
            report.chunks_inserted += run.add(&file.relative_path).await?;
        }
        for file in &report.changes.added {
            report.chunks_removed += run.remove(&file.relative_path).await?;
            report.chunks_inserted += run.add(&file.relative_path).await?;
        }

        let next = StoredSnapshot {
            folder_id: folder_id.to_string(),
            index_config: index_config.to_string(),
            manifest: report.changes.current.clone(),
        };
        stores
            .metadata
            .commit_snapshot(&next)
            .await
            .map_err(|source| SyncError::MetadataCommitFailed {
                folder_id: folder_id.to_string(),
                source,
            })?;

        tracing::info!(
            folder_id,
            added = report.changes.added.len(),
            removed = report.changes.removed.len(),
            modified = report.changes.modified.len(),
            chunks_removed = report.chunks_removed,
            chunks_inserted = report.chunks_inserted,
            folder_hash = %next.manifest.folder_hash,
            "committed snapshot"
        );
        guard.finish(FolderState::Indexed);
        Ok(report)
    }

    /// Tear down a folder's index and snapshot. Returns the number of chunks
    /// dropped.
    pub async fn drop_index(&self, folder_id: &str, stores: Stores<'_>) -> Result<u64> {
        let (dropped, ()) = self
            .drop_index_then(folder_id, stores, || async { Ok(()) })
            .await?;
        Ok(dropped)
    }

    /// [`drop_index`](Self::drop_index), then run `then` before the folder is
    /// released. Used to deregister or relocate a folder without another run
    /// slipping in between.
    pub async fn drop_index_then<F, Fut, T>(
        &self,
        folder_id: &str,
        stores: Stores<'_>,
        then: F,
    ) -> Result<(u64, T)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let guard = self.begin(folder_id)?;

        let dropped = stores
            .index
            .drop_collection(folder_id)
            .await
            .map_err(|e| SyncError::index_op("drop", folder_id, e))?;
        stores
            .metadata
            .delete_snapshot(folder_id)
            .await
            .map_err(SyncError::Metadata)?;
        tracing::info!(folder_id, chunks = dropped, "dropped index");

        let value = then().await.map_err(SyncError::Metadata)?;
        guard.finish(FolderState::Unindexed);
        Ok((dropped, value))
    }

    fn begin(&self, folder_id: &str) -> Result<RunGuard<'_>> {
        let mut states = self.lock_states();
        let previous = states
            .get(folder_id)
            .copied()
            .unwrap_or(FolderState::Unindexed);
        if previous == FolderState::Reconciling {
            return Err(SyncError::ReconcileInProgress(folder_id.to_string()));
        }
        let lock = match &self.lock_dir {
            Some(dir) => Some(acquire_folder_lock(dir, folder_id)?),
            None => None,
        };
        states.insert(folder_id.to_string(), FolderState::Reconciling);
        Ok(RunGuard {
            reconciler: self,
            folder_id: folder_id.to_string(),
            previous,
            outcome: None,
            _lock: lock,
        })
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, FolderState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lock file guarding runs for `folder_id` under `dir`. The file name is a
/// digest of the id, so any id maps to a valid file name.
pub fn lock_path(dir: &Path, folder_id: &str) -> PathBuf {
    let digest = format!("{:x}", Sha256::digest(folder_id.as_bytes()));
    dir.join(format!("{}.lock", &digest[..16]))
}

fn acquire_folder_lock(dir: &Path, folder_id: &str) -> Result<File> {
    let path = lock_path(dir, folder_id);
    let lock_error = |e: std::io::Error| {
        SyncError::Metadata(anyhow::anyhow!("lock file {}: {}", path.display(), e))
    };

    std::fs::create_dir_all(dir).map_err(lock_error)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(lock_error)?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            tracing::info!(folder_id, lock = %path.display(), "folder is locked by another run");
            Err(SyncError::ReconcileInProgress(folder_id.to_string()))
        }
        Err(e) => Err(lock_error(e)),
    }
}

/// Marks a folder as `Reconciling` for the lifetime of a run. Dropping it
/// without [`finish`](RunGuard::finish) (error, cancellation) leaves the
/// folder `Unindexed`. The folder's lock file, if any, is released when the
/// guard drops.
struct RunGuard<'a> {
    reconciler: &'a Reconciler,
    folder_id: String,
    previous: FolderState,
    outcome: Option<FolderState>,
    _lock: Option<File>,
}

impl RunGuard<'_> {
    fn finish(mut self, state: FolderState) {
        self.outcome = Some(state);
    }

    /// End a run that made no changes, restoring the prior state.
    fn restore(mut self) {
        self.outcome = Some(self.previous);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let state = self.outcome.unwrap_or(FolderState::Unindexed);
        self.reconciler
            .lock_states()
            .insert(std::mem::take(&mut self.folder_id), state);
    }
}

/// Per-run context for index operations on single files.
struct Run<'a> {
    folder_id: &'a str,
    collection: &'a str,
    root: &'a Path,
    index: &'a dyn IndexStore,
    pipeline: IndexPipeline<'a>,
}

impl Run<'_> {
    async fn remove(&self, relative_path: &str) -> Result<u64> {
        let source = source_key(self.root, relative_path);
        let removed = self
            .index
            .remove_by_source(self.collection, &source)
            .await
            .map_err(|e| SyncError::index_op("remove", &source, e))?;
        if removed == 0 {
            tracing::debug!(folder_id = self.folder_id, %source, "no chunks to remove");
        } else {
            tracing::info!(folder_id = self.folder_id, %source, removed, "removed chunks");
        }
        Ok(removed)
    }

    /// Load, split, identify, embed and insert one file's chunks.
    async fn add(&self, relative_path: &str) -> Result<u64> {
        let source = source_key(self.root, relative_path);
        let mut chunks = self.load_chunks(relative_path, &source).await?;
        if chunks.is_empty() {
            return Ok(0);
        }

        for chunk in &mut chunks {
            if let Some(meta) = chunk.metadata.as_object_mut() {
                meta.insert("relative_path".into(), relative_path.into());
                meta.insert("folder_id".into(), self.folder_id.into());
            }
        }

        if self.pipeline.embedder.is_enabled() {
            self.attach_embeddings(&mut chunks, &source).await?;
        }

        self.index
            .insert(self.collection, &chunks)
            .await
            .map_err(|e| SyncError::index_op("insert", &source, e))?;
        tracing::info!(
            folder_id = self.folder_id,
            %source,
            chunks = chunks.len(),
            "indexed file"
        );
        Ok(chunks.len() as u64)
    }

    async fn load_chunks(&self, relative_path: &str, source: &str) -> Result<Vec<IndexChunk>> {
        let path: PathBuf = self.root.join(relative_path);
        let key = source.to_string();
        let loaded = tokio::task::spawn_blocking(move || load_document(&path, &key))
            .await
            .map_err(|e| SyncError::Interrupted(format!("load task: {}", e)))?;

        let pages = match loaded {
            Ok(Some(pages)) => pages,
            Ok(None) => {
                tracing::warn!(folder_id = self.folder_id, %source, "unsupported file type, not indexed");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!(folder_id = self.folder_id, %source, error = %e, "could not load document, not indexed");
                return Ok(Vec::new());
            }
        };

        Ok(assign_chunk_ids(self.pipeline.splitter.split(&pages)))
    }

    async fn attach_embeddings(&self, chunks: &mut [IndexChunk], source: &str) -> Result<()> {
        let embedder = self.pipeline.embedder;
        for batch in chunks.chunks_mut(self.pipeline.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = embedder
                .embed(&texts)
                .await
                .map_err(|e| SyncError::index_op("embed", source, e))?;

            if vectors.len() != batch.len() {
                return Err(SyncError::index_op(
                    "embed",
                    source,
                    anyhow::anyhow!("expected {} vectors, got {}", batch.len(), vectors.len()),
                ));
            }
            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                if vector.len() != embedder.dims() {
                    return Err(SyncError::index_op(
                        "embed",
                        source,
                        anyhow::anyhow!(
                            "model {} returned {}-dim vector, expected {}",
                            embedder.model_name(),
                            vector.len(),
                            embedder.dims()
                        ),
                    ));
                }
                chunk.embedding = Some(vector);
            }
        }
        Ok(())
    }
}
