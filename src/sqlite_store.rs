//! SQLite-backed [`MetadataStore`] and [`IndexStore`].
//!
//! Both wrap a [`SqlitePool`] owned by the calling command. Snapshots live in
//! `watched_folders` (hash and index config) plus `folder_files` (one row
//! per file); chunks live in `index_chunks`, keyed by `(collection, id)`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use docsync_core::embedding::vec_to_blob;
use docsync_core::models::{FileRecord, FolderManifest, IndexChunk, StoredSnapshot};
use docsync_core::store::{IndexStore, MetadataStore};

/// SQLite implementation of [`MetadataStore`].
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn load_snapshot(&self, folder_id: &str) -> Result<Option<StoredSnapshot>> {
        let row = sqlx::query(
            "SELECT folder_hash, index_config FROM watched_folders WHERE id = ?",
        )
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let folder_hash: Option<String> = row.get("folder_hash");
        let index_config: Option<String> = row.get("index_config");
        let (Some(folder_hash), Some(index_config)) = (folder_hash, index_config) else {
            return Ok(None);
        };

        let files = sqlx::query(
            "SELECT name, relative_path, content_hash FROM folder_files WHERE folder_id = ? ORDER BY relative_path",
        )
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| FileRecord {
            name: r.get("name"),
            relative_path: r.get("relative_path"),
            content_hash: r.get("content_hash"),
        })
        .collect();

        Ok(Some(StoredSnapshot {
            folder_id: folder_id.to_string(),
            index_config,
            manifest: FolderManifest { folder_hash, files },
        }))
    }

    async fn commit_snapshot(&self, snapshot: &StoredSnapshot) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE watched_folders SET folder_hash = ?, index_config = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&snapshot.manifest.folder_hash)
        .bind(&snapshot.index_config)
        .bind(now)
        .bind(&snapshot.folder_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            bail!("folder '{}' is not registered", snapshot.folder_id);
        }

        sqlx::query("DELETE FROM folder_files WHERE folder_id = ?")
            .bind(&snapshot.folder_id)
            .execute(&mut *tx)
            .await?;

        for file in &snapshot.manifest.files {
            sqlx::query(
                "INSERT INTO folder_files (folder_id, relative_path, name, content_hash) VALUES (?, ?, ?, ?)",
            )
            .bind(&snapshot.folder_id)
            .bind(&file.relative_path)
            .bind(&file.name)
            .bind(&file.content_hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_snapshot(&self, folder_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM folder_files WHERE folder_id = ?")
            .bind(folder_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE watched_folders SET folder_hash = NULL, index_config = NULL WHERE id = ?",
        )
        .bind(folder_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

/// SQLite implementation of [`IndexStore`].
pub struct SqliteIndexStore {
    pool: SqlitePool,
}

impl SqliteIndexStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn remove_by_source(&self, collection: &str, source: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM index_chunks WHERE collection = ? AND source = ?")
            .bind(collection)
            .bind(source)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, collection: &str, chunks: &[IndexChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            let blob = chunk.embedding.as_deref().map(vec_to_blob);
            let dims = chunk.embedding.as_ref().map(|v| v.len() as i64);
            sqlx::query(
                r#"
                INSERT INTO index_chunks (collection, id, source, page, content, metadata_json, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(collection)
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(chunk.page as i64)
            .bind(&chunk.content)
            .bind(chunk.metadata.to_string())
            .bind(blob)
            .bind(dims)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_chunks WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn drop_collection(&self, collection: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM index_chunks WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
