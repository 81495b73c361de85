use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = create_schema(&pool).await;
    pool.close().await;
    result
}

/// Create all tables and indexes. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watched_folders (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            profile TEXT NOT NULL,
            folder_hash TEXT,
            index_config TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS folder_files (
            folder_id TEXT NOT NULL,
            relative_path TEXT NOT NULL,
            name TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            PRIMARY KEY (folder_id, relative_path),
            FOREIGN KEY (folder_id) REFERENCES watched_folders(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_chunks (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            source TEXT NOT NULL,
            page INTEGER NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB,
            dims INTEGER,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_index_chunks_source ON index_chunks(collection, source)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
