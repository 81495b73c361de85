//! Watched-folder registration.
//!
//! A watched folder is a named directory plus the embedding profile its
//! index is built with. Registration only records the folder; its snapshot
//! appears after the first successful reconciliation.

use anyhow::{bail, Result};
use docsync_core::SyncError;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

use crate::fingerprint::resolve_folder;

/// A registered folder as stored in `watched_folders`.
#[derive(Debug, Clone, Serialize)]
pub struct WatchedFolder {
    pub id: String,
    pub path: PathBuf,
    pub profile: String,
    /// Hash of the last committed snapshot, if any.
    pub folder_hash: Option<String>,
    /// Profile the committed snapshot was indexed with.
    pub index_config: Option<String>,
    pub file_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Register `path` under `id`.
///
/// The path is resolved to an absolute directory first; ids must be unique.
pub async fn register_folder(
    pool: &SqlitePool,
    id: &str,
    path: &Path,
    profile: &str,
) -> Result<WatchedFolder> {
    if id.trim().is_empty() {
        bail!("folder id must not be empty");
    }
    let root = resolve_folder(path)?;

    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM watched_folders WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if exists {
        bail!("folder '{}' is already registered", id);
    }

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO watched_folders (id, path, profile, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(root.to_string_lossy().to_string())
    .bind(profile)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(folder_id = id, path = %root.display(), profile, "registered folder");

    Ok(WatchedFolder {
        id: id.to_string(),
        path: root,
        profile: profile.to_string(),
        folder_hash: None,
        index_config: None,
        file_count: 0,
        created_at: now,
        updated_at: now,
    })
}

const SELECT_FOLDERS: &str = r#"
    SELECT w.id, w.path, w.profile, w.folder_hash, w.index_config, w.created_at, w.updated_at,
           (SELECT COUNT(*) FROM folder_files f WHERE f.folder_id = w.id) AS file_count
    FROM watched_folders w
"#;

fn row_to_folder(row: &sqlx::sqlite::SqliteRow) -> WatchedFolder {
    let path: String = row.get("path");
    WatchedFolder {
        id: row.get("id"),
        path: PathBuf::from(path),
        profile: row.get("profile"),
        folder_hash: row.get("folder_hash"),
        index_config: row.get("index_config"),
        file_count: row.get("file_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn get_folder(pool: &SqlitePool, id: &str) -> Result<Option<WatchedFolder>> {
    let row = sqlx::query(&format!("{} WHERE w.id = ?", SELECT_FOLDERS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_folder))
}

pub async fn list_folders(pool: &SqlitePool) -> Result<Vec<WatchedFolder>> {
    let rows = sqlx::query(&format!("{} ORDER BY w.id", SELECT_FOLDERS))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_folder).collect())
}

/// Change a folder's path and/or profile. A new path is resolved the same
/// way as at registration. The caller is responsible for the folder's index:
/// chunks indexed under the old path are not touched here.
pub async fn update_folder(
    pool: &SqlitePool,
    id: &str,
    path: Option<&Path>,
    profile: Option<&str>,
) -> Result<WatchedFolder> {
    if path.is_none() && profile.is_none() {
        bail!("nothing to update: pass --path and/or --profile");
    }
    let root = path.map(resolve_folder).transpose()?;

    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        r#"
        UPDATE watched_folders
        SET path = COALESCE(?, path), profile = COALESCE(?, profile), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(root.as_ref().map(|r| r.to_string_lossy().to_string()))
    .bind(profile)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SyncError::FolderNotRegistered(id.to_string()).into());
    }

    tracing::info!(folder_id = id, path = ?root, profile, "updated folder");

    match get_folder(pool, id).await? {
        Some(folder) => Ok(folder),
        None => Err(SyncError::FolderNotRegistered(id.to_string()).into()),
    }
}

/// Delete the registration row (file rows cascade). Returns whether a row
/// was removed.
pub async fn deregister_folder(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM watched_folders WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
