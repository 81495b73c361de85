//! `docsync folder add|list|update|remove`.

use anyhow::Result;
use serde::Serialize;
use docsync_core::store::IndexStore;
use docsync_core::SyncError;
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::fingerprint::resolve_folder;
use crate::folders::{self, WatchedFolder};
use crate::reconcile::{Reconciler, Stores};
use crate::sqlite_store::{SqliteIndexStore, SqliteMetadataStore};

/// Register a folder. The profile must resolve before anything is written.
pub async fn run_folder_add(
    config: &Config,
    id: &str,
    path: &Path,
    profile: Option<&str>,
) -> Result<()> {
    let profile = profile.unwrap_or_else(|| config.embedding.default_profile_name());
    config.embedding.resolve(profile)?;

    let pool = db::connect(config).await?;
    let result = folders::register_folder(&pool, id, path, profile).await;
    pool.close().await;
    let folder = result?;

    println!("folder add");
    println!("  id: {}", folder.id);
    println!("  path: {}", folder.path.display());
    println!("  profile: {}", folder.profile);
    Ok(())
}

/// One `folder list --json` entry.
#[derive(Serialize)]
struct FolderListing<'a> {
    #[serde(flatten)]
    folder: &'a WatchedFolder,
    chunks: u64,
}

pub async fn run_folder_list(config: &Config, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = list_with_counts(&pool).await;
    pool.close().await;
    let rows = result?;

    if json {
        let listing: Vec<_> = rows
            .iter()
            .map(|(folder, chunks)| FolderListing {
                folder,
                chunks: *chunks,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No folders registered.");
        return Ok(());
    }

    println!(
        "{:<16} {:<12} {:>6} {:>7} {:<14} PATH",
        "ID", "PROFILE", "FILES", "CHUNKS", "HASH"
    );
    for (folder, chunks) in rows {
        let hash = folder
            .folder_hash
            .as_deref()
            .map(|h| h.chars().take(12).collect::<String>())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<12} {:>6} {:>7} {:<14} {}",
            folder.id,
            folder.profile,
            folder.file_count,
            chunks,
            hash,
            folder.path.display()
        );
    }
    Ok(())
}

async fn list_with_counts(pool: &SqlitePool) -> Result<Vec<(WatchedFolder, u64)>> {
    let index = SqliteIndexStore::new(pool.clone());
    let mut out = Vec::new();
    for folder in folders::list_folders(pool).await? {
        let chunks = index.count(&folder.id).await?;
        out.push((folder, chunks));
    }
    Ok(out)
}

/// Change a folder's path and/or profile.
///
/// A new path invalidates everything indexed under the old one, so the
/// collection and snapshot are dropped and the next reconcile indexes the
/// folder from scratch. A new profile needs nothing here: the next reconcile
/// sees a different index configuration and rebuilds.
pub async fn run_folder_update(
    config: &Config,
    id: &str,
    path: Option<&Path>,
    profile: Option<&str>,
) -> Result<()> {
    if let Some(profile) = profile {
        config.embedding.resolve(profile)?;
    }

    let pool = db::connect(config).await?;
    let result = update(config, &pool, id, path, profile).await;
    pool.close().await;
    let (folder, dropped) = result?;

    println!("folder update");
    println!("  id: {}", folder.id);
    println!("  path: {}", folder.path.display());
    println!("  profile: {}", folder.profile);
    if let Some(dropped) = dropped {
        println!("  chunks dropped: {}", dropped);
    }
    Ok(())
}

async fn update(
    config: &Config,
    pool: &SqlitePool,
    id: &str,
    path: Option<&Path>,
    profile: Option<&str>,
) -> Result<(WatchedFolder, Option<u64>)> {
    let current = folders::get_folder(pool, id)
        .await?
        .ok_or_else(|| SyncError::FolderNotRegistered(id.to_string()))?;
    let new_root = path.map(resolve_folder).transpose()?;

    match new_root {
        Some(root) if root != current.path => {
            let index = SqliteIndexStore::new(pool.clone());
            let metadata = SqliteMetadataStore::new(pool.clone());
            let stores = Stores {
                index: &index,
                metadata: &metadata,
            };
            let (dropped, folder) = Reconciler::with_lock_dir(db::lock_dir(config))
                .drop_index_then(id, stores, || {
                    folders::update_folder(pool, id, Some(root.as_path()), profile)
                })
                .await?;
            Ok((folder, Some(dropped)))
        }
        _ => {
            let folder = folders::update_folder(pool, id, path, profile).await?;
            Ok((folder, None))
        }
    }
}

/// Tear down the folder's index and snapshot, then drop the registration.
pub async fn run_folder_remove(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = remove(config, &pool, id).await;
    pool.close().await;
    let dropped = result?;

    println!("folder remove");
    println!("  id: {}", id);
    println!("  chunks dropped: {}", dropped);
    Ok(())
}

async fn remove(config: &Config, pool: &SqlitePool, id: &str) -> Result<u64> {
    if folders::get_folder(pool, id).await?.is_none() {
        return Err(SyncError::FolderNotRegistered(id.to_string()).into());
    }

    let index = SqliteIndexStore::new(pool.clone());
    let metadata = SqliteMetadataStore::new(pool.clone());
    let stores = Stores {
        index: &index,
        metadata: &metadata,
    };
    let (dropped, _) = Reconciler::with_lock_dir(db::lock_dir(config))
        .drop_index_then(id, stores, || folders::deregister_folder(pool, id))
        .await?;
    Ok(dropped)
}
