//! `docsync fingerprint` and `docsync reconcile`.

use anyhow::Result;
use docsync_core::chunk::RecursiveSplitter;
use docsync_core::SyncError;
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::{index_config_key, Config};
use crate::db;
use crate::embedding::create_provider;
use crate::fingerprint::{fingerprint, resolve_folder};
use crate::folders;
use crate::reconcile::{IndexPipeline, ReconcileOptions, ReconcileReport, Reconciler, Stores};
use crate::sqlite_store::{SqliteIndexStore, SqliteMetadataStore};

/// Print the manifest of `path`. Touches neither store.
pub fn run_fingerprint(path: &Path, json: bool) -> Result<()> {
    let root = resolve_folder(path)?;
    let manifest = fingerprint(&root)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!("fingerprint {}", root.display());
    println!("  folder_hash: {}", manifest.folder_hash);
    println!("  files: {}", manifest.len());
    for file in &manifest.files {
        println!("  {}  {}", file.content_hash, file.relative_path);
    }
    Ok(())
}

/// Reconcile a registered folder. `profile` overrides the registered
/// profile for this run only.
pub async fn run_reconcile(
    config: &Config,
    id: &str,
    profile: Option<&str>,
    options: ReconcileOptions,
    json: bool,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = reconcile(config, &pool, id, profile, options).await;
    pool.close().await;
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn reconcile(
    config: &Config,
    pool: &SqlitePool,
    id: &str,
    profile: Option<&str>,
    options: ReconcileOptions,
) -> Result<ReconcileReport> {
    let folder = folders::get_folder(pool, id)
        .await?
        .ok_or_else(|| SyncError::FolderNotRegistered(id.to_string()))?;

    let profile_name = profile.unwrap_or(&folder.profile);
    let profile = config.embedding.resolve(profile_name)?;
    let index_config = index_config_key(profile_name, &profile, &config.chunking);
    let embedder = create_provider(&profile)?;
    let splitter = RecursiveSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap);

    let index = SqliteIndexStore::new(pool.clone());
    let metadata = SqliteMetadataStore::new(pool.clone());
    let stores = Stores {
        index: &index,
        metadata: &metadata,
    };
    let pipeline = IndexPipeline {
        splitter: &splitter,
        embedder: embedder.as_ref(),
        batch_size: profile.batch_size,
    };

    let report = Reconciler::with_lock_dir(db::lock_dir(config))
        .reconcile(id, &folder.path, &index_config, options, stores, pipeline)
        .await?;
    Ok(report)
}

fn print_report(report: &ReconcileReport) {
    let changes = &report.changes;
    if report.dry_run {
        println!("reconcile {} (dry-run)", report.folder_id);
    } else {
        println!("reconcile {}", report.folder_id);
    }
    println!("  folder_hash: {}", changes.current.folder_hash);
    println!("  changed: {}", changes.folder_hash_changed);
    println!("  added: {}", changes.added.len());
    println!("  removed: {}", changes.removed.len());
    println!("  modified: {}", changes.modified.len());

    if report.dry_run {
        for file in &changes.added {
            println!("  + {}", file.relative_path);
        }
        for file in &changes.removed {
            println!("  - {}", file.relative_path);
        }
        for file in &changes.modified {
            println!("  ~ {}", file.relative_path);
        }
        return;
    }

    println!("  chunks removed: {}", report.chunks_removed);
    println!("  chunks inserted: {}", report.chunks_inserted);
    if report.rebuilt {
        println!("  rebuilt: true");
    }
}
