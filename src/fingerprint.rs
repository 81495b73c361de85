//! Folder fingerprinting.
//!
//! Walks a directory tree, drops excluded files, hashes the rest and folds
//! the results into a [`FolderManifest`]. Relative paths always use `/` so a
//! tree fingerprints identically on every platform, and records are sorted
//! before folding so walk order never affects the folder hash.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use docsync_core::models::{FileRecord, FolderManifest};
use docsync_core::{Result, SyncError};

use crate::exclude::should_exclude;
use crate::hasher::hash_file;

/// Resolve `folder` to an absolute directory path (without following
/// symlinks in the final path).
///
/// # Errors
///
/// [`SyncError::NotADirectory`] if the path does not resolve to a directory.
pub fn resolve_folder(folder: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(folder).map_err(|_| SyncError::NotADirectory {
        path: folder.to_path_buf(),
    })?;
    if !absolute.is_dir() {
        return Err(SyncError::NotADirectory { path: absolute });
    }
    Ok(absolute)
}

/// Fingerprint every eligible file under `folder`.
///
/// Unreadable files and entries that vanish mid-walk are skipped and logged;
/// only an invalid root fails the call.
pub fn fingerprint(folder: &Path) -> Result<FolderManifest> {
    let root = resolve_folder(folder)?;
    let mut records = Vec::new();

    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let (Some(name), Some(relative_path)) =
            (entry.file_name().to_str(), relative_posix(&root, path))
        else {
            tracing::warn!(path = %path.display(), "skipping file with non-UTF-8 name");
            continue;
        };
        if should_exclude(name, path) {
            continue;
        }

        let Some(content_hash) = hash_file(path) else {
            continue;
        };

        records.push(FileRecord {
            name: name.to_string(),
            relative_path,
            content_hash,
        });
    }

    let manifest = FolderManifest::from_records(records);
    tracing::debug!(
        folder = %root.display(),
        files = manifest.len(),
        folder_hash = %manifest.folder_hash,
        "fingerprinted folder"
    );
    Ok(manifest)
}

/// `path` relative to `root`, joined with `/` regardless of host separator.
/// `None` if any component is not valid UTF-8; a lossy conversion could
/// give two distinct files the same relative path.
fn relative_posix(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Absolute, `/`-separated path of a manifest entry. This is the source key
/// chunks of that file are stored and removed under.
pub fn source_key(root: &Path, relative_path: &str) -> String {
    let root = root.to_string_lossy().replace('\\', "/");
    format!("{}/{}", root.trim_end_matches('/'), relative_path)
}
