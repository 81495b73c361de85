//! Manifest diffing.
//!
//! Compares a freshly fingerprinted [`FolderManifest`] against the manifest
//! stored by the last successful reconciliation and classifies every
//! relative path as added, removed, modified or unchanged.
//!
//! A missing stored manifest is not an error: it is treated as an empty
//! manifest whose folder hash matches nothing, so the first reconciliation of
//! a folder reports every current file as added and always commits, even for
//! an empty folder.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::diff::diff;
//! use docsync_core::models::{FileRecord, FolderManifest};
//!
//! let file = |hash: &str| FileRecord {
//!     name: "a.txt".into(),
//!     relative_path: "a.txt".into(),
//!     content_hash: hash.into(),
//! };
//! let stored = FolderManifest::from_records(vec![file("h1")]);
//! let current = FolderManifest::from_records(vec![file("h2")]);
//!
//! let changes = diff(current, Some(&stored));
//! assert!(changes.folder_hash_changed);
//! assert_eq!(changes.modified[0].old_hash, "h1");
//! assert_eq!(changes.modified[0].new_hash, "h2");
//! ```

use std::collections::BTreeMap;

use crate::models::{ChangeSet, FileRecord, FolderManifest, ModifiedFile};

/// Classify the differences between `current` and `stored`.
///
/// Output lists are ordered by relative path.
pub fn diff(current: FolderManifest, stored: Option<&FolderManifest>) -> ChangeSet {
    let folder_hash_changed = match stored {
        Some(s) => s.folder_hash != current.folder_hash,
        None => true,
    };

    let stored_map: BTreeMap<&str, &FileRecord> = stored
        .map(|s| {
            s.files
                .iter()
                .map(|f| (f.relative_path.as_str(), f))
                .collect()
        })
        .unwrap_or_default();
    let current_map: BTreeMap<&str, &FileRecord> = current
        .files
        .iter()
        .map(|f| (f.relative_path.as_str(), f))
        .collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for (path, file) in &current_map {
        match stored_map.get(path) {
            None => added.push((*file).clone()),
            Some(old) if old.content_hash != file.content_hash => modified.push(ModifiedFile {
                name: file.name.clone(),
                relative_path: file.relative_path.clone(),
                old_hash: old.content_hash.clone(),
                new_hash: file.content_hash.clone(),
            }),
            Some(_) => {}
        }
    }

    let removed = stored_map
        .iter()
        .filter(|(path, _)| !current_map.contains_key(*path))
        .map(|(_, file)| (*file).clone())
        .collect();

    ChangeSet {
        folder_hash_changed,
        current,
        added,
        removed,
        modified,
    }
}
