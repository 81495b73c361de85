//! Core data models for folder snapshots and indexed chunks.
//!
//! A [`FolderManifest`] is the fingerprint of a folder: every eligible file
//! with its content digest, plus one folder-level digest folded over the
//! sorted `(relative_path, content_hash)` pairs. Manifests are compared by
//! the diff engine to produce a [`ChangeSet`]; the last committed manifest
//! lives on as a [`StoredSnapshot`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One fingerprinted file. Identity key is `relative_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name (last path component).
    pub name: String,
    /// Path relative to the folder root, always `/`-separated.
    pub relative_path: String,
    /// Hex SHA-256 of the file content.
    pub content_hash: String,
}

/// Fingerprint of a folder.
///
/// `files` is always sorted by `relative_path` (byte-wise) and
/// `folder_hash` is a pure function of that sorted list, so two manifests of
/// byte-identical trees compare equal regardless of enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderManifest {
    pub folder_hash: String,
    pub files: Vec<FileRecord>,
}

impl FolderManifest {
    /// Build a manifest from records in any order.
    ///
    /// Records are sorted canonically before the folder hash is folded.
    pub fn from_records(mut files: Vec<FileRecord>) -> Self {
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        let folder_hash = fold_folder_hash(&files);
        Self { folder_hash, files }
    }

    /// Manifest of a folder with no eligible files.
    pub fn empty() -> Self {
        Self::from_records(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Fold sorted `(relative_path, content_hash)` pairs into one digest.
///
/// Callers must pass records already sorted by `relative_path`.
fn fold_folder_hash(sorted: &[FileRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in sorted {
        hasher.update(record.relative_path.as_bytes());
        hasher.update(record.content_hash.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// The last committed manifest of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub folder_id: String,
    /// Identifier of the embedding/indexing configuration the index was
    /// built with.
    pub index_config: String,
    pub manifest: FolderManifest,
}

/// A file present in both manifests whose content changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedFile {
    pub name: String,
    pub relative_path: String,
    pub old_hash: String,
    pub new_hash: String,
}

/// Result of diffing a fresh manifest against the stored one.
///
/// Ephemeral: produced per reconciliation run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub folder_hash_changed: bool,
    pub current: FolderManifest,
    pub added: Vec<FileRecord>,
    pub removed: Vec<FileRecord>,
    pub modified: Vec<ModifiedFile>,
}

impl ChangeSet {
    /// Total number of files that require index work.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// A sub-file unit of content produced by a content splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUnit {
    /// Declared source of the unit. Expected to be an absolute,
    /// `/`-separated path; anything else degrades chunk identity.
    pub source_path: Option<String>,
    /// Page, slide or other unit number within the source.
    pub page: u32,
    pub content: String,
}

/// A chunk ready for insertion into an index store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexChunk {
    /// Stable identifier `<source>:<page>:<ordinal>`.
    pub id: String,
    /// Removal key: the source this chunk was produced from.
    pub source: String,
    pub page: u32,
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Option<Vec<f32>>,
}
