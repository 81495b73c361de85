//! Error taxonomy for fingerprinting and reconciliation.
//!
//! Per-file problems ([`SyncError::UnreadableFile`]) are recovered locally by
//! the fingerprinter and only ever appear in logs. Every other variant aborts
//! the operation that raised it and is surfaced to the caller, which owns the
//! retry policy. Use [`SyncError::is_retryable`] to decide whether re-running
//! the whole `reconcile` call is expected to help.

use std::path::PathBuf;

/// Result alias used throughout the engine.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The folder path does not resolve to a directory.
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// A single file could not be opened or read.
    #[error("unreadable file {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A remove or insert against the index store failed. The stored
    /// snapshot was not touched; retrying the run is safe.
    #[error("index operation failed ({operation} {target}): {source}")]
    IndexOperationFailed {
        operation: &'static str,
        target: String,
        #[source]
        source: anyhow::Error,
    },

    /// The index was updated but the snapshot commit failed. The index may
    /// now be ahead of the stored snapshot.
    #[error("snapshot commit failed for folder '{folder_id}', index and snapshot may disagree: {source}")]
    MetadataCommitFailed {
        folder_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// The embedding/indexing configuration could not be resolved.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Another reconciliation of the same folder is already running.
    #[error("reconciliation already in progress for folder '{0}'")]
    ReconcileInProgress(String),

    #[error("folder '{0}' is not registered")]
    FolderNotRegistered(String),

    /// A background task of the run (fingerprinting, document loading) was
    /// cancelled or panicked. Nothing was committed.
    #[error("reconciliation interrupted: {0}")]
    Interrupted(String),

    /// Metadata store read failure (loading the previous snapshot, or
    /// tearing down registration state).
    #[error("metadata store error: {0}")]
    Metadata(#[source] anyhow::Error),
}

impl SyncError {
    pub fn index_op(operation: &'static str, target: impl Into<String>, source: anyhow::Error) -> Self {
        SyncError::IndexOperationFailed {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Whether re-running the whole operation is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::IndexOperationFailed { .. }
                | SyncError::ReconcileInProgress(_)
                | SyncError::Interrupted(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let idx = SyncError::index_op("insert", "a.txt", anyhow::anyhow!("boom"));
        assert!(idx.is_retryable());
        assert!(SyncError::ReconcileInProgress("docs".into()).is_retryable());

        let commit = SyncError::MetadataCommitFailed {
            folder_id: "docs".into(),
            source: anyhow::anyhow!("disk full"),
        };
        assert!(!commit.is_retryable());
        assert!(!SyncError::ConfigurationMissing("profile 'x'".into()).is_retryable());
        assert!(!SyncError::NotADirectory { path: "/nope".into() }.is_retryable());
    }

    #[test]
    fn messages_name_the_target() {
        let err = SyncError::index_op("remove", "/docs/a.txt", anyhow::anyhow!("locked"));
        let msg = err.to_string();
        assert!(msg.contains("remove"));
        assert!(msg.contains("/docs/a.txt"));
        assert!(msg.contains("locked"));
    }
}
