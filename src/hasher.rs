//! Streaming SHA-256 content digests.
//!
//! Files are read in fixed 8 KiB blocks so memory stays bounded for large
//! files. The algorithm must not change for the lifetime of any persisted
//! snapshot: every stored `content_hash` and `folder_hash` depends on it.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use docsync_core::SyncError;

const READ_BLOCK: usize = 8 * 1024;

/// Hex SHA-256 of the file at `path`, or `None` if it is not a regular file
/// or cannot be read.
///
/// Never fails: a file that disappears or becomes unreadable mid-walk is
/// skipped by the caller rather than aborting the whole fingerprint.
pub fn hash_file(path: &Path) -> Option<String> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "not a regular file, skipping");
        return None;
    }
    match digest_file(path) {
        Ok(hash) => Some(hash),
        Err(e) => {
            tracing::warn!(error = %e, "excluding file from manifest");
            None
        }
    }
}

fn digest_file(path: &Path) -> Result<String, SyncError> {
    let unreadable = |source| SyncError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_BLOCK];
    loop {
        let n = file.read(&mut buf).map_err(unreadable)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
