//! Static exclusion rules for fingerprinting.
//!
//! Platform metadata, hidden files, editor temp files and lock files never
//! participate in a manifest. The rules are compiled in: changing them
//! changes the folder hash of every folder that contains a matching file.

use std::path::Path;

/// Exact file names that are always excluded.
const EXCLUDED_NAMES: [&str; 3] = [".DS_Store", "Thumbs.db", "desktop.ini"];

/// File name prefixes: Office lock/temp files and hidden files.
const EXCLUDED_PREFIXES: [&str; 2] = ["~$", "."];

/// Extensions (compared case-insensitively, without the dot).
const EXCLUDED_EXTENSIONS: [&str; 2] = ["tmp", "lock"];

/// Whether a file should be left out of the manifest.
///
/// Rules, any match excludes: exact name, name prefix, then extension.
pub fn should_exclude(file_name: &str, full_path: &Path) -> bool {
    if EXCLUDED_NAMES.contains(&file_name) {
        return true;
    }
    if EXCLUDED_PREFIXES.iter().any(|p| file_name.starts_with(p)) {
        return true;
    }
    full_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            EXCLUDED_EXTENSIONS
                .iter()
                .any(|x| ext.eq_ignore_ascii_case(x))
        })
        .unwrap_or(false)
}
