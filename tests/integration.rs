use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const EMPTY_FOLDER_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

fn docsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docsync");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("notes")).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.",
    )
    .unwrap();
    fs::write(
        files_dir.join("notes").join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/docsync.sqlite"

[chunking]
chunk_size = 800
chunk_overlap = 80
"#,
        root.display()
    );

    let config_path = config_dir.join("docsync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("DOCSYNC_LOG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// init + register `files/` as `handbook`.
fn setup_registered() -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env();
    let files = tmp.path().join("files");
    let (_, stderr, ok) = run_docsync(&config_path, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    let (_, stderr, ok) = run_docsync(
        &config_path,
        &["folder", "add", "handbook", files.to_str().unwrap()],
    );
    assert!(ok, "folder add failed: {}", stderr);
    (tmp, config_path)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docsync(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/docsync.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_docsync(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_docsync(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_fingerprint_empty_folder() {
    let (tmp, config_path) = setup_test_env();
    let empty = tmp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let (stdout, stderr, success) =
        run_docsync(&config_path, &["fingerprint", empty.to_str().unwrap()]);
    assert!(success, "fingerprint failed: {}", stderr);
    assert!(stdout.contains(EMPTY_FOLDER_HASH), "got: {}", stdout);
    assert!(stdout.contains("files: 0"));
}

#[test]
fn test_fingerprint_identical_copies_match() {
    let (tmp, config_path) = setup_test_env();
    let a = tmp.path().join("copy_a");
    let b = tmp.path().join("copy_b");
    for dir in [&a, &b] {
        fs::create_dir_all(dir.join("sub")).unwrap();
    }
    // Different creation order on each side.
    fs::write(a.join("one.txt"), "1").unwrap();
    fs::write(a.join("sub/two.txt"), "2").unwrap();
    fs::write(b.join("sub/two.txt"), "2").unwrap();
    fs::write(b.join("one.txt"), "1").unwrap();

    let (out_a, _, ok_a) =
        run_docsync(&config_path, &["fingerprint", "--json", a.to_str().unwrap()]);
    let (out_b, _, ok_b) =
        run_docsync(&config_path, &["fingerprint", "--json", b.to_str().unwrap()]);
    assert!(ok_a && ok_b);

    let ja: serde_json::Value = serde_json::from_str(&out_a).unwrap();
    let jb: serde_json::Value = serde_json::from_str(&out_b).unwrap();
    assert_eq!(ja["folder_hash"], jb["folder_hash"]);
    assert_eq!(ja["files"][1]["relative_path"], "sub/two.txt");
}

#[test]
fn test_fingerprint_skips_excluded_files() {
    let (tmp, config_path) = setup_test_env();
    let files = tmp.path().join("files");
    fs::write(files.join(".DS_Store"), "x").unwrap();
    fs::write(files.join("~$draft.docx"), "x").unwrap();
    fs::write(files.join("build.lock"), "x").unwrap();

    let (stdout, _, success) =
        run_docsync(&config_path, &["fingerprint", files.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("files: 3"), "got: {}", stdout);
    assert!(!stdout.contains(".DS_Store"));
    assert!(!stdout.contains("build.lock"));
}

#[test]
fn test_fingerprint_not_a_directory() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("missing");

    let (_, stderr, success) =
        run_docsync(&config_path, &["fingerprint", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("not a directory"), "got: {}", stderr);
}

#[test]
fn test_folder_add_and_list() {
    let (_tmp, config_path) = setup_registered();

    let (stdout, _, success) = run_docsync(&config_path, &["folder", "list"]);
    assert!(success);
    assert!(stdout.contains("handbook"));
    assert!(stdout.contains("disabled"));
}

#[test]
fn test_folder_add_rejects_duplicates_and_bad_input() {
    let (tmp, config_path) = setup_registered();
    let files = tmp.path().join("files");

    let (_, stderr, success) = run_docsync(
        &config_path,
        &["folder", "add", "handbook", files.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("already registered"), "got: {}", stderr);

    let missing = tmp.path().join("missing");
    let (_, _, success) = run_docsync(
        &config_path,
        &["folder", "add", "other", missing.to_str().unwrap()],
    );
    assert!(!success);

    let (_, stderr, success) = run_docsync(
        &config_path,
        &["folder", "add", "other", files.to_str().unwrap(), "--profile", "nope"],
    );
    assert!(!success);
    assert!(stderr.contains("configuration missing"), "got: {}", stderr);
}

#[test]
fn test_reconcile_first_run_indexes_all() {
    let (_tmp, config_path) = setup_registered();

    let (stdout, stderr, success) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(success, "reconcile failed: {}", stderr);
    assert!(stdout.contains("changed: true"));
    assert!(stdout.contains("added: 3"));
    assert!(stdout.contains("chunks inserted: 3"));

    let (stdout, _, _) = run_docsync(&config_path, &["folder", "list"]);
    assert!(stdout.contains("      3       3"), "got: {}", stdout);
}

#[test]
fn test_reconcile_unchanged_is_noop() {
    let (_tmp, config_path) = setup_registered();
    run_docsync(&config_path, &["reconcile", "handbook"]);

    let (stdout, _, success) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(success);
    assert!(stdout.contains("changed: false"), "got: {}", stdout);
    assert!(stdout.contains("chunks inserted: 0"));
}

#[test]
fn test_reconcile_modify_and_remove() {
    let (tmp, config_path) = setup_registered();
    run_docsync(&config_path, &["reconcile", "handbook"]);

    let files = tmp.path().join("files");
    fs::write(files.join("alpha.md"), "# Alpha Document Updated\n\nThis file was modified.").unwrap();
    fs::remove_file(files.join("notes/gamma.txt")).unwrap();

    let (stdout, stderr, success) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(success, "reconcile failed: {}", stderr);
    assert!(stdout.contains("modified: 1"), "got: {}", stdout);
    assert!(stdout.contains("removed: 1"));
    assert!(stdout.contains("added: 0"));
    assert!(stdout.contains("chunks removed: 2"));
    assert!(stdout.contains("chunks inserted: 1"));

    let (stdout, _, _) = run_docsync(&config_path, &["folder", "list"]);
    assert!(stdout.contains("      2       2"), "got: {}", stdout);
}

#[test]
fn test_reconcile_dry_run_changes_nothing() {
    let (_tmp, config_path) = setup_registered();

    let (stdout, _, success) =
        run_docsync(&config_path, &["reconcile", "handbook", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("+ alpha.md"));
    assert!(stdout.contains("+ notes/gamma.txt"));

    // The real run still sees every file as new.
    let (stdout, _, _) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(stdout.contains("added: 3"));
}

#[test]
fn test_reconcile_full_rebuilds() {
    let (_tmp, config_path) = setup_registered();
    run_docsync(&config_path, &["reconcile", "handbook"]);

    let (stdout, _, success) = run_docsync(&config_path, &["reconcile", "handbook", "--full"]);
    assert!(success);
    assert!(stdout.contains("rebuilt: true"));
    assert!(stdout.contains("chunks removed: 3"));
    assert!(stdout.contains("chunks inserted: 3"));
}

#[test]
fn test_reconcile_unknown_folder() {
    let (_tmp, config_path) = setup_registered();

    let (_, stderr, success) = run_docsync(&config_path, &["reconcile", "nope"]);
    assert!(!success);
    assert!(stderr.contains("not registered"), "got: {}", stderr);
}

#[test]
fn test_folder_remove_drops_index() {
    let (_tmp, config_path) = setup_registered();
    run_docsync(&config_path, &["reconcile", "handbook"]);

    let (stdout, stderr, success) = run_docsync(&config_path, &["folder", "remove", "handbook"]);
    assert!(success, "remove failed: {}", stderr);
    assert!(stdout.contains("chunks dropped: 3"));

    let (stdout, _, _) = run_docsync(&config_path, &["folder", "list"]);
    assert!(stdout.contains("No folders registered."));

    let (_, _, success) = run_docsync(&config_path, &["folder", "remove", "handbook"]);
    assert!(!success);
}

#[test]
fn test_reconcile_rejected_while_folder_locked_elsewhere() {
    use fs2::FileExt;

    let (tmp, config_path) = setup_registered();
    let lock_dir = tmp.path().join("data/docsync.sqlite.locks");
    fs::create_dir_all(&lock_dir).unwrap();

    // Another process holding the folder's lock.
    let held = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(docsync::reconcile::lock_path(&lock_dir, "handbook"))
        .unwrap();
    held.try_lock_exclusive().unwrap();

    let (_, stderr, success) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(!success);
    assert!(stderr.contains("already in progress"), "got: {}", stderr);

    let (_, stderr, success) = run_docsync(&config_path, &["folder", "remove", "handbook"]);
    assert!(!success);
    assert!(stderr.contains("already in progress"), "got: {}", stderr);

    // Nothing was indexed or deregistered.
    let (stdout, _, _) = run_docsync(&config_path, &["folder", "list"]);
    assert!(stdout.contains("handbook"));
    assert!(stdout.contains("      0       0"), "got: {}", stdout);

    held.unlock().unwrap();
    let (stdout, stderr, success) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(success, "reconcile failed: {}", stderr);
    assert!(stdout.contains("added: 3"));
}

#[test]
fn test_reconcile_json_report() {
    let (_tmp, config_path) = setup_registered();

    let (stdout, stderr, success) =
        run_docsync(&config_path, &["reconcile", "handbook", "--json"]);
    assert!(success, "reconcile failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["folder_id"], "handbook");
    assert_eq!(report["chunks_inserted"], 3);
    assert_eq!(report["rebuilt"], false);
    assert_eq!(report["dry_run"], false);
    assert_eq!(report["changes"]["added"].as_array().unwrap().len(), 3);
    assert_eq!(report["changes"]["folder_hash_changed"], true);
}

#[test]
fn test_folder_list_json() {
    let (_tmp, config_path) = setup_registered();
    run_docsync(&config_path, &["reconcile", "handbook"]);

    let (stdout, _, success) = run_docsync(&config_path, &["folder", "list", "--json"]);
    assert!(success);
    let folders: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let folders = folders.as_array().unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0]["id"], "handbook");
    assert_eq!(folders[0]["profile"], "disabled");
    assert_eq!(folders[0]["file_count"], 3);
    assert_eq!(folders[0]["chunks"], 3);
    assert!(folders[0]["index_config"]
        .as_str()
        .unwrap()
        .starts_with("disabled@"));
}

#[test]
fn test_folder_update_path_reindexes_from_scratch() {
    let (tmp, config_path) = setup_registered();
    run_docsync(&config_path, &["reconcile", "handbook"]);

    let moved = tmp.path().join("moved");
    fs::create_dir_all(&moved).unwrap();
    fs::write(moved.join("one.md"), "# One\n\nFirst file in the new location.").unwrap();
    fs::write(moved.join("two.md"), "# Two\n\nSecond file in the new location.").unwrap();

    let (stdout, stderr, success) = run_docsync(
        &config_path,
        &["folder", "update", "handbook", "--path", moved.to_str().unwrap()],
    );
    assert!(success, "update failed: {}", stderr);
    assert!(stdout.contains("chunks dropped: 3"), "got: {}", stdout);

    let (stdout, _, _) = run_docsync(&config_path, &["folder", "list"]);
    assert!(stdout.contains("      0       0"), "got: {}", stdout);
    assert!(stdout.contains("moved"));

    let (stdout, stderr, success) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(success, "reconcile failed: {}", stderr);
    assert!(stdout.contains("added: 2"), "got: {}", stdout);
    assert!(stdout.contains("removed: 0"));
    assert!(stdout.contains("chunks inserted: 2"));

    let (stdout, _, _) = run_docsync(&config_path, &["folder", "list"]);
    assert!(stdout.contains("      2       2"), "got: {}", stdout);
}

#[test]
fn test_folder_update_profile_rebuilds_on_next_reconcile() {
    let (_tmp, config_path) = setup_registered();
    let mut config = fs::read_to_string(&config_path).unwrap();
    config.push_str("\n[embedding.profiles.plain]\nprovider = \"disabled\"\n");
    fs::write(&config_path, config).unwrap();
    run_docsync(&config_path, &["reconcile", "handbook"]);

    let (stdout, stderr, success) = run_docsync(
        &config_path,
        &["folder", "update", "handbook", "--profile", "plain"],
    );
    assert!(success, "update failed: {}", stderr);
    assert!(stdout.contains("profile: plain"));
    assert!(!stdout.contains("chunks dropped"));

    let (stdout, _, success) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(success);
    assert!(stdout.contains("rebuilt: true"), "got: {}", stdout);
    assert!(stdout.contains("chunks removed: 3"));
    assert!(stdout.contains("chunks inserted: 3"));

    let (stdout, _, _) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(stdout.contains("changed: false"), "got: {}", stdout);
}

#[test]
fn test_folder_update_rejects_bad_input() {
    let (tmp, config_path) = setup_registered();

    let (_, stderr, success) = run_docsync(&config_path, &["folder", "update", "handbook"]);
    assert!(!success);
    assert!(stderr.contains("nothing to update"), "got: {}", stderr);

    let (_, stderr, success) = run_docsync(
        &config_path,
        &["folder", "update", "ghost", "--profile", "disabled"],
    );
    assert!(!success);
    assert!(stderr.contains("not registered"), "got: {}", stderr);

    let (_, stderr, success) = run_docsync(
        &config_path,
        &["folder", "update", "handbook", "--profile", "nope"],
    );
    assert!(!success);
    assert!(stderr.contains("configuration missing"), "got: {}", stderr);

    let missing = tmp.path().join("missing");
    let (_, _, success) = run_docsync(
        &config_path,
        &["folder", "update", "handbook", "--path", missing.to_str().unwrap()],
    );
    assert!(!success);
}

#[test]
fn test_chunking_change_rebuilds_index() {
    let (_tmp, config_path) = setup_registered();
    run_docsync(&config_path, &["reconcile", "handbook"]);

    let config = fs::read_to_string(&config_path)
        .unwrap()
        .replace("chunk_size = 800", "chunk_size = 400");
    fs::write(&config_path, config).unwrap();

    let (stdout, stderr, success) = run_docsync(&config_path, &["reconcile", "handbook"]);
    assert!(success, "reconcile failed: {}", stderr);
    assert!(stdout.contains("rebuilt: true"), "got: {}", stdout);
    assert!(stdout.contains("added: 3"));
    assert!(stdout.contains("chunks removed: 3"));
}
