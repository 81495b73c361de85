//! # docsync CLI
//!
//! Registers watched folders and reconciles their index against the files on
//! disk.
//!
//! ## Usage
//!
//! ```bash
//! docsync --config ./config/docsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync init` | Create the SQLite database and schema |
//! | `docsync fingerprint <path>` | Print a folder's manifest and hash |
//! | `docsync folder add <id> <path>` | Register a folder |
//! | `docsync folder list [--json]` | List folders with file and chunk counts |
//! | `docsync folder update <id> [--path P] [--profile P]` | Move a folder or change its profile |
//! | `docsync folder remove <id>` | Drop a folder's index and registration |
//! | `docsync reconcile <id> [--json]` | Bring a folder's index up to date |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docsync::reconcile::ReconcileOptions;
use docsync::{config, folder_cmd, logging, migrate, reconcile_cmd};

/// docsync: incremental folder indexing.
///
/// Commands that touch the database read `--config`. See
/// `config/docsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docsync",
    about = "Content-addressable folder fingerprinting and incremental index reconciliation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsync.toml")]
    config: PathBuf,

    /// Debug-level logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only on stderr.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Fingerprint a folder and print its manifest.
    ///
    /// Does not read the configuration or touch the database.
    Fingerprint {
        path: PathBuf,

        /// Print the manifest as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage watched folders.
    Folder {
        #[command(subcommand)]
        action: FolderAction,
    },

    /// Reconcile a watched folder's index with its files.
    ///
    /// Only added, removed and modified files are processed. The stored
    /// snapshot is committed after every index operation has succeeded.
    Reconcile {
        /// Folder id.
        id: String,

        /// Embedding profile for this run (defaults to the registered one).
        /// A profile different from the last run's rebuilds the index.
        #[arg(long)]
        profile: Option<String>,

        /// Drop the index and re-process every file.
        #[arg(long)]
        full: bool,

        /// Show what would change without touching the index or snapshot.
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FolderAction {
    /// Register a directory under an id.
    Add {
        id: String,
        path: PathBuf,

        /// Embedding profile (defaults to `[embedding].default_profile`).
        #[arg(long)]
        profile: Option<String>,
    },
    /// List registered folders.
    List {
        /// Print the folders as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Change a folder's path or profile.
    ///
    /// A new path drops the folder's index; the next reconcile re-indexes
    /// it. A new profile takes effect (as a rebuild) on the next reconcile.
    Update {
        id: String,

        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long)]
        profile: Option<String>,
    },
    /// Drop the folder's index and snapshot, then deregister it.
    Remove { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(logging::Verbosity::from_flags(cli.verbose, cli.quiet));

    // Fingerprinting needs no config
    if let Commands::Fingerprint { path, json } = &cli.command {
        return reconcile_cmd::run_fingerprint(path, *json);
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Fingerprint { .. } => unreachable!(),
        Commands::Folder { action } => match action {
            FolderAction::Add { id, path, profile } => {
                folder_cmd::run_folder_add(&cfg, &id, &path, profile.as_deref()).await?;
            }
            FolderAction::List { json } => {
                folder_cmd::run_folder_list(&cfg, json).await?;
            }
            FolderAction::Update { id, path, profile } => {
                folder_cmd::run_folder_update(&cfg, &id, path.as_deref(), profile.as_deref())
                    .await?;
            }
            FolderAction::Remove { id } => {
                folder_cmd::run_folder_remove(&cfg, &id).await?;
            }
        },
        Commands::Reconcile {
            id,
            profile,
            full,
            dry_run,
            json,
        } => {
            let options = ReconcileOptions { full, dry_run };
            reconcile_cmd::run_reconcile(&cfg, &id, profile.as_deref(), options, json).await?;
        }
    }

    Ok(())
}
