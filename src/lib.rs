//! # docsync
//!
//! Keeps a derived index of a folder's documents consistent with the folder
//! itself, re-processing only what changed.
//!
//! Each watched folder is fingerprinted into a content-addressed manifest
//! (one SHA-256 per file plus a folder hash over the sorted pairs). The
//! manifest is diffed against the last committed snapshot, the index is
//! updated file by file, and the new snapshot is committed last. A run that
//! fails part way leaves the old snapshot in place, so the next run repeats
//! the same work safely.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Fingerprint │──▶│    Diff     │──▶│  Index ops   │──▶│ Commit snap  │
//! │ walk + hash │   │ vs snapshot │   │ split+embed  │   │   (SQLite)   │
//! └─────────────┘   └─────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsync init
//! docsync folder add handbook ./handbook
//! docsync reconcile handbook
//! docsync reconcile handbook --dry-run
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and embedding profiles |
//! | [`hasher`] | Streaming SHA-256 of one file |
//! | [`exclude`] | Fixed exclusion rules |
//! | [`fingerprint`] | Folder walk and manifest construction |
//! | [`extract`] | Document loading (txt, md, docx, pptx, pdf) |
//! | [`embedding`] | OpenAI and Ollama embedding providers |
//! | [`reconcile`] | Reconciliation orchestrator |
//! | [`sqlite_store`] | SQLite metadata and index stores |
//! | [`folders`] | Watched-folder registration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`logging`] | Tracing subscriber setup |
//!
//! Manifests, diffing, chunk identity, store traits and the error type
//! live in the [`docsync_core`] crate.

pub mod config;
pub mod db;
pub mod embedding;
pub mod exclude;
pub mod extract;
pub mod fingerprint;
pub mod folder_cmd;
pub mod folders;
pub mod hasher;
pub mod logging;
pub mod migrate;
pub mod reconcile;
pub mod reconcile_cmd;
pub mod sqlite_store;
