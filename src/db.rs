use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::Config;

/// Open a pool on the configured database. Callers own the pool for the
/// duration of one command and close it when done.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Directory holding per-folder run locks, next to the database file. Every
/// command working on the same database shares it.
pub fn lock_dir(config: &Config) -> PathBuf {
    let mut name = config.db.path.as_os_str().to_os_string();
    name.push(".locks");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, DbConfig, EmbeddingConfig};

    #[test]
    fn lock_dir_sits_beside_database() {
        let config = Config {
            db: DbConfig {
                path: PathBuf::from("/srv/data/docsync.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
        };
        assert_eq!(lock_dir(&config), PathBuf::from("/srv/data/docsync.sqlite.locks"));
    }
}
