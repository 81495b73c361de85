//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/docsync.sqlite"
//!
//! [chunking]
//! chunk_size = 800
//! chunk_overlap = 80
//!
//! [embedding]
//! default_profile = "local"
//!
//! [embedding.profiles.local]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//! ```
//!
//! An embedding profile plus the chunking parameters make up the "index
//! configuration" a folder's index is built with. [`index_config_key`]
//! condenses it into the string recorded in the folder's snapshot. The name
//! `disabled` always resolves, to a provider that produces no vectors.

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use docsync_core::SyncError;

/// Name of the built-in profile that indexes chunks without vectors.
pub const DISABLED_PROFILE: &str = "disabled";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    80
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, EmbeddingProfile>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingProfile {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingProfile {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            api_url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingProfile {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl EmbeddingConfig {
    /// Profile used when neither the command line nor the folder
    /// registration names one.
    pub fn default_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or(DISABLED_PROFILE)
    }

    /// Resolve a profile by name.
    ///
    /// # Errors
    ///
    /// [`SyncError::ConfigurationMissing`] if no such profile is defined.
    pub fn resolve(&self, name: &str) -> Result<EmbeddingProfile, SyncError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == DISABLED_PROFILE => Ok(EmbeddingProfile::default()),
            None => Err(SyncError::ConfigurationMissing(format!(
                "embedding profile '{}' is not defined",
                name
            ))),
        }
    }
}

/// Key recorded with a snapshot: `<profile>@<digest>`. The digest covers
/// everything that changes the chunks or vectors an index holds (provider,
/// model, dims, endpoint and chunking), so editing any of them makes the
/// next run rebuild. Batch size, retries and timeouts are left out.
pub fn index_config_key(name: &str, profile: &EmbeddingProfile, chunking: &ChunkingConfig) -> String {
    let dims = profile.dims.map(|d| d.to_string()).unwrap_or_default();
    let chunk_size = chunking.chunk_size.to_string();
    let chunk_overlap = chunking.chunk_overlap.to_string();
    let mut hasher = Sha256::new();
    for field in [
        profile.provider.as_str(),
        profile.model.as_deref().unwrap_or(""),
        dims.as_str(),
        profile.api_url.as_deref().unwrap_or(""),
        chunk_size.as_str(),
        chunk_overlap.as_str(),
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}@{}", name, &digest[..12])
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    for (name, profile) in &config.embedding.profiles {
        match profile.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown embedding provider '{}' in profile '{}'. Must be disabled, openai, or ollama.",
                other,
                name
            ),
        }
        if profile.is_enabled() {
            if profile.dims.is_none() || profile.dims == Some(0) {
                anyhow::bail!("embedding.profiles.{}.dims must be > 0", name);
            }
            if profile.model.is_none() {
                anyhow::bail!("embedding.profiles.{}.model must be specified", name);
            }
            if profile.batch_size == 0 {
                anyhow::bail!("embedding.profiles.{}.batch_size must be > 0", name);
            }
        }
    }

    if let Some(default) = &config.embedding.default_profile {
        config
            .embedding
            .resolve(default)
            .with_context(|| "embedding.default_profile")?;
    }

    Ok(())
}
