//! Embedding provider implementations.
//!
//! - **[`DisabledProvider`]**: produces no vectors; chunks are indexed as text only.
//! - **[`OpenAIProvider`]**: `POST https://api.openai.com/v1/embeddings`.
//! - **[`OllamaProvider`]**: `POST {api_url}/api/embed` on a local Ollama server.
//!
//! # Retry Strategy
//!
//! Both HTTP providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use docsync_core::embedding::EmbeddingProvider;
use docsync_core::SyncError;

use crate::config::EmbeddingProfile;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Build the provider a profile describes.
///
/// # Errors
///
/// [`SyncError::ConfigurationMissing`] for unknown providers, missing
/// `model`/`dims`, or an OpenAI profile without `OPENAI_API_KEY`.
pub fn create_provider(profile: &EmbeddingProfile) -> Result<Box<dyn EmbeddingProvider>, SyncError> {
    match profile.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(profile)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(profile)?)),
        other => Err(SyncError::ConfigurationMissing(format!(
            "unknown embedding provider '{}'",
            other
        ))),
    }
}

fn required_model_and_dims(profile: &EmbeddingProfile) -> Result<(String, usize), SyncError> {
    let model = profile.model.clone().ok_or_else(|| {
        SyncError::ConfigurationMissing(format!("model required for {} provider", profile.provider))
    })?;
    let dims = profile.dims.filter(|d| *d > 0).ok_or_else(|| {
        SyncError::ConfigurationMissing(format!("dims required for {} provider", profile.provider))
    })?;
    Ok((model, dims))
}

// ============ Disabled Provider ============

/// Provider for profiles that index text without vectors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    fn is_enabled(&self) -> bool {
        false
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Provider ============

pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAIProvider {
    pub fn new(profile: &EmbeddingProfile) -> Result<Self, SyncError> {
        let (model, dims) = required_model_and_dims(profile)?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            SyncError::ConfigurationMissing("OPENAI_API_KEY environment variable not set".into())
        })?;
        Ok(Self {
            model,
            dims,
            api_key,
            client: http_client(profile)?,
            max_retries: profile.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = || {
            self.client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        };
        let json = send_with_retry("OpenAI", request, self.max_retries).await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index` when present.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, parse_vector(embedding)?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(profile: &EmbeddingProfile) -> Result<Self, SyncError> {
        let (model, dims) = required_model_and_dims(profile)?;
        let base = profile.api_url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);
        Ok(Self {
            model,
            dims,
            url: format!("{}/api/embed", base.trim_end_matches('/')),
            client: http_client(profile)?,
            max_retries: profile.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = || self.client.post(&self.url).json(&body);
        let json = send_with_retry("Ollama", request, self.max_retries).await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(parse_vector)
        .collect()
}

// ============ Shared HTTP plumbing ============

fn http_client(profile: &EmbeddingProfile) -> Result<reqwest::Client, SyncError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(profile.timeout_secs))
        .build()
        .map_err(|e| SyncError::ConfigurationMissing(format!("HTTP client: {}", e)))
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("embedding contains a non-number"))
        })
        .collect()
}

async fn send_with_retry<F>(service: &str, request: F, max_retries: u32) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(service, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        match request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", service, status, body_text));
                    continue;
                }
                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", service)))
}
