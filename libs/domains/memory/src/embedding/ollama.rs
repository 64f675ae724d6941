use std::time::Duration;

use async_trait::async_trait;
use core_config::{env_or_default, env_parse_or};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{vector_name_for_model, EmbeddingProvider, EmbeddingProviderType};
use crate::error::{MemoryError, MemoryResult};

const DEFAULT_MODEL: &str = "nomic-embed-text";

/// Dimensionality of common Ollama embedding models.
fn model_dimension(model: &str) -> Option<u64> {
    // Model names may carry a tag suffix ("nomic-embed-text:latest").
    match model.split(':').next().unwrap_or(model) {
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        "snowflake-arctic-embed" => Some(1024),
        _ => None,
    }
}

/// Ollama embedding provider configuration (local/dev backend)
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub dimension_override: Option<u64>,
}

impl OllamaConfig {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 30,
            dimension_override: None,
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_dimension(mut self, dimension: u64) -> Self {
        self.dimension_override = Some(dimension);
        self
    }

    pub fn from_env(model: Option<String>) -> Self {
        Self {
            endpoint: env_or_default("OLLAMA_ENDPOINT", "http://localhost:11434"),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: env_parse_or("OLLAMA_TIMEOUT_SECS", 30),
            dimension_override: std::env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// Ollama embeddings provider.
///
/// Construction is cheap; the first `embed` call performs a one-time
/// readiness handshake against the Ollama server (is the model pulled?).
/// The handshake runs under a [`OnceCell`] guard so exactly one concurrent
/// caller pays for it, and its outcome is cached: once it has failed,
/// every later call reports `EmbeddingUnavailable` without re-probing.
/// A restart is required to retry.
#[derive(Debug)]
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    vector_name: String,
    dimension: u64,
    ready: OnceCell<Result<(), String>>,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> MemoryResult<Self> {
        let dimension = config
            .dimension_override
            .or_else(|| model_dimension(&config.model))
            .ok_or_else(|| {
                MemoryError::Config(format!(
                    "Unknown Ollama embedding model '{}' and no EMBEDDING_DIMENSION set",
                    config.model
                ))
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MemoryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            vector_name: vector_name_for_model(&config.model),
            client,
            config,
            dimension,
            ready: OnceCell::new(),
        })
    }

    pub fn from_env(model: Option<String>) -> MemoryResult<Self> {
        Self::new(OllamaConfig::from_env(model))
    }

    async fn probe_model(&self) -> Result<(), String> {
        let url = format!("{}/api/tags", self.config.endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Ollama not reachable at {}: {}", self.config.endpoint, e))?;

        if !response.status().is_success() {
            return Err(format!("Ollama /api/tags returned {}", response.status()));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid Ollama /api/tags response: {}", e))?;

        let wanted = self.config.model.split(':').next().unwrap_or_default();
        let found = tags
            .models
            .iter()
            .any(|m| m.name.split(':').next() == Some(wanted));

        if found {
            debug!(model = %self.config.model, "Ollama embedding model is available");
            Ok(())
        } else {
            Err(format!(
                "Model '{}' is not pulled on the Ollama server",
                self.config.model
            ))
        }
    }

    async fn ensure_ready(&self) -> MemoryResult<()> {
        let outcome = self.ready.get_or_init(|| self.probe_model()).await;

        outcome.as_ref().map_err(|e| {
            warn!("Ollama provider unavailable (cached): {}", e);
            MemoryError::EmbeddingUnavailable(e.clone())
        })?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Ollama
    }

    fn vector_name(&self) -> &str {
        &self.vector_name
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        self.ensure_ready().await?;

        let request = OllamaEmbedRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.config.endpoint))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MemoryError::EmbeddingUnavailable(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let body: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::EmbeddingUnavailable(e.to_string()))?;

        Ok(body.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        // The embeddings endpoint is single-prompt; issue sequential calls.
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}
