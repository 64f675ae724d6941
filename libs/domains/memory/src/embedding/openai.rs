use std::time::Duration;

use async_trait::async_trait;
use core_config::{env_or_default, env_parse_or, env_required};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{vector_name_for_model, EmbeddingProvider, EmbeddingProviderType};
use crate::error::{MemoryError, MemoryResult};

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Dimensionality of the known OpenAI embedding models.
fn model_dimension(model: &str) -> Option<u64> {
    match model {
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

/// OpenAI embedding provider configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Required for models outside the built-in dimension table.
    pub dimension_override: Option<u64>,
}

impl OpenAIConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
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

    pub fn from_env(model: Option<String>) -> MemoryResult<Self> {
        Ok(Self {
            api_key: env_required("OPENAI_API_KEY")?,
            base_url: env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: env_parse_or("OPENAI_TIMEOUT_SECS", 30),
            dimension_override: std::env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok()),
        })
    }
}

/// OpenAI embeddings provider
#[derive(Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
    vector_name: String,
    dimension: u64,
}

impl OpenAIProvider {
    /// Validates model and dimensionality up front: an unknown model
    /// without an explicit dimension is a configuration error at startup,
    /// not a runtime surprise on the first call.
    pub fn new(config: OpenAIConfig) -> MemoryResult<Self> {
        let dimension = config
            .dimension_override
            .or_else(|| model_dimension(&config.model))
            .ok_or_else(|| {
                MemoryError::Config(format!(
                    "Unknown OpenAI embedding model '{}' and no EMBEDDING_DIMENSION set",
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
        })
    }

    pub fn from_env(model: Option<String>) -> MemoryResult<Self> {
        Self::new(OpenAIConfig::from_env(model)?)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::OpenAI
    }

    fn vector_name(&self) -> &str {
        &self.vector_name
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results.into_iter().next().ok_or_else(|| {
            MemoryError::EmbeddingUnavailable("No embedding returned".to_string())
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: self.config.model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MemoryError::EmbeddingUnavailable(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::EmbeddingUnavailable(e.to_string()))?;

        // Sort by index to maintain input order
        let mut data = embedding_response.data;
        data.sort_by_key(|d| d.index);

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}
