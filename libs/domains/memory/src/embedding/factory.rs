use std::sync::Arc;

use tracing::info;

use super::{EmbeddingConfig, EmbeddingProvider, OllamaProvider, OpenAIProvider};
use crate::error::{MemoryError, MemoryResult};

/// Build the configured embedding provider.
///
/// Selection happens once, at startup. An unknown provider name is a
/// configuration error that halts initialization; there is no silent
/// fallback to a degraded or disabled backend.
pub fn create_provider(config: &EmbeddingConfig) -> MemoryResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.to_lowercase().as_str() {
        "openai" => Arc::new(OpenAIProvider::from_env(config.model.clone())?),
        "ollama" => Arc::new(OllamaProvider::from_env(config.model.clone())?),
        other => {
            return Err(MemoryError::Config(format!(
                "Unknown embedding provider '{}' (expected 'openai' or 'ollama')",
                other
            )));
        }
    };

    info!(
        provider = provider.provider_type().as_str(),
        vector_name = provider.vector_name(),
        dimension = provider.dimension(),
        "Embedding provider configured"
    );

    Ok(provider)
}
