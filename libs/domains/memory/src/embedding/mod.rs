mod factory;
mod ollama;
mod openai;
mod provider;

pub use factory::create_provider;
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;

use core_config::{env_optional, env_or_default};
use serde::{Deserialize, Serialize};

/// Kind of embedding backend in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingProviderType {
    OpenAI,
    Ollama,
}

impl EmbeddingProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingProviderType::OpenAI => "openai",
            EmbeddingProviderType::Ollama => "ollama",
        }
    }
}

/// Embedding backend selection, resolved once at startup.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Provider name ("openai" or "ollama"); validated by the factory.
    pub provider: String,
    /// Model name; each provider knows the dimensionality of its models.
    pub model: Option<String>,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            provider: env_or_default("EMBEDDING_PROVIDER", "ollama"),
            model: env_optional("EMBEDDING_MODEL"),
        }
    }
}

/// Key under which a model's vectors are stored, allowing multiple
/// embedding spaces per collection. Derived from the model name so two
/// providers never silently write into each other's space.
pub fn vector_name_for_model(model: &str) -> String {
    model
        .rsplit('/')
        .next()
        .unwrap_or(model)
        .to_lowercase()
        .replace(['_', ':', '.'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_name_slugs_model_names() {
        assert_eq!(
            vector_name_for_model("text-embedding-3-small"),
            "text-embedding-3-small"
        );
        assert_eq!(
            vector_name_for_model("sentence-transformers/all-MiniLM-L6-v2"),
            "all-minilm-l6-v2"
        );
        assert_eq!(
            vector_name_for_model("nomic-embed-text:latest"),
            "nomic-embed-text-latest"
        );
    }

    #[test]
    fn test_embedding_config_from_env() {
        temp_env::with_vars(
            [
                ("EMBEDDING_PROVIDER", Some("openai")),
                ("EMBEDDING_MODEL", Some("text-embedding-3-large")),
            ],
            || {
                let config = EmbeddingConfig::from_env();
                assert_eq!(config.provider, "openai");
                assert_eq!(config.model.as_deref(), Some("text-embedding-3-large"));
            },
        );

        temp_env::with_vars_unset(["EMBEDDING_PROVIDER", "EMBEDDING_MODEL"], || {
            let config = EmbeddingConfig::from_env();
            assert_eq!(config.provider, "ollama");
            assert_eq!(config.model, None);
        });
    }
}
