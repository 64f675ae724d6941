use async_trait::async_trait;

use super::EmbeddingProviderType;
use crate::error::MemoryResult;

/// Trait for embedding generation backends.
///
/// A provider declares the name and dimensionality of its embedding space
/// up front; collections are created against those values and never
/// silently coerced afterwards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Which backend this is.
    fn provider_type(&self) -> EmbeddingProviderType;

    /// Key under which this provider's vectors are stored.
    fn vector_name(&self) -> &str;

    /// Dimensionality of produced vectors.
    fn dimension(&self) -> u64;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;

    /// Embed multiple texts in one backend round trip where supported.
    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>>;
}

impl std::fmt::Debug for dyn EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("provider_type", &self.provider_type())
            .field("vector_name", &self.vector_name())
            .field("dimension", &self.dimension())
            .finish()
    }
}
