use async_trait::async_trait;
use uuid::Uuid;

use crate::error::MemoryResult;
use crate::models::{CollectionConfig, MemoryPoint, ScoredMemory, TenantId};

/// Repository trait for the underlying vector engine (Qdrant).
///
/// The search signature requires a resolved `TenantId`: there is no method
/// on this seam that can return another tenant's points, so tenant
/// filtering cannot be skipped by a forgetful caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Whether a collection with this name exists on the engine.
    async fn collection_exists(&self, name: &str) -> MemoryResult<bool>;

    /// Vector configuration the engine holds for `vector_name` in this
    /// collection. Returns the closest available configuration when the
    /// exact vector name is absent so mismatches can be reported, and
    /// `None` when the collection itself does not exist.
    async fn collection_config(
        &self,
        name: &str,
        vector_name: &str,
    ) -> MemoryResult<Option<CollectionConfig>>;

    /// Create a collection if absent. Returns `false` when it already
    /// existed (another writer won the race); the caller re-checks the
    /// configuration in that case.
    async fn create_collection(&self, name: &str, config: &CollectionConfig) -> MemoryResult<bool>;

    /// Write a single point.
    async fn upsert(&self, collection: &str, point: MemoryPoint) -> MemoryResult<Uuid>;

    /// Write multiple points in one call.
    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<MemoryPoint>,
    ) -> MemoryResult<Vec<Uuid>>;

    /// Nearest-neighbor search, always restricted server-side to points
    /// owned by `tenant`.
    async fn search(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        limit: u64,
        tenant: &TenantId,
    ) -> MemoryResult<Vec<ScoredMemory>>;
}
