use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, MemoryResult};
use crate::models::{
    CollectionConfig, DistanceMetric, Entry, MemoryPoint, PointPayload, SearchQuery, TenantId,
    TenantResolution,
};
use crate::repository::MemoryRepository;

/// High-level memory operations: embed, stamp the owning tenant, store,
/// and retrieve — with tenant filtering as an unconditional step rather
/// than a caller responsibility.
///
/// Shared across concurrent calls behind an `Arc`; collection
/// check-then-create is serialized per collection name.
pub struct MemoryService<R: MemoryRepository> {
    repository: R,
    embedder: Arc<dyn EmbeddingProvider>,
    distance: DistanceMetric,
    collection_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<R: MemoryRepository> MemoryService<R> {
    pub fn new(repository: R, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository,
            embedder,
            distance: DistanceMetric::default(),
            collection_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    /// The vector configuration collections must carry for the active
    /// embedding provider.
    pub fn expected_config(&self) -> CollectionConfig {
        CollectionConfig {
            vector_name: self.embedder.vector_name().to_string(),
            dimension: self.embedder.dimension(),
            distance: self.distance,
        }
    }

    fn lock_for(&self, collection: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .collection_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Idempotent collection creation, serialized per collection name so
    /// two simultaneous first stores never race into a spurious
    /// `CollectionConfigMismatch`.
    ///
    /// A collection's vector configuration is fixed at creation: an
    /// existing collection whose size or distance differs from what the
    /// active provider requires is a configuration error, never coerced.
    pub async fn ensure_collection(&self, collection: &str) -> MemoryResult<()> {
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;

        let expected = self.expected_config();

        if self.repository.collection_exists(collection).await? {
            return self.check_config(collection, &expected).await;
        }

        let created = self
            .repository
            .create_collection(collection, &expected)
            .await?;

        if created {
            info!(collection, config = %expected.describe(), "Created collection");
            Ok(())
        } else {
            // Lost a create race against another process; verify the winner
            // wrote a compatible configuration.
            self.check_config(collection, &expected).await
        }
    }

    async fn check_config(&self, collection: &str, expected: &CollectionConfig) -> MemoryResult<()> {
        let actual = self
            .repository
            .collection_config(collection, &expected.vector_name)
            .await?
            .ok_or_else(|| {
                MemoryError::Internal(format!(
                    "Collection '{}' exists but its configuration could not be read",
                    collection
                ))
            })?;

        if actual == *expected {
            Ok(())
        } else {
            Err(MemoryError::CollectionConfigMismatch {
                collection: collection.to_string(),
                expected: expected.describe(),
                actual: actual.describe(),
            })
        }
    }

    /// Store one entry for a resolved tenant.
    ///
    /// The tenant stamp goes into the point payload, and every search is
    /// additionally filtered server-side; the stamp is redundancy, not the
    /// isolation mechanism. An `Unresolved` tenant is a caller error here,
    /// never silently accepted.
    pub async fn store(
        &self,
        entry: Entry,
        collection: &str,
        tenant: &TenantResolution,
    ) -> MemoryResult<Uuid> {
        let tenant = tenant.resolved().ok_or(MemoryError::TenantRequired)?;

        if entry.content.trim().is_empty() {
            return Err(MemoryError::Validation(
                "content must be a non-empty string".to_string(),
            ));
        }

        let vector = self.embedder.embed(&entry.content).await?;
        self.ensure_collection(collection).await?;

        let point = self.build_point(&entry, vector, tenant);
        let id = self.repository.upsert(collection, point).await?;

        debug!(collection, tenant = %tenant, point_id = %id, "Stored memory");
        Ok(id)
    }

    /// Bulk store. `metadatas`, when present, must pair one-to-one with
    /// `contents`; a count mismatch is rejected before any backend call.
    pub async fn store_many(
        &self,
        contents: Vec<String>,
        metadatas: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
        collection: &str,
        tenant: &TenantResolution,
    ) -> MemoryResult<Vec<Uuid>> {
        let tenant = tenant.resolved().ok_or(MemoryError::TenantRequired)?;

        if contents.is_empty() {
            return Err(MemoryError::Validation(
                "at least one content chunk is required".to_string(),
            ));
        }

        if let Some(metadatas) = &metadatas {
            if metadatas.len() != contents.len() {
                return Err(MemoryError::Validation(format!(
                    "got {} content chunks but {} metadata entries",
                    contents.len(),
                    metadatas.len()
                )));
            }
        }

        let vectors = self.embedder.embed_batch(&contents).await?;
        self.ensure_collection(collection).await?;

        let mut metadatas = metadatas
            .map(|m| m.into_iter().map(Some).collect::<Vec<_>>())
            .unwrap_or_else(|| vec![None; contents.len()]);

        let points: Vec<MemoryPoint> = contents
            .into_iter()
            .zip(vectors)
            .zip(metadatas.iter_mut())
            .map(|((content, vector), metadata)| {
                let mut entry = Entry::new(content);
                if let Some(metadata) = metadata.take() {
                    entry = entry.with_metadata(metadata);
                }
                self.build_point(&entry, vector, tenant)
            })
            .collect();

        let ids = self.repository.upsert_batch(collection, points).await?;

        debug!(collection, tenant = %tenant, count = ids.len(), "Stored memory batch");
        Ok(ids)
    }

    /// Nearest-neighbor retrieval, fail-closed.
    ///
    /// An unresolved tenant yields an empty result with a security-relevant
    /// warning — by design it never raises, and it must never materialize
    /// as an unfiltered result set. A collection that does not exist yet is
    /// a valid empty memory space, not a fault.
    pub async fn search(&self, query: SearchQuery) -> MemoryResult<Vec<Entry>> {
        let tenant = match query.tenant.resolved() {
            Some(tenant) => tenant,
            None => {
                warn!(
                    collection = %query.collection,
                    "Search denied: tenant unresolved; returning empty result"
                );
                return Ok(vec![]);
            }
        };

        if query.limit == 0 {
            return Err(MemoryError::Validation(
                "limit must be a positive integer".to_string(),
            ));
        }

        if !self.repository.collection_exists(&query.collection).await? {
            debug!(collection = %query.collection, "Search against absent collection");
            return Ok(vec![]);
        }

        let vector = self.embedder.embed(&query.text).await?;

        let mut hits = self
            .repository
            .search(
                &query.collection,
                self.embedder.vector_name(),
                vector,
                query.limit,
                tenant,
            )
            .await?;

        // Engine similarity ranking first; point ids (UUIDv7, so
        // insertion-ordered) break score ties deterministically.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(hits.into_iter().map(|hit| hit.payload.into_entry()).collect())
    }

    fn build_point(&self, entry: &Entry, vector: Vec<f32>, tenant: &TenantId) -> MemoryPoint {
        MemoryPoint {
            // v7: time-ordered, so ids encode insertion order.
            id: Uuid::now_v7(),
            vector_name: self.embedder.vector_name().to_string(),
            vector,
            payload: PointPayload::from_entry(entry, tenant),
        }
    }
}
