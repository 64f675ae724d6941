//! In-memory stand-ins for the vector engine and the embedding backend,
//! used to exercise the service contract without a live Qdrant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use domain_memory::embedding::EmbeddingProviderType;
use domain_memory::{
    CollectionConfig, EmbeddingProvider, MemoryError, MemoryPoint, MemoryRepository, MemoryResult,
    ScoredMemory, TenantId,
};

/// Deterministic text-to-vector stub: identical text always produces an
/// identical vector, so exact-content queries rank their entry first
/// under cosine similarity.
pub struct StubEmbedder {
    dimension: u64,
    vector_name: String,
}

impl StubEmbedder {
    pub fn new(dimension: u64) -> Self {
        Self {
            dimension,
            vector_name: "stub-model".to_string(),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        // Cheap seeded pseudo-random projection; no semantics, just
        // determinism and distinctness.
        let mut state: u64 = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325, |acc: u64, b| {
                (acc ^ b as u64).wrapping_mul(0x100_0000_01b3)
            });

        (0..self.dimension)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f32 / u32::MAX as f32) - 0.5
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
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
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

struct StoredCollection {
    config: CollectionConfig,
    points: Vec<MemoryPoint>,
}

/// Engine fake with real cosine ranking and the same mandatory tenant
/// filter semantics the Qdrant repository applies server-side.
///
/// Clones share state, so tests can keep a handle for assertions after
/// handing one to the service.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    inner: std::sync::Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    collections: Mutex<HashMap<String, StoredCollection>>,
    create_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_calls(&self) -> usize {
        self.inner.create_calls.load(Ordering::SeqCst)
    }

    pub fn collection_count(&self) -> usize {
        self.inner.collections.lock().unwrap().len()
    }

    pub fn point_count(&self, collection: &str) -> usize {
        self.inner
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

#[async_trait]
impl MemoryRepository for InMemoryRepository {
    async fn collection_exists(&self, name: &str) -> MemoryResult<bool> {
        Ok(self.inner.collections.lock().unwrap().contains_key(name))
    }

    async fn collection_config(
        &self,
        name: &str,
        _vector_name: &str,
    ) -> MemoryResult<Option<CollectionConfig>> {
        Ok(self
            .inner
            .collections
            .lock()
            .unwrap()
            .get(name)
            .map(|c| c.config.clone()))
    }

    async fn create_collection(&self, name: &str, config: &CollectionConfig) -> MemoryResult<bool> {
        self.inner.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.inner.collections.lock().unwrap();
        if collections.contains_key(name) {
            return Ok(false);
        }
        collections.insert(
            name.to_string(),
            StoredCollection {
                config: config.clone(),
                points: Vec::new(),
            },
        );
        Ok(true)
    }

    async fn upsert(&self, collection: &str, point: MemoryPoint) -> MemoryResult<Uuid> {
        let id = point.id;
        let mut collections = self.inner.collections.lock().unwrap();
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| MemoryError::Backend(format!("no collection '{}'", collection)))?;
        stored.points.push(point);
        Ok(id)
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<MemoryPoint>,
    ) -> MemoryResult<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(points.len());
        for point in points {
            ids.push(self.upsert(collection, point).await?);
        }
        Ok(ids)
    }

    async fn search(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        limit: u64,
        tenant: &TenantId,
    ) -> MemoryResult<Vec<ScoredMemory>> {
        let collections = self.inner.collections.lock().unwrap();
        let stored = match collections.get(collection) {
            Some(stored) => stored,
            None => return Ok(vec![]),
        };

        let mut hits: Vec<ScoredMemory> = stored
            .points
            .iter()
            .filter(|p| p.vector_name == vector_name)
            .filter(|p| {
                p.payload.metadata.get("user_id").and_then(|v| v.as_str())
                    == Some(tenant.as_str())
            })
            .map(|p| ScoredMemory {
                id: p.id,
                score: Self::cosine(&vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit as usize);

        Ok(hits)
    }
}
