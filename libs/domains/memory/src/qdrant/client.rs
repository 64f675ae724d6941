use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    self, Condition, CreateCollectionBuilder, Distance, Filter, PointId, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorParamsMap, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

use super::payload::{payload_from_qdrant, payload_to_qdrant};
use super::QdrantConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::models::{
    tenant_filter_key, CollectionConfig, DistanceMetric, MemoryPoint, ScoredMemory, TenantId,
};
use crate::repository::MemoryRepository;

/// Qdrant-backed implementation of [`MemoryRepository`].
///
/// Collections use named vectors so multiple embedding spaces can share a
/// collection; every search carries a mandatory tenant filter.
pub struct QdrantRepository {
    client: Qdrant,
}

impl QdrantRepository {
    pub async fn new(config: QdrantConfig) -> MemoryResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }

        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .map_err(|e| MemoryError::Config(format!("Failed to build Qdrant client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn to_qdrant_distance(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Euclidean => Distance::Euclid,
            DistanceMetric::DotProduct => Distance::Dot,
            DistanceMetric::Manhattan => Distance::Manhattan,
        }
    }

    fn from_qdrant_distance(distance: Distance) -> DistanceMetric {
        match distance {
            Distance::Cosine => DistanceMetric::Cosine,
            Distance::Euclid => DistanceMetric::Euclidean,
            Distance::Dot => DistanceMetric::DotProduct,
            Distance::Manhattan => DistanceMetric::Manhattan,
            _ => DistanceMetric::Cosine,
        }
    }

    fn uuid_to_point_id(id: Uuid) -> PointId {
        PointId::from(id.to_string())
    }

    fn point_id_to_uuid(point_id: &PointId) -> MemoryResult<Uuid> {
        match &point_id.point_id_options {
            Some(qdrant::point_id::PointIdOptions::Uuid(uuid_str)) => Uuid::parse_str(uuid_str)
                .map_err(|e| MemoryError::Internal(format!("Invalid point UUID: {}", e))),
            Some(qdrant::point_id::PointIdOptions::Num(num)) => Ok(Uuid::from_u128(*num as u128)),
            None => Err(MemoryError::Internal("Missing point ID".to_string())),
        }
    }

    fn to_point_struct(point: MemoryPoint) -> PointStruct {
        let mut vectors = HashMap::new();
        vectors.insert(point.vector_name, point.vector);

        PointStruct::new(
            Self::uuid_to_point_id(point.id),
            vectors,
            Payload::from(payload_to_qdrant(&point.payload)),
        )
    }

    /// The filter restricting results to one tenant's points. Applied on
    /// every search, server-side, regardless of anything a caller supplies.
    fn tenant_filter(tenant: &TenantId) -> Filter {
        Filter::must([Condition::matches(
            tenant_filter_key(),
            tenant.as_str().to_string(),
        )])
    }

    fn extract_vector_params(
        config: &Option<qdrant::CollectionConfig>,
        vector_name: &str,
    ) -> Option<CollectionConfig> {
        let vectors_config = config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;

        match vectors_config.config.as_ref()? {
            qdrant::vectors_config::Config::Params(p) => Some(CollectionConfig {
                vector_name: String::new(),
                dimension: p.size,
                distance: Self::from_qdrant_distance(p.distance()),
            }),
            qdrant::vectors_config::Config::ParamsMap(map) => {
                // Prefer the exact vector name; otherwise report whatever is
                // there so a mismatch error can describe the actual state.
                let (name, p) = map
                    .map
                    .get_key_value(vector_name)
                    .or_else(|| map.map.iter().next())?;
                Some(CollectionConfig {
                    vector_name: name.clone(),
                    dimension: p.size,
                    distance: Self::from_qdrant_distance(p.distance()),
                })
            }
        }
    }
}

#[async_trait]
impl MemoryRepository for QdrantRepository {
    async fn collection_exists(&self, name: &str) -> MemoryResult<bool> {
        Ok(self.client.collection_exists(name).await?)
    }

    async fn collection_config(
        &self,
        name: &str,
        vector_name: &str,
    ) -> MemoryResult<Option<CollectionConfig>> {
        let info = match self.client.collection_info(name).await {
            Ok(info) => info,
            Err(_) => return Ok(None),
        };

        let result = match info.result {
            Some(result) => result,
            None => return Ok(None),
        };

        Ok(Self::extract_vector_params(&result.config, vector_name))
    }

    async fn create_collection(&self, name: &str, config: &CollectionConfig) -> MemoryResult<bool> {
        let params = VectorParams {
            size: config.dimension,
            distance: Self::to_qdrant_distance(config.distance).into(),
            ..Default::default()
        };

        let mut map = HashMap::new();
        map.insert(config.vector_name.clone(), params);

        let vectors_config = VectorsConfig {
            config: Some(qdrant::vectors_config::Config::ParamsMap(VectorParamsMap {
                map,
            })),
        };

        let builder = CreateCollectionBuilder::new(name).vectors_config(vectors_config);

        match self.client.create_collection(builder).await {
            Ok(_) => Ok(true),
            // Another writer created it first; the caller re-checks config.
            Err(e) if e.to_string().contains("already exists") => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert(&self, collection: &str, point: MemoryPoint) -> MemoryResult<Uuid> {
        let id = point.id;
        let builder =
            UpsertPointsBuilder::new(collection, vec![Self::to_point_struct(point)]).wait(true);

        self.client.upsert_points(builder).await?;

        Ok(id)
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<MemoryPoint>,
    ) -> MemoryResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = points.iter().map(|p| p.id).collect();
        let points: Vec<PointStruct> = points.into_iter().map(Self::to_point_struct).collect();

        let builder = UpsertPointsBuilder::new(collection, points).wait(true);
        self.client.upsert_points(builder).await?;

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
        let builder = SearchPointsBuilder::new(collection, vector, limit)
            .vector_name(vector_name)
            .filter(Self::tenant_filter(tenant))
            .with_payload(true);

        let results = self.client.search_points(builder).await?;

        results
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .as_ref()
                    .map(Self::point_id_to_uuid)
                    .transpose()?
                    .ok_or_else(|| MemoryError::Internal("Missing point ID".to_string()))?;

                Ok(ScoredMemory {
                    id,
                    score: point.score,
                    payload: payload_from_qdrant(point.payload)?,
                })
            })
            .collect()
    }
}
