use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MemoryError, MemoryResult};

/// Payload field holding the stored text.
pub const PAYLOAD_DOCUMENT: &str = "document";
/// Payload field holding the metadata map.
pub const PAYLOAD_METADATA: &str = "metadata";
/// Metadata field carrying the owning tenant, injected server-side.
pub const METADATA_USER_ID: &str = "user_id";

/// Dotted payload path used for the mandatory server-side tenant filter.
pub fn tenant_filter_key() -> String {
    format!("{}.{}", PAYLOAD_METADATA, METADATA_USER_ID)
}

/// Opaque, non-empty identifier for a caller's isolation boundary.
///
/// Every repository operation that could expose data is parameterized by a
/// `TenantId`; there is no constructor for an empty or placeholder identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> MemoryResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(MemoryError::Validation(
                "tenant id must be a non-empty string".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of tenant resolution for a call.
///
/// `Unresolved` is a distinct value, never a defaulted identity. Store
/// operations reject it; search treats it as fail-closed-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantResolution {
    Resolved(TenantId),
    Unresolved,
}

impl TenantResolution {
    pub fn resolved(&self) -> Option<&TenantId> {
        match self {
            TenantResolution::Resolved(id) => Some(id),
            TenantResolution::Unresolved => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, TenantResolution::Unresolved)
    }
}

impl From<TenantId> for TenantResolution {
    fn from(id: TenantId) -> Self {
        TenantResolution::Resolved(id)
    }
}

/// The logical unit a caller stores: text plus optional structured metadata.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Entry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Distance metric for similarity ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
    Manhattan,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::DotProduct => "dot",
            DistanceMetric::Manhattan => "manhattan",
        }
    }
}

/// Vector configuration of a collection, fixed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub vector_name: String,
    pub dimension: u64,
    pub distance: DistanceMetric,
}

impl CollectionConfig {
    pub fn describe(&self) -> String {
        format!(
            "{{vector '{}', size {}, {}}}",
            self.vector_name,
            self.dimension,
            self.distance.as_str()
        )
    }
}

/// Physical payload written alongside a vector:
/// `{document, metadata: {user_id, ...caller fields}}`.
///
/// `user_id` is injected here on every store. It is redundant with the
/// filter applied at query time, not a substitute for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub document: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl PointPayload {
    /// Build a payload from a caller entry, stamping the owning tenant.
    pub fn from_entry(entry: &Entry, tenant: &TenantId) -> Self {
        let mut metadata = entry.metadata.clone().unwrap_or_default();
        metadata.insert(
            METADATA_USER_ID.to_string(),
            serde_json::Value::String(tenant.to_string()),
        );
        Self {
            document: entry.content.clone(),
            metadata,
        }
    }

    /// Recover the caller-facing entry, dropping the server-injected
    /// tenant stamp.
    pub fn into_entry(mut self) -> Entry {
        self.metadata.remove(METADATA_USER_ID);
        Entry {
            content: self.document,
            metadata: if self.metadata.is_empty() {
                None
            } else {
                Some(self.metadata)
            },
        }
    }
}

/// The physical record written to the vector engine.
#[derive(Debug, Clone)]
pub struct MemoryPoint {
    pub id: Uuid,
    pub vector_name: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A point returned by the engine with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub id: Uuid,
    pub score: f32,
    pub payload: PointPayload,
}

/// Nearest-neighbor retrieval request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub collection: String,
    pub limit: u64,
    pub tenant: TenantResolution,
}

impl SearchQuery {
    pub fn new(
        text: impl Into<String>,
        collection: impl Into<String>,
        limit: u64,
        tenant: TenantResolution,
    ) -> Self {
        Self {
            text: text.into(),
            collection: collection.into(),
            limit,
            tenant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_id_rejects_empty() {
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new("   ").is_err());
        assert!(TenantId::new("u1").is_ok());
    }

    #[test]
    fn test_payload_stamps_user_id() {
        let tenant = TenantId::new("u1").unwrap();
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".to_string(), json!("chat"));
        let entry = Entry::new("project deadline is June 1").with_metadata(metadata);

        let payload = PointPayload::from_entry(&entry, &tenant);
        assert_eq!(payload.document, "project deadline is June 1");
        assert_eq!(payload.metadata.get(METADATA_USER_ID), Some(&json!("u1")));
        assert_eq!(payload.metadata.get("source"), Some(&json!("chat")));
    }

    #[test]
    fn test_into_entry_drops_tenant_stamp() {
        let tenant = TenantId::new("u1").unwrap();
        let entry = Entry::new("note");
        let payload = PointPayload::from_entry(&entry, &tenant);

        let roundtripped = payload.into_entry();
        assert_eq!(roundtripped.content, "note");
        assert_eq!(roundtripped.metadata, None);
    }

    #[test]
    fn test_tenant_filter_key() {
        assert_eq!(tenant_filter_key(), "metadata.user_id");
    }

    #[test]
    fn test_unresolved_is_not_a_tenant() {
        let resolution = TenantResolution::Unresolved;
        assert!(resolution.is_unresolved());
        assert_eq!(resolution.resolved(), None);
    }
}
