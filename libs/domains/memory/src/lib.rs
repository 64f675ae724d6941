//! Memory Domain Library
//!
//! Tenant-isolated vector memory: stores text entries with metadata,
//! embeds them, and answers nearest-neighbor retrieval — with per-tenant
//! filtering built into the storage seam so no code path can skip it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  MemoryService   │  ← embed + tenant stamp + fail-closed search
//! └───────┬──────────┘
//!         │
//! ┌───────▼──────────┐     ┌──────────────────┐
//! │ MemoryRepository │     │ EmbeddingProvider│
//! │    (trait)       │     │     (trait)      │
//! └───────┬──────────┘     └───────┬──────────┘
//!         │                        │
//! ┌───────▼──────────┐     ┌───────▼──────────┐
//! │ QdrantRepository │     │  OpenAIProvider  │
//! │ (implementation) │     │  OllamaProvider  │
//! └──────────────────┘     └──────────────────┘
//! ```
//!
//! Tenant identity comes from an ordered [`resolver::TenantResolver`]
//! chain (explicit argument → session store → environment fallback) and is
//! threaded through every store and search call. Resolution failure is a
//! distinct `Unresolved` value: stores reject it, searches return an empty
//! result rather than an unfiltered one.

pub mod embedding;
pub mod error;
pub mod models;
pub mod qdrant;
pub mod repository;
pub mod resolver;
pub mod service;

pub use embedding::{
    create_provider, EmbeddingConfig, EmbeddingProvider, EmbeddingProviderType, OllamaProvider,
    OpenAIProvider,
};
pub use error::{MemoryError, MemoryResult};
pub use models::{
    CollectionConfig, DistanceMetric, Entry, MemoryPoint, PointPayload, ScoredMemory, SearchQuery,
    TenantId, TenantResolution,
};
pub use qdrant::{QdrantConfig, QdrantRepository};
pub use repository::MemoryRepository;
pub use resolver::{CallContext, SessionStore, TenantResolver, TenantStrategy};
pub use service::MemoryService;
