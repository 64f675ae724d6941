//! Memory Tool Server
//!
//! A tenant-isolated memory service exposed as line-oriented JSON-RPC over
//! stdio: `store`, `store_many`, and `find` tools backed by Qdrant and a
//! configurable embedding provider.
//!
//! ## Architecture
//!
//! ```text
//! Client (one JSON request per line on stdin)
//!   ↓
//! MemoryTools (tools.rs)
//!   ↓ (validation, tenant resolution, response formatting)
//! MemoryService (domain layer)
//!   ↓ (embed + tenant stamp + fail-closed search)
//! ┌─────────────┬──────────────────┐
//! │ QdrantRepo  │ EmbeddingProvider │
//! └─────────────┴──────────────────┘
//!   ↓                  ↓
//! Qdrant          OpenAI / Ollama
//! ```
//!
//! Logging goes to stderr exclusively; stdout carries nothing but response
//! lines.
//!
//! ## Modules
//!
//! - `server`: initialization and the stdio serve loop
//! - `tools`: tool handlers and request dispatch
//! - `rpc`: JSON-RPC framing and error mapping
//! - `config`: server configuration from `DENKER_*` variables

pub mod config;
pub mod rpc;
pub mod server;
pub mod tools;

pub use config::MemoryServerConfig;
pub use server::run;
pub use tools::MemoryTools;
