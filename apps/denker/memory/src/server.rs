//! Server initialization and the stdio serve loop.
//!
//! This module handles all server setup:
//! - Tracing initialization (stderr only; stdout is the response channel)
//! - Qdrant connection
//! - Embedding provider setup
//! - Tenant resolver and service creation
//! - Line-oriented request loop over stdin/stdout

use std::sync::Arc;

use core_config::Environment;
use eyre::{Result, WrapErr};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use domain_memory::{
    create_provider, EmbeddingConfig, MemoryRepository, MemoryService, QdrantConfig,
    QdrantRepository, SessionStore, TenantResolver,
};

use crate::config::MemoryServerConfig;
use crate::tools::MemoryTools;

/// Run the memory tool server.
///
/// This is the main entry point for server initialization. It:
/// 1. Sets up structured logging on stderr (env-aware: JSON for prod,
///    pretty for dev)
/// 2. Connects to Qdrant
/// 3. Initializes the configured embedding provider (fatal if unknown)
/// 4. Builds the tenant resolver chain and the memory service
/// 5. Serves requests line-by-line from stdin until EOF
///
/// # Errors
///
/// Returns an error if:
/// - Qdrant configuration is invalid or the connection fails
/// - The embedding provider is unknown or misconfigured
/// - The server configuration is invalid
/// - Reading from stdin fails
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();

    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let qdrant_config = QdrantConfig::from_env().wrap_err("Failed to load Qdrant configuration")?;

    info!("Connecting to Qdrant at {}...", qdrant_config.url);
    let repository = QdrantRepository::new(qdrant_config)
        .await
        .wrap_err("Failed to connect to Qdrant")?;
    info!("Connected to Qdrant successfully");

    let embedding_config = EmbeddingConfig::from_env();
    let embedder = create_provider(&embedding_config)
        .wrap_err("Failed to initialize embedding provider")?;

    let server_config =
        MemoryServerConfig::from_env().wrap_err("Failed to load server configuration")?;

    let session_store = Arc::new(SessionStore::new());
    let resolver = Arc::new(TenantResolver::standard(
        session_store,
        server_config.user_id_env.clone(),
    ));

    let service = Arc::new(MemoryService::new(repository, embedder));
    let tools = Arc::new(MemoryTools::new(service, resolver, server_config));

    serve_stdio(tools).await
}

/// Serve requests from stdin, one JSON object per line.
///
/// Each request runs in its own task so a slow embedding call never blocks
/// the read loop; responses funnel through a single writer task, which
/// keeps stdout lines whole under concurrency. Response order is not
/// guaranteed to match request order — callers correlate by `id`.
async fn serve_stdio<R: MemoryRepository + 'static>(tools: Arc<MemoryTools<R>>) -> Result<()> {
    let session_id = Uuid::new_v4().to_string();
    info!(session = %session_id, "Memory tool server listening on stdio");

    let (response_tx, mut response_rx) = mpsc::channel::<String>(64);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = response_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                error!("Failed to write response to stdout");
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .wrap_err("Failed to read from stdin")?
    {
        if line.trim().is_empty() {
            continue;
        }

        let tools = tools.clone();
        let response_tx = response_tx.clone();
        let session_id = session_id.clone();

        tokio::spawn(async move {
            if let Some(response) = tools.handle_line(&line, &session_id).await {
                match serde_json::to_string(&response) {
                    Ok(encoded) => {
                        let _ = response_tx.send(encoded).await;
                    }
                    Err(e) => error!(error = %e, "Failed to encode response"),
                }
            }
        });
    }

    // stdin EOF: let in-flight responses drain, then stop the writer.
    drop(response_tx);
    let _ = writer.await;

    info!(session = %session_id, "stdin closed, shutting down");
    Ok(())
}
