//! Tool operations exposed over the RPC surface.
//!
//! The handler validates input shape, resolves the tenant exactly once per
//! call, delegates to the domain service, and renders results as the
//! caller-facing strings. It holds no per-call mutable state: everything a
//! call needs travels through its own `CallContext`, so concurrent calls
//! from different tenants cannot bleed into each other.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error};

use domain_memory::{
    CallContext, Entry, MemoryError, MemoryRepository, MemoryResult, MemoryService, SearchQuery,
    TenantResolver,
};

use crate::config::MemoryServerConfig;
use crate::rpc::{
    FindParams, RpcError, RpcRequest, RpcResponse, StoreManyParams, StoreParams, INVALID_PARAMS,
    METHOD_NOT_FOUND, PARSE_ERROR,
};

pub struct MemoryTools<R: MemoryRepository> {
    service: Arc<MemoryService<R>>,
    resolver: Arc<TenantResolver>,
    config: MemoryServerConfig,
}

impl<R: MemoryRepository> MemoryTools<R> {
    pub fn new(
        service: Arc<MemoryService<R>>,
        resolver: Arc<TenantResolver>,
        config: MemoryServerConfig,
    ) -> Self {
        Self {
            service,
            resolver,
            config,
        }
    }

    /// Parse one request line and produce the response line, if any
    /// (notifications get none).
    pub async fn handle_line(&self, line: &str, session_id: &str) -> Option<RpcResponse> {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                return Some(RpcResponse::failure(
                    serde_json::Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Invalid request: {}", e)),
                ));
            }
        };

        let id = request.id.clone()?;
        let method = request.method.clone();
        debug!(%method, session = session_id, "Handling call");

        let outcome = self.dispatch(request, session_id).await;

        Some(match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => {
                error!(%method, error = %err.message, code = err.code, "Call failed");
                RpcResponse::failure(id, err)
            }
        })
    }

    async fn dispatch(
        &self,
        request: RpcRequest,
        session_id: &str,
    ) -> Result<serde_json::Value, RpcError> {
        let result = match request.method.as_str() {
            "store" => {
                let params: StoreParams = parse_params(request.params)?;
                self.store(params, session_id).await.map(|r| json!(r))
            }
            "store_many" => {
                let params: StoreManyParams = parse_params(request.params)?;
                self.store_many(params, session_id).await.map(|r| json!(r))
            }
            "find" => {
                let params: FindParams = parse_params(request.params)?;
                self.find(params, session_id).await.map(|r| json!(r))
            }
            other => {
                return Err(RpcError::new(
                    METHOD_NOT_FOUND,
                    format!("Unknown method '{}'", other),
                ));
            }
        };

        result.map_err(RpcError::from)
    }

    /// `store(information, metadata?, collection?)` — remember one entry.
    pub async fn store(&self, params: StoreParams, session_id: &str) -> MemoryResult<String> {
        if params.information.trim().is_empty() {
            return Err(MemoryError::Validation(
                "'information' must be a non-empty string".to_string(),
            ));
        }

        let collection = self.collection_or_default(params.collection);
        let tenant = self
            .resolver
            .resolve(&self.call_context(params.user_id, session_id));

        let mut entry = Entry::new(params.information.clone());
        if let Some(metadata) = params.metadata {
            entry = entry.with_metadata(metadata);
        }

        self.service.store(entry, &collection, &tenant).await?;

        Ok(format!(
            "Remembered: {} in collection '{}'",
            params.information, collection
        ))
    }

    /// `store_many(chunks, metadatas?, collection?)` — bulk remember.
    pub async fn store_many(
        &self,
        params: StoreManyParams,
        session_id: &str,
    ) -> MemoryResult<String> {
        if params.chunks.iter().any(|c| c.trim().is_empty()) {
            return Err(MemoryError::Validation(
                "every chunk must be a non-empty string".to_string(),
            ));
        }

        let collection = self.collection_or_default(params.collection);
        let tenant = self
            .resolver
            .resolve(&self.call_context(params.user_id, session_id));

        let ids = self
            .service
            .store_many(params.chunks, params.metadatas, &collection, &tenant)
            .await?;

        Ok(format!(
            "Remembered {} entries in collection '{}'",
            ids.len(),
            collection
        ))
    }

    /// `find(query, collection?, limit?)` — retrieve nearest memories.
    ///
    /// Always answers with the no-information line rather than an error
    /// when there is nothing to return — including the fail-closed case
    /// where no tenant could be resolved.
    pub async fn find(&self, params: FindParams, session_id: &str) -> MemoryResult<Vec<String>> {
        if params.query.trim().is_empty() {
            return Err(MemoryError::Validation(
                "'query' must be a non-empty string".to_string(),
            ));
        }

        let limit = params.limit.unwrap_or(self.config.default_find_limit);
        if limit < 1 || limit > self.config.max_find_limit {
            return Err(MemoryError::Validation(format!(
                "'limit' must be between 1 and {}",
                self.config.max_find_limit
            )));
        }

        let collection = self.collection_or_default(params.collection);
        let tenant = self
            .resolver
            .resolve(&self.call_context(params.user_id, session_id));

        let entries = self
            .service
            .search(SearchQuery::new(&params.query, collection, limit, tenant))
            .await?;

        if entries.is_empty() {
            return Ok(vec![format!(
                "No information found for the query '{}'",
                params.query
            )]);
        }

        let mut lines = Vec::with_capacity(entries.len() + 1);
        lines.push(format!("Results for the query '{}'", params.query));
        lines.extend(entries.iter().map(format_entry));

        Ok(lines)
    }

    fn collection_or_default(&self, collection: Option<String>) -> String {
        collection
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.config.default_collection.clone())
    }

    fn call_context(&self, user_id: Option<String>, session_id: &str) -> CallContext {
        let mut ctx = CallContext::new().with_session(session_id);
        if let Some(user_id) = user_id {
            ctx = ctx.with_explicit_user(user_id);
        }
        ctx
    }
}

fn format_entry(entry: &Entry) -> String {
    let metadata = match &entry.metadata {
        Some(metadata) => serde_json::Value::Object(metadata.clone()).to_string(),
        None => "null".to_string(),
    };
    format!(
        "<entry><content>{}</content><metadata>{}</metadata></entry>",
        entry.content, metadata
    )
}

fn parse_params<T: serde::de::DeserializeOwned>(params: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(params)
        .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid parameters: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain_memory::embedding::EmbeddingProviderType;
    use domain_memory::resolver::SessionStore;
    use domain_memory::{
        CollectionConfig, EmbeddingProvider, MemoryPoint, ScoredMemory, TenantId,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn provider_type(&self) -> EmbeddingProviderType {
            EmbeddingProviderType::Ollama
        }

        fn vector_name(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> u64 {
            3
        }

        async fn embed(&self, _text: &str) -> MemoryResult<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    /// Minimal engine fake: stores points per collection, returns a
    /// tenant's points in insertion order with a constant score.
    #[derive(Default)]
    struct FakeRepo {
        collections: Mutex<HashMap<String, Vec<MemoryPoint>>>,
    }

    #[async_trait]
    impl MemoryRepository for FakeRepo {
        async fn collection_exists(&self, name: &str) -> MemoryResult<bool> {
            Ok(self.collections.lock().unwrap().contains_key(name))
        }

        async fn collection_config(
            &self,
            _name: &str,
            vector_name: &str,
        ) -> MemoryResult<Option<CollectionConfig>> {
            Ok(Some(CollectionConfig {
                vector_name: vector_name.to_string(),
                dimension: 3,
                distance: Default::default(),
            }))
        }

        async fn create_collection(
            &self,
            name: &str,
            _config: &CollectionConfig,
        ) -> MemoryResult<bool> {
            self.collections
                .lock()
                .unwrap()
                .insert(name.to_string(), Vec::new());
            Ok(true)
        }

        async fn upsert(&self, collection: &str, point: MemoryPoint) -> MemoryResult<Uuid> {
            let id = point.id;
            self.collections
                .lock()
                .unwrap()
                .get_mut(collection)
                .expect("collection ensured before upsert")
                .push(point);
            Ok(id)
        }

        async fn upsert_batch(
            &self,
            collection: &str,
            points: Vec<MemoryPoint>,
        ) -> MemoryResult<Vec<Uuid>> {
            let mut ids = Vec::new();
            for point in points {
                ids.push(self.upsert(collection, point).await?);
            }
            Ok(ids)
        }

        async fn search(
            &self,
            collection: &str,
            _vector_name: &str,
            _vector: Vec<f32>,
            limit: u64,
            tenant: &TenantId,
        ) -> MemoryResult<Vec<ScoredMemory>> {
            Ok(self
                .collections
                .lock()
                .unwrap()
                .get(collection)
                .map(|points| {
                    points
                        .iter()
                        .filter(|p| {
                            p.payload.metadata.get("user_id").and_then(|v| v.as_str())
                                == Some(tenant.as_str())
                        })
                        .take(limit as usize)
                        .map(|p| ScoredMemory {
                            id: p.id,
                            score: 1.0,
                            payload: p.payload.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    fn tools() -> MemoryTools<FakeRepo> {
        let service = Arc::new(MemoryService::new(
            FakeRepo::default(),
            Arc::new(FixedEmbedder),
        ));
        // No env fallback: tenant identity must come from the call or session.
        let resolver = Arc::new(TenantResolver::standard(Arc::new(SessionStore::new()), None));
        MemoryTools::new(service, resolver, MemoryServerConfig::default())
    }

    fn store_params(information: &str, user_id: Option<&str>) -> StoreParams {
        StoreParams {
            information: information.to_string(),
            metadata: None,
            collection: None,
            user_id: user_id.map(String::from),
        }
    }

    fn find_params(query: &str, user_id: Option<&str>) -> FindParams {
        FindParams {
            query: query.to_string(),
            collection: None,
            limit: None,
            user_id: user_id.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_store_returns_confirmation_with_default_collection() {
        let tools = tools();
        let message = tools
            .store(store_params("the wifi password is hunter2", Some("u1")), "s1")
            .await
            .unwrap();
        assert_eq!(
            message,
            "Remembered: the wifi password is hunter2 in collection 'memories'"
        );
    }

    #[tokio::test]
    async fn test_store_without_tenant_is_rejected() {
        let tools = tools();
        let err = tools
            .store(store_params("orphan note", None), "s1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TENANT_REQUIRED");
    }

    #[tokio::test]
    async fn test_store_rejects_blank_information() {
        let tools = tools();
        let err = tools
            .store(store_params("   ", Some("u1")), "s1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_find_formats_header_and_entries() {
        let tools = tools();
        tools
            .store(store_params("favorite color is green", Some("u1")), "s1")
            .await
            .unwrap();

        let lines = tools
            .find(find_params("favorite color", Some("u1")), "s1")
            .await
            .unwrap();

        assert_eq!(lines[0], "Results for the query 'favorite color'");
        assert_eq!(
            lines[1],
            "<entry><content>favorite color is green</content><metadata>null</metadata></entry>"
        );
    }

    #[tokio::test]
    async fn test_find_for_other_tenant_reports_no_information() {
        let tools = tools();
        tools
            .store(store_params("favorite color is green", Some("u1")), "s1")
            .await
            .unwrap();

        let lines = tools
            .find(find_params("favorite color", Some("u2")), "s1")
            .await
            .unwrap();

        assert_eq!(
            lines,
            vec!["No information found for the query 'favorite color'".to_string()]
        );
    }

    #[tokio::test]
    async fn test_find_with_unresolved_tenant_fails_closed_to_no_information() {
        let tools = tools();
        tools
            .store(store_params("secret", Some("u1")), "s1")
            .await
            .unwrap();

        // No explicit user, no session binding, no env fallback configured.
        let lines = tools.find(find_params("secret", None), "s1").await.unwrap();

        assert_eq!(
            lines,
            vec!["No information found for the query 'secret'".to_string()]
        );
    }

    #[tokio::test]
    async fn test_find_rejects_limit_above_max() {
        let tools = tools();
        let mut params = find_params("anything", Some("u1"));
        params.limit = Some(5000);

        let err = tools.find(params, "s1").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_handle_line_reports_parse_errors() {
        let tools = tools();
        let response = tools.handle_line("{not json", "s1").await.unwrap();
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_handle_line_roundtrip_store_and_find() {
        let tools = tools();

        let store_line = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "store",
            "params": {"information": "deploy friday", "user_id": "u1"},
        })
        .to_string();
        let response = tools.handle_line(&store_line, "s1").await.unwrap();
        assert!(response.error.is_none());

        let find_line = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "find",
            "params": {"query": "deploy", "user_id": "u1"},
        })
        .to_string();
        let response = tools.handle_line(&find_line, "s1").await.unwrap();
        let result = response.result.unwrap();
        assert_eq!(result[0], "Results for the query 'deploy'");
    }

    #[tokio::test]
    async fn test_unknown_method_reports_method_not_found() {
        let tools = tools();
        let line = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 9,
            "method": "forget",
            "params": {},
        })
        .to_string();
        let response = tools.handle_line(&line, "s1").await.unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let tools = tools();
        let line = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "store",
            "params": {"information": "x", "user_id": "u1"},
        })
        .to_string();
        assert!(tools.handle_line(&line, "s1").await.is_none());
    }
}
