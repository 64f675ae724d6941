//! Line-oriented JSON-RPC 2.0 framing for the stdio transport.
//!
//! One request object per line on stdin, one response object per line on
//! stdout. Requests without an `id` are notifications and get no response.

use serde::{Deserialize, Serialize};

use domain_memory::MemoryError;

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC "server error" range; the stable domain code travels in
/// `error.data.code`.
pub const SERVER_ERROR: i64 = -32000;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<MemoryError> for RpcError {
    fn from(err: MemoryError) -> Self {
        let code = match &err {
            MemoryError::Validation(_) => INVALID_PARAMS,
            _ => SERVER_ERROR,
        };

        Self {
            code,
            message: err.to_string(),
            data: Some(serde_json::json!({
                "code": err.code(),
                "retryable": err.is_retryable(),
            })),
        }
    }
}

// ===== Tool parameters =====

#[derive(Debug, Deserialize)]
pub struct StoreParams {
    pub information: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StoreManyParams {
    pub chunks: Vec<String>,
    #[serde(default)]
    pub metadatas: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FindParams {
    pub query: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub user_id: Option<String>,
}
