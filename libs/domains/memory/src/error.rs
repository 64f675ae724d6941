use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Fatal at startup: bad provider type, missing URL, malformed settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store operation was attempted without a resolved tenant identity.
    #[error("Tenant identity required for this operation")]
    TenantRequired,

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The embedding backend failed to initialize or serve a request.
    #[error("Embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A bounded network call to the embedding backend or vector engine
    /// timed out. Safe to retry; retries belong to the caller.
    #[error("Backend call timed out: {0}")]
    BackendTimeout(String),

    /// An existing collection carries a vector configuration that does not
    /// match what the active embedding provider requires.
    #[error(
        "Collection '{collection}' exists with a different vector configuration: expected {expected}, found {actual}"
    )]
    CollectionConfigMismatch {
        collection: String,
        expected: String,
        actual: String,
    },

    #[error("Vector engine error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Stable error code surfaced at the tool server boundary.
    pub fn code(&self) -> &'static str {
        match self {
            MemoryError::Config(_) => "CONFIG_ERROR",
            MemoryError::TenantRequired => "TENANT_REQUIRED",
            MemoryError::Validation(_) => "VALIDATION_ERROR",
            MemoryError::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            MemoryError::BackendTimeout(_) => "BACKEND_TIMEOUT",
            MemoryError::CollectionConfigMismatch { .. } => "COLLECTION_CONFIG_MISMATCH",
            MemoryError::Backend(_) => "BACKEND_ERROR",
            MemoryError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller may safely retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MemoryError::BackendTimeout(_))
    }
}

impl From<qdrant_client::QdrantError> for MemoryError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        let msg = err.to_string();
        // The gRPC client reports deadline expiry in the status message.
        if msg.contains("deadline") || msg.contains("timed out") || msg.contains("timeout") {
            MemoryError::BackendTimeout(msg)
        } else {
            MemoryError::Backend(msg)
        }
    }
}

impl From<reqwest::Error> for MemoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MemoryError::BackendTimeout(err.to_string())
        } else {
            MemoryError::EmbeddingUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Internal(format!("JSON error: {}", err))
    }
}

impl From<core_config::ConfigError> for MemoryError {
    fn from(err: core_config::ConfigError) -> Self {
        MemoryError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(MemoryError::TenantRequired.code(), "TENANT_REQUIRED");
        assert_eq!(
            MemoryError::BackendTimeout("slow".into()).code(),
            "BACKEND_TIMEOUT"
        );
        assert_eq!(
            MemoryError::Config("bad provider".into()).code(),
            "CONFIG_ERROR"
        );
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        assert!(MemoryError::BackendTimeout("slow".into()).is_retryable());
        assert!(!MemoryError::TenantRequired.is_retryable());
        assert!(!MemoryError::EmbeddingUnavailable("down".into()).is_retryable());
    }
}
