//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The embedding service could not be reached.
    #[error("embedding service unavailable at {url}: {reason}")]
    ServiceUnavailable { url: String, reason: String },

    /// The configured model is not installed on the service.
    #[error("model '{model}' is not installed; pull it first (e.g. `ollama pull {model}`)")]
    ModelMissing { model: String },

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::ServiceUnavailable { .. }
                | EmbeddingError::ApiRequest(_)
                | EmbeddingError::Http(_)
        )
    }
}
