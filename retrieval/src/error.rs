//! Error types for review retrieval.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while indexing or querying reviews.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The corpus file does not exist.
    #[error("corpus file not found: {}", .0.display())]
    CorpusNotFound(PathBuf),

    /// The corpus file is missing required columns or has unreadable rows.
    #[error("malformed corpus {}: {reason}", path.display())]
    CorpusMalformed { path: PathBuf, reason: String },

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] reviewrag_embeddings::EmbeddingError),

    /// The persisted store is corrupt or cannot be written.
    #[error("vector store unavailable at {}: {reason}", path.display())]
    StoreUnavailable { path: PathBuf, reason: String },

    /// The question cannot be answered as given.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The answer model failed.
    #[error("answer generation failed: {0}")]
    Generation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    pub(crate) fn store(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        RetrievalError::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RetrievalError::CorpusMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure concerns a single question and the caller may
    /// simply ask again.
    pub fn is_transient(&self) -> bool {
        match self {
            RetrievalError::Embedding(e) => e.is_transient(),
            RetrievalError::StoreUnavailable { .. } | RetrievalError::Generation(_) => true,
            _ => false,
        }
    }
}
