//! Configuration for review indexing and question answering.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, RetrievalError};

/// Configuration for the whole pipeline.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewRagConfig {
    /// CSV file holding the reviews.
    pub corpus_path: PathBuf,

    /// Directory holding the persisted index.
    pub index_dir: PathBuf,

    /// Collection name inside the index directory.
    pub collection: String,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Query processing configuration.
    pub query: QueryConfig,

    /// Answer model configuration.
    pub answer: AnswerConfig,
}

impl ReviewRagConfig {
    /// Load a configuration file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Set the corpus path.
    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = path.into();
        self
    }

    /// Set the index directory.
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = dir.into();
        self
    }

    /// Set the number of reviews retrieved per question.
    pub fn with_k(mut self, k: usize) -> Self {
        self.query.k = k;
        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(RetrievalError::Config("collection must not be empty".into()));
        }
        if self.query.k == 0 {
            return Err(RetrievalError::Config("query.k must be at least 1".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(RetrievalError::Config(
                "embedding.batch_size must be at least 1".into(),
            ));
        }
        if self.embedding.timeout_secs == 0 || self.answer.timeout_secs == 0 {
            return Err(RetrievalError::Config("timeouts must be at least 1 second".into()));
        }
        if self.embedding.concurrency == 0 {
            return Err(RetrievalError::Config(
                "embedding.concurrency must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.answer.temperature) {
            return Err(RetrievalError::Config(format!(
                "answer.temperature must be between 0 and 2, got {}",
                self.answer.temperature
            )));
        }
        Ok(())
    }
}

impl Default for ReviewRagConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("realistic_restaurant_reviews.csv"),
            index_dir: PathBuf::from("./chrome_langchain_db"),
            collection: "restaurant_reviews".to_string(),
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
            answer: AnswerConfig::default(),
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Ollama server address.
    pub base_url: String,

    /// Model to use for embeddings.
    pub model: String,

    /// Texts sent per embedding request during bootstrap.
    pub batch_size: usize,

    /// Embedding requests in flight during bootstrap.
    pub concurrency: usize,

    /// Question embeddings kept in memory (0 disables the cache).
    pub cache_max_entries: usize,

    /// Upper bound on a single embedding request.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: reviewrag_embeddings::ollama::DEFAULT_BASE_URL.to_string(),
            model: reviewrag_embeddings::ollama::DEFAULT_MODEL.to_string(),
            batch_size: 32,
            concurrency: 4,
            cache_max_entries: 256,
            timeout_secs: 60,
        }
    }
}

/// Configuration for query processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Number of reviews retrieved per question.
    pub k: usize,

    /// Characters of each review shown to the answer model.
    pub max_context_chars: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            k: 5,
            max_context_chars: crate::context::DEFAULT_MAX_CHARS,
        }
    }
}

/// Configuration for the answer model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnswerConfig {
    /// Ollama server address.
    pub base_url: String,

    /// Chat model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Upper bound on a single answer request.
    pub timeout_secs: u64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            base_url: reviewrag_embeddings::ollama::DEFAULT_BASE_URL.to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}
