//! Question-to-reviews lookup.

use std::sync::Arc;

use tracing::debug;

use reviewrag_embeddings::EmbeddingProvider;

use crate::error::{Result, RetrievalError};
use crate::store::{IndexedDocument, ScoredDocument, VectorStore};

/// Default number of reviews returned per question.
pub const DEFAULT_K: usize = 5;

/// Finds the reviews nearest to a question.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            provider,
            store,
            k: DEFAULT_K,
        }
    }

    /// Set the number of reviews returned per question.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Up to `k` reviews nearest to `question`, best first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<IndexedDocument>> {
        Ok(self
            .retrieve_scored(question)
            .await?
            .into_iter()
            .map(|hit| hit.document)
            .collect())
    }

    /// Like [`Retriever::retrieve`], keeping the similarity scores.
    pub async fn retrieve_scored(&self, question: &str) -> Result<Vec<ScoredDocument>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "question must not be empty".to_string(),
            ));
        }

        let embedding = self.provider.embed(question).await?;
        let hits = self.store.query(&embedding, self.k).await?;

        debug!(
            "Retrieved {} reviews for question ({} chars)",
            hits.len(),
            question.len()
        );
        Ok(hits)
    }
}
