//! The embedding provider capability.

use async_trait::async_trait;

use crate::Embedding;
use crate::error::Result;

/// Trait for embedding providers.
///
/// Implementations must be deterministic for a fixed model and text: the
/// index is built once and queried later, so the same text has to land on
/// the same vector in both phases.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the model this provider embeds with.
    fn model(&self) -> &str;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        // Default implementation: process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

#[async_trait]
impl<P> EmbeddingProvider for std::sync::Arc<P>
where
    P: EmbeddingProvider + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        (**self).embed_batch(texts).await
    }
}
