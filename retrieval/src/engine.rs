//! Question answering over the review index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use reviewrag_embeddings::{CachedProvider, EmbeddingCache, EmbeddingProvider, OllamaProvider};

use crate::answer::{AnswerGenerator, OllamaGenerator};
use crate::builder::{BootstrapReport, IndexBuilder};
use crate::config::{EmbeddingConfig, ReviewRagConfig};
use crate::context::format_reviews;
use crate::error::Result;
use crate::retriever::Retriever;
use crate::store::{FileVectorStore, IndexedDocument, VectorStore};

/// The answer to one question.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Generated answer; `None` when no reviews matched.
    pub text: Option<String>,

    /// Reviews the answer was based on, best first.
    pub reviews: Vec<IndexedDocument>,
}

/// Review question-answering engine.
///
/// Owns the index builder, retriever and answer generator for one
/// collection. Call [`ReviewQa::bootstrap`] once before asking questions.
pub struct ReviewQa {
    config: ReviewRagConfig,
    store: Arc<dyn VectorStore>,
    builder: IndexBuilder,
    retriever: Retriever,
    generator: Arc<dyn AnswerGenerator>,
}

impl ReviewQa {
    /// Create a new engine builder.
    pub fn builder() -> ReviewQaBuilder {
        ReviewQaBuilder::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReviewRagConfig {
        &self.config
    }

    /// Populate the index unless a previous bootstrap completed.
    pub async fn bootstrap(&self) -> Result<BootstrapReport> {
        self.builder.bootstrap().await
    }

    /// Delete the persisted collection so the next bootstrap re-embeds the
    /// corpus.
    pub async fn reset(&self) -> Result<()> {
        info!("Resetting collection '{}'", self.config.collection);
        self.store.clear().await
    }

    /// Answer a question from the most similar reviews.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let reviews = self.retriever.retrieve(question).await?;
        if reviews.is_empty() {
            debug!("No reviews matched; skipping answer generation");
            return Ok(Answer {
                text: None,
                reviews,
            });
        }

        let context = format_reviews(&reviews, self.config.query.max_context_chars);
        let text = self.generator.generate(question.trim(), &context).await?;

        Ok(Answer {
            text: Some(text),
            reviews,
        })
    }
}

/// Builder for [`ReviewQa`].
///
/// Components not supplied are constructed from the configuration: an
/// Ollama embedding provider behind a question cache, a file-backed store
/// and an Ollama answer generator.
pub struct ReviewQaBuilder {
    config: ReviewRagConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl ReviewQaBuilder {
    /// Create a new builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: ReviewRagConfig::default(),
            provider: None,
            store: None,
            generator: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ReviewRagConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the embedding provider.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the vector store.
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the answer generator.
    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the engine.
    pub async fn build(self) -> Result<ReviewQa> {
        let config = self.config;
        config.validate()?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => cached_provider(ollama_provider(&config.embedding)?, &config.embedding),
        };
        let store: Arc<dyn VectorStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileVectorStore::open(&config.index_dir, config.collection.clone()).await?),
        };
        let generator: Arc<dyn AnswerGenerator> = match self.generator {
            Some(generator) => generator,
            None => Arc::new(OllamaGenerator::new(&config.answer)?),
        };

        let builder = IndexBuilder::new(provider.clone(), store.clone(), &config.corpus_path)
            .with_batch_size(config.embedding.batch_size)
            .with_concurrency(config.embedding.concurrency);
        let retriever = Retriever::new(provider, store.clone()).with_k(config.query.k);

        Ok(ReviewQa {
            config,
            store,
            builder,
            retriever,
            generator,
        })
    }
}

impl Default for ReviewQaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Ollama embedding provider for the configured server and model.
pub fn ollama_provider(config: &EmbeddingConfig) -> Result<OllamaProvider> {
    let provider = OllamaProvider::new()
        .with_base_url(&config.base_url)
        .with_model(&config.model)
        .with_timeout(Duration::from_secs(config.timeout_secs))?;
    Ok(provider)
}

/// Wrap `provider` so repeated questions are embedded once.
pub fn cached_provider<P>(provider: P, config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider>
where
    P: EmbeddingProvider + 'static,
{
    Arc::new(CachedProvider::new(
        provider,
        EmbeddingCache::new(config.cache_max_entries),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ReviewMetadata;
    use crate::error::RetrievalError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;

    use reviewrag_embeddings::Embedding;

    struct ConstantProvider;

    #[async_trait]
    impl EmbeddingProvider for ConstantProvider {
        fn name(&self) -> &str {
            "constant"
        }

        fn model(&self) -> &str {
            "constant-v1"
        }

        async fn embed(&self, _text: &str) -> reviewrag_embeddings::Result<Embedding> {
            Ok(vec![1.0, 0.0])
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AnswerGenerator for RecordingGenerator {
        async fn generate(&self, question: &str, reviews: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((question.to_string(), reviews.to_string()));
            Ok("answer".to_string())
        }
    }

    async fn engine(
        temp_dir: &TempDir,
        generator: Arc<RecordingGenerator>,
    ) -> (ReviewQa, Arc<FileVectorStore>) {
        let store = Arc::new(
            FileVectorStore::open(temp_dir.path().join("db"), "reviews")
                .await
                .unwrap(),
        );
        let qa = ReviewQa::builder()
            .with_config(ReviewRagConfig::default().with_corpus_path(temp_dir.path().join("none.csv")))
            .with_provider(Arc::new(ConstantProvider))
            .with_store(store.clone())
            .with_generator(generator)
            .build()
            .await
            .unwrap();
        (qa, store)
    }

    #[tokio::test]
    async fn test_ask_passes_formatted_reviews() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let (qa, store) = engine(&temp_dir, generator.clone()).await;
        store
            .upsert(vec![IndexedDocument {
                id: "0".to_string(),
                embedding: vec![1.0, 0.0],
                text: "Great crust. Crispy.".to_string(),
                metadata: ReviewMetadata {
                    rating: Some(5),
                    date: Some("2024-03-01".to_string()),
                    title: Some("Great crust".to_string()),
                },
            }])
            .await
            .unwrap();

        let answer = qa.ask("  How is the crust?  ").await.unwrap();

        assert_eq!(answer.text.as_deref(), Some("answer"));
        assert_eq!(answer.reviews.len(), 1);
        let calls = generator.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(
                "How is the crust?".to_string(),
                "Review 1 (Rating: 5/5, Date: 2024-03-01):\nGreat crust. Crispy.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_ask_without_reviews_skips_generation() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let (qa, _store) = engine(&temp_dir, generator.clone()).await;

        let answer = qa.ask("Anything?").await.unwrap();

        assert_eq!(answer.text, None);
        assert!(answer.reviews.is_empty());
        assert!(generator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ask_empty_question() {
        let temp_dir = TempDir::new().unwrap();
        let (qa, _store) = engine(&temp_dir, Arc::new(RecordingGenerator::default())).await;

        let err = qa.ask("   ").await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let result = ReviewQa::builder()
            .with_config(ReviewRagConfig::default().with_k(0))
            .with_provider(Arc::new(ConstantProvider))
            .build()
            .await;

        assert!(matches!(result, Err(RetrievalError::Config(_))));
    }
}
