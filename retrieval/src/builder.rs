//! One-time population of the vector store from the review corpus.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use reviewrag_embeddings::{Embedding, EmbeddingError, EmbeddingProvider};

use crate::corpus::{ReviewRecord, load_corpus};
use crate::error::Result;
use crate::store::{IndexedDocument, PopulationMarker, VectorStore};

/// Default number of texts per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default number of embedding requests in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome of a bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapReport {
    /// The store was already populated; nothing was loaded or embedded.
    Skipped { existing: usize },

    /// The corpus was embedded and stored.
    Populated { documents: usize },
}

impl BootstrapReport {
    /// Number of documents in the store after the bootstrap.
    pub fn documents(&self) -> usize {
        match *self {
            BootstrapReport::Skipped { existing } => existing,
            BootstrapReport::Populated { documents } => documents,
        }
    }
}

/// Builds the index from the corpus exactly once per store location.
///
/// A store counts as populated only once its completion marker is written.
/// A store holding documents without a marker was interrupted mid-bootstrap;
/// it is cleared and rebuilt. Corpus edits after a successful bootstrap are
/// not picked up until the store is cleared.
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    corpus_path: PathBuf,
    batch_size: usize,
    concurrency: usize,
}

impl IndexBuilder {
    /// Create a builder for the corpus at `corpus_path`.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        corpus_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            store,
            corpus_path: corpus_path.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the number of texts per embedding request (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the number of embedding requests in flight (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Populate the store unless a previous bootstrap completed.
    ///
    /// Loading and embedding finish before anything is written, so a corpus
    /// or embedding failure leaves the store untouched.
    pub async fn bootstrap(&self) -> Result<BootstrapReport> {
        if let Some(marker) = self.store.population().await {
            if marker.embedding_model != self.provider.model() {
                warn!(
                    "Index was built with model '{}' but '{}' is configured; clear the index to re-embed",
                    marker.embedding_model,
                    self.provider.model()
                );
            }
            info!("Using existing index with {} reviews", marker.documents);
            return Ok(BootstrapReport::Skipped {
                existing: marker.documents,
            });
        }

        let start = Instant::now();
        let records = load_corpus(&self.corpus_path)?;
        let texts: Vec<String> = records.iter().map(ReviewRecord::document_text).collect();

        info!(
            "Embedding {} reviews with model {} (batch size {}, concurrency {})",
            texts.len(),
            self.provider.model(),
            self.batch_size,
            self.concurrency
        );
        let embeddings = self.embed_all(&texts).await?;

        let documents: Vec<IndexedDocument> = records
            .into_iter()
            .zip(texts)
            .zip(embeddings)
            .map(|((record, text), embedding)| IndexedDocument {
                metadata: record.metadata(),
                id: record.id,
                embedding,
                text,
            })
            .collect();
        let count = documents.len();

        if self.store.exists().await {
            warn!("Found an incomplete index from an interrupted bootstrap; rebuilding it");
            self.store.clear().await?;
        }

        self.store.upsert(documents).await?;
        self.store
            .mark_populated(PopulationMarker::new(count, self.provider.model()))
            .await?;
        self.store.flush().await?;

        info!(
            "Indexed {count} reviews in {}ms",
            start.elapsed().as_millis()
        );
        Ok(BootstrapReport::Populated { documents: count })
    }

    /// Embed `texts` in batches, keeping input order whatever order the
    /// batches complete in.
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let total = texts.len().div_ceil(self.batch_size);

        let batches: Vec<Vec<Embedding>> = stream::iter(texts.chunks(self.batch_size).enumerate())
            .map(|(batch, chunk)| self.embed_chunk(batch, total, chunk))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    async fn embed_chunk(
        &self,
        batch: usize,
        total: usize,
        chunk: &[String],
    ) -> std::result::Result<Vec<Embedding>, EmbeddingError> {
        let embeddings = self.provider.embed_batch(chunk).await?;
        if embeddings.len() != chunk.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "batch {}: requested {} embeddings, received {}",
                batch + 1,
                chunk.len(),
                embeddings.len()
            )));
        }

        debug!("Embedded batch {}/{total}", batch + 1);
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::error::RetrievalError;
    use crate::store::FileVectorStore;

    const CORPUS: &str =
        "Title,Review,Rating,Date\nA,a,1,\nBB,bb,2,\nCCC,ccc,3,\nDDDD,dddd,4,\nEEEEE,eeeee,5,\n";

    /// How a [`TestProvider`] misbehaves.
    #[derive(Clone, Copy)]
    enum Fault {
        None,
        /// Later batches answer before the first one.
        SlowFirst,
        /// The given 0-based batch fails as if the server went away.
        FailBatch(usize),
        /// Every batch comes back one embedding short.
        ShortBatch,
    }

    /// Embeds a text as its length.
    struct TestProvider {
        model: &'static str,
        fault: Fault,
        batches: AtomicUsize,
    }

    impl TestProvider {
        fn new(model: &'static str, fault: Fault) -> Arc<Self> {
            Arc::new(Self {
                model,
                fault,
                batches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TestProvider {
        fn name(&self) -> &str {
            "test"
        }

        fn model(&self) -> &str {
            self.model
        }

        async fn embed(&self, text: &str) -> reviewrag_embeddings::Result<Embedding> {
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> reviewrag_embeddings::Result<Vec<Embedding>> {
            let batch = self.batches.fetch_add(1, Ordering::SeqCst);
            let mut embeddings: Vec<Embedding> =
                texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect();

            match self.fault {
                Fault::None => {}
                Fault::SlowFirst => {
                    if batch == 0 {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
                Fault::FailBatch(failing) => {
                    if batch == failing {
                        return Err(EmbeddingError::ServiceUnavailable {
                            url: "http://localhost:11434".to_string(),
                            reason: "connection refused".to_string(),
                        });
                    }
                }
                Fault::ShortBatch => {
                    embeddings.pop();
                }
            }
            Ok(embeddings)
        }
    }

    fn write_corpus(dir: &Path) -> PathBuf {
        let corpus = dir.join("reviews.csv");
        std::fs::write(&corpus, CORPUS).unwrap();
        corpus
    }

    async fn open_store(dir: &Path) -> Arc<FileVectorStore> {
        Arc::new(FileVectorStore::open(dir, "reviews").await.unwrap())
    }

    #[tokio::test]
    async fn test_batches_are_reassembled_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let corpus = write_corpus(temp_dir.path());
        let store = open_store(&temp_dir.path().join("db")).await;
        let provider = TestProvider::new("test-v1", Fault::SlowFirst);

        let builder = IndexBuilder::new(provider.clone(), store.clone(), &corpus)
            .with_batch_size(2)
            .with_concurrency(3);
        let report = builder.bootstrap().await.unwrap();

        assert_eq!(report, BootstrapReport::Populated { documents: 5 });
        assert_eq!(provider.batches.load(Ordering::SeqCst), 3);

        let hits = store.query(&[10.0, 1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 5);
        for hit in hits {
            assert_eq!(hit.document.embedding[0] as usize, hit.document.text.len());
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let corpus = write_corpus(temp_dir.path());
        let index_dir = temp_dir.path().join("db");
        let store = open_store(&index_dir).await;
        let provider = TestProvider::new("test-v1", Fault::FailBatch(1));

        let result = IndexBuilder::new(provider, store.clone(), &corpus)
            .with_batch_size(2)
            .with_concurrency(1)
            .bootstrap()
            .await;

        assert!(matches!(
            result,
            Err(RetrievalError::Embedding(EmbeddingError::ServiceUnavailable { .. }))
        ));
        assert!(!store.exists().await);
        assert!(!store.is_populated().await);
        assert!(!index_dir.exists());
    }

    #[tokio::test]
    async fn test_short_batch_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let corpus = write_corpus(temp_dir.path());
        let index_dir = temp_dir.path().join("db");
        let store = open_store(&index_dir).await;
        let provider = TestProvider::new("test-v1", Fault::ShortBatch);

        let result = IndexBuilder::new(provider, store.clone(), &corpus)
            .with_batch_size(2)
            .bootstrap()
            .await;

        match result {
            Err(RetrievalError::Embedding(EmbeddingError::InvalidResponse(reason))) => {
                assert!(reason.contains("requested 2 embeddings, received 1"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!index_dir.exists());
    }

    #[tokio::test]
    async fn test_model_change_keeps_existing_index() {
        let temp_dir = TempDir::new().unwrap();
        let corpus = write_corpus(temp_dir.path());
        let index_dir = temp_dir.path().join("db");

        let first = TestProvider::new("test-v1", Fault::None);
        IndexBuilder::new(first, open_store(&index_dir).await, &corpus)
            .bootstrap()
            .await
            .unwrap();

        let store = open_store(&index_dir).await;
        let second = TestProvider::new("test-v2", Fault::None);
        let report = IndexBuilder::new(second.clone(), store.clone(), &corpus)
            .bootstrap()
            .await
            .unwrap();

        assert_eq!(report, BootstrapReport::Skipped { existing: 5 });
        assert_eq!(second.batches.load(Ordering::SeqCst), 0);
        let marker = store.population().await.unwrap();
        assert_eq!(marker.embedding_model, "test-v1");
    }
}
