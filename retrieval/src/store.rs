//! Persistent vector store for indexed reviews.
//!
//! `FileVectorStore` keeps one collection per JSON file inside the index
//! directory, plus a completion marker written only after a bootstrap has
//! upserted every document:
//!
//! ```text
//! <index_dir>/
//!   <collection>.json            documents, in insertion order
//!   <collection>.populated.json  completion marker
//! ```
//!
//! Every write goes to a temporary file that is renamed into place, so a
//! crash leaves either the old file or the new one. Queries rank by cosine
//! similarity, highest first, with ties in insertion order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use reviewrag_embeddings::index::IndexEntry;
use reviewrag_embeddings::{Embedding, VectorIndex};

use crate::corpus::ReviewMetadata;
use crate::error::{Result, RetrievalError};

/// A review as stored in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Matches the review record id.
    pub id: String,

    /// Embedding of `text`.
    pub embedding: Embedding,

    /// The embedded text: title and body.
    pub text: String,

    /// Rating, date and title.
    pub metadata: ReviewMetadata,
}

/// A query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: IndexedDocument,

    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Written once a bootstrap has stored every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationMarker {
    /// Number of documents the bootstrap stored.
    pub documents: usize,

    /// Model the documents were embedded with.
    pub embedding_model: String,

    /// When the bootstrap finished.
    pub completed_at: DateTime<Utc>,
}

impl PopulationMarker {
    pub fn new(documents: usize, embedding_model: impl Into<String>) -> Self {
        Self {
            documents,
            embedding_model: embedding_model.into(),
            completed_at: Utc::now(),
        }
    }
}

/// Storage for indexed documents with k-nearest-neighbor lookup.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether storage has been initialized at the configured location.
    async fn exists(&self) -> bool;

    /// The completion marker, if a bootstrap finished against this store.
    async fn population(&self) -> Option<PopulationMarker>;

    /// Whether a bootstrap finished against this store.
    async fn is_populated(&self) -> bool {
        self.population().await.is_some()
    }

    /// Insert documents; a document with an existing id replaces it.
    async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<()>;

    /// Up to `k` documents nearest to `vector`, best first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Record that a bootstrap completed.
    async fn mark_populated(&self, marker: PopulationMarker) -> Result<()>;

    /// Number of stored documents.
    async fn count(&self) -> usize;

    /// Remove every document and the completion marker.
    async fn clear(&self) -> Result<()>;

    /// Make sure everything written so far is on disk.
    async fn flush(&self) -> Result<()>;
}

/// Text and metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredPayload {
    text: String,
    metadata: ReviewMetadata,
}

/// On-disk format of a collection.
#[derive(Debug, Deserialize)]
struct CollectionData {
    version: u32,
    collection: String,
    #[serde(default)]
    dimension: Option<usize>,
    documents: Vec<IndexEntry<StoredPayload>>,
}

#[derive(Debug, Serialize)]
struct CollectionDataRef<'a> {
    version: u32,
    collection: &'a str,
    dimension: Option<usize>,
    documents: Vec<&'a IndexEntry<StoredPayload>>,
}

const FORMAT_VERSION: u32 = 1;

#[derive(Default)]
struct StoreState {
    index: VectorIndex<StoredPayload>,
    marker: Option<PopulationMarker>,
}

/// File-backed vector store.
pub struct FileVectorStore {
    /// Index directory.
    dir: PathBuf,

    /// Collection name; also the file stem.
    collection: String,

    state: RwLock<StoreState>,
}

impl FileVectorStore {
    /// Open the collection at `dir`, loading it if it was persisted before.
    ///
    /// Nothing is created on disk until the first write.
    pub async fn open(dir: impl AsRef<Path>, collection: impl Into<String>) -> Result<Self> {
        let store = Self {
            dir: dir.as_ref().to_path_buf(),
            collection: collection.into(),
            state: RwLock::new(StoreState::default()),
        };

        let index = store.load_collection().await?;
        let marker = store.load_marker().await?;
        info!(
            "Opened collection '{}' at {} ({} documents)",
            store.collection,
            store.dir.display(),
            index.len()
        );

        *store.state.write().await = StoreState { index, marker };
        Ok(store)
    }

    fn collection_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.collection))
    }

    fn marker_path(&self) -> PathBuf {
        self.dir.join(format!("{}.populated.json", self.collection))
    }

    async fn load_collection(&self) -> Result<VectorIndex<StoredPayload>> {
        let path = self.collection_path();
        if !fs::try_exists(&path).await? {
            return Ok(VectorIndex::new());
        }

        let content = fs::read(&path)
            .await
            .map_err(|e| RetrievalError::store(&path, e))?;
        let data: CollectionData = serde_json::from_slice(&content)
            .map_err(|e| RetrievalError::store(&path, format!("corrupt collection file: {e}")))?;

        if data.version != FORMAT_VERSION {
            return Err(RetrievalError::store(
                &path,
                format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    data.version
                ),
            ));
        }
        if data.collection != self.collection {
            return Err(RetrievalError::store(
                &path,
                format!(
                    "file holds collection '{}', expected '{}'",
                    data.collection, self.collection
                ),
            ));
        }

        VectorIndex::from_entries(data.dimension, data.documents)
            .map_err(|e| RetrievalError::store(&path, format!("corrupt collection file: {e}")))
    }

    async fn load_marker(&self) -> Result<Option<PopulationMarker>> {
        let path = self.marker_path();
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let content = fs::read(&path)
            .await
            .map_err(|e| RetrievalError::store(&path, e))?;
        let marker = serde_json::from_slice(&content)
            .map_err(|e| RetrievalError::store(&path, format!("corrupt marker file: {e}")))?;
        Ok(Some(marker))
    }

    /// Write `content` to `path` through a temporary file.
    async fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RetrievalError::store(&self.dir, e))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)
            .await
            .map_err(|e| RetrievalError::store(&temp_path, e))?;
        fs::rename(&temp_path, path)
            .await
            .map_err(|e| RetrievalError::store(path, e))?;
        Ok(())
    }

    async fn persist(&self, index: &VectorIndex<StoredPayload>) -> Result<()> {
        let data = CollectionDataRef {
            version: FORMAT_VERSION,
            collection: &self.collection,
            dimension: index.dimension(),
            documents: index.entries().collect(),
        };
        let content = serde_json::to_vec(&data)
            .map_err(|e| RetrievalError::store(self.collection_path(), e))?;

        self.write_atomic(&self.collection_path(), &content).await?;
        debug!(
            "Saved {} documents to {}",
            data.documents.len(),
            self.collection_path().display()
        );
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn exists(&self) -> bool {
        let path = self.collection_path();
        match fs::try_exists(&path).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Cannot check for {}: {e}", path.display());
                false
            }
        }
    }

    async fn population(&self) -> Option<PopulationMarker> {
        let state = self.state.read().await;
        let marker = state.marker.clone()?;
        if marker.documents != state.index.len() {
            warn!(
                "Collection '{}' holds {} documents but its marker records {}; treating it as unpopulated",
                self.collection,
                state.index.len(),
                marker.documents
            );
            return None;
        }
        Some(marker)
    }

    async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<()> {
        let mut state = self.state.write().await;
        let count = documents.len();

        // The live index changes only once the new one is on disk
        let mut index = state.index.clone();
        for doc in documents {
            let payload = StoredPayload {
                text: doc.text,
                metadata: doc.metadata,
            };
            index.upsert(doc.id, doc.embedding, payload)?;
        }
        self.persist(&index).await?;
        state.index = index;

        info!(
            "Upserted {count} documents into '{}' ({} total)",
            self.collection,
            state.index.len()
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let state = self.state.read().await;

        let results = state
            .index
            .search(vector, k)?
            .into_iter()
            .map(|(entry, score)| ScoredDocument {
                document: IndexedDocument {
                    id: entry.id.clone(),
                    embedding: entry.embedding.clone(),
                    text: entry.payload.text.clone(),
                    metadata: entry.payload.metadata.clone(),
                },
                score,
            })
            .collect::<Vec<_>>();

        debug!("Query returned {} of at most {k} documents", results.len());
        Ok(results)
    }

    async fn mark_populated(&self, marker: PopulationMarker) -> Result<()> {
        let mut state = self.state.write().await;
        let path = self.marker_path();
        let content =
            serde_json::to_vec_pretty(&marker).map_err(|e| RetrievalError::store(&path, e))?;

        self.write_atomic(&path, &content).await?;
        info!(
            "Marked collection '{}' populated with {} documents",
            self.collection, marker.documents
        );
        state.marker = Some(marker);
        Ok(())
    }

    async fn count(&self) -> usize {
        self.state.read().await.index.len()
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;

        for path in [self.marker_path(), self.collection_path()] {
            if fs::try_exists(&path).await? {
                fs::remove_file(&path)
                    .await
                    .map_err(|e| RetrievalError::store(&path, e))?;
            }
        }

        *state = StoreState::default();
        info!(
            "Deleted collection '{}' at {}",
            self.collection,
            self.dir.display()
        );
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        // Upserts and markers are written as they happen.
        Ok(())
    }
}
