//! Embedding cache for repeated questions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::Embedding;
use crate::error::Result;
use crate::provider::EmbeddingProvider;

/// Cache entry for an embedding.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The embedding vector.
    embedding: Embedding,

    /// Insertion sequence number; the smallest is evicted first.
    sequence: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
    hits: u64,
    misses: u64,
}

/// Bounded in-memory cache of embeddings keyed by model and text.
#[derive(Clone)]
pub struct EmbeddingCache {
    state: Arc<RwLock<CacheState>>,

    /// Maximum cache size.
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            max_entries,
        }
    }

    /// Compute a hash for cache lookup.
    fn hash_key(text: &str, model: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        model.hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let mut state = self.state.write().await;
        let found = state.entries.get(&key).map(|e| e.embedding.clone());
        if found.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        found
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        if self.max_entries == 0 {
            return;
        }

        let key = Self::hash_key(text, model);
        let mut state = self.state.write().await;

        // Evict if at capacity
        if state.entries.len() >= self.max_entries && !state.entries.contains_key(&key) {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.sequence)
                .map(|(k, _)| k.clone());
            if let Some(oldest_key) = oldest {
                state.entries.remove(&oldest_key);
            }
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            CacheEntry {
                embedding,
                sequence,
            },
        );
        debug!("Cached embedding for text (model: {model})");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.max_entries,
            hits: state.hits,
            misses: state.misses,
        }
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Lookups answered from the cache.
    pub hits: u64,

    /// Lookups that went to the provider.
    pub misses: u64,
}

/// A wrapper that provides cached embedding generation.
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        self.provider.model()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = self.provider.model();

        if let Some(embedding) = self.cache.get(text, model).await {
            debug!("Cache hit for embedding");
            return Ok(embedding);
        }

        let embedding = self.provider.embed(text).await?;
        self.cache.put(text, model, embedding.clone()).await;
        Ok(embedding)
    }

    // Batches are bootstrap traffic; caching them would only evict questions.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.provider.embed_batch(texts).await
    }
}
