//! In-memory vector index with insertion-ordered entries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::find_top_k;

/// An entry in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry<T> {
    /// Unique identifier.
    pub id: String,

    /// The embedding vector, as produced by the provider.
    pub embedding: Embedding,

    /// Payload stored alongside the vector.
    pub payload: T,
}

/// A vector index ranking entries by cosine similarity.
///
/// Entries keep the position of their first insertion. Upserting an existing
/// id replaces the vector and payload in place, so search results for equal
/// scores come back in a stable order.
#[derive(Debug, Clone)]
pub struct VectorIndex<T> {
    /// Stored entries, in insertion order.
    entries: Vec<IndexEntry<T>>,

    /// Position of each id in `entries`.
    positions: HashMap<String, usize>,

    /// Dimension of the stored embeddings, fixed by the first insert.
    dimension: Option<usize>,
}

impl<T> VectorIndex<T> {
    /// Create an empty index; the first insert fixes the dimension.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            dimension: None,
        }
    }

    /// Create an empty index accepting only `dimension`-long vectors.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::new()
        }
    }

    /// Rebuild an index from entries in their stored order.
    ///
    /// A recorded `dimension` is enforced on every entry, so an empty index
    /// keeps the dimension it was persisted with.
    pub fn from_entries(dimension: Option<usize>, entries: Vec<IndexEntry<T>>) -> Result<Self> {
        let mut index = match dimension {
            Some(dimension) => Self::with_dimension(dimension),
            None => Self::new(),
        };
        for entry in entries {
            index.upsert(entry.id, entry.embedding, entry.payload)?;
        }
        Ok(index)
    }

    /// Get the embedding dimension, if known.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Insert an entry, or replace the entry with the same id.
    ///
    /// Returns `true` when the id was not present before.
    pub fn upsert(
        &mut self,
        id: impl Into<String>,
        embedding: Embedding,
        payload: T,
    ) -> Result<bool> {
        let id = id.into();

        match self.dimension {
            Some(expected) if expected != embedding.len() => {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
            None => self.dimension = Some(embedding.len()),
        }

        if let Some(&position) = self.positions.get(&id) {
            let entry = &mut self.entries[position];
            entry.embedding = embedding;
            entry.payload = payload;
            debug!("Replaced index entry: {id}");
            return Ok(false);
        }

        self.positions.insert(id.clone(), self.entries.len());
        self.entries.push(IndexEntry {
            id,
            embedding,
            payload,
        });
        Ok(true)
    }

    /// Get an entry by ID.
    pub fn get(&self, id: &str) -> Option<&IndexEntry<T>> {
        self.positions.get(id).map(|&position| &self.entries[position])
    }

    /// Check if an ID exists in the index.
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry<T>> {
        self.entries.iter()
    }

    /// Search for the `k` entries most similar to `query`.
    ///
    /// An empty index yields no results regardless of the query dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(&IndexEntry<T>, f32)>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let candidates = self
            .entries
            .iter()
            .map(|e| (e.id.as_str(), e.embedding.as_slice()));

        let results = find_top_k(query, candidates, k, f32::MIN)?
            .into_iter()
            .filter_map(|result| self.get(&result.id).map(|entry| (entry, result.score)))
            .collect();

        Ok(results)
    }
}

impl<T> Default for VectorIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
