//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A zero vector is orthogonal to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// A similarity search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// ID of the matched item.
    pub id: String,

    /// Similarity score.
    pub score: f32,
}

impl SimilarityResult {
    /// Create a new similarity result.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Find the top-k most similar embeddings.
///
/// Candidates are ranked by descending cosine similarity. Equal scores keep
/// the order in which the candidates were supplied.
pub fn find_top_k<'a, I>(
    query: &[f32],
    candidates: I,
    k: usize,
    min_score: f32,
) -> Result<Vec<SimilarityResult>>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scores: Vec<(OrderedFloat<f32>, &str)> = Vec::new();
    for (id, embedding) in candidates {
        let score = cosine_similarity(query, embedding)?;
        if score >= min_score {
            scores.push((OrderedFloat(score), id));
        }
    }

    // Stable sort: ties stay in candidate order
    scores.sort_by_key(|(score, _)| Reverse(*score));

    Ok(scores
        .into_iter()
        .take(k)
        .map(|(score, id)| SimilarityResult::new(id, score.0))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_find_top_k() {
        let query = vec![1.0, 0.0, 0.0];
        let a = vec![1.0, 0.0, 0.0]; // similarity 1.0
        let b = vec![0.0, 1.0, 0.0]; // similarity 0.0
        let c = vec![0.7, 0.7, 0.0]; // similarity ~0.7
        let candidates = [("a", a.as_slice()), ("b", b.as_slice()), ("c", c.as_slice())];

        let results = find_top_k(&query, candidates, 2, -1.0).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_find_top_k_ties_keep_candidate_order() {
        let query = vec![1.0, 0.0];
        let same = vec![2.0, 0.0];
        let candidates = [
            ("7", same.as_slice()),
            ("2", same.as_slice()),
            ("5", same.as_slice()),
        ];

        let results = find_top_k(&query, candidates, 3, -1.0).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "2", "5"]);
    }

    #[test]
    fn test_find_top_k_zero_k() {
        let query = vec![1.0];
        let one = vec![1.0];
        let results = find_top_k(&query, [("x", one.as_slice())], 0, -1.0).unwrap();
        assert!(results.is_empty());
    }
}
