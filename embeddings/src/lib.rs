//! # Embeddings
//!
//! This crate turns review text into dense vectors and ranks stored vectors
//! against a query for the reviewrag question-answering tool.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors through a local
//!   Ollama server
//! - **Similarity Search**: Cosine ranking with deterministic tie-breaking
//! - **Caching**: Optional cache for repeated question embeddings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorIndex               │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  OllamaProvider / CachedProvider     find_top_k                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod ollama;
pub mod provider;
pub mod similarity;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use index::VectorIndex;
pub use ollama::OllamaProvider;
pub use provider::EmbeddingProvider;
pub use similarity::{SimilarityResult, cosine_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
