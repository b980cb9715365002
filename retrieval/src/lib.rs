//! # Review Retrieval
//!
//! This crate answers questions about a restaurant from its customer
//! reviews. It combines:
//!
//! - **Corpus**: CSV review loading
//! - **Vector Store**: A persistent, file-backed collection of embedded reviews
//! - **Index Builder**: One-time, idempotent population of the store
//! - **Retriever**: Nearest-review lookup for a question
//! - **Answer Generation**: Prompting a local language model with the reviews
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           ReviewQa                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  reviews.csv ──► load_corpus ──► IndexBuilder ──► VectorStore   │
//! │                                       │               │         │
//! │                                       ▼               │         │
//! │                              EmbeddingProvider ◄──────┤         │
//! │                                       │               │         │
//! │  question ──────────────────────► Retriever ◄─────────┘         │
//! │                                       │                         │
//! │                                       ▼                         │
//! │              format_reviews ──► AnswerGenerator ──► Answer      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reviewrag_retrieval::{ReviewQa, ReviewRagConfig};
//!
//! let qa = ReviewQa::builder()
//!     .with_config(ReviewRagConfig::default().with_corpus_path("reviews.csv"))
//!     .build()
//!     .await?;
//!
//! qa.bootstrap().await?;
//! let answer = qa.ask("How is the crust?").await?;
//! ```

pub mod answer;
pub mod builder;
pub mod config;
pub mod context;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod retriever;
pub mod store;

pub use answer::{AnswerGenerator, OllamaGenerator};
pub use builder::{BootstrapReport, IndexBuilder};
pub use config::ReviewRagConfig;
pub use context::format_reviews;
pub use corpus::{ReviewMetadata, ReviewRecord, load_corpus};
pub use engine::{Answer, ReviewQa};
pub use error::{Result, RetrievalError};
pub use retriever::Retriever;
pub use store::{FileVectorStore, IndexedDocument, PopulationMarker, ScoredDocument, VectorStore};
