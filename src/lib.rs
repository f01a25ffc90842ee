//! Semantic document retrieval.
//!
//! Documents are embedded through an [`EmbeddingProvider`], held in an exact
//! brute-force [`VectorIndex`] next to their text, and queried by squared
//! Euclidean distance. Distances are reported alongside a `1 / (1 + d)`
//! similarity score.
//!
//! ```text
//! documents ─> EmbeddingProvider ─> VectorIndex::add
//! query     ─> EmbeddingProvider ─> VectorIndex::search ─> ranked QueryResult
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod rag_search;
pub mod retriever;
pub mod score;
pub mod tools;
pub mod utils;
pub mod vector_db;

pub use config::{EmbedderConfig, RetrievalConfig};
pub use embedding::{EmbeddingProvider, HashingEmbedder, OllamaEmbedder, SharedEmbedder};
pub use error::{Result, RetrievalError};
pub use rag_search::QueryOrchestrator;
pub use retriever::{KnowledgeBase, QueryResult, RetrievalStore};
pub use vector_db::VectorIndex;
