use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("{0}")]
    Validation(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Embedding timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unknown knowledge base: {0}")]
    UnknownKnowledgeBase(Uuid),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RetrievalError {
    pub fn validation(message: impl Into<String>) -> Self {
        RetrievalError::Validation(message.into())
    }

    /// Errors raised before any state was touched.
    pub fn is_validation(&self) -> bool {
        matches!(self, RetrievalError::Validation(_))
    }
}
