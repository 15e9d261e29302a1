//! Error types for docsearch-index

use thiserror::Error;

/// Errors that can occur while building or querying an embedding index
#[derive(Debug, Error)]
pub enum IndexError {
    /// The embedding function failed for a page or a query
    #[error("Embedding failed for {path}: {message}")]
    Embedding { path: String, message: String },

    /// The persisted artifact cannot be used
    #[error("Malformed index: {0}")]
    MalformedIndex(String),

    /// A vector's length disagrees with the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The same page path was supplied twice
    #[error("Duplicate page path: {0}")]
    DuplicatePath(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Create an embedding error for the given page path (or query text)
    pub fn embedding(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Embedding {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a malformed index error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedIndex(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type for index operations
pub type Result<T> = std::result::Result<T, IndexError>;
