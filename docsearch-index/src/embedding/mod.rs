//! Embedding module
//!
//! The indexer and the query engine share one capability: turn a piece of text
//! into a fixed-length vector. Implementations are pluggable; the ranking core
//! never depends on a specific inference stack.

mod engine;
mod hash;

#[cfg(feature = "fastembed")]
mod fastembed;

pub use engine::VectorEngine;
pub use hash::HashEmbedder;

#[cfg(feature = "fastembed")]
pub use self::fastembed::FastEmbedEmbedder;

use async_trait::async_trait;

use crate::error::Result;

/// Text to vector embedding function
///
/// Must be deterministic for a fixed model: the offline index and the online
/// query have to be produced by the same implementation for scores to mean
/// anything.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier of the underlying model, for logs and diagnostics
    fn model_id(&self) -> &str;

    /// Output dimension when known up front
    fn dimension(&self) -> Option<usize> {
        None
    }
}
