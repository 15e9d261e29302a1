//! Vector embedding engine
//!
//! High-level API for query embeddings: validates the embedder's output and
//! caches it per text, so retyping an earlier query costs no model call.

use dashmap::DashMap;
use std::sync::Arc;

use super::Embedder;
use crate::error::{IndexError, Result};

/// Default number of cached query embeddings
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Vector embedding engine with caching
///
/// Wraps an [`Embedder`] with a DashMap cache for efficient repeated lookups.
pub struct VectorEngine {
    embedder: Arc<dyn Embedder>,
    cache: DashMap<String, Vec<f32>>,
    capacity: usize,
}

impl VectorEngine {
    /// Create VectorEngine with the default cache capacity
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_capacity(embedder, DEFAULT_CACHE_CAPACITY)
    }

    /// Create VectorEngine caching at most `capacity` embeddings
    pub fn with_capacity(embedder: Arc<dyn Embedder>, capacity: usize) -> Self {
        log::info!(
            "VectorEngine ready ({}, cache capacity {})",
            embedder.model_id(),
            capacity
        );

        Self {
            embedder,
            cache: DashMap::new(),
            capacity,
        }
    }

    /// Generate embedding with caching
    ///
    /// Rejects empty output, non-finite elements, and output whose length
    /// disagrees with the embedder's declared dimension.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // Check cache first
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached.clone());
        }

        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| wrap_query_error(text, e))?;
        self.validate(text, &embedding)?;

        if self.capacity > 0 {
            if self.cache.len() >= self.capacity {
                self.cache.clear();
            }
            self.cache.insert(text.to_string(), embedding.clone());
        }
        Ok(embedding)
    }

    fn validate(&self, text: &str, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(IndexError::embedding(text, "embedder returned an empty vector"));
        }
        if let Some(pos) = embedding.iter().position(|x| !x.is_finite()) {
            return Err(IndexError::embedding(
                text,
                format!("element {} is not finite", pos),
            ));
        }
        if let Some(expected) = self.embedder.dimension() {
            if expected != embedding.len() {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        Ok(())
    }

    /// Declared dimension of the wrapped model
    pub fn dimension(&self) -> Option<usize> {
        self.embedder.dimension()
    }

    #[cfg(test)]
    pub(crate) fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

fn wrap_query_error(text: &str, err: IndexError) -> IndexError {
    match err {
        IndexError::Embedding { message, .. } => IndexError::embedding(text, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        output: Vec<f32>,
        calls: AtomicUsize,
        declared: Option<usize>,
    }

    impl FixedEmbedder {
        fn new(output: Vec<f32>) -> Self {
            Self {
                output,
                calls: AtomicUsize::new(0),
                declared: None,
            }
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }

        fn model_id(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> Option<usize> {
            self.declared
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_embedder() {
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0]));
        let engine = VectorEngine::new(embedder.clone());

        engine.embed("install").await.unwrap();
        engine.embed("install").await.unwrap();
        engine.embed("installation").await.unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.cache_size(), 2);
    }

    #[tokio::test]
    async fn test_cache_is_bounded() {
        let engine = VectorEngine::with_capacity(Arc::new(FixedEmbedder::new(vec![1.0])), 2);
        for text in ["a", "b", "c"] {
            engine.embed(text).await.unwrap();
        }
        assert!(engine.cache_size() <= 2);
    }

    #[tokio::test]
    async fn test_rejects_non_finite_output() {
        let engine = VectorEngine::new(Arc::new(FixedEmbedder::new(vec![f32::NAN, 1.0])));
        let err = engine.embed("query").await.unwrap_err();
        assert!(matches!(err, IndexError::Embedding { .. }));
        assert_eq!(engine.cache_size(), 0);
    }

    #[tokio::test]
    async fn test_rejects_empty_output() {
        let engine = VectorEngine::new(Arc::new(FixedEmbedder::new(vec![])));
        assert!(engine.embed("query").await.is_err());
    }

    #[test]
    fn test_rejects_undeclared_dimension() {
        let mut embedder = FixedEmbedder::new(vec![1.0, 2.0, 3.0]);
        embedder.declared = Some(2);
        let engine = VectorEngine::new(Arc::new(embedder));

        let err = tokio_test::block_on(engine.embed("query")).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }
}
