//! Query engine
//!
//! Brute-force cosine ranking of every indexed page against a query
//! embedding. Results are ordered by descending similarity, exact ties by
//! ascending path, and truncated to the configured top K.

use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use crate::config::{PageContext, SearchConfig};
use crate::embedding::{Embedder, VectorEngine};
use crate::error::{IndexError, Result};
use crate::index::EmbeddingIndex;

/// One ranked page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub path: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Why an engine answers every query with nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisabledReason {
    /// The page context turned search off
    NotEnabled,
    /// The artifact could not be loaded
    MalformedIndex(String),
}

/// Engine state after initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Ready,
    Disabled(DisabledReason),
}

/// Loaded index with per-entry magnitudes computed once up front
struct Ranker {
    index: Arc<EmbeddingIndex>,
    norms: Vec<f64>,
    vectors: VectorEngine,
}

/// Ranks indexed pages against live queries
///
/// The index is read-only after load; one engine can serve any number of
/// concurrent queries through a shared reference.
pub struct QueryEngine {
    ranker: Option<Ranker>,
    status: EngineStatus,
    config: SearchConfig,
}

impl QueryEngine {
    /// Create a ready engine over an already loaded index
    pub fn new(index: Arc<EmbeddingIndex>, embedder: Arc<dyn Embedder>, config: SearchConfig) -> Self {
        let norms = index.iter().map(|(_, vector)| magnitude(vector)).collect();

        let engine = Self {
            ranker: Some(Ranker {
                index,
                norms,
                vectors: VectorEngine::new(embedder),
            }),
            status: EngineStatus::Ready,
            config,
        };
        if let Err(e) = engine.check_model() {
            log::warn!("Query model disagrees with the index, every query will fail: {}", e);
        }
        engine
    }

    /// Compare the embedder's declared dimension with the index dimension
    ///
    /// Passes when either side is unknown or the engine is disabled.
    pub fn check_model(&self) -> Result<()> {
        let Some(ranker) = &self.ranker else {
            return Ok(());
        };
        match (ranker.index.dimension(), ranker.vectors.dimension()) {
            (Some(expected), Some(actual)) if expected != actual => {
                Err(IndexError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Create an engine that ignores every query
    pub fn disabled(reason: DisabledReason, config: SearchConfig) -> Self {
        Self {
            ranker: None,
            status: EngineStatus::Disabled(reason),
            config,
        }
    }

    /// Build an engine from raw artifact bytes, disabling it if they are malformed
    pub fn from_artifact(bytes: &[u8], embedder: Arc<dyn Embedder>, config: SearchConfig) -> Self {
        match EmbeddingIndex::from_json_slice(bytes) {
            Ok(index) => {
                log::info!(
                    "Semantic search ready: {} pages, {}d, model {}",
                    index.len(),
                    index.dimension().unwrap_or(0),
                    embedder.model_id()
                );
                Self::new(Arc::new(index), embedder, config)
            }
            Err(e) => {
                log::warn!("Semantic search disabled: {}", e);
                Self::disabled(DisabledReason::MalformedIndex(e.to_string()), config)
            }
        }
    }

    /// Initialize from the page context and the built site on disk
    ///
    /// Does nothing (not even a file read) when the context is disabled. A
    /// missing or malformed artifact disables the engine instead of failing.
    pub async fn initialize(
        page: &PageContext,
        site_root: &Path,
        embedder: Arc<dyn Embedder>,
        config: SearchConfig,
    ) -> Self {
        if !page.enabled {
            log::debug!("Semantic search not enabled for this page");
            return Self::disabled(DisabledReason::NotEnabled, config);
        }

        let artifact = page
            .embedding_file
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(site_root.to_path_buf(), |path, part| path.join(part));

        match tokio::fs::read(&artifact).await {
            Ok(bytes) => Self::from_artifact(&bytes, embedder, config),
            Err(e) => {
                let err = IndexError::malformed(format!(
                    "cannot read {}: {}",
                    artifact.display(),
                    e
                ));
                log::warn!("Semantic search disabled: {}", err);
                Self::disabled(DisabledReason::MalformedIndex(err.to_string()), config)
            }
        }
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.status == EngineStatus::Ready
    }

    /// The loaded index, if any
    pub fn index(&self) -> Option<&EmbeddingIndex> {
        self.ranker.as_ref().map(|r| r.index.as_ref())
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Embed and rank a query
    ///
    /// An empty (or whitespace-only) query returns no results without calling
    /// the embedder; so does a disabled engine.
    pub async fn search(&self, query: &str) -> Result<Vec<QueryResult>> {
        let Some(ranker) = &self.ranker else {
            return Ok(Vec::new());
        };
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = ranker.vectors.embed(query).await?;
        self.rank(&query_vector)
    }

    /// Rank the index against an already computed query vector
    ///
    /// Fails with [`IndexError::DimensionMismatch`] when the query vector's
    /// length differs from the index dimension.
    pub fn rank(&self, query_vector: &[f32]) -> Result<Vec<QueryResult>> {
        let Some(ranker) = &self.ranker else {
            return Ok(Vec::new());
        };
        check_dimension(&ranker.index, query_vector)?;

        let query_norm = magnitude(query_vector);
        let scored = ranker
            .index
            .iter()
            .zip(ranker.norms.iter())
            .map(|((path, vector), norm)| {
                (path, similarity_with_norms(query_vector, query_norm, vector, *norm))
            });

        Ok(top_k(scored, self.config.limit))
    }
}

/// Rank every entry of `index` against `query_vector`, keeping the top `limit`
pub fn rank(index: &EmbeddingIndex, query_vector: &[f32], limit: usize) -> Result<Vec<QueryResult>> {
    check_dimension(index, query_vector)?;
    let scored = index
        .iter()
        .map(|(path, vector)| (path, cosine_similarity(query_vector, vector)));
    Ok(top_k(scored, limit))
}

/// Cosine similarity between two embeddings
///
/// Accumulates in f64. A zero-magnitude operand (or a length mismatch)
/// yields 0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    similarity_with_norms(a, magnitude(a), b, magnitude(b))
}

fn similarity_with_norms(a: &[f32], norm_a: f64, b: &[f32], norm_b: f64) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .fold(0.0, |acc, (x, y)| acc + f64::from(*x) * f64::from(*y));
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}

fn magnitude(v: &[f32]) -> f64 {
    v.iter()
        .fold(0.0, |acc, x| acc + f64::from(*x) * f64::from(*x))
        .sqrt()
}

fn check_dimension(index: &EmbeddingIndex, query_vector: &[f32]) -> Result<()> {
    match index.dimension() {
        Some(expected) if expected != query_vector.len() => Err(IndexError::DimensionMismatch {
            expected,
            actual: query_vector.len(),
        }),
        _ => Ok(()),
    }
}

/// Descending score, then ascending path
fn by_rank(a: &(&str, f32), b: &(&str, f32)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(b.0))
}

fn top_k<'a>(scored: impl Iterator<Item = (&'a str, f32)>, limit: usize) -> Vec<QueryResult> {
    if limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&str, f32)> = scored.collect();
    if scored.len() > limit {
        scored.select_nth_unstable_by(limit - 1, by_rank);
        scored.truncate(limit);
    }
    scored.sort_by(by_rank);

    scored
        .into_iter()
        .map(|(path, score)| QueryResult {
            path: path.to_string(),
            score,
        })
        .collect()
}
