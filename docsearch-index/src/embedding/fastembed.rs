//! all-MiniLM-L6-v2 through fastembed
//!
//! Local ONNX inference; mean pooled, normalized 384d sentence embeddings.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use super::Embedder;
use crate::error::{IndexError, Result};

const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// fastembed-backed embedder
///
/// Inference is blocking, so every call runs on tokio's blocking pool.
pub struct FastEmbedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl FastEmbedEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use
    pub fn new(cache_dir: Option<&Path>) -> Result<Self> {
        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir.to_path_buf());
        }

        log::info!("Loading {}", MODEL_ID);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| IndexError::embedding(MODEL_ID, format!("failed to load model: {}", e)))?;

        // Get dimension by encoding test string
        let probe = model
            .embed(vec!["test"], None)
            .map_err(|e| IndexError::embedding(MODEL_ID, format!("failed to encode probe: {}", e)))?;
        let dimension = probe.first().map(Vec::len).unwrap_or_default();

        log::info!("Loaded {} ({}d)", MODEL_ID, dimension);

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for FastEmbedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        let embeddings = tokio::task::spawn_blocking(move || model.lock().embed(vec![text], None))
            .await
            .map_err(|e| IndexError::embedding(MODEL_ID, format!("inference task failed: {}", e)))?
            .map_err(|e| IndexError::embedding(MODEL_ID, e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::embedding(MODEL_ID, "model returned no embedding"))
    }

    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}
