//! Offline index builder
//!
//! Embeds every page handed over by the build pipeline and publishes the
//! resulting [`EmbeddingIndex`] as one artifact. A single failed page fails
//! the whole run: partial search coverage is worse than a failed build.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::DEFAULT_CONCURRENCY;
use crate::embedding::Embedder;
use crate::error::{IndexError, Result};
use crate::index::{EmbeddingIndex, PageEmbedding};

/// A page's identifier and extracted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Site-relative path, used verbatim as the index key
    pub path: String,
    /// Plain text to embed (may be empty)
    pub text: String,
}

impl Page {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Summary of a completed indexing run
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub pages: usize,
    pub dimension: Option<usize>,
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// Builds embedding indexes
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    concurrency: usize,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit the number of embed calls in flight (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Embed all pages into a fresh index
    ///
    /// Input paths must be unique. On the first failure outstanding embed
    /// calls are aborted and the error names the failing page.
    pub async fn build(&self, pages: Vec<Page>) -> Result<EmbeddingIndex> {
        let mut seen = HashSet::with_capacity(pages.len());
        for page in &pages {
            if !seen.insert(page.path.as_str()) {
                return Err(IndexError::DuplicatePath(page.path.clone()));
            }
        }
        drop(seen);

        if pages.is_empty() {
            log::warn!("No pages to index; the artifact will be empty");
            return Ok(EmbeddingIndex::new());
        }

        log::info!(
            "Indexing {} pages with {} (concurrency {})",
            pages.len(),
            self.embedder.model_id(),
            self.concurrency
        );

        let vectors: Arc<DashMap<String, Vec<f32>>> = Arc::new(DashMap::new());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for page in pages {
            // Dropping `tasks` on an early return aborts everything still running
            while let Some(done) = tasks.try_join_next() {
                check_task(done)?;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| IndexError::embedding(&page.path, e.to_string()))?;
            let embedder = Arc::clone(&self.embedder);
            let vectors = Arc::clone(&vectors);

            tasks.spawn(async move {
                let _permit = permit;
                let vector = embedder
                    .embed(&page.text)
                    .await
                    .map_err(|e| page_error(&page.path, e))?;
                log::debug!(
                    "Embedded {} ({} chars, {}d)",
                    page.path,
                    page.text.len(),
                    vector.len()
                );
                vectors.insert(page.path, vector);
                Ok::<(), IndexError>(())
            });
        }

        while let Some(done) = tasks.join_next().await {
            check_task(done)?;
        }

        let vectors = Arc::try_unwrap(vectors).unwrap_or_else(|shared| shared.as_ref().clone());
        let ordered: BTreeMap<String, Vec<f32>> = vectors.into_iter().collect();

        let mut index = EmbeddingIndex::new();
        for (path, vector) in ordered {
            let context = path.clone();
            index
                .insert(PageEmbedding { path, vector })
                .map_err(|e| page_error(&context, e))?;
        }

        Ok(index)
    }

    /// Build the index and publish it atomically at `output`
    ///
    /// Nothing is written unless every page embedded successfully.
    pub async fn run(&self, pages: Vec<Page>, output: &Path) -> Result<IndexReport> {
        let started = Instant::now();
        let index = self.build(pages).await?;

        let pages = index.len();
        let dimension = index.dimension();
        let target = output.to_path_buf();
        tokio::task::spawn_blocking(move || index.write_atomic(&target))
            .await
            .map_err(|e| IndexError::Io(std::io::Error::other(e)))??;

        let report = IndexReport {
            pages,
            dimension,
            output: output.to_path_buf(),
            elapsed: started.elapsed(),
        };

        log::info!(
            "Indexed {} pages ({}d) into {} in {:?}",
            report.pages,
            report.dimension.unwrap_or(0),
            report.output.display(),
            report.elapsed
        );
        Ok(report)
    }
}

fn check_task(done: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match done {
        Ok(result) => result,
        Err(e) => Err(IndexError::embedding(
            "<task>",
            format!("embedding task failed: {}", e),
        )),
    }
}

/// Attribute any failure to the page being embedded
fn page_error(path: &str, err: IndexError) -> IndexError {
    match err {
        IndexError::Embedding { message, .. } => IndexError::embedding(path, message),
        IndexError::DimensionMismatch { expected, actual } => IndexError::embedding(
            path,
            format!("embedding has {} dimensions, expected {}", actual, expected),
        ),
        other => IndexError::embedding(path, other.to_string()),
    }
}
