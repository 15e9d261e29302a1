//! Subcommand implementations
//!
//! `index` plays the site build (discover pages, embed, publish the artifact),
//! `query` and `interactive` play the page (load the artifact, rank queries).

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use docsearch_index::{
    DisabledReason, Embedder, EngineStatus, HashEmbedder, IndexReport, Indexer, QueryEngine,
    QueryOutcome, QueryResult, SearchSession, SemanticSearchConfig,
};

use crate::pages::{load_pages, MarkdownExtractor};

/// Which embedding model to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Feature hashing, no model download
    Hash,
    /// all-MiniLM-L6-v2 via ONNX (requires the `fastembed` feature)
    #[value(name = "fastembed")]
    FastEmbed,
}

/// Options shared by every subcommand
#[derive(Debug, Clone, clap::Args)]
pub struct SiteArgs {
    /// JSON configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Override the artifact file name
    #[arg(long)]
    pub embedding_file: Option<String>,

    /// Override the artifact directory under the site root
    #[arg(long)]
    pub artifact_dir: Option<String>,

    /// Embedding model; index and query must use the same one
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hash)]
    pub embedder: EmbedderKind,

    /// Vector width of the hash embedder
    #[arg(long, default_value_t = HashEmbedder::DEFAULT_DIMENSION)]
    pub dimension: usize,

    /// Model cache directory for the fastembed embedder
    #[arg(long)]
    pub model_cache: Option<PathBuf>,
}

impl SiteArgs {
    /// Configuration file (or defaults) with command line overrides applied
    pub fn load_config(&self) -> Result<SemanticSearchConfig> {
        let mut config = match &self.config {
            Some(path) => SemanticSearchConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => SemanticSearchConfig::default(),
        };
        if let Some(file) = &self.embedding_file {
            config.embedding_file = file.clone();
        }
        if let Some(dir) = &self.artifact_dir {
            config.artifact_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        build_embedder(self.embedder, self.dimension, self.model_cache.as_deref())
    }
}

pub fn build_embedder(
    kind: EmbedderKind,
    dimension: usize,
    model_cache: Option<&Path>,
) -> Result<Arc<dyn Embedder>> {
    match kind {
        EmbedderKind::Hash => Ok(Arc::new(HashEmbedder::new(dimension))),
        EmbedderKind::FastEmbed => fastembed_embedder(model_cache),
    }
}

#[cfg(feature = "fastembed")]
fn fastembed_embedder(model_cache: Option<&Path>) -> Result<Arc<dyn Embedder>> {
    let embedder = docsearch_index::FastEmbedEmbedder::new(model_cache)
        .context("failed to load the embedding model")?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_embedder(_model_cache: Option<&Path>) -> Result<Arc<dyn Embedder>> {
    bail!("this build does not include the fastembed embedder (rebuild with --features fastembed)")
}

#[derive(Debug, Clone, clap::Args)]
pub struct IndexArgs {
    /// Markdown source directory
    #[arg(long, default_value = "docs")]
    pub docs_dir: PathBuf,

    /// Built site directory the artifact is published into
    #[arg(long, default_value = "site")]
    pub site_dir: PathBuf,

    /// Concurrent embed calls (overrides the config)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Key pages by directory URL (`guide/install/`) instead of source path
    #[arg(long)]
    pub directory_urls: bool,

    /// Also write the page context JSON to this file
    #[arg(long)]
    pub page_context: Option<PathBuf>,

    #[command(flatten)]
    pub site: SiteArgs,
}

/// Build and publish the index; `None` when search is disabled
pub async fn run_index(args: &IndexArgs) -> Result<Option<IndexReport>> {
    let mut config = args.site.load_config()?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
        config.validate()?;
    }

    if let Some(path) = &args.page_context {
        write_page_context(&config, path)?;
    }

    if !config.enabled {
        tracing::info!("Semantic search disabled, skipping index generation");
        return Ok(None);
    }

    let extractor = MarkdownExtractor::new()?;
    let pages = load_pages(&args.docs_dir, args.directory_urls, &extractor)?;
    tracing::info!(
        "Found {} markdown files in {}",
        pages.len(),
        args.docs_dir.display()
    );

    let embedder = args.site.embedder()?;
    let output = config.artifact_path(&args.site_dir);
    let report = Indexer::new(embedder)
        .with_concurrency(config.concurrency)
        .run(pages, &output)
        .await
        .context("failed to generate embeddings")?;

    Ok(Some(report))
}

fn write_page_context(config: &SemanticSearchConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&config.page_context())?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write page context {}", path.display()))?;
    tracing::debug!("Wrote page context to {}", path.display());
    Ok(())
}

#[derive(Debug, Clone, clap::Args)]
pub struct QueryArgs {
    /// Built site directory holding the artifact
    #[arg(long, default_value = "site")]
    pub site_dir: PathBuf,

    /// Results to return (overrides the config)
    #[arg(long, short = 'k')]
    pub top_k: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub site: SiteArgs,

    /// Query text
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct InteractiveArgs {
    /// Built site directory holding the artifact
    #[arg(long, default_value = "site")]
    pub site_dir: PathBuf,

    /// Results to return (overrides the config)
    #[arg(long, short = 'k')]
    pub top_k: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub site: SiteArgs,
}

/// Load the published artifact the way a page does
///
/// Unlike a page, the command line reports a disabled engine as an error.
pub async fn open_engine(
    site_dir: &Path,
    site: &SiteArgs,
    top_k: Option<usize>,
) -> Result<QueryEngine> {
    let mut config = site.load_config()?;
    if let Some(k) = top_k {
        config.top_k = k;
        config.validate()?;
    }
    if !config.enabled {
        bail!("semantic search is disabled in the configuration");
    }

    let embedder = site.embedder()?;
    let engine = QueryEngine::initialize(
        &config.page_context(),
        site_dir,
        embedder,
        config.search_config(),
    )
    .await;

    match engine.status() {
        EngineStatus::Ready => {
            if let Err(e) = engine.check_model() {
                tracing::warn!(
                    "Embedder does not match the index, rebuild with the same model: {}",
                    e
                );
            }
            Ok(engine)
        }
        EngineStatus::Disabled(DisabledReason::NotEnabled) => {
            bail!("semantic search is disabled in the configuration")
        }
        EngineStatus::Disabled(DisabledReason::MalformedIndex(reason)) => {
            bail!("search index unavailable: {}", reason)
        }
    }
}

pub async fn run_query(args: &QueryArgs) -> Result<Vec<QueryResult>> {
    let engine = open_engine(&args.site_dir, &args.site, args.top_k).await?;
    let query = args.query.join(" ");
    let results = engine.search(&query).await?;
    tracing::debug!("{} results for {:?}", results.len(), query);
    Ok(results)
}

/// Format results one per line as `score  path`, or as a JSON array
pub fn render_results(results: &[QueryResult], json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string(results)? + "\n");
    }
    let mut out = String::new();
    for result in results {
        out.push_str(&format!("{:.2}  {}\n", result.score, result.path));
    }
    Ok(out)
}

/// Treat each input line as the search box contents after an edit
///
/// Every line issues a new query through a [`SearchSession`]; applied results
/// are written out, a failed query is reported and the session continues.
pub async fn run_interactive<R, W>(args: &InteractiveArgs, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let engine = open_engine(&args.site_dir, &args.site, args.top_k).await?;
    let session = SearchSession::new(Arc::new(engine));

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match session.on_input(&line).await {
            Ok(QueryOutcome::Applied(results)) => {
                let rendered = render_results(&results, args.json)?;
                output.write_all(rendered.as_bytes()).await?;
                if !args.json {
                    output.write_all(b"--\n").await?;
                }
            }
            Ok(QueryOutcome::Stale { sequence, latest }) => {
                tracing::debug!("Query #{} superseded by #{}", sequence, latest);
            }
            Err(e) => {
                output.write_all(format!("error: {}\n", e).as_bytes()).await?;
            }
        }
        output.flush().await?;
    }
    Ok(())
}
