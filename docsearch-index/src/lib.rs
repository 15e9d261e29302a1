//! Docsearch Index
//!
//! Embedding index and nearest-neighbor ranking engine for semantic search
//! over a statically generated documentation site.
//!
//! ## Features
//!
//! - **Offline indexing** - Embed every page once per build and publish a single `path -> vector` artifact
//! - **Brute-force cosine ranking** - Deterministic top-K with path tie-breaking and zero-vector safety
//! - **Search as you type** - Sequence-numbered sessions where the last issued query always wins
//! - **Pluggable embedders** - Feature hashing out of the box, all-MiniLM-L6-v2 behind the `fastembed` feature
//!
//! ## Example
//!
//! ```ignore
//! use docsearch_index::{HashEmbedder, Indexer, Page, PageContext, QueryEngine, SearchConfig};
//!
//! // Build time
//! let embedder = Arc::new(HashEmbedder::default());
//! let indexer = Indexer::new(embedder.clone()).with_concurrency(4);
//! indexer
//!     .run(vec![Page::new("guide/install.md", "Install with cargo")], &artifact)
//!     .await?;
//!
//! // Page load
//! let engine = QueryEngine::initialize(&page_context, &site_dir, embedder, SearchConfig::default()).await;
//! let results = engine.search("how do I install it").await?;
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexer;
pub mod search;
pub mod session;

// Re-exports for convenience
pub use config::{PageContext, SearchConfig, SemanticSearchConfig};
pub use embedding::{Embedder, HashEmbedder, VectorEngine};
pub use error::IndexError;
pub use index::{EmbeddingIndex, PageEmbedding, DEFAULT_EMBEDDING_FILE};
pub use indexer::{IndexReport, Indexer, Page};
pub use search::{cosine_similarity, rank, DisabledReason, EngineStatus, QueryEngine, QueryResult};
pub use session::{QueryOutcome, QueryTicket, SearchSession};

#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedEmbedder;
