//! Docsearch command line
//!
//! Builds the semantic search artifact for a documentation site and runs
//! queries against a built site, the same way a page would.

pub mod commands;
pub mod pages;

pub use commands::{
    build_embedder, open_engine, render_results, run_index, run_interactive, run_query,
    EmbedderKind, IndexArgs, InteractiveArgs, QueryArgs, SiteArgs,
};
pub use pages::{discover_markdown, load_pages, page_path, MarkdownExtractor};
