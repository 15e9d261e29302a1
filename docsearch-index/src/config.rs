//! Semantic search configuration
//!
//! One serde record shared by the build side (where to write the artifact,
//! how many embed calls to run at once) and the page side (whether search is
//! active and where the artifact lives).

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::index::DEFAULT_EMBEDDING_FILE;

/// Default subdirectory of the site output holding the artifact
pub const DEFAULT_ARTIFACT_DIR: &str = "semantic-search";

/// Default number of results per query
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of concurrent embed calls while indexing
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Site-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SemanticSearchConfig {
    /// Turn semantic search on or off for the whole site
    pub enabled: bool,
    /// Artifact file name
    pub embedding_file: String,
    /// Artifact directory, relative to the site root (empty for the root itself)
    pub artifact_dir: String,
    /// Results per query
    pub top_k: usize,
    /// Maximum concurrent embed calls during indexing
    pub concurrency: usize,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            embedding_file: DEFAULT_EMBEDDING_FILE.to_string(),
            artifact_dir: DEFAULT_ARTIFACT_DIR.to_string(),
            top_k: DEFAULT_TOP_K,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl SemanticSearchConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| IndexError::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check value ranges and that artifact locations stay inside the site
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(IndexError::config("top_k must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(IndexError::config("concurrency must be at least 1"));
        }
        if self.embedding_file.trim().is_empty() {
            return Err(IndexError::config("embedding_file must not be empty"));
        }
        if !is_plain_file_name(Path::new(&self.embedding_file)) {
            return Err(IndexError::config(format!(
                "embedding_file must be a plain file name: {}",
                self.embedding_file
            )));
        }
        if !is_site_relative(Path::new(&self.artifact_dir)) {
            return Err(IndexError::config(format!(
                "artifact_dir must be relative to the site root: {}",
                self.artifact_dir
            )));
        }
        Ok(())
    }

    /// Artifact location relative to the site root, `/`-separated
    pub fn artifact_relative_path(&self) -> String {
        let dir = self.artifact_dir.trim_matches('/');
        if dir.is_empty() {
            self.embedding_file.clone()
        } else {
            format!("{}/{}", dir, self.embedding_file)
        }
    }

    /// Artifact location under a built site directory
    pub fn artifact_path(&self, site_dir: &Path) -> PathBuf {
        self.artifact_relative_path()
            .split('/')
            .fold(site_dir.to_path_buf(), |path, part| path.join(part))
    }

    /// Values the site exposes to every page
    pub fn page_context(&self) -> PageContext {
        PageContext {
            enabled: self.enabled,
            embedding_file: self.artifact_relative_path(),
        }
    }

    /// Query-time settings
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig { limit: self.top_k }
    }
}

/// Per-page activation passed to the query engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    /// When false the query engine does nothing at all
    pub enabled: bool,
    /// Artifact path relative to the site root
    pub embedding_file: String,
}

impl PageContext {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            embedding_file: String::new(),
        }
    }
}

/// Query configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Maximum results to return (K)
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TOP_K,
        }
    }
}

fn is_plain_file_name(path: &Path) -> bool {
    let mut components = path.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn is_site_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
