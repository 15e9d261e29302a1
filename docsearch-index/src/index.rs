//! Page embedding index
//!
//! In-memory `path -> vector` map plus its on-disk JSON artifact: a flat object
//! whose keys are site-relative page paths and whose values are arrays of
//! finite numbers, all of the same length.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Default artifact file name
pub const DEFAULT_EMBEDDING_FILE: &str = "embeddings.json";

/// One page and its embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEmbedding {
    /// Site-relative page path, unique within an index
    pub path: String,
    /// Embedding of the page text
    pub vector: Vec<f32>,
}

impl PageEmbedding {
    pub fn new(path: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            path: path.into(),
            vector,
        }
    }
}

/// Mapping from page path to embedding vector
///
/// Every vector has the same length, fixed by the first insertion. Entries are
/// kept in ascending path order so serialization is reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingIndex {
    entries: BTreeMap<String, Vec<f32>>,
    dimension: Option<usize>,
}

impl EmbeddingIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from page embeddings, rejecting duplicates and ragged vectors
    pub fn from_entries(entries: impl IntoIterator<Item = PageEmbedding>) -> Result<Self> {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry)?;
        }
        Ok(index)
    }

    /// Insert one page
    ///
    /// Fails on an already present path, an empty vector, a non-finite
    /// element, or a length different from the index dimension.
    pub fn insert(&mut self, page: PageEmbedding) -> Result<()> {
        if self.entries.contains_key(&page.path) {
            return Err(IndexError::DuplicatePath(page.path));
        }
        if page.vector.is_empty() {
            return Err(IndexError::embedding(page.path, "embedding is empty"));
        }
        if let Some(pos) = page.vector.iter().position(|x| !x.is_finite()) {
            return Err(IndexError::embedding(
                page.path,
                format!("element {} is not finite", pos),
            ));
        }

        match self.dimension {
            Some(expected) if expected != page.vector.len() => {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: page.vector.len(),
                });
            }
            Some(_) => {}
            None => self.dimension = Some(page.vector.len()),
        }

        self.entries.insert(page.path, page.vector);
        Ok(())
    }

    /// Vector length shared by every entry, `None` while empty
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Look up the vector of a page
    pub fn get(&self, path: &str) -> Option<&[f32]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Iterate entries in ascending path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries
            .iter()
            .map(|(path, vector)| (path.as_str(), vector.as_slice()))
    }

    /// Serialize to the artifact format (pretty-printed, keys ascending)
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(&self.entries)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse an artifact
    ///
    /// Any structural problem is reported as [`IndexError::MalformedIndex`]:
    /// invalid JSON, a non-object root, non-numeric elements, an empty
    /// artifact, ragged vector lengths, or values that are not finite `f32`.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let raw: BTreeMap<String, Vec<f64>> = serde_json::from_slice(bytes).map_err(|e| {
            IndexError::malformed(format!("expected an object of number arrays: {}", e))
        })?;

        if raw.is_empty() {
            return Err(IndexError::malformed("artifact contains no pages"));
        }

        let mut index = Self::new();
        for (path, values) in raw {
            let mut vector = Vec::with_capacity(values.len());
            for (pos, value) in values.into_iter().enumerate() {
                // Values beyond f32 range become infinite here
                let value = value as f32;
                if !value.is_finite() {
                    return Err(IndexError::malformed(format!(
                        "{}: element {} is not a finite number",
                        path, pos
                    )));
                }
                vector.push(value);
            }

            let context = path.clone();
            index
                .insert(PageEmbedding { path, vector })
                .map_err(|e| match e {
                    IndexError::DimensionMismatch { expected, actual } => {
                        IndexError::malformed(format!(
                            "{}: vector has {} elements, expected {}",
                            context, actual, expected
                        ))
                    }
                    other => IndexError::malformed(format!("{}: {}", context, other)),
                })?;
        }

        Ok(index)
    }

    /// Read and parse an artifact from disk
    ///
    /// A missing or unreadable file is a malformed index as far as readers
    /// are concerned.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            IndexError::malformed(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_slice(&bytes)
    }

    /// Write the artifact so readers never observe a partial file
    ///
    /// Missing parent directories are created. The bytes go to a sibling
    /// temporary file which is synced and then renamed over `path`.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let bytes = self.to_json()?;
        let temp_path = temp_path_for(path);

        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        log::debug!(
            "Wrote {} embeddings ({} bytes) to {}",
            self.len(),
            bytes.len(),
            path.display()
        );
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_EMBEDDING_FILE.into());
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
