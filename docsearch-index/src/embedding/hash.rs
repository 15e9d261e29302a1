//! Feature-hashing embedder
//!
//! Deterministic bag-of-words embedding with no model download. Each token and
//! each adjacent token pair is hashed into a signed bucket; the result is L2
//! normalized. Useful for tests, offline builds, and as a lexical fallback.

use async_trait::async_trait;

use super::Embedder;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Weight of adjacent token pairs relative to single tokens
const BIGRAM_WEIGHT: f32 = 0.5;

/// Hashing embedder with a configurable dimension
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashEmbedder {
    /// Same width as all-MiniLM-L6-v2
    pub const DEFAULT_DIMENSION: usize = 384;

    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("feature-hash-{}", dimension),
        }
    }

    /// Synchronous embedding, identical to [`Embedder::embed`]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(&mut vector, fnv1a(token.as_bytes()), 1.0);
        }
        for pair in tokens.windows(2) {
            let mut bytes = Vec::with_capacity(pair[0].len() + pair[1].len() + 1);
            bytes.extend_from_slice(pair[0].as_bytes());
            bytes.push(b' ');
            bytes.extend_from_slice(pair[1].as_bytes());
            self.accumulate(&mut vector, fnv1a(&bytes), BIGRAM_WEIGHT);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], hash: u64, weight: f32) {
        let bucket = (hash % self.dimension as u64) as usize;
        // Top bit picks the sign so collisions tend to cancel
        let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

/// Lowercase alphanumeric tokens
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Install the CLI: `cargo install`!"),
            vec!["install", "the", "cli", "cargo", "install"]
        );
    }

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("Configure the search plugin");
        let b = embedder.embed_text("Configure the search plugin");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed_text("  ... ");
        assert_eq!(v, vec![0.0; 16]);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashEmbedder::default();
        assert_eq!(
            embedder.embed_text("Semantic Search!"),
            embedder.embed_text("semantic search")
        );
    }

    #[test]
    fn test_zero_dimension_is_clamped() {
        let embedder = HashEmbedder::new(0);
        assert_eq!(embedder.dimension(), Some(1));
        assert_eq!(embedder.model_id(), "feature-hash-1");
    }

    #[tokio::test]
    async fn test_trait_matches_sync_embedding() {
        let embedder = HashEmbedder::new(32);
        let via_trait = embedder.embed("vector ranking").await.unwrap();
        assert_eq!(via_trait, embedder.embed_text("vector ranking"));
    }
}
