//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, the [`cosine_similarity`] used for guideline ranking, and
//! [`HashProvider`], a deterministic offline embedder.
//!
//! Network and model-backed providers (OpenAI, Ollama, fastembed) live in
//! the `creview` app crate. A provider is built once and handed to the
//! [`Matcher`](crate::index::Matcher); nothing here holds global state.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Trait for embedding providers.
///
/// All vectors returned by one provider share the same dimensionality
/// ([`dims`](EmbeddingProvider::dims)); vectors from different providers
/// must never be compared.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per text in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text.
pub async fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    provider
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| crate::ReviewError::embedding("empty embedding response"))
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased word tokens and adjacent-token bigrams are hashed with
/// SHA-256 into a fixed number of signed buckets, then L2-normalized.
/// Needs no model download or network, so it backs offline runs and
/// tests. Quality is lexical overlap, not semantics.
pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub const MODEL_NAME: &'static str = "hash-v1";

    /// Create a hashing embedder. `dims` below 16 is raised to 16.
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(16) }
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            self.add_feature(&mut vec, &format!("t:{token}"), 1.0);
            // Split identifiers like UNSAFE_MACRO into their parts too.
            if token.contains('_') {
                for part in token.split('_').filter(|p| !p.is_empty()) {
                    self.add_feature(&mut vec, &format!("t:{part}"), 0.5);
                }
            }
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vec, &format!("b:{}_{}", pair[0], pair[1]), 0.5);
        }

        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut first = [0u8; 8];
        first.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(first) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vec[idx] += sign * weight;
    }
}

impl Default for HashProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
