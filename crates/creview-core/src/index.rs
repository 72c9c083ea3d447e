//! Guideline embedding index and chunk matcher.
//!
//! [`GuidelineIndex`] embeds every guideline once (`rule + ". " +
//! description`) and ranks them against a query vector by cosine
//! similarity. [`Matcher`] pairs the index with the provider that built
//! it, embeds each chunk fresh, and returns the top-K matches.
//!
//! # Ranking
//!
//! 1. Score every guideline vector against the query vector.
//! 2. Stable sort by score, descending; ties keep record order.
//! 3. Truncate to `top_k`. There is no score threshold: a weak match that
//!    ranks in the top K is still returned.
//!
//! An empty index answers every query with an empty list.

use std::sync::Arc;

use crate::embedding::{cosine_similarity, embed_one, EmbeddingProvider};
use crate::error::{Result, ReviewError};
use crate::models::{GuidelineRecord, MatchResult};

/// Guideline texts sent to the provider per call unless configured.
pub const DEFAULT_EMBED_BATCH: usize = 64;

/// Canonical text embedded for a guideline.
///
/// Only the rule and description carry meaning; id, severity, and
/// category are used after retrieval for prompt formatting.
pub fn guideline_text(record: &GuidelineRecord) -> String {
    format!("{}. {}", record.rule, record.description)
}

/// Read-only index of guideline records and their vectors.
#[derive(Debug, Clone, Default)]
pub struct GuidelineIndex {
    records: Vec<GuidelineRecord>,
    vectors: Vec<Vec<f32>>,
    dims: usize,
}

impl GuidelineIndex {
    /// Embed `records` with `provider` and build the index.
    ///
    /// An empty record set builds an empty index without calling the
    /// provider.
    pub async fn build(
        records: Vec<GuidelineRecord>,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        Self::build_batched(records, provider, DEFAULT_EMBED_BATCH).await
    }

    /// Like [`build`](Self::build), sending at most `batch_size` texts per
    /// provider call. A `batch_size` of 0 is treated as 1.
    pub async fn build_batched(
        records: Vec<GuidelineRecord>,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self> {
        if records.is_empty() {
            return Ok(Self::default());
        }

        let texts: Vec<String> = records.iter().map(guideline_text).collect();
        tracing::info!(
            guidelines = texts.len(),
            model = provider.model_name(),
            batch_size,
            "embedding guidelines"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            let mut embedded = provider.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(ReviewError::embedding(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.append(&mut embedded);
        }

        Self::from_vectors(records, vectors)
    }

    /// Build an index from precomputed vectors (e.g. a cache).
    ///
    /// Every vector must have the same length as the first one.
    pub fn from_vectors(records: Vec<GuidelineRecord>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if records.len() != vectors.len() {
            return Err(ReviewError::embedding(format!(
                "{} guidelines but {} vectors",
                records.len(),
                vectors.len()
            )));
        }

        let dims = vectors.first().map_or(0, Vec::len);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(ReviewError::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }

        Ok(Self {
            records,
            vectors,
            dims,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimensionality of the stored vectors (0 for an empty index).
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn records(&self) -> &[GuidelineRecord] {
        &self.records
    }

    /// Rank all guidelines against `query` and keep the best `top_k`.
    pub fn rank(&self, query: &[f32], top_k: usize) -> Result<Vec<MatchResult>> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(ReviewError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();

        // sort_by is stable, so equal scores keep record order.
        scored.sort_by(|a, b| sort_key(b.1).total_cmp(&sort_key(a.1)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| MatchResult {
                guideline: self.records[i].clone(),
                score,
            })
            .collect())
    }
}

/// NaN scores (from NaN vector components) rank below every real score.
fn sort_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Embeds chunks and queries a shared [`GuidelineIndex`].
///
/// The provider is injected at construction and must be the one that
/// built the index.
#[derive(Clone)]
pub struct Matcher {
    index: Arc<GuidelineIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Matcher {
    pub fn new(
        index: Arc<GuidelineIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            provider,
            top_k,
        }
    }

    /// Build the index from `records` and wrap it in a matcher.
    pub async fn build(
        records: Vec<GuidelineRecord>,
        provider: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Result<Self> {
        Self::build_batched(records, provider, top_k, DEFAULT_EMBED_BATCH).await
    }

    /// [`build`](Self::build) with an explicit embedding batch size.
    pub async fn build_batched(
        records: Vec<GuidelineRecord>,
        provider: Arc<dyn EmbeddingProvider>,
        top_k: usize,
        batch_size: usize,
    ) -> Result<Self> {
        let index = GuidelineIndex::build_batched(records, provider.as_ref(), batch_size).await?;
        Ok(Self::new(Arc::new(index), provider, top_k))
    }

    pub fn index(&self) -> &GuidelineIndex {
        &self.index
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top-K guidelines for `text`, best first.
    pub async fn match_chunk(&self, text: &str) -> Result<Vec<MatchResult>> {
        self.match_chunk_k(text, self.top_k).await
    }

    /// Like [`match_chunk`](Self::match_chunk) with an explicit `top_k`.
    pub async fn match_chunk_k(&self, text: &str, top_k: usize) -> Result<Vec<MatchResult>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(chars = text.len(), "embedding code chunk");
        let query = embed_one(self.provider.as_ref(), text).await?;
        let matches = self.index.rank(&query, top_k)?;

        if let Some(last) = matches.last() {
            tracing::info!(
                matched = matches.len(),
                min_score = last.score,
                "matched guidelines"
            );
        }
        Ok(matches)
    }
}
