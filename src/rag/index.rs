//! Exact nearest-neighbor index.
//!
//! A brute-force linear scan over the stored vectors: O(n·d) per query and
//! exact by construction. Corpora in the tens of thousands of chunks stay
//! comfortably inside interactive latency, and the narrow surface
//! (`add_point` / `search_knn`) leaves room to drop in an approximate
//! structure later without touching the retriever.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Similarity metric. Ranking direction follows the metric: cosine scores
/// rank descending (higher is closer), euclidean distances ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
}

struct IndexEntry {
    chunk_id: String,
    vector: Vec<f32>,
}

/// One search hit. `position` is the insertion position of the matching
/// point; `chunk_id` is the reference stored with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub position: usize,
    pub chunk_id: String,
    pub score: f32,
}

pub struct VectorIndex {
    dim: usize,
    metric: Metric,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Creates an empty index. `capacity_hint` pre-sizes the backing storage
    /// and may be zero.
    pub fn new(dim: usize, metric: Metric, capacity_hint: usize) -> Self {
        Self {
            dim,
            metric,
            entries: Vec::with_capacity(capacity_hint),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Appends a point and returns its position.
    pub fn add_point(&mut self, vector: Vec<f32>, chunk_id: &str) -> Result<usize, IndexError> {
        if vector.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                got: vector.len(),
            });
        }
        let position = self.entries.len();
        self.entries.push(IndexEntry {
            chunk_id: chunk_id.to_string(),
            vector,
        });
        Ok(position)
    }

    /// Returns the `k` nearest points to `query`, best first. Ties rank by
    /// insertion order. An empty index, `k == 0` or a query of the wrong
    /// dimension all return an empty result.
    pub fn search_knn(&self, query: &[f32], k: usize) -> Vec<ScoredHit> {
        if self.entries.is_empty() || k == 0 {
            return Vec::new();
        }
        if query.len() != self.dim {
            tracing::warn!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dim
            );
            return Vec::new();
        }

        let mut hits: Vec<ScoredHit> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| ScoredHit {
                position,
                chunk_id: entry.chunk_id.clone(),
                score: match self.metric {
                    Metric::Cosine => cosine_similarity(query, &entry.vector),
                    Metric::Euclidean => euclidean_distance(query, &entry.vector),
                },
            })
            .collect();

        hits.sort_by(|a, b| {
            let by_score = match self.metric {
                Metric::Cosine => b.score.partial_cmp(&a.score),
                Metric::Euclidean => a.score.partial_cmp(&b.score),
            };
            by_score
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.position.cmp(&b.position))
        });
        hits.truncate(k);
        hits
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
