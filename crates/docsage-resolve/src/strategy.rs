//! Chunk-selection strategies.
//!
//! Both strategies read only the index, never fail on `k` larger than the
//! index, and return an empty list for an empty index.

use docsage_core::{Result, RetrievalConfig, RetrievalStrategyKind, ScoredChunk};
use docsage_store::VectorIndex;

/// Picks up to `k` entries for a query vector.
pub trait RetrievalStrategy: Send + Sync {
    fn kind(&self) -> RetrievalStrategyKind;

    fn select(&self, index: &VectorIndex, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Build the strategy named by configuration.
pub fn strategy_for(config: &RetrievalConfig) -> Box<dyn RetrievalStrategy> {
    match config.strategy {
        RetrievalStrategyKind::Similarity => Box::new(Similarity),
        RetrievalStrategyKind::Mmr => Box::new(Mmr::new(config.diversity_weight, config.fetch_k)),
    }
}

/// Entry positions ordered by descending score. Sorting is stable, so ties
/// keep index order.
fn ranked(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

fn scored(index: &VectorIndex, position: usize, score: f32) -> ScoredChunk {
    ScoredChunk {
        chunk: index.entries()[position].chunk.clone(),
        score,
    }
}

/// Top-k by cosine similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Similarity;

impl RetrievalStrategy for Similarity {
    fn kind(&self) -> RetrievalStrategyKind {
        RetrievalStrategyKind::Similarity
    }

    fn select(&self, index: &VectorIndex, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let scores = index.similarities(query)?;
        Ok(ranked(&scores)
            .into_iter()
            .take(k)
            .map(|i| scored(index, i, scores[i]))
            .collect())
    }
}

/// Maximal Marginal Relevance over the `fetch_k` most similar entries.
///
/// Each step picks the candidate maximizing
/// `λ · sim(query, c) − (1 − λ) · max sim(c, selected)`.
/// λ = 1 is pure relevance, λ = 0 pure diversity. Reported scores are the
/// query similarity, not the MMR value.
#[derive(Debug, Clone, Copy)]
pub struct Mmr {
    pub lambda: f32,
    pub fetch_k: usize,
}

impl Mmr {
    pub fn new(lambda: f32, fetch_k: usize) -> Self {
        Self {
            lambda: lambda.clamp(0.0, 1.0),
            fetch_k,
        }
    }
}

impl RetrievalStrategy for Mmr {
    fn kind(&self) -> RetrievalStrategyKind {
        RetrievalStrategyKind::Mmr
    }

    fn select(&self, index: &VectorIndex, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let scores = index.similarities(query)?;

        let pool = self.fetch_k.max(k);
        let mut remaining: Vec<usize> = ranked(&scores).into_iter().take(pool).collect();
        let k = k.min(remaining.len());
        let mut selected: Vec<usize> = Vec::with_capacity(k);

        while selected.len() < k {
            let mut best_idx = 0;
            let mut best_mmr = f32::NEG_INFINITY;

            for (idx, &candidate) in remaining.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|&s| index.pairwise(candidate, s))
                    .fold(f32::NEG_INFINITY, f32::max);
                let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
                let mmr = self.lambda * scores[candidate] - (1.0 - self.lambda) * redundancy;

                // Strict comparison: ties go to the more relevant candidate.
                if mmr > best_mmr {
                    best_mmr = mmr;
                    best_idx = idx;
                }
            }

            selected.push(remaining.remove(best_idx));
        }

        Ok(selected
            .into_iter()
            .map(|i| scored(index, i, scores[i]))
            .collect())
    }
}
