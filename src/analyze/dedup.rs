//! Greedy near-duplicate filter over headline embeddings.
//!
//! Items are visited in input order. A candidate is kept iff its cosine similarity to
//! every already-kept embedding is strictly below the threshold; otherwise it is dropped.
//! The first headline of a near-duplicate cluster always survives, whatever its source.
//! Downstream consumers rely on that ordering, so this is not a symmetric clustering.
//!
//! Cost is O(kept) comparisons per candidate, fine for batches of a few hundred.

use crate::embed::cosine_similarity;
use crate::model::NewsItem;

/// Stateful filter, usable item by item or over a whole batch.
#[derive(Debug)]
pub struct Deduplicator {
    threshold: f32,
    retained: Vec<Vec<f32>>,
}

impl Deduplicator {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            retained: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Highest similarity between `embedding` and anything retained so far.
    pub fn max_similarity(&self, embedding: &[f32]) -> Option<f32> {
        self.retained
            .iter()
            .map(|r| cosine_similarity(r, embedding))
            .fold(None, |acc, s| Some(acc.map_or(s, |a: f32| a.max(s))))
    }

    /// Returns `true` when the candidate duplicates a retained item.
    /// Otherwise the embedding is remembered and `false` is returned.
    pub fn should_drop(&mut self, embedding: &[f32]) -> bool {
        if let Some(max) = self.max_similarity(embedding) {
            if max >= self.threshold {
                return true;
            }
        }
        self.retained.push(embedding.to_vec());
        false
    }

    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }
}

/// Result of one dedup pass.
#[derive(Debug)]
pub struct DedupOutcome {
    pub kept: Vec<NewsItem>,
    pub dropped: usize,
}

/// Keep only non-duplicate items, preserving input order.
pub fn filter(items: Vec<NewsItem>, threshold: f32) -> DedupOutcome {
    let mut dedup = Deduplicator::new(threshold);
    let mut kept = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for item in items {
        if dedup.should_drop(&item.embedding) {
            dropped += 1;
        } else {
            kept.push(item);
        }
    }
    DedupOutcome { kept, dropped }
}
