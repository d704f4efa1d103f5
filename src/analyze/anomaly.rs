// src/analyze/anomaly.rs
//! Batch-relative semantic isolation.
//!
//! The centroid of the batch's embeddings stands in for "today's mainstream coverage";
//! headlines far from it are flagged. Always computed from the current batch.

use crate::embed::cosine_similarity;

/// Mean vector. `None` for an empty batch or mixed dimensions.
pub fn centroid<V: AsRef<[f32]>>(vectors: &[V]) -> Option<Vec<f32>> {
    let first = vectors.first()?.as_ref();
    let dim = first.len();
    if dim == 0 || vectors.iter().any(|v| v.as_ref().len() != dim) {
        return None;
    }
    let mut acc = vec![0.0f32; dim];
    for v in vectors {
        for (a, x) in acc.iter_mut().zip(v.as_ref()) {
            *a += x;
        }
    }
    let n = vectors.len() as f32;
    for a in acc.iter_mut() {
        *a /= n;
    }
    Some(acc)
}

/// Per-vector similarity to the batch centroid (empty when no centroid exists).
pub fn centroid_similarities<V: AsRef<[f32]>>(vectors: &[V]) -> Vec<f32> {
    match centroid(vectors) {
        Some(c) => vectors
            .iter()
            .map(|v| cosine_similarity(v.as_ref(), &c))
            .collect(),
        None => Vec::new(),
    }
}

/// Flags vectors whose similarity to the centroid is below `threshold`.
/// Batches smaller than `min_batch` (or without a centroid) flag nothing.
pub fn isolated<V: AsRef<[f32]>>(vectors: &[V], threshold: f32, min_batch: usize) -> Vec<bool> {
    if vectors.len() < min_batch.max(1) {
        return vec![false; vectors.len()];
    }
    let sims = centroid_similarities(vectors);
    if sims.len() != vectors.len() {
        return vec![false; vectors.len()];
    }
    sims.into_iter().map(|s| s < threshold).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_the_mean() {
        let c = centroid(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 2.0]]).unwrap();
        assert_eq!(c, vec![1.0, 1.0]);
    }

    #[test]
    fn centroid_rejects_empty_and_mixed() {
        let empty: Vec<Vec<f32>> = Vec::new();
        assert!(centroid(&empty).is_none());
        assert!(centroid(&[vec![1.0], vec![1.0, 2.0]]).is_none());
    }

    #[test]
    fn outlier_is_flagged() {
        let vs = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.95, 0.1, 0.0],
            vec![0.9, 0.0, 0.1],
            vec![0.98, 0.05, 0.0],
            vec![-0.2, 0.0, -1.0],
        ];
        let flags = isolated(&vs, 0.2, 3);
        assert_eq!(flags, vec![false, false, false, false, true]);
    }

    #[test]
    fn small_batches_flag_nothing() {
        let vs = vec![vec![1.0, 0.0], vec![-1.0, 0.1]];
        assert_eq!(isolated(&vs, 0.2, 3), vec![false, false]);
        // A lone item is its own centroid.
        assert_eq!(isolated(&[vec![0.3, 0.4]], 0.2, 1), vec![false]);
    }
}
