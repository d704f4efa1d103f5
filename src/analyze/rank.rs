// src/analyze/rank.rs
//! Final ordering of scored items for the report.

use crate::model::NewsItem;

/// Stable sort by score, highest first; equal scores keep their input order.
pub fn rank(mut items: Vec<NewsItem>) -> Vec<NewsItem> {
    items.sort_by(|a, b| b.score.cmp(&a.score));
    items
}

/// `rank` then keep the first `n`.
pub fn top_n(items: Vec<NewsItem>, n: usize) -> Vec<NewsItem> {
    let mut ranked = rank(items);
    ranked.truncate(n);
    ranked
}
