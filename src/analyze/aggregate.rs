//! Combine signal hits into one bounded score and an ordered reason list.

use crate::analyze::signals::SignalHit;
use crate::model::{Category, NewsItem, Reason};

pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub score: u8,
    pub reasons: Vec<Reason>,
    pub confirmed: bool,
}

impl Aggregate {
    /// Write the result onto an item.
    pub fn apply_to(self, item: &mut NewsItem) {
        item.score = self.score;
        item.reasons = self.reasons;
        item.confirmed = self.confirmed;
    }
}

/// A fact-check hit short-circuits everything: score 100, that reason alone, confirmed.
/// Otherwise deltas are summed, clamped to [0, 100], and one reason per category is kept
/// (first hit wins) in category order.
pub fn aggregate(hits: &[SignalHit]) -> Aggregate {
    if let Some(fc) = hits.iter().find(|h| h.category == Category::FactCheck) {
        return Aggregate {
            score: MAX_SCORE,
            reasons: vec![fc.reason()],
            confirmed: true,
        };
    }

    let mut seen: Vec<&SignalHit> = Vec::with_capacity(hits.len());
    for h in hits {
        if !seen.iter().any(|s| s.category == h.category) {
            seen.push(h);
        }
    }
    seen.sort_by_key(|h| h.category);

    let total = seen
        .iter()
        .fold(0i32, |acc, h| acc.saturating_add(h.delta));

    Aggregate {
        score: clamp_score(total),
        reasons: seen.into_iter().map(SignalHit::reason).collect(),
        confirmed: false,
    }
}

pub fn clamp_score(raw: i32) -> u8 {
    raw.clamp(0, MAX_SCORE as i32) as u8
}
