// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod model;
pub mod pipeline;
pub mod report;

// Embedding backends + persistent cache
pub mod embed;

// Scoring stages (dedup, signals, anomaly, fact-check, aggregate, rank)
pub mod analyze;

// Feed retrieval (news + fact-checkers)
pub mod ingest;

pub mod metrics;

// `watch` mode loop
pub mod watch;

// ---- Re-exports for stable public API ----
pub use crate::config::ScoringConfig;
pub use crate::model::{Category, DebunkedClaim, NewsItem, RawItem, Reason, RiskLevel};
pub use crate::pipeline::{Pipeline, PipelineOutput, RunStats};

/// Short anonymized id for log lines. Raw headlines are never logged.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
