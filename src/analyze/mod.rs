// src/analyze/mod.rs
//! Scoring stages, in pipeline order:
//! dedup → signals → anomaly → factcheck → aggregate → rank.

pub mod aggregate;
pub mod anomaly;
pub mod dedup;
pub mod factcheck;
pub mod rank;
pub mod signals;

// Re-export convenient types.
pub use crate::analyze::aggregate::{aggregate, Aggregate};
pub use crate::analyze::dedup::{DedupOutcome, Deduplicator};
pub use crate::analyze::factcheck::{
    build_factcheck_service, DisabledFactCheck, DynFactCheck, FactCheckMatch, FactCheckMatcher, FactCheckService,
    is_debunk_rating, GoogleFactCheckClient,
};
pub use crate::analyze::rank::rank;
pub use crate::analyze::signals::{SignalExtractor, SignalHit};
