// src/pipeline.rs
//! One scoring pass over a batch of raw headlines.
//!
//! Order:
//! 1) validation (non-empty title + link)
//! 2) embeddings through the cache (failed items are dropped, not fatal)
//! 3) greedy dedup (first seen wins)
//! 4) title/link signals
//! 5) isolation against the batch centroid
//! 6) fact-check matching for items at or above the gate: local corpus first, then
//!    concurrent remote lookups for the rest, each review verified against the headline
//! 7) aggregation (fact-check confirmation overrides everything)
//! 8) stable ranking by score

use anyhow::Result;
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyze::{
    aggregate, anomaly, dedup, rank, DisabledFactCheck, DynFactCheck, FactCheckMatch,
    FactCheckMatcher, SignalExtractor, SignalHit,
};
use crate::anon_hash;
use crate::config::ScoringConfig;
use crate::embed::EmbeddingCache;
use crate::model::{Category, DebunkedClaim, NewsItem, RawItem};

/// Remote fact-check lookups in flight at once.
const REMOTE_CONCURRENCY: usize = 8;

/// Counters for one run, written into the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub input: usize,
    pub invalid: usize,
    pub embed_failures: usize,
    pub duplicates: usize,
    pub isolated: usize,
    pub factcheck_checked: usize,
    pub remote_queries: usize,
    pub confirmed: usize,
    pub scored: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub claims: usize,
    pub skipped_sources: Vec<String>,
}

#[derive(Debug)]
pub struct PipelineOutput {
    /// Every scored item, ranked.
    pub items: Vec<NewsItem>,
    pub stats: RunStats,
}

impl PipelineOutput {
    pub fn top(&self, n: usize) -> &[NewsItem] {
        &self.items[..n.min(self.items.len())]
    }
}

pub struct Pipeline {
    config: ScoringConfig,
    extractor: SignalExtractor,
    matcher: FactCheckMatcher,
    factcheck: DynFactCheck,
}

impl Pipeline {
    /// Compiles the extractors; fails only on invalid configured regexes.
    pub fn new(config: ScoringConfig) -> Result<Self> {
        let extractor = SignalExtractor::new(&config)?;
        let matcher = FactCheckMatcher::new(config.factcheck_threshold)
            .with_debunk_ratings(config.debunk_ratings.clone());
        Ok(Self {
            config,
            extractor,
            matcher,
            factcheck: Arc::new(DisabledFactCheck),
        })
    }

    pub fn with_factcheck_service(mut self, service: DynFactCheck) -> Self {
        self.factcheck = service;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Full pass: validate, embed, score, rank.
    pub async fn run(
        &self,
        raw: Vec<RawItem>,
        claims: &[DebunkedClaim],
        cache: &EmbeddingCache,
    ) -> PipelineOutput {
        crate::metrics::ensure_described();
        let mut stats = RunStats {
            input: raw.len(),
            claims: claims.len(),
            ..Default::default()
        };
        let (hits0, misses0) = (cache.hits(), cache.misses());

        let valid: Vec<RawItem> = raw
            .into_iter()
            .filter(|r| {
                let ok = r.is_valid();
                if !ok {
                    stats.invalid += 1;
                }
                ok
            })
            .collect();

        let items = embed_items(valid, cache, &mut stats).await;
        let items = self.score(items, claims, cache, &mut stats).await;

        stats.cache_hits = cache.hits() - hits0;
        stats.cache_misses = cache.misses() - misses0;
        counter!("pipeline_items_total").increment(stats.input as u64);

        info!(
            target: "pipeline",
            input = stats.input,
            scored = stats.scored,
            duplicates = stats.duplicates,
            embed_failures = stats.embed_failures,
            confirmed = stats.confirmed,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            "pipeline run finished"
        );

        PipelineOutput { items, stats }
    }

    /// Stages 3–8 over already-embedded items. `cache` embeds remote claim texts.
    pub async fn score(
        &self,
        items: Vec<NewsItem>,
        claims: &[DebunkedClaim],
        cache: &EmbeddingCache,
        stats: &mut RunStats,
    ) -> Vec<NewsItem> {
        let cfg = &self.config;

        let deduped = dedup::filter(items, cfg.duplicate_threshold);
        stats.duplicates += deduped.dropped;
        counter!("pipeline_dedup_dropped_total").increment(deduped.dropped as u64);
        let mut items = deduped.kept;

        let mut hits: Vec<Vec<SignalHit>> = items
            .iter()
            .map(|it| self.extractor.extract(&it.title, &it.link))
            .collect();

        let vectors: Vec<&[f32]> = items.iter().map(|i| i.embedding.as_slice()).collect();
        let flags = anomaly::isolated(&vectors, cfg.isolation_threshold, cfg.isolation_min_batch);
        if flags.contains(&true) {
            let sims = anomaly::centroid_similarities(&vectors);
            for ((h, flagged), sim) in hits.iter_mut().zip(flags).zip(sims) {
                if flagged {
                    stats.isolated += 1;
                    h.push(SignalHit::new(
                        Category::Isolation,
                        cfg.weight(Category::Isolation),
                        format!("Semantically isolated from today's coverage (similarity {sim:.2})"),
                    ));
                }
            }
        }

        // Gate, then the local corpus; whatever it leaves unmatched goes remote.
        let mut remote: Vec<usize> = Vec::new();
        for (i, (item, item_hits)) in items.iter().zip(hits.iter_mut()).enumerate() {
            if aggregate(item_hits.as_slice()).score < cfg.factcheck_gate {
                continue;
            }
            stats.factcheck_checked += 1;
            match self.matcher.find(&item.embedding, claims) {
                Some(m) => {
                    log_match(item, &m);
                    item_hits.push(m.to_hit());
                }
                None if self.factcheck.is_enabled() => remote.push(i),
                None => {}
            }
        }

        if !remote.is_empty() {
            stats.remote_queries += remote.len();
            let service = &self.factcheck;
            let answers: Vec<Vec<FactCheckMatch>> = stream::iter(
                remote.iter().map(|&i| service.query(&items[i].title)),
            )
            .buffered(REMOTE_CONCURRENCY)
            .collect()
            .await;

            for (&i, reviews) in remote.iter().zip(answers) {
                let item = &items[i];
                if let Some(m) = self.matcher.confirm_remote(&item.embedding, reviews, cache).await {
                    log_match(item, &m);
                    hits[i].push(m.to_hit());
                }
            }
        }

        for (item, item_hits) in items.iter_mut().zip(hits) {
            let agg = aggregate(&item_hits);
            if agg.confirmed {
                stats.confirmed += 1;
                counter!("pipeline_confirmed_total").increment(1);
            }
            agg.apply_to(item);
            debug!(
                target: "pipeline",
                id = %anon_hash(&item.title),
                score = item.score,
                reasons = item.reasons.len(),
                "scored"
            );
        }

        stats.scored = items.len();
        rank(items)
    }
}

fn log_match(item: &NewsItem, m: &FactCheckMatch) {
    info!(
        target: "pipeline",
        id = %anon_hash(&item.title),
        publisher = %m.publisher,
        "headline matches a published debunk"
    );
}

/// Embed raw items through the cache, dropping (and counting) the ones that fail.
async fn embed_items(raw: Vec<RawItem>, cache: &EmbeddingCache, stats: &mut RunStats) -> Vec<NewsItem> {
    let titles: Vec<String> = raw.iter().map(|r| r.title.clone()).collect();
    let vectors = cache.get_or_compute_batch(&titles).await;

    let mut out = Vec::with_capacity(raw.len());
    for (r, v) in raw.into_iter().zip(vectors) {
        match v {
            Ok(embedding) => out.push(NewsItem::from_raw(r, embedding)),
            Err(e) => {
                stats.embed_failures += 1;
                counter!("pipeline_embed_failures_total").increment(1);
                warn!(
                    target: "pipeline",
                    id = %anon_hash(&r.title),
                    source = %r.source,
                    error = %e,
                    "embedding failed; item skipped"
                );
            }
        }
    }
    out
}

/// Embed fact-checker headlines into the debunked-claim corpus. Failures are dropped.
pub async fn build_claim_corpus(raw: Vec<RawItem>, cache: &EmbeddingCache) -> Vec<DebunkedClaim> {
    let raw: Vec<RawItem> = raw.into_iter().filter(|r| !r.title.trim().is_empty()).collect();
    let titles: Vec<String> = raw.iter().map(|r| r.title.clone()).collect();
    let vectors = cache.get_or_compute_batch(&titles).await;

    let mut out = Vec::with_capacity(raw.len());
    let mut failed = 0usize;
    for (r, v) in raw.into_iter().zip(vectors) {
        match v {
            Ok(embedding) => out.push(DebunkedClaim {
                title: r.title,
                embedding,
                source: r.source,
            }),
            Err(_) => failed += 1,
        }
    }
    if failed > 0 {
        warn!(target: "pipeline", failed, "debunked claims without embedding were skipped");
    }
    out
}
