// src/metrics.rs
//! Prometheus series: one-time descriptions and an optional text-exposition dump.

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_all);
}

/// Register descriptions for every series this crate emits.
pub fn describe_all() {
    describe_counter!("ingest_events_total", "Items parsed from feed providers.");
    describe_counter!(
        "ingest_provider_errors_total",
        "Feed fetch/parse failures (source skipped for the run)."
    );
    describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    describe_counter!("pipeline_items_total", "Raw items submitted to the pipeline.");
    describe_counter!(
        "pipeline_dedup_dropped_total",
        "Items removed as near-duplicates."
    );
    describe_counter!(
        "pipeline_embed_failures_total",
        "Items skipped because no embedding could be computed."
    );
    describe_counter!(
        "pipeline_confirmed_total",
        "Items matched to a published debunk."
    );
    describe_counter!("embedding_cache_hits_total", "Embedding cache hits.");
    describe_counter!("embedding_cache_misses_total", "Embedding cache misses.");
    describe_counter!("factcheck_errors_total", "Remote fact-check failures (fail-open).");
    describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Dump the exposition text (e.g. for a node-exporter textfile collector).
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(path, self.render())
            .with_context(|| format!("writing metrics to {}", path.display()))
    }
}
