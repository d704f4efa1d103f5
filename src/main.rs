//! BuloRadar binary entrypoint.
//! Fetches news + fact-checker feeds, scores headlines and writes a JSON report.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use buloradar::analyze::{build_factcheck_service, DynFactCheck};
use buloradar::config::{HotReloadConfig, DEFAULT_CONFIG_TOML, ENV_CONFIG_PATH};
use buloradar::embed::{build_embedder, EmbedderBackend, EmbedderConfig, EmbeddingCache};
use buloradar::ingest::{self, config::FeedsConfig};
use buloradar::metrics::Metrics;
use buloradar::pipeline::build_claim_corpus;
use buloradar::report::Report;
use buloradar::watch::run_until_shutdown;
use buloradar::{Pipeline, RawItem, RunStats, ScoringConfig};

const DEFAULT_LOG_FILTER: &str =
    "buloradar=info,pipeline=info,ingest=info,cache=info,factcheck=info,config=info,warn";

#[derive(Parser)]
#[command(
    name = "buloradar",
    about = "Scores Spanish news headlines for sensationalism and known hoaxes",
    version
)]
struct Cli {
    /// Emit JSON log lines instead of compact text
    #[arg(long, global = true, env = "BULORADAR_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One pass: fetch feeds, score, write the report
    Run(RunArgs),

    /// Repeat `run` on a fixed interval, hot-reloading the scoring config
    Watch {
        #[command(flatten)]
        run: RunArgs,

        /// Seconds between passes
        #[arg(long, default_value = "900")]
        interval_secs: u64,
    },

    /// Score ad-hoc titles and print the JSON report to stdout
    Score {
        /// Headlines to score
        #[arg(required = true)]
        titles: Vec<String>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },
}

#[derive(Args, Clone)]
struct ScoringArgs {
    /// Scoring config (TOML or JSON); defaults to $BULORADAR_CONFIG_PATH, then config/scoring.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Embedding backend: `hash` (offline) or `openai`
    #[arg(long, env = "BULORADAR_EMBEDDER", default_value = "hash")]
    embedder: String,

    /// Embedding dimension for the hash backend
    #[arg(long, env = "BULORADAR_EMBED_DIM", default_value = "384")]
    embed_dim: usize,

    /// Model name for the openai backend
    #[arg(long, env = "BULORADAR_EMBED_MODEL")]
    embed_model: Option<String>,

    /// Base URL of an OpenAI-compatible embeddings API
    #[arg(long, env = "BULORADAR_EMBED_BASE_URL")]
    embed_base_url: Option<String>,

    /// Persistent embedding cache
    #[arg(long, default_value = "cache/embeddings.json")]
    cache: PathBuf,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    scoring: ScoringArgs,

    /// Feed list (TOML or JSON); defaults to $BULORADAR_FEEDS_PATH, then config/feeds.toml
    #[arg(long)]
    feeds: Option<PathBuf>,

    /// Report output path
    #[arg(long, default_value = "out/buloradar.json")]
    output: PathBuf,

    /// Write Prometheus exposition text here after each pass
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

impl ScoringArgs {
    fn embedder_config(&self) -> Result<EmbedderConfig> {
        let mut cfg = EmbedderConfig {
            backend: self.embedder.parse::<EmbedderBackend>()?,
            dim: self.embed_dim,
            ..Default::default()
        };
        if let Some(m) = &self.embed_model {
            cfg.model = m.clone();
        }
        if let Some(u) = &self.embed_base_url {
            cfg.base_url = u.clone();
        }
        Ok(cfg)
    }

    fn load_scoring(&self) -> Result<ScoringConfig> {
        match &self.config {
            Some(p) => ScoringConfig::load_from(p),
            None => ScoringConfig::load_default(),
        }
    }

    /// Path watched in `watch` mode.
    fn scoring_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_TOML))
    }

    fn open_cache(&self) -> Result<EmbeddingCache> {
        let embedder = build_embedder(&self.embedder_config()?)?;
        info!(target: "cache", backend = embedder.name(), dim = embedder.dim(), "embedder ready");
        Ok(EmbeddingCache::load(&self.cache, embedder))
    }
}

impl RunArgs {
    fn load_feeds(&self) -> Result<FeedsConfig> {
        match &self.feeds {
            Some(p) => FeedsConfig::load_from(p),
            None => FeedsConfig::load_default(),
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Local .env for OPENAI_API_KEY / FACTCHECK_API_KEY; absent in prod.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run(args) => {
            let scoring = args.scoring.load_scoring()?;
            let feeds = args.load_feeds()?;
            let metrics = init_metrics(args.metrics_out.as_deref())?;
            let cache = args.scoring.open_cache()?;
            let factcheck = build_factcheck_service(feeds.timeout());

            run_pass(&args, scoring, &feeds, &cache, factcheck, metrics.as_ref()).await
        }
        Commands::Watch { run, interval_secs } => {
            let initial = run.scoring.load_scoring()?;
            let hot = HotReloadConfig::new(run.scoring.scoring_path(), initial);
            let feeds = run.load_feeds()?;
            let metrics = init_metrics(run.metrics_out.as_deref())?;
            let cache = run.scoring.open_cache()?;
            let factcheck = build_factcheck_service(feeds.timeout());

            info!(target: "pipeline", interval_secs, config = %hot.path().display(), "watch mode started");
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(target: "pipeline", error = %e, "ctrl-c handler unavailable");
                    std::future::pending::<()>().await;
                }
            };
            run_until_shutdown(Duration::from_secs(interval_secs.max(1)), shutdown, || {
                run_pass(&run, hot.current(), &feeds, &cache, factcheck.clone(), metrics.as_ref())
            })
            .await;
            Ok(())
        }
        Commands::Score { titles, scoring } => {
            let cfg = scoring.load_scoring()?;
            let top_n = cfg.top_n;
            let cache = scoring.open_cache()?;
            let pipeline = Pipeline::new(cfg)?
                .with_factcheck_service(build_factcheck_service(Duration::from_secs(10)));

            let raw: Vec<RawItem> = titles
                .iter()
                .enumerate()
                .map(|(i, t)| RawItem::new("cli", t.as_str(), format!("cli:{i}")))
                .collect();
            let out = pipeline.run(raw, &[], &cache).await;
            persist_cache(&cache);

            println!("{}", Report::from_output(&out, top_n).to_json_pretty()?);
            Ok(())
        }
    }
}

fn init_metrics(out: Option<&Path>) -> Result<Option<Metrics>> {
    match out {
        Some(_) => Ok(Some(Metrics::init()?)),
        None => Ok(None),
    }
}

fn persist_cache(cache: &EmbeddingCache) {
    if let Err(e) = cache.persist() {
        warn!(target: "cache", error = %e, "embedding cache not saved");
    }
}

/// fetch (news ∥ fact-checkers) → claim corpus → pipeline → report.
async fn run_pass(
    args: &RunArgs,
    scoring: ScoringConfig,
    feeds: &FeedsConfig,
    cache: &EmbeddingCache,
    factcheck: DynFactCheck,
    metrics: Option<&Metrics>,
) -> Result<()> {
    let news_providers = feeds.news_providers()?;
    let claim_providers = feeds.fact_checker_providers()?;

    let ((news, skipped_news), (claims_raw, skipped_claims)) = tokio::join!(
        ingest::run_once(&news_providers),
        ingest::run_once(&claim_providers)
    );
    let claims = build_claim_corpus(claims_raw, cache).await;

    let top_n = scoring.top_n;
    let pipeline = Pipeline::new(scoring)?.with_factcheck_service(factcheck);
    let mut out = pipeline.run(news, &claims, cache).await;
    out.stats.skipped_sources = skipped_news.into_iter().chain(skipped_claims).collect();

    persist_cache(cache);
    metrics::gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

    let report = Report::from_output(&out, top_n);
    report
        .write_json(&args.output)
        .with_context(|| format!("writing report to {}", args.output.display()))?;
    log_summary(&out.stats, &args.output);

    if let (Some(m), Some(path)) = (metrics, args.metrics_out.as_deref()) {
        if let Err(e) = m.write_to(path) {
            warn!(target: "pipeline", error = ?e, "metrics dump failed");
        }
    }
    Ok(())
}

fn log_summary(stats: &RunStats, output: &Path) {
    info!(
        target: "pipeline",
        scored = stats.scored,
        confirmed = stats.confirmed,
        claims = stats.claims,
        skipped_sources = stats.skipped_sources.len(),
        output = %output.display(),
        "report written"
    );
}
