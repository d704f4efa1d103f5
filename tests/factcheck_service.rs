use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use buloradar::analyze::{FactCheckMatch, FactCheckService};
use buloradar::embed::{EmbeddingCache, HashEmbedder};
use buloradar::pipeline::build_claim_corpus;
use buloradar::{Category, Pipeline, RawItem, ScoringConfig};

/// Rates anything mentioning "microchips" with `rating`, quoting the headline as the claim.
struct Scripted {
    queries: AtomicUsize,
    rating: &'static str,
    delay: Duration,
}

impl Scripted {
    fn rating(rating: &'static str) -> Arc<Self> {
        Arc::new(Self {
            queries: AtomicUsize::new(0),
            rating,
            delay: Duration::ZERO,
        })
    }

    fn debunks() -> Arc<Self> {
        Self::rating("Falso")
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            queries: AtomicUsize::new(0),
            rating: "Falso",
            delay,
        })
    }
}

#[async_trait]
impl FactCheckService for Scripted {
    async fn query(&self, text: &str) -> Vec<FactCheckMatch> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if !text.contains("microchips") {
            return Vec::new();
        }
        vec![FactCheckMatch {
            verdict: self.rating.into(),
            publisher: "Newtral".into(),
            similarity: None,
            claim: Some(text.to_string()),
        }]
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn cache() -> EmbeddingCache {
    EmbeddingCache::in_memory(Arc::new(HashEmbedder::new(384)))
}

#[tokio::test]
async fn remote_service_confirms_when_corpus_is_silent() {
    let svc = Scripted::debunks();
    let p = Pipeline::new(ScoringConfig::default())
        .unwrap()
        .with_factcheck_service(svc.clone());

    let out = p
        .run(
            vec![
                RawItem::new("Medio", "Las vacunas llevan microchips", "https://medio.test/1"),
                RawItem::new("Medio", "Sube el precio del aceite", "https://medio.test/2"),
            ],
            &[],
            &cache(),
        )
        .await;

    assert_eq!(svc.queries.load(Ordering::SeqCst), 2);
    assert_eq!(out.stats.remote_queries, 2);
    let top = &out.items[0];
    assert!(top.confirmed);
    assert_eq!(top.score, 100);
    assert_eq!(top.reasons[0].category, Category::FactCheck);
    assert!(top.reasons[0].label.contains("Newtral"));
    assert!(!out.items[1].confirmed);
}

#[tokio::test]
async fn corpus_hit_skips_remote_query() {
    let svc = Scripted::debunks();
    let p = Pipeline::new(ScoringConfig::default())
        .unwrap()
        .with_factcheck_service(svc.clone());
    let c = cache();
    let claims = build_claim_corpus(
        vec![RawItem::new("AFP", "Las vacunas llevan microchips", "https://factual.afp.com/x")],
        &c,
    )
    .await;

    let out = p
        .run(
            vec![RawItem::new("Medio", "Las vacunas llevan microchips", "https://medio.test/1")],
            &claims,
            &c,
        )
        .await;
    assert!(out.items[0].confirmed);
    assert_eq!(svc.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn gate_keeps_low_scores_away_from_the_service() {
    let svc = Scripted::debunks();
    let cfg = ScoringConfig {
        factcheck_gate: 30,
        ..Default::default()
    };
    let p = Pipeline::new(cfg).unwrap().with_factcheck_service(svc.clone());

    let out = p
        .run(
            vec![
                RawItem::new("Medio", "Las vacunas llevan microchips", "https://medio.test/1"),
                RawItem::new("Medio", "VACUNAS CON MICROCHIPS", "https://medio.test/2"),
            ],
            &[],
            &cache(),
        )
        .await;

    // only the all-caps title (30) reaches the gate
    assert_eq!(svc.queries.load(Ordering::SeqCst), 1);
    assert_eq!(out.stats.factcheck_checked, 1);
    assert!(out.items.iter().all(|i| !i.confirmed));
}

#[tokio::test]
async fn true_rating_never_confirms() {
    let svc = Scripted::rating("Verdadero");
    let p = Pipeline::new(ScoringConfig::default())
        .unwrap()
        .with_factcheck_service(svc.clone());

    let out = p
        .run(
            vec![RawItem::new("Medio", "Las vacunas llevan microchips", "https://medio.test/1")],
            &[],
            &cache(),
        )
        .await;

    assert_eq!(out.stats.remote_queries, 1);
    assert_eq!(out.stats.confirmed, 0);
    assert!(!out.items[0].confirmed);
    assert!(!out.items[0].has_reason(Category::FactCheck));
}

#[tokio::test]
async fn slow_service_is_queried_concurrently() {
    let svc = Scripted::slow(Duration::from_millis(200));
    let p = Pipeline::new(ScoringConfig::default())
        .unwrap()
        .with_factcheck_service(svc.clone());
    let titles = [
        "Las vacunas llevan microchips",
        "Sube el precio del aceite",
        "Huelga de controladores aéreos",
        "Récord de turistas en verano",
        "Nueva línea de metro en Sevilla",
        "Temporal de nieve en Burgos",
    ];
    let raw: Vec<RawItem> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| RawItem::new("Medio", *t, format!("https://medio.test/{i}")))
        .collect();

    let started = Instant::now();
    let out = p.run(raw, &[], &cache()).await;
    let elapsed = started.elapsed();

    assert_eq!(svc.queries.load(Ordering::SeqCst), 6);
    assert_eq!(out.stats.remote_queries, 6);
    assert_eq!(out.stats.confirmed, 1);
    // one at a time would take 6 × 200ms
    assert!(elapsed < Duration::from_millis(700), "took {elapsed:?}");
}
