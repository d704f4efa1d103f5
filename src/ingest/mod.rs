// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use crate::ingest::types::{FetchOutcome, SourceProvider, SourceReport};
use crate::model::RawItem;
use futures::future::join_all;
use metrics::counter;

/// Normalize feed text: decode entities, strip tags, fold quotes, collapse whitespace.
/// Punctuation is kept as-is since it feeds the formatting signals.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| {
        regex::Regex::new(r"(?is)</?[^>]+>").expect("static tag regex")
    });
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. NBSP)
    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // 5) Length cap: 500 chars (headlines only)
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

/// Fetch every provider concurrently. Reports come back in provider order.
pub async fn fetch_all(providers: &[Box<dyn SourceProvider>]) -> Vec<SourceReport> {
    crate::metrics::ensure_described();

    let futs = providers.iter().map(|p| async move {
        let outcome = match p.fetch_latest().await {
            Ok(items) => FetchOutcome::Fetched { items },
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error; source skipped");
                counter!("ingest_provider_errors_total").increment(1);
                FetchOutcome::Skipped {
                    reason: format!("{e:#}"),
                }
            }
        };
        SourceReport {
            source: p.name().to_string(),
            outcome,
        }
    });
    join_all(futs).await
}

/// Flatten fetched items in provider order. Returns (items, skipped source names).
pub fn merge(reports: Vec<SourceReport>) -> (Vec<RawItem>, Vec<String>) {
    let mut items = Vec::new();
    let mut skipped = Vec::new();
    for r in reports {
        match r.outcome {
            FetchOutcome::Fetched { items: mut v } => items.append(&mut v),
            FetchOutcome::Skipped { .. } => skipped.push(r.source),
        }
    }
    (items, skipped)
}

/// Fetch + merge in one go.
pub async fn run_once(providers: &[Box<dyn SourceProvider>]) -> (Vec<RawItem>, Vec<String>) {
    let reports = fetch_all(providers).await;
    let (items, skipped) = merge(reports);
    tracing::info!(
        target: "ingest",
        items = items.len(),
        skipped = skipped.len(),
        "ingest round finished"
    );
    (items, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};

    struct Fixed(&'static str, Vec<RawItem>);
    struct Broken;

    #[async_trait::async_trait]
    impl SourceProvider for Fixed {
        async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
            Ok(self.1.clone())
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    #[async_trait::async_trait]
    impl SourceProvider for Broken {
        async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
            Err(anyhow!("connection reset"))
        }
        fn name(&self) -> &str {
            "Broken"
        }
    }

    #[test]
    fn normalize_text_keeps_punctuation() {
        let s = "  <b>¡¡ÚLTIMA&nbsp;HORA!!</b>   &ldquo;ok&rdquo;?? ";
        assert_eq!(normalize_text(s), r#"¡¡ÚLTIMA HORA!! "ok"??"#);
    }

    #[tokio::test]
    async fn failing_source_is_skipped_not_fatal() {
        let providers: Vec<Box<dyn SourceProvider>> = vec![
            Box::new(Fixed("A", vec![RawItem::new("A", "uno", "https://a.test/1")])),
            Box::new(Broken),
            Box::new(Fixed("C", vec![RawItem::new("C", "dos", "https://c.test/2")])),
        ];
        let reports = fetch_all(&providers).await;
        assert_eq!(reports.len(), 3);
        assert!(reports[1].outcome.is_skipped());

        let (items, skipped) = merge(reports);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["uno", "dos"]);
        assert_eq!(skipped, vec!["Broken".to_string()]);
    }
}
