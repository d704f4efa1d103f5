// src/ingest/providers/rss.rs
//! RSS 2.0 / Atom feed provider, from a URL or an in-memory fixture.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;
use crate::model::RawItem;

// RSS 2.0
#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
}

// Atom
#[derive(Debug, Deserialize)]
struct Feed {
    // Required by RFC 4287; also keeps arbitrary documents from parsing as an empty feed.
    #[allow(dead_code)]
    id: String,
    #[serde(rename = "entry", default)]
    entry: Vec<Entry>,
}
#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<AtomText>,
    #[serde(default)]
    link: Vec<AtomLink>,
}
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}
#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl Entry {
    /// `rel="alternate"` (or no rel) is the article; `self`/`edit` point at the feed.
    fn article_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.link.first())
            .and_then(|l| l.href.as_deref())
    }
}

/// Generic RSS 2.0 / Atom headline provider.
pub struct RssProvider {
    name: String,
    limit: usize,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssProvider {
    /// Parse a fixed document instead of fetching (tests, offline runs).
    pub fn from_fixture(name: impl Into<String>, xml: &str, limit: usize) -> Self {
        Self {
            name: name.into(),
            limit,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(
        name: impl Into<String>,
        url: impl Into<String>,
        limit: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("buloradar/0.1")
            .connect_timeout(Duration::from_secs(3))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            name: name.into(),
            limit,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);

        let entries: Vec<(Option<String>, Option<String>)> = match from_str::<Rss>(&xml_clean) {
            Ok(rss) => rss
                .channel
                .item
                .into_iter()
                .map(|it| (it.title, it.link))
                .collect(),
            Err(rss_err) => {
                let feed: Feed = from_str(&xml_clean).map_err(|atom_err| {
                    anyhow!("not RSS ({rss_err}) nor Atom ({atom_err})")
                })?;
                feed.entry
                    .into_iter()
                    .map(|e| {
                        let link = e.article_link().map(str::to_string);
                        (e.title.map(|t| t.value), link)
                    })
                    .collect()
            }
        };

        let mut out = Vec::with_capacity(entries.len().min(self.limit));
        for (title, link) in entries {
            if out.len() >= self.limit {
                break;
            }
            let title = normalize_text(title.as_deref().unwrap_or_default());
            let link = link.as_deref().unwrap_or_default().trim().to_string();
            if title.is_empty() || link.is_empty() {
                continue;
            }
            out.push(RawItem::new(self.name.as_str(), title, link));
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("{} http get", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))?;
                self.parse_items_from_str(&body)
                    .with_context(|| format!("parsing {} feed", self.name))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// quick-xml only knows the five XML entities; feeds routinely ship HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&laquo;", "\"")
        .replace("&raquo;", "\"")
        .replace("&hellip;", "...")
}
