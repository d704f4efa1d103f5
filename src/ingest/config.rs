// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::providers::RssProvider;
use crate::ingest::types::SourceProvider;

pub const ENV_FEEDS_PATH: &str = "BULORADAR_FEEDS_PATH";
pub const DEFAULT_FEEDS_TOML: &str = "config/feeds.toml";
pub const DEFAULT_FEEDS_JSON: &str = "config/feeds.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
}

impl FeedSpec {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// News and fact-checker feed lists plus per-feed limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub news: Vec<FeedSpec>,
    pub fact_checkers: Vec<FeedSpec>,
    pub news_per_feed: usize,
    pub claims_per_feed: usize,
    pub timeout_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            news: vec![
                FeedSpec::new("El País", "https://feeds.elpais.com/mrss-s/pages/ep/site/elpais.com/portada"),
                FeedSpec::new("El Mundo", "https://e00-elmundo.uecdn.es/elmundo/rss/portada.xml"),
                FeedSpec::new("ABC", "https://www.abc.es/rss/feeds/abcPortada.xml"),
                FeedSpec::new("La Vanguardia", "https://www.lavanguardia.com/rss/home.xml"),
                FeedSpec::new("El Confidencial", "https://blogs.elconfidencial.com/rss/"),
                FeedSpec::new("Público", "https://www.publico.es/rss/"),
                FeedSpec::new("HuffPost", "https://www.huffingtonpost.es/feed/"),
                FeedSpec::new("El Español", "https://www.elespanol.com/rss/"),
                FeedSpec::new("Xataka", "http://feeds.weblogssl.com/xataka2"),
                FeedSpec::new(
                    "Scientific American",
                    "https://www.scientificamerican.com/section/news/rss/",
                ),
            ],
            fact_checkers: vec![
                FeedSpec::new("Maldita", "https://maldita.es/rss/fact-checking"),
                FeedSpec::new("Newtral", "https://www.newtral.es/feed/"),
                FeedSpec::new("EFE Verifica", "https://efeverifica.com/feed/"),
                FeedSpec::new("AFP", "https://factual.afp.com/feed/all"),
            ],
            news_per_feed: 10,
            claims_per_feed: 25,
            timeout_secs: 10,
        }
    }
}

impl FeedsConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feeds from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_feeds(&content, ext.as_str())
            .with_context(|| format!("parsing feeds config {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $BULORADAR_FEEDS_PATH
    /// 2) config/feeds.toml
    /// 3) config/feeds.json
    /// 4) built-in feed list
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_FEEDS_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_FEEDS_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from(DEFAULT_FEEDS_TOML);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from(DEFAULT_FEEDS_JSON);
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn news_providers(&self) -> Result<Vec<Box<dyn SourceProvider>>> {
        build_providers(&self.news, self.news_per_feed, self.timeout())
    }

    pub fn fact_checker_providers(&self) -> Result<Vec<Box<dyn SourceProvider>>> {
        build_providers(&self.fact_checkers, self.claims_per_feed, self.timeout())
    }
}

fn build_providers(
    feeds: &[FeedSpec],
    limit: usize,
    timeout: Duration,
) -> Result<Vec<Box<dyn SourceProvider>>> {
    feeds
        .iter()
        .map(|f| {
            RssProvider::from_url(f.name.as_str(), f.url.as_str(), limit, timeout)
                .map(|p| Box::new(p) as Box<dyn SourceProvider>)
        })
        .collect()
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<FeedsConfig> {
    let parsed = match hint_ext {
        "json" => serde_json::from_str::<FeedsConfig>(s)?,
        "toml" => toml::from_str::<FeedsConfig>(s)?,
        _ => match serde_json::from_str::<FeedsConfig>(s) {
            Ok(v) => v,
            Err(_) => toml::from_str::<FeedsConfig>(s)
                .map_err(|e| anyhow!("unsupported feeds format: {e}"))?,
        },
    };
    Ok(clean(parsed))
}

/// Trim names/urls, drop blanks and repeated urls (first wins).
fn clean(mut cfg: FeedsConfig) -> FeedsConfig {
    fn clean_list(items: Vec<FeedSpec>) -> Vec<FeedSpec> {
        let mut seen = std::collections::HashSet::new();
        items
            .into_iter()
            .map(|f| FeedSpec {
                name: f.name.trim().to_string(),
                url: f.url.trim().to_string(),
            })
            .filter(|f| !f.name.is_empty() && !f.url.is_empty())
            .filter(|f| seen.insert(f.url.clone()))
            .collect()
    }
    cfg.news = clean_list(cfg.news);
    cfg.fact_checkers = clean_list(cfg.fact_checkers);
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn trim_dedup_and_formats_work() {
        let toml = r#"
news_per_feed = 5
[[news]]
name = " Medio "
url = "https://medio.test/rss"
[[news]]
name = "Copia"
url = "https://medio.test/rss"
[[news]]
name = ""
url = "https://vacio.test/rss"
"#;
        let cfg = parse_feeds(toml, "toml").unwrap();
        assert_eq!(cfg.news, vec![FeedSpec::new("Medio", "https://medio.test/rss")]);
        assert_eq!(cfg.news_per_feed, 5);
        assert_eq!(cfg.claims_per_feed, 25);
        // fact_checkers omitted → defaults kept
        assert_eq!(cfg.fact_checkers.len(), 4);

        let json = r#"{"fact_checkers":[{"name":"Verif","url":"https://verif.test/feed"}],"timeout_secs":0}"#;
        let cfg = parse_feeds(json, "").unwrap();
        assert_eq!(cfg.fact_checkers.len(), 1);
        assert_eq!(cfg.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn providers_follow_feed_lists() {
        let cfg = FeedsConfig::default();
        let news = cfg.news_providers().unwrap();
        let names: Vec<_> = news.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "El País");
        assert_eq!(cfg.fact_checker_providers().unwrap().len(), 4);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_FEEDS_PATH);

        // No files in temp CWD → built-in list
        assert_eq!(FeedsConfig::load_default().unwrap(), FeedsConfig::default());

        // Env wins
        let p_json = tmp.path().join("feeds.json");
        fs::write(&p_json, r#"{"news":[{"name":"X","url":"https://x.test/rss"}]}"#).unwrap();
        env::set_var(ENV_FEEDS_PATH, p_json.display().to_string());
        let v = FeedsConfig::load_default().unwrap();
        assert_eq!(v.news, vec![FeedSpec::new("X", "https://x.test/rss")]);

        // Dangling env path is an error
        env::set_var(ENV_FEEDS_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(FeedsConfig::load_default().is_err());
        env::remove_var(ENV_FEEDS_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
