// src/config.rs
//! Scoring configuration: thresholds, signal weights and lexicons in one injectable struct.
//!
//! File shape (TOML; JSON with the same keys is accepted too):
//! ```toml
//! duplicate_threshold = 0.88
//! isolation_threshold = 0.20
//! factcheck_threshold = 0.78
//!
//! [signal_weights]
//! all_caps = 30
//!
//! [lexicons]
//! sensationalism = ["bomba", "impactante"]
//! ```
//!
//! Keys left out of the file fall back to the built-in defaults, per category.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};
use tracing::warn;

use crate::model::Category;

pub const ENV_CONFIG_PATH: &str = "BULORADAR_CONFIG_PATH";
pub const DEFAULT_CONFIG_TOML: &str = "config/scoring.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/scoring.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Candidates at or above this cosine similarity to a retained item are dropped.
    pub duplicate_threshold: f32,
    /// Items below this similarity to the batch centroid are flagged as isolated.
    pub isolation_threshold: f32,
    /// Smaller batches are too thin for a meaningful centroid; nothing is flagged.
    pub isolation_min_batch: usize,
    /// A debunked claim matches when similarity is strictly above this.
    pub factcheck_threshold: f32,
    /// Fact-check matching only runs for items whose heuristic score is >= gate.
    pub factcheck_gate: u8,
    /// Remote reviews confirm a hoax only when their rating contains one of these (whole words).
    pub debunk_ratings: Vec<String>,
    /// Ranked items kept in the report.
    pub top_n: usize,
    #[serde(deserialize_with = "de_category_map")]
    pub signal_weights: BTreeMap<Category, i32>,
    #[serde(deserialize_with = "de_category_map")]
    pub lexicons: BTreeMap<Category, Vec<String>>,
    /// Regexes matched against the link host (look-alike news domains).
    pub suspicious_link_patterns: Vec<String>,
    /// Hosts (or parent domains) that never trigger the link signal.
    pub trusted_domains: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.88,
            isolation_threshold: 0.20,
            isolation_min_batch: 3,
            factcheck_threshold: 0.78,
            factcheck_gate: 0,
            debunk_ratings: strings(&[
                "falso",
                "falsa",
                "bulo",
                "engañoso",
                "engañosa",
                "incorrecto",
                "sin evidencia",
                "false",
                "fake",
                "misleading",
                "incorrect",
                "pants on fire",
            ]),
            top_n: 40,
            signal_weights: default_weights(),
            lexicons: default_lexicons(),
            suspicious_link_patterns: strings(&[
                r"noticia-[a-z0-9]{10}\.com$",
                r"el-[a-z]+-diario\.es$",
                r"periodico-[a-z]+\.org$",
                r"\.xyz$",
                r"\.top$",
                r"\.club$",
            ]),
            trusted_domains: strings(&[
                "who.int",
                "sanidad.gob.es",
                "maldita.es",
                "newtral.es",
                "rtve.es",
                "efe.com",
                "reuters.com",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_weights() -> BTreeMap<Category, i32> {
    BTreeMap::from([
        (Category::FactCheck, 100),
        (Category::Sensationalism, 20),
        (Category::Ambiguity, 15),
        (Category::Urgency, 15),
        (Category::Conspiracy, 20),
        (Category::AllCaps, 30),
        (Category::Punctuation, 15),
        (Category::Isolation, 15),
        (Category::SuspiciousLink, 10),
    ])
}

fn default_lexicons() -> BTreeMap<Category, Vec<String>> {
    BTreeMap::from([
        (
            Category::Sensationalism,
            strings(&[
                "escándalo",
                "bomba",
                "impactante",
                "ocultan",
                "alarmante",
                "brutal",
                "pánico",
                "exclusiva",
                "no creerás",
                "histórico",
                "censura",
                "increíble",
            ]),
        ),
        (
            Category::Ambiguity,
            strings(&[
                "podría",
                "se cree que",
                "rumores",
                "se rumorea",
                "al parecer",
                "supuestamente",
                "fuentes anónimas",
            ]),
        ),
        (
            Category::Urgency,
            strings(&[
                "última hora",
                "urgente",
                "compartid",
                "difunde",
                "antes de que lo borren",
                "alerta",
            ]),
        ),
        (
            Category::Conspiracy,
            strings(&[
                "cura milagrosa",
                "remedio milagroso",
                "remedio secreto",
                "nos oculta",
                "nos esconde",
                "nos esconden",
                "verdad que no quieren que sepas",
                "100% efectivo",
                "100% seguro",
                "descubrimiento revolucionario",
            ]),
        ),
    ])
}

/// Accepts `{"all_caps": 30}` style maps keyed by category name.
fn de_category_map<'de, D, V>(deserializer: D) -> Result<BTreeMap<Category, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    let raw: BTreeMap<String, V> = BTreeMap::deserialize(deserializer)?;
    let mut out = BTreeMap::new();
    for (k, v) in raw {
        let cat = Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(k.trim()))
            .ok_or_else(|| serde::de::Error::custom(format!("unknown signal category `{k}`")))?;
        out.insert(cat, v);
    }
    Ok(out)
}

impl ScoringConfig {
    /// Weight for a category (0 when explicitly unset and absent from defaults).
    pub fn weight(&self, category: Category) -> i32 {
        self.signal_weights.get(&category).copied().unwrap_or(0)
    }

    pub fn lexicon(&self, category: Category) -> &[String] {
        self.lexicons
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fill missing categories from defaults and pull thresholds back into range.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        for (cat, w) in default_weights() {
            self.signal_weights.entry(cat).or_insert(w);
        }
        for (cat, words) in default_lexicons() {
            self.lexicons.entry(cat).or_insert(words);
        }
        for words in self.lexicons.values_mut() {
            words.retain(|w| !w.trim().is_empty());
        }
        self.debunk_ratings = self
            .debunk_ratings
            .iter()
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty())
            .collect();

        self.duplicate_threshold =
            unit_or(self.duplicate_threshold, defaults.duplicate_threshold);
        self.isolation_threshold =
            unit_or(self.isolation_threshold, defaults.isolation_threshold);
        self.factcheck_threshold =
            unit_or(self.factcheck_threshold, defaults.factcheck_threshold);
        self.factcheck_gate = self.factcheck_gate.min(100);
        if self.top_n == 0 {
            self.top_n = defaults.top_n;
        }
        self
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scoring config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing scoring config {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $BULORADAR_CONFIG_PATH
    /// 2) config/scoring.toml
    /// 3) config/scoring.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from(DEFAULT_CONFIG_TOML);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from(DEFAULT_CONFIG_JSON);
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }
}

fn unit_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<ScoringConfig> {
    if hint_ext == "json" {
        let cfg: ScoringConfig = serde_json::from_str(s)?;
        return Ok(cfg.sanitized());
    }
    if hint_ext == "toml" {
        let cfg: ScoringConfig = toml::from_str(s)?;
        return Ok(cfg.sanitized());
    }
    // Unknown extension: JSON first (cheap to reject), then TOML.
    if let Ok(cfg) = serde_json::from_str::<ScoringConfig>(s) {
        return Ok(cfg.sanitized());
    }
    let cfg: ScoringConfig =
        toml::from_str(s).map_err(|e| anyhow!("unsupported scoring config format: {e}"))?;
    Ok(cfg.sanitized())
}

/// Hot-reload wrapper: reloads when the config file mtime changes.
/// A file that disappears or stops parsing keeps the last good config.
#[derive(Debug)]
pub struct HotReloadConfig {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    config: ScoringConfig,
    last_modified: Option<SystemTime>,
}

impl HotReloadConfig {
    pub fn new(path: impl Into<PathBuf>, initial: ScoringConfig) -> Self {
        Self {
            path: path.into(),
            inner: RwLock::new(State {
                config: initial,
                last_modified: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the latest config, reloading if the file changed.
    pub fn current(&self) -> ScoringConfig {
        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return self.read_state().config.clone(),
        };

        {
            let guard = self.read_state();
            if guard.last_modified == Some(mtime) {
                return guard.config.clone();
            }
        }

        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Double-check in case another caller already reloaded.
        if guard.last_modified != Some(mtime) {
            match ScoringConfig::load_from(&self.path) {
                Ok(cfg) => {
                    guard.config = cfg;
                    guard.last_modified = Some(mtime);
                }
                Err(e) => {
                    warn!(target: "config", error = ?e, "scoring config reload failed; keeping previous");
                }
            }
        }
        guard.config.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
