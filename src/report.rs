// src/report.rs
//! JSON report handed to the rendering side: top-N items plus run counters.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::model::{NewsItem, Reason, RiskLevel};
use crate::pipeline::{PipelineOutput, RunStats};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportItem {
    pub title: String,
    pub link: String,
    pub source: String,
    pub score: u8,
    pub risk: RiskLevel,
    pub reasons: Vec<Reason>,
    pub confirmed: bool,
}

impl From<&NewsItem> for ReportItem {
    fn from(it: &NewsItem) -> Self {
        Self {
            title: it.title.clone(),
            link: it.link.clone(),
            source: it.source.clone(),
            score: it.score,
            risk: it.risk(),
            reasons: it.reasons.clone(),
            confirmed: it.confirmed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ReportItem>,
    pub stats: RunStats,
}

impl Report {
    /// Keep the first `top_n` ranked items.
    pub fn from_output(output: &PipelineOutput, top_n: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            items: output.top(top_n).iter().map(ReportItem::from).collect(),
            stats: output.stats.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing report")
    }

    /// Atomic write (temp file + rename); creates the parent directory.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
        }
        let json = self.to_json_pretty()?;
        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, path)
            .with_context(|| format!("renaming report into {}", path.display()))?;
        Ok(())
    }
}
