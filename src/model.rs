// src/model.rs
//! Core records flowing through the scoring pipeline.

use serde::{Deserialize, Serialize};

/// Input record handed over by a feed provider (already unescaped and tag-stripped).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawItem {
    pub source: String, // e.g., "El País", "Maldita"
    pub title: String,
    pub link: String,
}

impl RawItem {
    pub fn new(source: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            link: link.into(),
        }
    }

    /// Title and link must both carry text.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.link.trim().is_empty()
    }
}

/// Signal categories. Declaration order is the order reasons are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FactCheck,
    Sensationalism,
    Ambiguity,
    Urgency,
    Conspiracy,
    AllCaps,
    Punctuation,
    Isolation,
    SuspiciousLink,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::FactCheck,
        Category::Sensationalism,
        Category::Ambiguity,
        Category::Urgency,
        Category::Conspiracy,
        Category::AllCaps,
        Category::Punctuation,
        Category::Isolation,
        Category::SuspiciousLink,
    ];

    /// Categories driven by a configurable word/phrase lexicon.
    pub const LEXICAL: [Category; 4] = [
        Category::Sensationalism,
        Category::Ambiguity,
        Category::Urgency,
        Category::Conspiracy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FactCheck => "fact_check",
            Category::Sensationalism => "sensationalism",
            Category::Ambiguity => "ambiguity",
            Category::Urgency => "urgency",
            Category::Conspiracy => "conspiracy",
            Category::AllCaps => "all_caps",
            Category::Punctuation => "punctuation",
            Category::Isolation => "isolation",
            Category::SuspiciousLink => "suspicious_link",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One explanation attached to a scored item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reason {
    pub category: Category,
    pub label: String,
}

impl Reason {
    pub fn new(category: Category, label: impl Into<String>) -> Self {
        Self {
            category,
            label: label.into(),
        }
    }
}

/// Review priority derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => RiskLevel::High,
            70..=89 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

/// A headline that survived embedding; scored in place by the pipeline stages.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub link: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    pub score: u8,
    pub reasons: Vec<Reason>,
    pub confirmed: bool,
}

impl NewsItem {
    pub fn from_raw(raw: RawItem, embedding: Vec<f32>) -> Self {
        Self {
            source: raw.source,
            title: raw.title,
            link: raw.link,
            embedding,
            score: 0,
            reasons: Vec::new(),
            confirmed: false,
        }
    }

    pub fn risk(&self) -> RiskLevel {
        RiskLevel::from_score(self.score)
    }

    pub fn has_reason(&self, category: Category) -> bool {
        self.reasons.iter().any(|r| r.category == category)
    }
}

/// A headline published by a fact-checking organization as false or misleading.
#[derive(Debug, Clone, PartialEq)]
pub struct DebunkedClaim {
    pub title: String,
    pub embedding: Vec<f32>,
    pub source: String, // publisher, e.g. "Maldita"
}
