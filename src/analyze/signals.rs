//! Heuristic signal extractors.
//!
//! Every extractor is a pure function of the headline (or its link) returning at most
//! one hit per category. Lexicon terms match case-insensitively on whole words only:
//! "bomba" fires on "ES UNA BOMBA!!" but not on "bombardeo".

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::ScoringConfig;
use crate::model::{Category, Reason};

/// One triggered signal: its score contribution and explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalHit {
    pub category: Category,
    pub delta: i32,
    pub label: String,
}

impl SignalHit {
    pub fn new(category: Category, delta: i32, label: impl Into<String>) -> Self {
        Self {
            category,
            delta,
            label: label.into(),
        }
    }

    pub fn reason(&self) -> Reason {
        Reason::new(self.category, self.label.clone())
    }
}

/// Compiled whole-word matcher for one lexicon category.
#[derive(Debug, Clone)]
struct LexiconMatcher {
    category: Category,
    weight: i32,
    re: Regex,
}

impl LexiconMatcher {
    fn compile(category: Category, weight: i32, terms: &[String]) -> Result<Option<Self>> {
        let alts: Vec<String> = terms
            .iter()
            .map(|t| {
                t.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .filter(|t| !t.is_empty())
            .collect();
        if alts.is_empty() {
            return Ok(None);
        }
        // Explicit boundaries instead of `\b` so terms may start/end with symbols ("100%").
        let pattern = format!(r"(?iu)(?:^|[^\w])({})(?:[^\w]|$)", alts.join("|"));
        let re = Regex::new(&pattern)
            .with_context(|| format!("compiling {category} lexicon"))?;
        Ok(Some(Self {
            category,
            weight,
            re,
        }))
    }

    /// First matched term, as written in the title.
    fn find<'t>(&self, title: &'t str) -> Option<&'t str> {
        self.re
            .captures(title)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// All title/link extractors, compiled once from a `ScoringConfig`.
#[derive(Debug, Clone)]
pub struct SignalExtractor {
    lexicons: Vec<LexiconMatcher>,
    all_caps_weight: i32,
    punctuation_weight: i32,
    punctuation_re: Regex,
    link_weight: i32,
    link_patterns: Vec<Regex>,
    trusted_domains: Vec<String>,
}

impl SignalExtractor {
    pub fn new(cfg: &ScoringConfig) -> Result<Self> {
        let mut lexicons = Vec::new();
        for cat in Category::LEXICAL {
            if let Some(m) = LexiconMatcher::compile(cat, cfg.weight(cat), cfg.lexicon(cat))? {
                lexicons.push(m);
            }
        }

        let link_patterns = cfg
            .suspicious_link_patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).with_context(|| format!("link pattern `{p}`")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            lexicons,
            all_caps_weight: cfg.weight(Category::AllCaps),
            punctuation_weight: cfg.weight(Category::Punctuation),
            punctuation_re: Regex::new(r"[!?¡¿]{2,}").context("punctuation regex")?,
            link_weight: cfg.weight(Category::SuspiciousLink),
            link_patterns,
            trusted_domains: cfg
                .trusted_domains
                .iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        })
    }

    /// Lexicon hit for one category, if configured and matched.
    pub fn lexical(&self, category: Category, title: &str) -> Option<SignalHit> {
        let m = self.lexicons.iter().find(|m| m.category == category)?;
        let term = m.find(title)?;
        Some(SignalHit::new(category, m.weight, lexical_label(category, term)))
    }

    pub fn all_caps(&self, title: &str) -> Option<SignalHit> {
        is_all_caps(title).then(|| {
            SignalHit::new(Category::AllCaps, self.all_caps_weight, "Headline written in all caps")
        })
    }

    pub fn punctuation(&self, title: &str) -> Option<SignalHit> {
        let run = self.punctuation_re.find(title)?;
        Some(SignalHit::new(
            Category::Punctuation,
            self.punctuation_weight,
            format!("Excessive punctuation (\"{}\")", run.as_str()),
        ))
    }

    pub fn suspicious_link(&self, link: &str) -> Option<SignalHit> {
        let parsed = url::Url::parse(link.trim()).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let trusted = self
            .trusted_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")));
        if trusted {
            return None;
        }
        self.link_patterns.iter().any(|re| re.is_match(&host)).then(|| {
            SignalHit::new(
                Category::SuspiciousLink,
                self.link_weight,
                format!("Link on a look-alike news domain ({host})"),
            )
        })
    }

    /// Every title/link signal, in category order, at most one per category.
    pub fn extract(&self, title: &str, link: &str) -> Vec<SignalHit> {
        let mut hits: Vec<SignalHit> = Category::LEXICAL
            .into_iter()
            .filter_map(|cat| self.lexical(cat, title))
            .collect();
        hits.extend(self.all_caps(title));
        hits.extend(self.punctuation(title));
        hits.extend(self.suspicious_link(link));
        hits
    }
}

fn lexical_label(category: Category, term: &str) -> String {
    let what = match category {
        Category::Sensationalism => "Sensationalist language",
        Category::Ambiguity => "Hedged or unsourced claim",
        Category::Urgency => "False urgency",
        Category::Conspiracy => "Hoax-style phrasing",
        _ => "Lexicon match",
    };
    format!("{what} (\"{}\")", term.to_lowercase())
}

/// Has at least one uppercase letter and no lowercase ones.
pub fn is_all_caps(title: &str) -> bool {
    title.chars().any(char::is_uppercase) && !title.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> SignalExtractor {
        SignalExtractor::new(&ScoringConfig::default()).unwrap()
    }

    fn cats(hits: &[SignalHit]) -> Vec<Category> {
        hits.iter().map(|h| h.category).collect()
    }

    #[test]
    fn whole_word_only() {
        let x = extractor();
        assert!(x.lexical(Category::Sensationalism, "Es una bomba").is_some());
        assert!(x.lexical(Category::Sensationalism, "Bombardeo en la frontera").is_none());
        assert!(x.lexical(Category::Sensationalism, "La bomba.").is_some());
        assert!(x.lexical(Category::Sensationalism, "bomba").is_some());
    }

    #[test]
    fn case_insensitive_with_accents_and_phrases() {
        let x = extractor();
        let hit = x.lexical(Category::Urgency, "ÚLTIMA   HORA: cierre de carreteras").unwrap();
        assert_eq!(hit.delta, 15);
        assert!(hit.label.contains("última   hora") || hit.label.contains("última hora"));
        assert!(x.lexical(Category::Ambiguity, "Se cree que el acuerdo caerá").is_some());
        assert!(x.lexical(Category::Conspiracy, "Un remedio 100% efectivo").is_some());
    }

    #[test]
    fn one_hit_per_category_even_with_many_terms() {
        let x = extractor();
        let hits = x.extract("Bomba impactante: escándalo brutal", "https://elpais.com/a");
        assert_eq!(cats(&hits), vec![Category::Sensationalism]);
    }

    #[test]
    fn all_caps_rules() {
        assert!(is_all_caps("ESTO ES UNA BOMBA!!"));
        assert!(is_all_caps("ÑANDÚ 2024"));
        assert!(!is_all_caps("Esto Es"));
        assert!(!is_all_caps("2024 !!"));
    }

    #[test]
    fn all_caps_without_lexicon_scores_only_formatting() {
        let x = extractor();
        let hits = x.extract("INFORME TRIMESTRAL DEL BANCO CENTRAL", "https://elpais.com/a");
        assert_eq!(cats(&hits), vec![Category::AllCaps]);
        assert_eq!(hits[0].delta, 30);
    }

    #[test]
    fn punctuation_runs() {
        let x = extractor();
        assert!(x.punctuation("¿Qué pasó?").is_none());
        assert!(x.punctuation("Increíble!!").is_some());
        assert!(x.punctuation("¿¡En serio!?").is_some());
    }

    #[test]
    fn suspicious_links_respect_trusted_domains() {
        let x = extractor();
        assert!(x.suspicious_link("https://noticia-ab12cd34ef.com/x").is_some());
        assert!(x.suspicious_link("https://el-verdadero-diario.es/p").is_some());
        assert!(x.suspicious_link("https://ofertas.xyz/").is_some());
        assert!(x.suspicious_link("https://www.elpais.com/x").is_none());
        assert!(x.suspicious_link("https://verifica.rtve.es/x").is_none());
        assert!(x.suspicious_link("not a url").is_none());
    }

    #[test]
    fn extract_orders_by_category() {
        let x = extractor();
        let hits = x.extract("¡¡URGENTE!! ESTO ES UNA BOMBA", "https://ofertas.top/");
        assert_eq!(
            cats(&hits),
            vec![
                Category::Sensationalism,
                Category::Urgency,
                Category::AllCaps,
                Category::Punctuation,
                Category::SuspiciousLink,
            ]
        );
    }

    #[test]
    fn empty_lexicon_never_fires() {
        let mut cfg = ScoringConfig::default();
        cfg.lexicons.insert(Category::Sensationalism, Vec::new());
        let x = SignalExtractor::new(&cfg).unwrap();
        assert!(x.lexical(Category::Sensationalism, "bomba").is_none());
    }
}
