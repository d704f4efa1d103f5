//! Fact-check cross-matching.
//!
//! Primary: embedding similarity against the debunked-claim corpus built from
//! fact-checker feeds. Secondary: an optional remote search service queried with the
//! headline text. A remote review only confirms a hoax when its rating reads as a
//! debunk and the reviewed claim embeds close to the headline. The remote side is
//! best-effort; every failure reads as "no match".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::analyze::signals::SignalHit;
use crate::embed::{cosine_similarity, EmbeddingCache};
use crate::model::{Category, DebunkedClaim};

/// A match against a published fact-check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckMatch {
    /// Debunked claim title or the reviewer's rating text.
    pub verdict: String,
    pub publisher: String,
    /// Embedding similarity to the headline; `None` until a remote review is verified.
    pub similarity: Option<f32>,
    /// Claim text the remote reviewer rated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,
}

impl FactCheckMatch {
    /// The single reason a confirmed hoax carries.
    pub fn to_hit(&self) -> SignalHit {
        let label = match (&self.claim, self.similarity) {
            (Some(claim), Some(sim)) => format!(
                "Confirmed hoax: rated \"{}\" by {} (\"{}\", similarity {:.2})",
                self.verdict, self.publisher, claim, sim
            ),
            (None, Some(sim)) => format!(
                "Confirmed hoax: matches a debunk by {} (\"{}\", similarity {:.2})",
                self.publisher, self.verdict, sim
            ),
            (_, None) => format!(
                "Confirmed hoax: rated \"{}\" by {}",
                self.verdict, self.publisher
            ),
        };
        SignalHit::new(Category::FactCheck, 100, label)
    }
}

/// Lowercase alphanumeric words joined by single spaces, padded for whole-word `contains`.
fn padded_words(s: &str) -> String {
    let words: Vec<String> = s
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

/// True when the rating contains one of the debunk terms as whole words
/// ("Mayormente falso" matches "falso"; "Verdadero" matches nothing).
pub fn is_debunk_rating(rating: &str, debunk_terms: &[String]) -> bool {
    let rating = padded_words(rating);
    debunk_terms.iter().any(|t| {
        let term = padded_words(t);
        !term.trim().is_empty() && rating.contains(&term)
    })
}

/// Corpus matcher; also verifies remote reviews against the headline.
#[derive(Debug, Clone)]
pub struct FactCheckMatcher {
    threshold: f32,
    debunk_ratings: Vec<String>,
}

impl FactCheckMatcher {
    /// No debunk ratings: remote reviews never confirm until `with_debunk_ratings`.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            debunk_ratings: Vec::new(),
        }
    }

    pub fn with_debunk_ratings(mut self, ratings: Vec<String>) -> Self {
        self.debunk_ratings = ratings;
        self
    }

    /// Best claim strictly above the threshold. An empty corpus never matches.
    pub fn find(&self, embedding: &[f32], claims: &[DebunkedClaim]) -> Option<FactCheckMatch> {
        let (best, sim) = claims
            .iter()
            .map(|c| (c, cosine_similarity(embedding, &c.embedding)))
            .fold(None, |acc: Option<(&DebunkedClaim, f32)>, (c, s)| match acc {
                Some((_, best)) if best >= s => acc,
                _ => Some((c, s)),
            })?;
        (sim > self.threshold).then(|| FactCheckMatch {
            verdict: best.title.clone(),
            publisher: best.source.clone(),
            similarity: Some(sim),
            claim: None,
        })
    }

    /// Best remote review that confirms the headline: a debunk rating, and a claim text
    /// whose embedding (through `cache`) is strictly above the threshold.
    pub async fn confirm_remote(
        &self,
        headline: &[f32],
        reviews: Vec<FactCheckMatch>,
        cache: &EmbeddingCache,
    ) -> Option<FactCheckMatch> {
        let debunks: Vec<(FactCheckMatch, String)> = reviews
            .into_iter()
            .filter(|r| is_debunk_rating(&r.verdict, &self.debunk_ratings))
            .filter_map(|r| {
                let text = r.claim.clone().filter(|t| !t.trim().is_empty())?;
                Some((r, text))
            })
            .collect();
        if debunks.is_empty() {
            return None;
        }

        let texts: Vec<String> = debunks.iter().map(|(_, t)| t.clone()).collect();
        let vectors = cache.get_or_compute_batch(&texts).await;
        debunks
            .into_iter()
            .zip(vectors)
            .filter_map(|((review, _), v)| {
                let sim = cosine_similarity(headline, &v.ok()?);
                (sim > self.threshold).then(|| FactCheckMatch {
                    similarity: Some(sim),
                    ..review
                })
            })
            .max_by(|a, b| a.similarity.partial_cmp(&b.similarity).unwrap_or(Ordering::Equal))
    }
}

/// Remote corroboration by text search.
#[async_trait]
pub trait FactCheckService: Send + Sync {
    /// Reviews found for `text`, unverified. Empty on no result or any failure.
    async fn query(&self, text: &str) -> Vec<FactCheckMatch>;
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }
}

pub type DynFactCheck = Arc<dyn FactCheckService>;

/// Used when no API key is configured.
pub struct DisabledFactCheck;

#[async_trait]
impl FactCheckService for DisabledFactCheck {
    async fn query(&self, _text: &str) -> Vec<FactCheckMatch> {
        Vec::new()
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
    fn is_enabled(&self) -> bool {
        false
    }
}

/// Google Fact Check Tools `claims:search`. Requires an API key.
pub struct GoogleFactCheckClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    language: String,
}

#[derive(Deserialize)]
struct SearchResp {
    #[serde(default)]
    claims: Vec<Claim>,
}

#[derive(Deserialize)]
struct Claim {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "claimReview")]
    claim_review: Vec<ClaimReview>,
}

#[derive(Deserialize)]
struct ClaimReview {
    publisher: Option<Publisher>,
    #[serde(rename = "textualRating")]
    textual_rating: Option<String>,
}

#[derive(Deserialize)]
struct Publisher {
    name: Option<String>,
    site: Option<String>,
}

impl GoogleFactCheckClient {
    pub const ENDPOINT: &'static str = "https://factchecktools.googleapis.com/v1alpha1/claims:search";
    const PAGE_SIZE: &'static str = "5";

    pub fn new(api_key: String, language: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("buloradar/0.1")
            .connect_timeout(Duration::from_secs(3))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            endpoint: Self::ENDPOINT.to_string(),
            language: language.to_string(),
        })
    }

    /// Point at a different host (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn search(&self, text: &str) -> anyhow::Result<Vec<FactCheckMatch>> {
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("query", text),
                ("languageCode", self.language.as_str()),
                ("pageSize", Self::PAGE_SIZE),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: SearchResp = resp.json().await?;
        Ok(reviews(body))
    }
}

/// Every rated review, paired with the text of the claim it rates.
fn reviews(body: SearchResp) -> Vec<FactCheckMatch> {
    body.claims
        .into_iter()
        .flat_map(|c| {
            let claim = c
                .text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            c.claim_review.into_iter().filter_map(move |r| {
                let verdict = r
                    .textual_rating
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())?;
                let publisher = r
                    .publisher
                    .and_then(|p| p.name.or(p.site))
                    .unwrap_or_else(|| "unknown fact-checker".to_string());
                Some(FactCheckMatch {
                    verdict,
                    publisher,
                    similarity: None,
                    claim: claim.clone(),
                })
            })
        })
        .collect()
}

#[async_trait]
impl FactCheckService for GoogleFactCheckClient {
    async fn query(&self, text: &str) -> Vec<FactCheckMatch> {
        if self.api_key.is_empty() || text.trim().is_empty() {
            return Vec::new();
        }
        match self.search(text).await {
            Ok(found) => {
                debug!(target: "factcheck", id = %crate::anon_hash(text), reviews = found.len(), "fact-check query");
                found
            }
            Err(e) => {
                warn!(target: "factcheck", error = %e, "fact-check query failed; treating as no match");
                metrics::counter!("factcheck_errors_total").increment(1);
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "google-factcheck"
    }
}

/// Factory: Google client when `FACTCHECK_API_KEY` is set, otherwise disabled.
pub fn build_factcheck_service(timeout: Duration) -> DynFactCheck {
    let key = std::env::var("FACTCHECK_API_KEY").unwrap_or_default();
    if key.trim().is_empty() {
        return Arc::new(DisabledFactCheck);
    }
    match GoogleFactCheckClient::new(key, "es", timeout) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            warn!(target: "factcheck", error = %e, "fact-check client init failed; disabled");
            Arc::new(DisabledFactCheck)
        }
    }
}
