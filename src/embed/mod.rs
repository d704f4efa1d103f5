// src/embed/mod.rs
//! Embedding backends (text → fixed-length vector) and the persistent embedding cache.

pub mod cache;
pub mod hash;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use cache::EmbeddingCache;
pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbedError {
    /// Backend could not be reached or refused the request (timeout, HTTP error, no credentials).
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
    /// Input (or backend output) does not yield a usable vector.
    #[error("malformed embedding input: {0}")]
    Malformed(String),
}

/// Maps text to a vector of `dim()` floats. Identical input yields identical output.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    fn name(&self) -> &'static str;

    /// Identifies the vector space (backend plus model). Cached vectors are only
    /// reused under the same fingerprint.
    fn fingerprint(&self) -> String {
        self.name().to_string()
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Encode several texts; output order matches input order.
    async fn encode_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbedError>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.encode(t).await);
        }
        out
    }
}

pub type DynEmbedder = Arc<dyn Embedder>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    /// Offline feature hashing; deterministic, no model download.
    #[default]
    Hash,
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    OpenAi,
}

impl std::str::FromStr for EmbedderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" => Ok(EmbedderBackend::Hash),
            "openai" => Ok(EmbedderBackend::OpenAi),
            other => anyhow::bail!("unsupported embedder backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub backend: EmbedderBackend,
    pub dim: usize,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: EmbedderBackend::Hash,
            dim: 384,
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Factory: build the configured backend.
///
/// * `hash` never fails.
/// * `openai` reads `OPENAI_API_KEY`; without it the backend reports `Unavailable`
///   for every call, so items are skipped rather than the run aborting.
pub fn build_embedder(cfg: &EmbedderConfig) -> anyhow::Result<DynEmbedder> {
    match cfg.backend {
        EmbedderBackend::Hash => Ok(Arc::new(HashEmbedder::new(cfg.dim))),
        EmbedderBackend::OpenAi => {
            let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
            Ok(Arc::new(OpenAiEmbedder::new(cfg, api_key)?))
        }
    }
}

/// Raw cosine similarity in [-1, 1].
///
/// Returns 0.0 if vectors have different lengths or either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn backend_from_str() {
        assert_eq!("HASH".parse::<EmbedderBackend>().unwrap(), EmbedderBackend::Hash);
        assert_eq!(" openai ".parse::<EmbedderBackend>().unwrap(), EmbedderBackend::OpenAi);
        assert!("bert".parse::<EmbedderBackend>().is_err());
    }
}
