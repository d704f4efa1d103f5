// src/embed/openai.rs
//! OpenAI-compatible embeddings backend (`POST {base_url}/embeddings`). Requires `OPENAI_API_KEY`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbedError, Embedder, EmbedderConfig};

pub struct OpenAiEmbedder {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    dim: usize,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct Resp {
    data: Vec<Datum>,
}

#[derive(Deserialize)]
struct Datum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(cfg: &EmbedderConfig, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("buloradar/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: cfg.model.clone(),
            endpoint: format!("{}/embeddings", cfg.base_url.trim_end_matches('/')),
            dim: cfg.dim,
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.api_key.is_empty() {
            return Err(EmbedError::Unavailable("OPENAI_API_KEY not set".into()));
        }
        let req = Req {
            model: &self.model,
            input,
            dimensions: self.dim,
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| EmbedError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EmbedError::Unavailable(format!("http status {}", resp.status())));
        }
        let mut body: Resp = resp
            .json()
            .await
            .map_err(|e| EmbedError::Unavailable(format!("decode: {e}")))?;

        if body.data.len() != input.len() {
            return Err(EmbedError::Malformed(format!(
                "expected {} embeddings, got {}",
                input.len(),
                body.data.len()
            )));
        }
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    fn check_dim(&self, v: Vec<f32>) -> Result<Vec<f32>, EmbedError> {
        if v.len() == self.dim {
            Ok(v)
        } else {
            Err(EmbedError::Malformed(format!(
                "dimension {} (expected {})",
                v.len(),
                self.dim
            )))
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn fingerprint(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::Malformed("empty text".into()));
        }
        let mut out = self.request(&[text.to_string()]).await?;
        match out.pop() {
            Some(v) => self.check_dim(v),
            None => Err(EmbedError::Malformed("empty response".into())),
        }
    }

    async fn encode_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbedError>> {
        if texts.is_empty() {
            return Vec::new();
        }
        // Empty strings are rejected locally so one bad title cannot fail the whole request.
        let sendable: Vec<String> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        let fetched = if sendable.is_empty() {
            Vec::new()
        } else {
            match self.request(&sendable).await {
                Ok(vs) => vs.into_iter().map(|v| self.check_dim(v)).collect(),
                Err(e) => vec![Err(e); sendable.len()],
            }
        };
        let mut fetched = fetched.into_iter();

        texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    Err(EmbedError::Malformed("empty text".into()))
                } else {
                    fetched
                        .next()
                        .unwrap_or_else(|| Err(EmbedError::Malformed("missing result".into())))
                }
            })
            .collect()
    }
}
