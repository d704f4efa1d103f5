// src/embed/hash.rs
use async_trait::async_trait;

use super::{EmbedError, Embedder};

/// Feature-hashing embedder: lowercased word tokens are hashed into signed buckets,
/// then the vector is L2-normalized. Headlines sharing their words land close together.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v = vec![0.0f32; self.dim];
        let mut tokens = 0usize;
        for token in tokenize(text) {
            let h = fnv1a_64(token.as_bytes());
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
            tokens += 1;
        }
        if tokens == 0 {
            return Err(EmbedError::Malformed("no word tokens".into()));
        }
        if !normalize_l2(&mut v) {
            // Every bucket cancelled out; nudge into a stable non-zero vector.
            v[0] = 1.0;
        }
        Ok(v)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &'static str {
        "hash"
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_sync(text)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

fn normalize_l2(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
        true
    } else {
        false
    }
}

fn fnv1a_64(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x00000100000001b3;
    let mut hash = OFFSET;
    for b in data {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
