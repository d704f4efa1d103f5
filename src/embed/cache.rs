// src/embed/cache.rs
//! Persistent embedding cache keyed by SHA-256 of the normalized title.
//!
//! On-disk shape (`cache/embeddings.json`):
//! ```json
//! { "embedder": "openai:text-embedding-3-small", "dim": 384,
//!   "entries": { "<sha256 hex>": [0.01, -0.2, ...] } }
//! ```
//! A missing, unreadable or corrupt file is an empty cache, and so is a file written
//! under another embedder fingerprint (or without one). Entries that are not numeric
//! arrays of the embedder's dimension are dropped and recomputed on demand.

use metrics::counter;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{DynEmbedder, EmbedError};

pub struct EmbeddingCache {
    embedder: DynEmbedder,
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Serialize)]
struct CacheFileOut<'a> {
    embedder: &'a str,
    dim: usize,
    entries: &'a HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    /// In-memory only; `persist` is a no-op.
    pub fn in_memory(embedder: DynEmbedder) -> Self {
        Self {
            embedder,
            path: None,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Load from `path`; any failure degrades to an empty cache.
    pub fn load(path: impl Into<PathBuf>, embedder: DynEmbedder) -> Self {
        let path = path.into();
        let entries = match read_entries(&path, &embedder.fingerprint(), embedder.dim()) {
            Ok((entries, dropped)) => {
                if dropped > 0 {
                    warn!(target: "cache", dropped, "dropped corrupt embedding cache entries");
                }
                debug!(target: "cache", entries = entries.len(), path = %path.display(), "embedding cache loaded");
                entries
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(target: "cache", error = %e, path = %path.display(), "embedding cache unusable; starting empty");
                }
                HashMap::new()
            }
        };
        Self {
            embedder,
            path: Some(path),
            entries: Mutex::new(entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn embedder(&self) -> &DynEmbedder {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Cached embedding for `text`, computing (and remembering) it on a miss.
    pub async fn get_or_compute(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut out = self.get_or_compute_batch(&[text.to_string()]).await;
        out.pop()
            .unwrap_or_else(|| Err(EmbedError::Malformed("empty batch result".into())))
    }

    /// Batch lookup. Misses go to the embedder in one `encode_batch` call;
    /// results are returned in input order.
    pub async fn get_or_compute_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbedError>> {
        let keys: Vec<(String, String)> = texts
            .iter()
            .map(|t| {
                let norm = normalize_for_key(t);
                (cache_key(&norm), norm)
            })
            .collect();

        let mut out: Vec<Option<Result<Vec<f32>, EmbedError>>> = vec![None; texts.len()];
        // Normalized text → positions still waiting for a vector (duplicates share one call).
        let mut pending: Vec<(String, String, Vec<usize>)> = Vec::new();
        {
            let guard = self.lock();
            for (i, (key, norm)) in keys.iter().enumerate() {
                if let Some(v) = guard.get(key) {
                    out[i] = Some(Ok(v.clone()));
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    counter!("embedding_cache_hits_total").increment(1);
                } else if let Some(p) = pending.iter_mut().find(|p| &p.0 == key) {
                    p.2.push(i);
                } else {
                    pending.push((key.clone(), norm.clone(), vec![i]));
                }
            }
        }

        if !pending.is_empty() {
            self.misses.fetch_add(pending.len() as u64, Ordering::Relaxed);
            counter!("embedding_cache_misses_total").increment(pending.len() as u64);

            let miss_texts: Vec<String> = pending.iter().map(|p| p.1.clone()).collect();
            let computed = self.embedder.encode_batch(&miss_texts).await;

            let mut guard = self.lock();
            for ((key, _, positions), res) in pending.into_iter().zip(computed) {
                let res = res.and_then(|v| {
                    if v.len() == self.embedder.dim() {
                        Ok(v)
                    } else {
                        Err(EmbedError::Malformed(format!("dimension {}", v.len())))
                    }
                });
                if let Ok(v) = &res {
                    guard.insert(key, v.clone());
                }
                for i in positions {
                    out[i] = Some(res.clone());
                }
            }
        }

        out.into_iter()
            .map(|r| r.unwrap_or_else(|| Err(EmbedError::Malformed("embedder returned too few results".into()))))
            .collect()
    }

    /// Best-effort atomic write (temp file + rename). Never fatal for callers.
    pub fn persist(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let fingerprint = self.embedder.fingerprint();
        let json = {
            let guard = self.lock();
            serde_json::to_string(&CacheFileOut {
                embedder: &fingerprint,
                dim: self.embedder.dim(),
                entries: &guard,
            })
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        };
        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<f32>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Trim and collapse whitespace; the embedder sees exactly this text.
pub fn normalize_for_key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 of already-normalized text.
pub fn cache_key(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Parse the cache file entry by entry. Returns (valid entries, dropped count).
/// A file written under a different embedder fingerprint is rejected whole.
fn read_entries(
    path: &Path,
    fingerprint: &str,
    dim: usize,
) -> io::Result<(HashMap<String, Vec<f32>>, usize)> {
    let bytes = fs::read(path)?;
    let root: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let stored = root.get("embedder").and_then(|e| e.as_str()).unwrap_or("<none>");
    if stored != fingerprint {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("written by embedder `{stored}`, current is `{fingerprint}`"),
        ));
    }
    let entries = root
        .get("entries")
        .and_then(|e| e.as_object())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing `entries` object"))?;

    let mut out = HashMap::with_capacity(entries.len());
    let mut dropped = 0usize;
    for (key, value) in entries {
        match parse_vector(value, dim) {
            Some(v) if is_hex_key(key) => {
                out.insert(key.clone(), v);
            }
            _ => dropped += 1,
        }
    }
    Ok((out, dropped))
}

fn parse_vector(value: &serde_json::Value, dim: usize) -> Option<Vec<f32>> {
    let arr = value.as_array()?;
    if arr.len() != dim {
        return None;
    }
    arr.iter()
        .map(|x| x.as_f64().map(|f| f as f32).filter(|f| f.is_finite()))
        .collect()
}

fn is_hex_key(key: &str) -> bool {
    key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit())
}
