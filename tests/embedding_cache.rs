use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use buloradar::embed::{EmbedError, Embedder, EmbeddingCache};

/// Deterministic embedder that counts how often it is asked for a vector.
struct Counting {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for Counting {
    fn dim(&self) -> usize {
        3
    }
    fn name(&self) -> &'static str {
        "counting"
    }
    async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.is_empty() {
            return Err(EmbedError::Malformed("empty".into()));
        }
        Ok(vec![text.len() as f32, 1.0, 0.0])
    }
}

/// Always returns `vector`, under the given backend name.
struct Fixed {
    name: &'static str,
    vector: [f32; 3],
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for Fixed {
    fn dim(&self) -> usize {
        3
    }
    fn name(&self) -> &'static str {
        self.name
    }
    async fn encode(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.to_vec())
    }
}

fn counting() -> Arc<Counting> {
    Arc::new(Counting {
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn second_lookup_is_served_from_cache() {
    let emb = counting();
    let cache = EmbeddingCache::in_memory(emb.clone());

    let a = cache.get_or_compute("Hola mundo").await.unwrap();
    let b = cache.get_or_compute("  Hola   mundo ").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(emb.calls.load(Ordering::SeqCst), 1);
    assert_eq!((cache.hits(), cache.misses()), (1, 1));
}

#[tokio::test]
async fn persisted_cache_survives_reload() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("cache").join("embeddings.json");

    let first = counting();
    let cache = EmbeddingCache::load(&path, first.clone());
    let titles = vec!["uno".to_string(), "dos".to_string(), "uno".to_string()];
    let v1 = cache.get_or_compute_batch(&titles).await;
    assert_eq!(first.calls.load(Ordering::SeqCst), 2);
    cache.persist().unwrap();

    let second = counting();
    let reloaded = EmbeddingCache::load(&path, second.clone());
    assert_eq!(reloaded.len(), 2);
    let v2 = reloaded.get_or_compute_batch(&titles).await;
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    assert_eq!(v1, v2);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let emb = counting();
    let cache = EmbeddingCache::in_memory(emb.clone());
    assert!(cache.get_or_compute("").await.is_err());
    assert!(cache.get_or_compute("").await.is_err());
    assert_eq!(emb.calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn corrupt_file_means_empty_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("embeddings.json");
    std::fs::write(&path, "{not json").unwrap();

    let emb = counting();
    let cache = EmbeddingCache::load(&path, emb.clone());
    assert!(cache.is_empty());
    cache.get_or_compute("tres").await.unwrap();
    assert_eq!(emb.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn switching_backend_at_same_dim_recomputes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("embeddings.json");

    let hash = Arc::new(Fixed {
        name: "hash",
        vector: [1.0, 0.0, 1.0],
        calls: AtomicUsize::new(0),
    });
    let cache = EmbeddingCache::load(&path, hash);
    assert_eq!(cache.get_or_compute("Hola mundo").await.unwrap(), vec![1.0, 0.0, 1.0]);
    cache.persist().unwrap();

    let openai = Arc::new(Fixed {
        name: "openai",
        vector: [-5.0, 0.0, 1.0],
        calls: AtomicUsize::new(0),
    });
    let reloaded = EmbeddingCache::load(&path, openai.clone());
    assert!(reloaded.is_empty());
    assert_eq!(
        reloaded.get_or_compute("Hola mundo").await.unwrap(),
        vec![-5.0, 0.0, 1.0]
    );
    assert_eq!(openai.calls.load(Ordering::SeqCst), 1);
    assert_eq!((reloaded.hits(), reloaded.misses()), (0, 1));

    // the rewritten file now belongs to the new backend
    reloaded.persist().unwrap();
    let again = EmbeddingCache::load(&path, openai);
    assert_eq!(again.len(), 1);
}
