//! LRU query cache for embedding results.
//!
//! Avoids re-computing embeddings for repeated questions.
//! Default: 1000 entries, 1-hour TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use docsage_core::Result;

use crate::embedder::Embedder;

/// Cached embedding entry with timestamp.
struct CacheEntry {
    embedding: Vec<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU query cache for embeddings.
pub struct QueryCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    order: Vec<String>,
    max_size: usize,
    ttl: Duration,
}

impl QueryCache {
    /// Create a new cache with the given capacity and TTL.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size),
                order: Vec::with_capacity(max_size),
                max_size,
                ttl,
            }),
        }
    }

    /// Create a cache with default settings (1000 entries, 1hr TTL).
    pub fn default_cache() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }

    /// Get a cached embedding. Returns None on miss or expired entry.
    pub fn get(&self, query: &str) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();

        let ttl = inner.ttl;
        let (embedding, expired) = match inner.entries.get(query) {
            Some(entry) => (entry.embedding.clone(), entry.inserted_at.elapsed() >= ttl),
            None => return None,
        };

        if expired {
            inner.entries.remove(query);
            inner.order.retain(|k| k != query);
            return None;
        }

        if let Some(pos) = inner.order.iter().position(|k| k == query) {
            let key = inner.order.remove(pos);
            inner.order.push(key);
        }
        Some(embedding)
    }

    /// Insert an embedding into the cache.
    pub fn put(&self, query: String, embedding: Vec<f32>) {
        let mut inner = self.inner.lock();
        if inner.max_size == 0 {
            return;
        }

        // If already present, update and move to end
        if inner.entries.contains_key(&query) {
            inner.entries.insert(
                query.clone(),
                CacheEntry {
                    embedding,
                    inserted_at: Instant::now(),
                },
            );
            inner.order.retain(|k| k != &query);
            inner.order.push(query);
            return;
        }

        // Evict oldest if at capacity
        while inner.entries.len() >= inner.max_size && !inner.order.is_empty() {
            let oldest = inner.order.remove(0);
            inner.entries.remove(&oldest);
        }

        inner.order.push(query.clone());
        inner.entries.insert(
            query,
            CacheEntry {
                embedding,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

/// Wraps an embedder with a [`QueryCache`] on the single-text path.
///
/// Batches (ingestion) bypass the cache; they are embedded once per build.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: QueryCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, cache: QueryCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.get(text) {
            debug!("query embedding cache hit");
            return Ok(cached);
        }
        let embedding = self.inner.embed(text).await?;
        self.cache.put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn id(&self) -> String {
        self.inner.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = QueryCache::new(10, Duration::from_secs(3600));
        assert!(cache.get("hello").is_none());

        cache.put("hello".into(), vec![1.0, 2.0, 3.0]);
        assert_eq!(cache.get("hello"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_eviction() {
        let cache = QueryCache::new(2, Duration::from_secs(3600));
        cache.put("a".into(), vec![1.0]);
        cache.put("b".into(), vec![2.0]);
        assert_eq!(cache.len(), 2);

        // Adding third should evict "a"
        cache.put("c".into(), vec![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cache_ttl_expiry() {
        let cache = QueryCache::new(10, Duration::from_millis(1));
        cache.put("ephemeral".into(), vec![1.0]);

        // Sleep past TTL
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("ephemeral").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cached_embedder_returns_same_vector() {
        let embedder = CachedEmbedder::new(Arc::new(HashEmbedder::new(32)), QueryCache::default_cache());
        let first = embedder.embed("leave policy").await.unwrap();
        let second = embedder.embed("leave policy").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(embedder.cache().len(), 1);
        assert_eq!(embedder.id(), "hash-v1-32");
    }
}
