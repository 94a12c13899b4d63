use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("serialization error: {0}")]
    SerializationError(String),
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

impl CacheStats {
    fn record(hits: u64, misses: u64, entries: usize) -> Self {
        let hit_rate = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64 * 100.0
        } else {
            0.0
        };
        Self { hits, misses, entries, hit_rate }
    }
}

/// Common shape for in-process caches fronting a slower backing store.
#[async_trait]
pub trait CacheStrategy<K, V>: Send + Sync
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Option<V>;
    async fn set(&self, key: K, value: V) -> Result<(), CacheError>;
    async fn remove(&self, key: &K);
    async fn clear(&self);
    async fn stats(&self) -> CacheStats;
}

struct TtlEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Fixed-capacity cache with a single TTL applied to every entry; expired
/// entries are swept lazily on read and periodically by a background task.
pub struct TtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    entries: RwLock<HashMap<K, TtlEntry<V>>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Spawns a background sweep of expired entries at `interval`.
    pub fn with_cleanup_interval(self: Self, interval: Duration) -> Arc<Self> {
        let shared = Arc::new(self);
        let weak = Arc::downgrade(&shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else { break };
                let mut entries = cache.entries.write().await;
                entries.retain(|_, e| e.inserted_at.elapsed() < cache.ttl);
            }
        });
        shared
    }
}

#[async_trait]
impl<K, V> CacheStrategy<K, V> for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: K, value: V) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            // Evict an arbitrary entry; TTL cache does not track recency.
            if let Some(stale) = entries.keys().next().cloned() {
                entries.remove(&stale);
            }
        }
        entries.insert(key, TtlEntry { value, inserted_at: Instant::now() });
        Ok(())
    }

    async fn remove(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats::record(
            self.hits.load(std::sync::atomic::Ordering::Relaxed),
            self.misses.load(std::sync::atomic::Ordering::Relaxed),
            entries.len(),
        )
    }
}
