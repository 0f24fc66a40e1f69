use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// Keyed memoization with a fixed time-to-live.
///
/// Expiry is checked on read. Only successful values are stored, so a failed
/// initialization is retried by the next caller. Initialization is single-flight per
/// key: callers for the same key wait on each other, callers for different keys never do.
/// A value whose initialization started before [`TtlCache::invalidate_all`] is returned to
/// its caller but never stored.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    key_locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
    generation: AtomicU64,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn enabled(&self) -> bool {
        self.ttl > Duration::ZERO
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        if !self.enabled() {
            return None;
        }
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .and_then(|entry| (entry.expires_at > now).then(|| entry.value.clone()))
    }

    pub async fn insert(&self, key: K, value: V) {
        self.insert_unless_invalidated(key, value, None).await;
    }

    async fn insert_unless_invalidated(&self, key: K, value: V, started_in: Option<u64>) {
        if !self.enabled() {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let current = self.generation.load(Ordering::Acquire);
        if started_in.is_some_and(|generation| generation != current) {
            return;
        }
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Return the live value for `key`, or run `init` and store its success.
    ///
    /// The boolean is `true` when the value came from the cache.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, init: F) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key_lock = self.key_lock(&key).await;
        let _held = key_lock.lock().await;

        if let Some(value) = self.get(&key).await {
            return Ok((value, true));
        }

        let started_in = self.generation.load(Ordering::Acquire);
        let value = init().await?;
        self.insert_unless_invalidated(key, value.clone(), Some(started_in)).await;
        Ok((value, false))
    }

    /// Drop every entry regardless of age. Initializations still in flight keep their
    /// key lock but do not store their result.
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }

    /// Number of entries that have not yet expired.
    pub async fn live_len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    async fn key_lock(&self, key: &K) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
