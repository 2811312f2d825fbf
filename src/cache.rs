//! TTL-keyed memoization with per-key single-flight.
//!
//! [`TtlCache::get_or_fetch`] returns a fresh entry when one exists and
//! otherwise runs the fetch. Concurrent misses for the same key queue on a
//! per-key async lock, so only the first runs the fetch and the rest read its
//! result. Misses on different keys never wait on each other.
//!
//! Time comes from a [`Clock`] so tests can move it by hand.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|p| p.into_inner());
        self.base + offset
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

/// A map of values that expire `ttl` after they were stored.
pub struct TtlCache<K, V> {
    name: &'static str,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    in_flight: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache").field("name", &self.name).finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self::with_clock(name, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            clock,
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The stored value for `key` if it has not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        lock(&self.entries)
            .get(key)
            .filter(|e| e.is_fresh(now))
            .map(|e| e.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
            ttl,
        };
        lock(&self.entries).insert(key, entry);
    }

    /// Drop every entry regardless of age.
    pub fn clear(&self) {
        let n = {
            let mut entries = lock(&self.entries);
            let n = entries.len();
            entries.clear();
            n
        };
        debug!(cache = self.name, dropped = n, "Cache cleared");
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_lock(&self, key: &K) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.in_flight)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_key_lock(&self, key: &K, key_lock: Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = lock(&self.in_flight);
        // Two references left: ours and the map's.
        if Arc::strong_count(&key_lock) <= 2 {
            in_flight.remove(key);
        }
    }

    /// Return the fresh value for `key`, or run `fetch`, store and return it.
    ///
    /// The boolean is `true` when the value came from the cache.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, ttl: Duration, fetch: F) -> (V, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        match self
            .try_get_or_fetch(key, ttl, || async { Ok::<V, std::convert::Infallible>(fetch().await) })
            .await
        {
            Ok(hit) => hit,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but errors are returned to
    /// the caller and never stored.
    pub async fn try_get_or_fetch<F, Fut, E>(&self, key: K, ttl: Duration, fetch: F) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(v) = self.get(&key) {
            debug!(cache = self.name, ?key, "Cache hit");
            return Ok((v, true));
        }

        let key_lock = self.key_lock(&key);
        let result = {
            let _guard = key_lock.lock().await;

            // Another caller may have filled the entry while we waited.
            if let Some(v) = self.get(&key) {
                debug!(cache = self.name, ?key, "Cache filled by concurrent fetch");
                Ok((v, true))
            } else {
                debug!(cache = self.name, ?key, "Cache miss; fetching");
                match fetch().await {
                    Ok(v) => {
                        self.insert(key.clone(), v.clone(), ttl);
                        Ok((v, false))
                    }
                    Err(e) => Err(e),
                }
            }
        };
        self.release_key_lock(&key, key_lock);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(clock: Arc<ManualClock>) -> TtlCache<String, u32> {
        TtlCache::with_clock("test", clock)
    }

    #[tokio::test]
    async fn test_fetches_once_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(clock.clone());
        let calls = &AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        };

        assert_eq!(cache.get_or_fetch("k".into(), ttl, fetch).await, (7, false));
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get_or_fetch("k".into(), ttl, fetch).await, (7, true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetches_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(clock.clone());
        let calls = &AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);
        let fetch = move || async move { calls.fetch_add(1, Ordering::SeqCst) as u32 };

        assert_eq!(cache.get_or_fetch("k".into(), ttl, fetch).await, (0, false));
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get(&"k".to_string()), None);
        assert_eq!(cache.get_or_fetch("k".into(), ttl, fetch).await, (1, false));
        assert_eq!(cache.get_or_fetch("k".into(), ttl, fetch).await, (1, true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_drops_fresh_entries() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(clock);
        let ttl = Duration::from_secs(3600);
        cache.get_or_fetch("a".into(), ttl, || async { 1 }).await;
        cache.get_or_fetch("b".into(), ttl, || async { 2 }).await;
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_fetch("a".into(), ttl, || async { 3 }).await, (3, false));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = cache(Arc::new(ManualClock::new()));
        let ttl = Duration::from_secs(60);
        let res: Result<_, &str> = cache
            .try_get_or_fetch("k".into(), ttl, || async { Err("boom") })
            .await;
        assert_eq!(res, Err("boom"));
        assert!(cache.is_empty());
        let res: Result<_, &str> = cache.try_get_or_fetch("k".into(), ttl, || async { Ok(4) }).await;
        assert_eq!(res, Ok((4, false)));
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let cache = cache(Arc::new(ManualClock::new()));
        let calls = &AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            9
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch("k".into(), ttl, fetch),
            cache.get_or_fetch("k".into(), ttl, fetch),
            cache.get_or_fetch("k".into(), ttl, fetch),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!([a.0, b.0, c.0], [9, 9, 9]);
        assert_eq!([a.1, b.1, c.1].iter().filter(|hit| !**hit).count(), 1);
    }

    #[tokio::test]
    async fn test_different_keys_fetch_independently() {
        let cache = cache(Arc::new(ManualClock::new()));
        let calls = &AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            1
        };
        tokio::join!(
            cache.get_or_fetch("a".into(), ttl, fetch),
            cache.get_or_fetch("b".into(), ttl, fetch),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
