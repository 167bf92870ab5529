//! In-process store implementing both [`CacheStore`] and [`CounterStore`].
//!
//! Expiry is evaluated against the injected [`Clock`], so TTL and window
//! behaviour can be driven by a [`ManualClock`](crate::clock::ManualClock).
//! Expired entries are dropped when touched, and both tables are purged
//! every [`PURGE_INTERVAL`] writes so keys that are never read again do not
//! accumulate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{CacheStore, CounterStore};
use crate::Result;
use crate::clock::{self, Clock};

/// Default number of writes between full purges of expired entries.
pub const PURGE_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe in-memory store.
///
/// Values and counters live in separate tables, so a cache key and a
/// counter key never collide even if spelled the same.
pub struct MemoryStore {
    values: Mutex<HashMap<String, Expiring<String>>>,
    counters: Mutex<HashMap<String, Expiring<f64>>>,
    clock: Arc<dyn Clock>,
    writes: AtomicU64,
    purge_interval: u64,
}

impl MemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(clock::system())
    }

    /// Create an empty store on a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            clock,
            writes: AtomicU64::new(0),
            purge_interval: PURGE_INTERVAL,
        }
    }

    /// Purge expired entries every `writes` writes instead. `0` disables
    /// the periodic purge.
    pub fn with_purge_interval(mut self, writes: u64) -> Self {
        self.purge_interval = writes;
        self
    }

    /// Drop every expired value and counter. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        {
            let mut values = lock(&self.values);
            let before = values.len();
            values.retain(|_, e| e.is_live(now));
            removed += before - values.len();
        }
        let mut counters = lock(&self.counters);
        let before = counters.len();
        counters.retain(|_, e| e.is_live(now));
        removed + before - counters.len()
    }

    /// Entries held in memory, expired or not.
    pub fn stored_entries(&self) -> usize {
        lock(&self.values).len() + lock(&self.counters).len()
    }

    fn note_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if self.purge_interval > 0 && writes % self.purge_interval == 0 {
            let removed = self.purge_expired();
            if removed > 0 {
                debug!(removed, "purged expired memory store entries");
            }
        }
    }

    /// Number of live (unexpired) values.
    pub fn value_count(&self) -> usize {
        let now = self.clock.now();
        lock(&self.values).values().filter(|e| e.is_live(now)).count()
    }

    /// Remaining lifetime of a counter key, if it exists.
    pub fn counter_ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        lock(&self.counters)
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| clock::elapsed(now, e.expires_at))
    }

    fn expiry(&self, now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut values = lock(&self.values);
        match values.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(now, ttl);
        lock(&self.values).insert(key.to_string(), Expiring { value, expires_at });
        self.note_write();
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self, key: &str) -> Result<f64> {
        let now = self.clock.now();
        Ok(lock(&self.counters)
            .get(key)
            .filter(|e| e.is_live(now))
            .map_or(0.0, |e| e.value))
    }

    async fn increment(&self, key: &str, amount: f64, ttl_if_first: Duration) -> Result<f64> {
        let now = self.clock.now();
        let mut counters = lock(&self.counters);
        let total = match counters.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.value += amount;
                entry.value
            }
            _ => {
                let expires_at = self.expiry(now, ttl_if_first);
                counters.insert(
                    key.to_string(),
                    Expiring {
                        value: amount,
                        expires_at,
                    },
                );
                amount
            }
        };
        drop(counters);
        self.note_write();
        Ok(total)
    }

    async fn clear(&self, keys: &[String]) -> Result<()> {
        let mut counters = lock(&self.counters);
        for key in keys {
            counters.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn store() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap());
        (MemoryStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn value_expires_at_ttl() {
        let (store, clock) = store();
        store
            .set_with_ttl("k", "v".into(), Duration::from_secs(10))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(9));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(Duration::from_secs(1));
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn increment_sets_expiry_only_on_first_write() {
        let (store, clock) = store();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.increment("c", 1.0, ttl).await.unwrap(), 1.0);
        clock.advance(Duration::from_secs(30));
        assert_eq!(store.increment("c", 1.0, ttl).await.unwrap(), 2.0);

        // Second write did not re-extend: 30s remain, not 60.
        assert_eq!(store.counter_ttl("c"), Some(Duration::from_secs(30)));

        clock.advance(Duration::from_secs(30));
        assert_eq!(store.read("c").await.unwrap(), 0.0);
        assert_eq!(store.increment("c", 1.0, ttl).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn clear_removes_only_named_counters() {
        let (store, _clock) = store();
        let ttl = Duration::from_secs(60);
        store.increment("a", 3.0, ttl).await.unwrap();
        store.increment("b", 4.0, ttl).await.unwrap();

        store.clear(&["a".to_string()]).await.unwrap();
        assert_eq!(store.read("a").await.unwrap(), 0.0);
        assert_eq!(store.read("b").await.unwrap(), 4.0);
    }

    #[tokio::test]
    async fn values_and_counters_do_not_collide() {
        let (store, _clock) = store();
        store
            .set_with_ttl("same", "text".into(), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .increment("same", 2.5, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(CacheStore::get(&store, "same").await.unwrap().as_deref(), Some("text"));
        assert_eq!(store.read("same").await.unwrap(), 2.5);
    }

    #[tokio::test]
    async fn keys_never_read_again_are_purged() {
        let (store, clock) = store();
        let store = store.with_purge_interval(4);
        let short = Duration::from_secs(10);
        for key in ["a", "b", "c"] {
            store.set_with_ttl(key, "v".into(), short).await.unwrap();
        }
        store.increment("n", 1.0, short).await.unwrap();
        assert_eq!(store.stored_entries(), 4);

        clock.advance(Duration::from_secs(11));
        let long = Duration::from_secs(60);
        for key in ["d", "e", "f"] {
            store.set_with_ttl(key, "v".into(), long).await.unwrap();
        }
        // Nothing touched the expired keys; they still occupy memory.
        assert_eq!(store.stored_entries(), 7);

        // The eighth write triggers a purge.
        store.increment("m", 1.0, long).await.unwrap();
        assert_eq!(store.stored_entries(), 4);
        assert_eq!(store.value_count(), 3);
        assert_eq!(store.read("m").await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn purge_expired_on_demand() {
        let (store, clock) = store();
        let store = store.with_purge_interval(0);
        for i in 0..100 {
            store
                .increment(&format!("k{i}"), 1.0, Duration::from_secs(5))
                .await
                .unwrap();
        }
        assert_eq!(store.purge_expired(), 0);
        clock.advance(Duration::from_secs(5));
        assert_eq!(store.stored_entries(), 100);
        assert_eq!(store.purge_expired(), 100);
        assert_eq!(store.stored_entries(), 0);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let (store, _clock) = store();
        let store = Arc::new(store);
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .increment("burst", 1.0, Duration::from_secs(60))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.read("burst").await.unwrap(), 50.0);
    }
}
