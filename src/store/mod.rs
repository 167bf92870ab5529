//! Shared backing stores for the L2 cache and usage counters.
//!
//! Components never reach for a global cache or counter table; they receive
//! an `Arc<dyn CacheStore>` / `Arc<dyn CounterStore>` at construction. This
//! keeps the in-process [`MemoryStore`] and the shared [`RedisStore`]
//! interchangeable, and lets tests substitute failing fakes.
//!
//! # Failure semantics
//!
//! Store errors surface as [`HuginnError::Store`](crate::HuginnError::Store)
//! or [`HuginnError::StoreTimeout`](crate::HuginnError::StoreTimeout). What
//! the caller does with them differs by consumer: the result cache degrades
//! to L1-only, while admission checks fail closed on budget reads.
//!
//! Wrap slow stores in [`BoundedCacheStore`] / [`BoundedCounterStore`] to put
//! a ceiling on every operation.

pub mod bounded;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

pub use bounded::{BoundedCacheStore, BoundedCounterStore};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

/// Key/value store with per-key expiry, backing the L2 result cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store name for logging/metrics.
    fn name(&self) -> &str;

    /// Fetch a value. Expired keys read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value that expires after `ttl`, replacing any previous value.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Atomic numeric counters with first-write expiry, backing usage limits.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Store name for logging/metrics.
    fn name(&self) -> &str;

    /// Current value, `0.0` if the key is absent or expired.
    async fn read(&self, key: &str) -> Result<f64>;

    /// Atomically add `amount` and return the new value.
    ///
    /// If the key did not exist (or had expired), it is created with
    /// expiry `ttl_if_first`. An existing key keeps its running expiry,
    /// even when two writers both believe they are first.
    async fn increment(&self, key: &str, amount: f64, ttl_if_first: Duration) -> Result<f64>;

    /// Delete all `keys` in one atomic step.
    async fn clear(&self, keys: &[String]) -> Result<()>;
}
