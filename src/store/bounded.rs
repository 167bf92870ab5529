//! Timeout decorators for stores.
//!
//! Every store operation is a suspension point on a shared dependency. The
//! `Bounded*Store` decorators cap each operation at a fixed duration so a
//! slow or hung store turns into a [`HuginnError::StoreTimeout`] for the one
//! request that hit it, instead of stalling every caller behind it.
//!
//! Failures and timeouts are counted under
//! [`STORE_ERRORS_TOTAL`](crate::telemetry::STORE_ERRORS_TOTAL).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CacheStore, CounterStore};
use crate::telemetry;
use crate::{HuginnError, Result};

/// Default per-operation ceiling.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// Run a store operation under a timeout, recording failures.
pub(crate) async fn with_timeout<F, T>(
    store: &str,
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let outcome = match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(HuginnError::StoreTimeout {
            store: store.to_owned(),
            after,
        }),
    };
    if outcome.is_err() {
        metrics::counter!(telemetry::STORE_ERRORS_TOTAL,
            "store" => store.to_owned(),
            "operation" => operation,
        )
        .increment(1);
    }
    outcome
}

/// Decorator that bounds every [`CacheStore`] operation.
pub struct BoundedCacheStore {
    inner: Arc<dyn CacheStore>,
    timeout: Duration,
}

impl BoundedCacheStore {
    /// Wrap a cache store with a per-operation timeout.
    pub fn new(inner: Arc<dyn CacheStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl CacheStore for BoundedCacheStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        with_timeout(self.inner.name(), "get", self.timeout, self.inner.get(key)).await
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        with_timeout(
            self.inner.name(),
            "set_with_ttl",
            self.timeout,
            self.inner.set_with_ttl(key, value, ttl),
        )
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        with_timeout(self.inner.name(), "remove", self.timeout, self.inner.remove(key)).await
    }
}

/// Decorator that bounds every [`CounterStore`] operation.
pub struct BoundedCounterStore {
    inner: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl BoundedCounterStore {
    /// Wrap a counter store with a per-operation timeout.
    pub fn new(inner: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl CounterStore for BoundedCounterStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&self, key: &str) -> Result<f64> {
        with_timeout(self.inner.name(), "read", self.timeout, self.inner.read(key)).await
    }

    async fn increment(&self, key: &str, amount: f64, ttl_if_first: Duration) -> Result<f64> {
        with_timeout(
            self.inner.name(),
            "increment",
            self.timeout,
            self.inner.increment(key, amount, ttl_if_first),
        )
        .await
    }

    async fn clear(&self, keys: &[String]) -> Result<()> {
        with_timeout(self.inner.name(), "clear", self.timeout, self.inner.clear(keys)).await
    }
}
