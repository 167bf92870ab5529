//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::VisionGateway;
use crate::backend::AnalysisBackend;
use crate::cache::{CacheConfig, ResultCache};
use crate::clock::{self, Clock};
use crate::config::HuginnConfig;
use crate::effort::{EffortConfig, EffortSelector};
use crate::signature::{PerceptualSigner, SignatureConfig};
use crate::store::{BoundedCacheStore, BoundedCounterStore, CacheStore, CounterStore, MemoryStore};
use crate::usage::{UsageGuard, UsageLimits};
use crate::{HuginnError, Result};

/// Main entry point for creating gateway instances.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }
}

/// Builder for configuring gateway instances.
///
/// Only the backend is required. Stores default to one shared in-process
/// [`MemoryStore`] and the clock defaults to the system clock.
pub struct HuginnBuilder {
    backend: Option<Arc<dyn AnalysisBackend>>,
    config: HuginnConfig,
    cache_store: Option<Arc<dyn CacheStore>>,
    counter_store: Option<Arc<dyn CounterStore>>,
    l2_enabled: bool,
    clock: Option<Arc<dyn Clock>>,
    http_client: Option<reqwest::Client>,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            config: HuginnConfig::default(),
            cache_store: None,
            counter_store: None,
            l2_enabled: true,
            clock: None,
            http_client: None,
        }
    }

    /// Set the analysis backend invoked on cache misses.
    pub fn backend(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: HuginnConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn limits(mut self, limits: UsageLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn effort_config(mut self, effort: EffortConfig) -> Self {
        self.config.effort = effort;
        self
    }

    pub fn signature_config(mut self, signature: SignatureConfig) -> Self {
        self.config.signature = signature;
        self
    }

    /// Ceiling on each store operation (default: 250ms).
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store.operation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Ceiling on each backend call (default: 120s).
    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.config.backend.timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    /// Shared store for the L2 result cache.
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self.l2_enabled = true;
        self
    }

    /// Shared store for usage counters.
    pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counter_store = Some(store);
        self
    }

    /// Run the result cache L1-only.
    pub fn without_l2(mut self) -> Self {
        self.cache_store = None;
        self.l2_enabled = false;
        self
    }

    /// Time source for TTLs and window bucketing.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// HTTP client used to fetch remote images for signatures.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Use one redis server for both the L2 cache and usage counters.
    #[cfg(feature = "redis")]
    pub async fn redis(mut self, url: &str) -> Result<Self> {
        let store = Arc::new(crate::store::RedisStore::connect(url).await?);
        self.cache_store = Some(store.clone());
        self.counter_store = Some(store);
        self.l2_enabled = true;
        Ok(self)
    }

    /// Connect to `store.redis_url` from the configuration, if set.
    #[cfg(feature = "redis")]
    pub async fn redis_from_config(self) -> Result<Self> {
        match self.config.store.redis_url.clone() {
            Some(url) => self.redis(&url).await,
            None => Ok(self),
        }
    }

    pub fn build(self) -> Result<VisionGateway> {
        self.config.validate()?;
        let backend = self.backend.ok_or_else(|| {
            HuginnError::Configuration("no analysis backend configured".to_string())
        })?;

        let clock = self.clock.unwrap_or_else(clock::system);
        let timeout = self.config.store.operation_timeout();

        if self.config.store.redis_url.is_some()
            && self.cache_store.is_none()
            && self.counter_store.is_none()
        {
            warn!("store.redis_url is set but no redis store was connected; using in-process store");
        }

        let shared = Arc::new(MemoryStore::with_clock(clock.clone()));
        let cache_store: Option<Arc<dyn CacheStore>> = if self.l2_enabled {
            let inner = self
                .cache_store
                .unwrap_or_else(|| shared.clone() as Arc<dyn CacheStore>);
            Some(Arc::new(BoundedCacheStore::new(inner, timeout)))
        } else {
            None
        };
        let counter_store: Arc<dyn CounterStore> = Arc::new(BoundedCounterStore::new(
            self.counter_store
                .unwrap_or_else(|| shared as Arc<dyn CounterStore>),
            timeout,
        ));

        let signer = Arc::new(match self.http_client {
            Some(http) => PerceptualSigner::with_http_client(self.config.signature.clone(), http),
            None => PerceptualSigner::new(self.config.signature.clone()),
        });

        debug!(
            backend = backend.name(),
            l2 = ?cache_store.as_ref().map(|s| s.name()),
            counters = counter_store.name(),
            "building vision gateway"
        );

        let cache = ResultCache::new(self.config.cache.clone(), cache_store, signer, clock.clone());
        let effort = EffortSelector::new(&self.config.effort);
        let usage = UsageGuard::with_clock(counter_store, self.config.limits.clone(), clock);

        Ok(VisionGateway::new(
            backend,
            cache,
            effort,
            usage,
            self.config.backend.clone(),
        ))
    }
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
