//! Two-level result cache for visual-analysis answers.
//!
//! # Architecture
//!
//! ```text
//! lookup(request)
//!     │ fingerprint (exact request identity)
//!     ▼
//! ┌───────────────┐  fresh?  ──► hit (L1), hit_count += 1
//! │ L1: moka,     │
//! │ process-local │  stale   ──► evict, fall through
//! └───────┬───────┘
//!         │ semantic key (analysis type + image content signature)
//!         ▼
//! ┌───────────────┐  fresh?  ──► write through to L1, hit (L2)
//! │ L2: CacheStore│
//! │ shared        │  error   ──► warn, treat as miss
//! └───────────────┘
//! ```
//!
//! Freshness is always judged against the entry's own `created_at` and its
//! complexity tier's TTL, so an entry is never served once
//! `age >= ttl[tier]`, whatever the backing store's own expiry does.
//!
//! Moka's capacity bound keeps L1 from growing without limit. Stale L1
//! entries are removed lazily on lookup and by an amortised sweep every
//! `sweep_interval` stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::complexity::{TtlPolicy, classify_complexity};
use crate::clock::{self, Clock};
use crate::signature::{PerceptualSigner, request_fingerprint, semantic_key};
use crate::store::CacheStore;
use crate::telemetry;
use crate::types::{AnalysisRequest, BackendOutput, CacheLevel, CacheMeta, ComplexityTier};

const L2_KEY_PREFIX: &str = "huginn:result:";

/// Configuration for the result cache.
///
/// ```rust
/// # use huginn::cache::CacheConfig;
/// let config = CacheConfig::new().max_entries(5_000).sweep_interval(50);
/// assert_eq!(config.ttl.minimal_secs, 1_800);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum L1 entries. Default: 10,000.
    pub max_entries: u64,
    /// Run an expiry sweep every this many stores (0 disables). Default: 100.
    pub sweep_interval: u64,
    /// Per-complexity-tier TTLs.
    pub ttl: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            sweep_interval: 100,
            ttl: TtlPolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    pub fn sweep_interval(mut self, every: u64) -> Self {
        self.sweep_interval = every;
        self
    }

    pub fn ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }
}

/// One cached answer.
///
/// Immutable apart from the hit counter.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub result: String,
    pub created_at: DateTime<Utc>,
    pub complexity: ComplexityTier,
    pub processing_time_ms: u64,
    pub model_used: String,
    pub cost_usd: f64,
    #[serde(skip)]
    hit_count: AtomicU64,
}

impl CacheEntry {
    fn new(
        output: &BackendOutput,
        complexity: ComplexityTier,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            result: output.text.clone(),
            created_at,
            complexity,
            processing_time_ms: output.processing_time.as_millis() as u64,
            model_used: output.model.clone(),
            cost_usd: output.cost_usd,
            hit_count: AtomicU64::new(0),
        }
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    fn record_hit(&self) -> u64 {
        self.hit_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn meta(&self, level: CacheLevel, age: Duration, hit_count: u64) -> CacheMeta {
        CacheMeta {
            level,
            age,
            hit_count,
            complexity: self.complexity,
            model_used: self.model_used.clone(),
            processing_time_ms: self.processing_time_ms,
            cost_usd: self.cost_usd,
        }
    }
}

/// A cache hit: the stored answer and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub result: String,
    pub meta: CacheMeta,
}

/// L1 + optional L2 result cache. See module docs.
pub struct ResultCache {
    l1: Cache<String, Arc<CacheEntry>>,
    l2: Option<Arc<dyn CacheStore>>,
    signer: Arc<PerceptualSigner>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    stores: AtomicU64,
}

impl ResultCache {
    /// Create a cache. Pass `None` for `l2` to run L1-only.
    pub fn new(
        config: CacheConfig,
        l2: Option<Arc<dyn CacheStore>>,
        signer: Arc<PerceptualSigner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let l1 = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl.longest().max(Duration::from_secs(1)))
            .build();
        Self {
            l1,
            l2,
            signer,
            clock,
            config,
            stores: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> (bool, Duration) {
        let age = clock::elapsed(entry.created_at, now);
        (age < self.config.ttl.ttl(entry.complexity), age)
    }

    /// Look up a cached answer, L1 first, then L2.
    ///
    /// Returns `None` on a full miss. L2 failures are logged and treated as
    /// misses.
    pub async fn lookup(&self, request: &AnalysisRequest) -> Option<CacheHit> {
        let fingerprint = request_fingerprint(request);

        if let Some(entry) = self.l1.get(&fingerprint).await {
            let (fresh, age) = self.is_fresh(&entry, self.clock.now());
            if fresh {
                let hits = entry.record_hit();
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "level" => "L1").increment(1);
                debug!(fingerprint, hits, age_secs = age.as_secs(), "L1 cache hit");
                return Some(CacheHit {
                    result: entry.result.clone(),
                    meta: entry.meta(CacheLevel::L1, age, hits),
                });
            }
            self.l1.invalidate(&fingerprint).await;
            metrics::counter!(telemetry::CACHE_EXPIRED_TOTAL).increment(1);
            debug!(fingerprint, age_secs = age.as_secs(), "evicted stale L1 entry");
        }

        if let Some(hit) = self.lookup_l2(request, fingerprint).await {
            return Some(hit);
        }

        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        None
    }

    async fn lookup_l2(&self, request: &AnalysisRequest, fingerprint: String) -> Option<CacheHit> {
        let l2 = self.l2.as_ref()?;
        let signature = self.signer.content_signature(&request.image).await;
        let key = l2_key(&semantic_key(request, &signature));

        let raw = match l2.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(store = l2.name(), error = %e, "L2 cache unavailable, serving L1 only");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(store = l2.name(), key, error = %e, "discarding undecodable L2 entry");
                if let Err(e) = l2.remove(&key).await {
                    debug!(error = %e, "failed to remove undecodable L2 entry");
                }
                return None;
            }
        };

        let (fresh, age) = self.is_fresh(&entry, self.clock.now());
        if !fresh {
            debug!(key, age_secs = age.as_secs(), "ignoring stale L2 entry");
            return None;
        }

        let entry = Arc::new(entry);
        let hits = entry.record_hit();
        self.l1.insert(fingerprint, Arc::clone(&entry)).await;
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "level" => "L2").increment(1);
        debug!(key, age_secs = age.as_secs(), "L2 cache hit, promoted to L1");
        Some(CacheHit {
            result: entry.result.clone(),
            meta: entry.meta(CacheLevel::L2, age, hits),
        })
    }

    /// Store a completed backend result and return its complexity tier.
    ///
    /// Writes L2 (with the tier's TTL) when configured, then L1. An L2
    /// failure is logged and otherwise ignored.
    pub async fn store(&self, request: &AnalysisRequest, output: &BackendOutput) -> ComplexityTier {
        let complexity = classify_complexity(request, &output.text);
        let entry = Arc::new(CacheEntry::new(output, complexity, self.clock.now()));
        let fingerprint = request_fingerprint(request);

        if let Some(l2) = &self.l2 {
            let signature = self.signer.content_signature(&request.image).await;
            let key = l2_key(&semantic_key(request, &signature));
            let ttl = self.config.ttl.ttl(complexity);
            match serde_json::to_string(entry.as_ref()) {
                Ok(json) => {
                    if let Err(e) = l2.set_with_ttl(&key, json, ttl).await {
                        warn!(store = l2.name(), error = %e, "L2 cache write failed, kept L1 only");
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode cache entry for L2"),
            }
        }
        // L1 last, so a store abandoned mid-way never serves from this process.
        self.l1.insert(fingerprint, Arc::clone(&entry)).await;

        let stored = self.stores.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.sweep_interval > 0 && stored % self.config.sweep_interval == 0 {
            self.sweep_expired().await;
        }
        complexity
    }

    /// Remove every stale L1 entry. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let stale: Vec<Arc<String>> = self
            .l1
            .iter()
            .filter(|(_, entry)| !self.is_fresh(entry, now).0)
            .map(|(key, _)| key)
            .collect();
        for key in &stale {
            self.l1.invalidate(key.as_str()).await;
        }
        if !stale.is_empty() {
            metrics::counter!(telemetry::CACHE_EXPIRED_TOTAL).increment(stale.len() as u64);
            debug!(removed = stale.len(), "swept stale L1 entries");
        }
        stale.len()
    }

    /// Approximate number of L1 entries (moka applies writes lazily).
    pub fn l1_entry_count(&self) -> u64 {
        self.l1.entry_count()
    }

    /// Drop every L1 entry. L2 is left alone.
    pub fn clear_l1(&self) {
        self.l1.invalidate_all();
    }
}

fn l2_key(semantic: &str) -> String {
    format!("{L2_KEY_PREFIX}{semantic}")
}
