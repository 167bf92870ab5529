//! Analysis response types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ComplexityTier;
use crate::effort::EffortDecision;

/// Output of one backend invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendOutput {
    pub text: String,
    pub processing_time: Duration,
    /// Model that actually served the call.
    pub model: String,
    pub cost_usd: f64,
}

/// Cache level that served a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheLevel {
    L1,
    L2,
}

impl CacheLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
        }
    }
}

/// Metadata describing a cache hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub level: CacheLevel,
    /// Age of the entry at lookup time.
    pub age: Duration,
    /// Reads served from this entry so far, including this one.
    pub hit_count: u64,
    pub complexity: ComplexityTier,
    pub model_used: String,
    pub processing_time_ms: u64,
    /// Cost of the original backend call that produced the entry.
    pub cost_usd: f64,
}

/// Result of [`VisionGateway::analyze`](crate::VisionGateway::analyze).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub text: String,
    pub model: String,
    /// Spend incurred by this request (zero when served from cache).
    pub cost_usd: f64,
    /// Present when the result came from cache.
    pub cache: Option<CacheMeta>,
    /// Present when the backend was invoked.
    pub effort: Option<EffortDecision>,
}

impl AnalysisResponse {
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }
}
