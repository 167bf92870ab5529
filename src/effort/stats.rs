//! Per-tier performance estimates, adapted online.
//!
//! Each effort tier keeps an exponential moving average of observed latency
//! and success rate. Values start from fixed priors and are only ever
//! nudged: `avg = (1 - alpha) * avg + alpha * sample`. There is no reset
//! and no recomputation from history.
//!
//! Thread-safe via atomics (f64 bits in `AtomicU64`), so recording an
//! outcome never blocks a request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::EffortTier;

/// Default EMA learning rate.
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Starting estimates per tier: (latency seconds, success rate).
const PRIORS: [(f64, f64); 4] = [(2.0, 0.98), (5.0, 0.96), (12.0, 0.93), (30.0, 0.90)];

struct TierCell {
    latency_secs: AtomicU64,
    success_rate: AtomicU64,
    samples: AtomicU64,
}

impl TierCell {
    fn new((latency, success): (f64, f64)) -> Self {
        Self {
            latency_secs: AtomicU64::new(latency.to_bits()),
            success_rate: AtomicU64::new(success.to_bits()),
            samples: AtomicU64::new(0),
        }
    }
}

/// Point-in-time view of one tier's estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierEstimate {
    pub tier: EffortTier,
    pub avg_latency_secs: f64,
    pub success_rate: f64,
    /// Outcomes recorded since process start.
    pub samples: u64,
}

/// Process-wide EMA estimates for every effort tier.
pub struct EffortStats {
    tiers: [TierCell; 4],
    alpha: f64,
}

impl EffortStats {
    /// Create stats seeded with the built-in priors.
    ///
    /// `alpha` is clamped into `[0.0, 1.0]`.
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            DEFAULT_LEARNING_RATE
        };
        Self {
            tiers: PRIORS.map(TierCell::new),
            alpha,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fold one completed call into the tier's estimates.
    pub fn record(&self, tier: EffortTier, latency: Duration, success: bool) {
        let cell = &self.tiers[tier.index()];
        ema_update(&cell.latency_secs, self.alpha, latency.as_secs_f64());
        ema_update(
            &cell.success_rate,
            self.alpha,
            if success { 1.0 } else { 0.0 },
        );
        cell.samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Current estimates for one tier.
    pub fn estimate(&self, tier: EffortTier) -> TierEstimate {
        let cell = &self.tiers[tier.index()];
        TierEstimate {
            tier,
            avg_latency_secs: f64::from_bits(cell.latency_secs.load(Ordering::Relaxed)),
            success_rate: f64::from_bits(cell.success_rate.load(Ordering::Relaxed)),
            samples: cell.samples.load(Ordering::Relaxed),
        }
    }

    /// Estimates for all tiers, cheapest first.
    pub fn snapshot(&self) -> Vec<TierEstimate> {
        EffortTier::ALL.iter().map(|t| self.estimate(*t)).collect()
    }
}

impl Default for EffortStats {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_RATE)
    }
}

impl std::fmt::Debug for EffortStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffortStats")
            .field("alpha", &self.alpha)
            .field("tiers", &self.snapshot())
            .finish()
    }
}

/// Lock-free EMA step on an f64 stored as bits.
fn ema_update(cell: &AtomicU64, alpha: f64, sample: f64) {
    loop {
        let current_bits = cell.load(Ordering::Relaxed);
        let current = f64::from_bits(current_bits);
        let new = (1.0 - alpha) * current + alpha * sample;
        if cell
            .compare_exchange_weak(current_bits, new.to_bits(), Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            break;
        }
    }
}
