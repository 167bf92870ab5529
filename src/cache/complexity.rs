//! Complexity classification and the TTL policy it drives.
//!
//! Simple answers are stable and cheap to keep around; nuanced answers go
//! stale faster and are less likely to be asked for verbatim again. The
//! tier assigned at store time picks the entry's TTL.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{AnalysisRequest, AnalysisType, ComplexityTier, DetailLevel};

/// Per-tier time-to-live, in seconds.
///
/// ```toml
/// [cache.ttl]
/// minimal_secs = 1800
/// high_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    /// Default: 1,800 (30 minutes).
    pub minimal_secs: u64,
    /// Default: 900 (15 minutes).
    pub low_secs: u64,
    /// Default: 600 (10 minutes).
    pub medium_secs: u64,
    /// Default: 300 (5 minutes).
    pub high_secs: u64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            minimal_secs: 1_800,
            low_secs: 900,
            medium_secs: 600,
            high_secs: 300,
        }
    }
}

impl TtlPolicy {
    /// TTL for entries of the given tier.
    pub fn ttl(&self, tier: ComplexityTier) -> Duration {
        Duration::from_secs(match tier {
            ComplexityTier::Minimal => self.minimal_secs,
            ComplexityTier::Low => self.low_secs,
            ComplexityTier::Medium => self.medium_secs,
            ComplexityTier::High => self.high_secs,
        })
    }

    /// Longest TTL across tiers; an upper bound on any entry's lifetime.
    pub fn longest(&self) -> Duration {
        ComplexityTier::ALL
            .iter()
            .map(|t| self.ttl(*t))
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

/// Bucket a completed result into a complexity tier.
///
/// Rules, first match wins:
/// 1. general + basic → minimal
/// 2. more than three specific questions → high
/// 3. detailed → medium, comprehensive → high
/// 4. ocr / technical / document → medium
/// 5. by result length: >1000 chars medium, >500 low, else minimal
pub fn classify_complexity(request: &AnalysisRequest, result: &str) -> ComplexityTier {
    if request.analysis_type == AnalysisType::General && request.detail_level == DetailLevel::Basic
    {
        return ComplexityTier::Minimal;
    }
    if request.specific_questions.len() > 3 {
        return ComplexityTier::High;
    }
    match request.detail_level {
        DetailLevel::Detailed => return ComplexityTier::Medium,
        DetailLevel::Comprehensive => return ComplexityTier::High,
        _ => {}
    }
    if matches!(
        request.analysis_type,
        AnalysisType::Ocr | AnalysisType::Technical | AnalysisType::Document
    ) {
        return ComplexityTier::Medium;
    }

    let len = result.chars().count();
    if len > 1000 {
        ComplexityTier::Medium
    } else if len > 500 {
        ComplexityTier::Low
    } else {
        ComplexityTier::Minimal
    }
}
