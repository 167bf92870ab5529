//! Complexity and effort tiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Complexity bucket assigned to a cached result; drives its TTL.
///
/// Assigned once at store time and never revised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Minimal,
    Low,
    Medium,
    High,
}

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 4] = [Self::Minimal, Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much reasoning effort the backend should spend on one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortTier {
    Minimal,
    Low,
    Medium,
    High,
}

impl EffortTier {
    pub const ALL: [EffortTier; 4] = [Self::Minimal, Self::Low, Self::Medium, Self::High];

    /// Map a 0-100 weighted score onto a tier.
    ///
    /// `<=25` minimal, `<=50` low, `<=75` medium, above that high.
    pub fn from_score(score: f64) -> Self {
        if score <= 25.0 {
            Self::Minimal
        } else if score <= 50.0 {
            Self::Low
        } else if score <= 75.0 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Minimal => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl fmt::Display for EffortTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
