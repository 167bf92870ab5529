//! Limit configuration and admission outcomes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-user rate limits and spend ceilings.
///
/// ```toml
/// [limits]
/// minute_uploads = 10
/// daily_budget_usd = 5.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLimits {
    /// Uploads per calendar minute. Default: 10.
    pub minute_uploads: u64,
    /// Analyses per clock hour. Default: 100.
    pub hour_analyses: u64,
    /// Analyses per calendar month. Default: 1,000.
    pub month_quota: u64,
    /// Ceiling on one call's estimated cost. Default: $0.50.
    pub per_analysis_usd: f64,
    /// Spend per UTC day. Default: $5.00.
    pub daily_budget_usd: f64,
    /// Spend per UTC calendar month. Default: $50.00.
    pub monthly_budget_usd: f64,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            minute_uploads: 10,
            hour_analyses: 100,
            month_quota: 1_000,
            per_analysis_usd: 0.50,
            daily_budget_usd: 5.0,
            monthly_budget_usd: 50.0,
        }
    }
}

impl UsageLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minute_uploads(mut self, n: u64) -> Self {
        self.minute_uploads = n;
        self
    }

    pub fn hour_analyses(mut self, n: u64) -> Self {
        self.hour_analyses = n;
        self
    }

    pub fn month_quota(mut self, n: u64) -> Self {
        self.month_quota = n;
        self
    }

    pub fn per_analysis_usd(mut self, usd: f64) -> Self {
        self.per_analysis_usd = usd;
        self
    }

    pub fn daily_budget_usd(mut self, usd: f64) -> Self {
        self.daily_budget_usd = usd;
        self
    }

    pub fn monthly_budget_usd(mut self, usd: f64) -> Self {
        self.monthly_budget_usd = usd;
        self
    }
}

/// Spend is accounted in whole micro-dollars so budget comparisons are exact.
pub const MICROS_PER_USD: f64 = 1_000_000.0;

/// Dollars to whole micro-dollars, rounded to nearest.
///
/// Negative and NaN amounts are zero; `+inf` saturates.
pub fn usd_to_micros(usd: f64) -> u64 {
    if usd.is_nan() || usd <= 0.0 {
        return 0;
    }
    (usd * MICROS_PER_USD).round() as u64
}

pub fn micros_to_usd(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_USD
}

/// Machine-readable denial reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    MinuteLimit,
    HourLimit,
    MonthQuota,
    PerAnalysisCost,
    DailyBudget,
    MonthlyBudget,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinuteLimit => "minute_limit",
            Self::HourLimit => "hour_limit",
            Self::MonthQuota => "month_quota",
            Self::PerAnalysisCost => "per_analysis_cost",
            Self::DailyBudget => "daily_budget",
            Self::MonthlyBudget => "monthly_budget",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was refused, and when it is worth trying again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Denial {
    pub reason: DenialReason,
    pub message: String,
    /// Time until the violated window rolls over. `None` when waiting
    /// would not help (per-analysis ceiling).
    pub retry_after: Option<Duration>,
}

impl Denial {
    pub fn new(reason: DenialReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            retry_after: None,
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admit,
    Deny(Denial),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }
}

/// Which counters [`UsageGuard::reset_limits`](super::UsageGuard::reset_limits)
/// clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    Minute,
    Hour,
    Month,
    DailyCost,
    MonthlyCost,
    All,
}

/// Current usage for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub minute_uploads: u64,
    pub hour_analyses: u64,
    pub month_quota_used: u64,
    pub daily_cost_usd: f64,
    pub monthly_cost_usd: f64,
    pub limits: UsageLimits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_snake_case() {
        assert_eq!(DenialReason::PerAnalysisCost.to_string(), "per_analysis_cost");
        assert_eq!(
            serde_json::to_string(&DenialReason::MonthlyBudget).unwrap(),
            "\"monthly_budget\""
        );
    }

    #[test]
    fn micro_dollar_conversion() {
        assert_eq!(usd_to_micros(0.01), 10_000);
        assert_eq!(usd_to_micros(0.1 + 0.2), 300_000);
        assert_eq!(usd_to_micros(-1.0), 0);
        assert_eq!(usd_to_micros(f64::NAN), 0);
        assert_eq!(usd_to_micros(f64::INFINITY), u64::MAX);
        assert_eq!(micros_to_usd(250_000), 0.25);
    }

    #[test]
    fn limits_deserialize_with_defaults() {
        let limits: UsageLimits = toml::from_str("minute_uploads = 3").unwrap();
        assert_eq!(limits.minute_uploads, 3);
        assert_eq!(limits.hour_analyses, 100);
        assert_eq!(limits.daily_budget_usd, 5.0);
    }
}
