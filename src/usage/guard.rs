//! Admission control over shared usage counters.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::limits::{
    Admission, Denial, DenialReason, ResetScope, UsageLimits, UsageStats, micros_to_usd,
    usd_to_micros,
};
use super::windows::{
    DAY_TTL, HOUR_TTL, MINUTE_TTL, MONTH_TTL, WindowKeys, until_next_day, until_next_hour,
    until_next_minute, until_next_month,
};
use crate::Result;
use crate::clock::{self, Clock};
use crate::store::CounterStore;
use crate::telemetry;

/// Multi-window rate limiter and layered spend governor.
///
/// Checks only read counters; [`record_usage`](Self::record_usage) is the
/// only writer and runs after a successful backend call, so a failed or
/// retried call is never charged. Concurrent admissions for one user can
/// overshoot a limit by the number of in-flight requests.
pub struct UsageGuard {
    counters: Arc<dyn CounterStore>,
    limits: UsageLimits,
    clock: Arc<dyn Clock>,
}

impl UsageGuard {
    pub fn new(counters: Arc<dyn CounterStore>, limits: UsageLimits) -> Self {
        Self::with_clock(counters, limits, clock::system())
    }

    pub fn with_clock(
        counters: Arc<dyn CounterStore>,
        limits: UsageLimits,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            counters,
            limits,
            clock,
        }
    }

    pub fn limits(&self) -> &UsageLimits {
        &self.limits
    }

    /// Decide whether `user_id` may spend `estimated_cost_usd` now.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// minute uploads, hour analyses, month quota, per-analysis ceiling,
    /// daily budget, monthly budget. Count limits are exclusive
    /// (`count < limit`); budgets are inclusive (`spent + est <= budget`),
    /// compared in whole micro-dollars.
    ///
    /// An unreadable count is skipped. An unreadable spend accumulator
    /// denies with that budget's reason.
    pub async fn check_admission(&self, user_id: &str, estimated_cost_usd: f64) -> Admission {
        let now = self.clock.now();
        let keys = WindowKeys::at(user_id, now);

        let (minute, hour, month, day_cost, month_cost) = tokio::join!(
            self.counters.read(&keys.minute),
            self.counters.read(&keys.hour),
            self.counters.read(&keys.month),
            self.counters.read(&keys.day_cost),
            self.counters.read(&keys.month_cost),
        );

        let admission = self.evaluate(
            user_id,
            estimated_cost_usd,
            [
                (minute, DenialReason::MinuteLimit),
                (hour, DenialReason::HourLimit),
                (month, DenialReason::MonthQuota),
            ],
            [
                (day_cost, DenialReason::DailyBudget),
                (month_cost, DenialReason::MonthlyBudget),
            ],
            now,
        );

        match &admission {
            Admission::Admit => {
                metrics::counter!(telemetry::ADMISSIONS_TOTAL, "outcome" => "admit").increment(1);
            }
            Admission::Deny(denial) => {
                debug!(user_id, reason = %denial.reason, "admission denied");
                metrics::counter!(telemetry::ADMISSIONS_TOTAL,
                    "outcome" => "deny",
                    "reason" => denial.reason.as_str(),
                )
                .increment(1);
            }
        }
        admission
    }

    fn evaluate(
        &self,
        user_id: &str,
        estimated_cost_usd: f64,
        counts: [(Result<f64>, DenialReason); 3],
        spend: [(Result<f64>, DenialReason); 2],
        now: chrono::DateTime<chrono::Utc>,
    ) -> Admission {
        for (read, reason) in counts {
            let count = match read {
                Ok(count) => count,
                Err(err) => {
                    warn!(user_id, reason = %reason, error = %err, "usage count unavailable; skipping check");
                    continue;
                }
            };
            let limit = self.count_limit(reason);
            if count >= limit as f64 {
                return deny(reason, format!("{} ({count}/{limit})", describe(reason)), now);
            }
        }

        let estimated = usd_to_micros(estimated_cost_usd);
        if estimated_cost_usd.is_nan() || estimated > usd_to_micros(self.limits.per_analysis_usd) {
            return deny(
                DenialReason::PerAnalysisCost,
                format!(
                    "estimated cost ${estimated_cost_usd:.2} exceeds per-analysis ceiling ${:.2}",
                    self.limits.per_analysis_usd
                ),
                now,
            );
        }

        for (read, reason) in spend {
            let budget = usd_to_micros(self.budget(reason));
            let spent = match read {
                Ok(spent) => stored_micros(spent),
                Err(err) => {
                    warn!(user_id, reason = %reason, error = %err, "spend unavailable; denying");
                    return deny(reason, format!("{} unavailable", describe(reason)), now);
                }
            };
            let total = spent.saturating_add(estimated);
            if total > budget {
                return deny(
                    reason,
                    format!(
                        "{} would reach ${:.2} (budget ${:.2})",
                        describe(reason),
                        micros_to_usd(total),
                        micros_to_usd(budget)
                    ),
                    now,
                );
            }
        }

        Admission::Admit
    }

    /// Charge one completed analysis to `user_id`.
    ///
    /// Bumps all three counts by one and adds `cost_usd`, in micro-dollars,
    /// to both spend accumulators. Every increment is attempted even if an
    /// earlier one fails; the first error is returned.
    pub async fn record_usage(&self, user_id: &str, cost_usd: f64) -> Result<()> {
        let micros = if cost_usd.is_finite() {
            usd_to_micros(cost_usd)
        } else {
            0
        };
        let cost = micros as f64;
        let keys = WindowKeys::at(user_id, self.clock.now());

        let results = [
            self.counters.increment(&keys.minute, 1.0, MINUTE_TTL).await,
            self.counters.increment(&keys.hour, 1.0, HOUR_TTL).await,
            self.counters.increment(&keys.month, 1.0, MONTH_TTL).await,
            self.counters.increment(&keys.day_cost, cost, DAY_TTL).await,
            self.counters.increment(&keys.month_cost, cost, MONTH_TTL).await,
        ];

        metrics::counter!(telemetry::SPEND_MICRO_USD_TOTAL).increment(micros);

        for result in results {
            result?;
        }
        Ok(())
    }

    /// Current counters for `user_id`. Store failures propagate.
    pub async fn get_usage_stats(&self, user_id: &str) -> Result<UsageStats> {
        let keys = WindowKeys::at(user_id, self.clock.now());
        Ok(UsageStats {
            minute_uploads: self.counters.read(&keys.minute).await? as u64,
            hour_analyses: self.counters.read(&keys.hour).await? as u64,
            month_quota_used: self.counters.read(&keys.month).await? as u64,
            daily_cost_usd: micros_to_usd(stored_micros(self.counters.read(&keys.day_cost).await?)),
            monthly_cost_usd: micros_to_usd(stored_micros(
                self.counters.read(&keys.month_cost).await?,
            )),
            limits: self.limits.clone(),
        })
    }

    /// Clear the current window's counters for `user_id` in one step.
    pub async fn reset_limits(&self, user_id: &str, scope: ResetScope) -> Result<()> {
        let keys = WindowKeys::at(user_id, self.clock.now()).for_scope(scope);
        self.counters.clear(&keys).await?;
        debug!(user_id, ?scope, "usage limits reset");
        Ok(())
    }

    fn count_limit(&self, reason: DenialReason) -> u64 {
        match reason {
            DenialReason::MinuteLimit => self.limits.minute_uploads,
            DenialReason::HourLimit => self.limits.hour_analyses,
            _ => self.limits.month_quota,
        }
    }

    fn budget(&self, reason: DenialReason) -> f64 {
        match reason {
            DenialReason::DailyBudget => self.limits.daily_budget_usd,
            _ => self.limits.monthly_budget_usd,
        }
    }
}

impl std::fmt::Debug for UsageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageGuard")
            .field("store", &self.counters.name())
            .field("limits", &self.limits)
            .finish()
    }
}

/// A cost counter's value as whole micro-dollars.
fn stored_micros(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

fn describe(reason: DenialReason) -> &'static str {
    match reason {
        DenialReason::MinuteLimit => "minute upload limit reached",
        DenialReason::HourLimit => "hourly analysis limit reached",
        DenialReason::MonthQuota => "monthly quota exhausted",
        DenialReason::PerAnalysisCost => "per-analysis cost ceiling exceeded",
        DenialReason::DailyBudget => "daily spend",
        DenialReason::MonthlyBudget => "monthly spend",
    }
}

fn deny(reason: DenialReason, message: String, now: chrono::DateTime<chrono::Utc>) -> Admission {
    Admission::Deny(Denial {
        retry_after: retry_after(reason, now),
        ..Denial::new(reason, message)
    })
}

fn retry_after(reason: DenialReason, now: chrono::DateTime<chrono::Utc>) -> Option<Duration> {
    Some(match reason {
        DenialReason::MinuteLimit => until_next_minute(now),
        DenialReason::HourLimit => until_next_hour(now),
        DenialReason::DailyBudget => until_next_day(now),
        DenialReason::MonthQuota | DenialReason::MonthlyBudget => until_next_month(now),
        DenialReason::PerAnalysisCost => return None,
    })
}
