//! Window bucketing for usage counters.
//!
//! Every counter key embeds the user and the window it counts, so a new
//! window is simply a new key. Nothing is ever reset on rollover: old keys
//! stop being read and expire on their own.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use super::limits::ResetScope;

const KEY_PREFIX: &str = "huginn:usage";

pub(crate) const MINUTE_TTL: Duration = Duration::from_secs(60);
pub(crate) const HOUR_TTL: Duration = Duration::from_secs(3_600);
pub(crate) const DAY_TTL: Duration = Duration::from_secs(86_400);
pub(crate) const MONTH_TTL: Duration = Duration::from_secs(31 * 86_400);

/// Counter keys for one user at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WindowKeys {
    pub minute: String,
    pub hour: String,
    pub month: String,
    pub day_cost: String,
    pub month_cost: String,
}

impl WindowKeys {
    pub fn at(user_id: &str, now: DateTime<Utc>) -> Self {
        let ts = now.timestamp();
        let base = format!("{KEY_PREFIX}:{user_id}");
        Self {
            minute: format!("{base}:minute:{}", ts.div_euclid(60)),
            hour: format!("{base}:hour:{}", ts.div_euclid(3_600)),
            month: format!("{base}:month:{}", now.format("%Y%m")),
            day_cost: format!("{base}:daycost:{}", now.format("%Y%m%d")),
            month_cost: format!("{base}:monthcost:{}", now.format("%Y%m")),
        }
    }

    /// Keys covered by a reset scope.
    pub fn for_scope(&self, scope: ResetScope) -> Vec<String> {
        match scope {
            ResetScope::Minute => vec![self.minute.clone()],
            ResetScope::Hour => vec![self.hour.clone()],
            ResetScope::Month => vec![self.month.clone()],
            ResetScope::DailyCost => vec![self.day_cost.clone()],
            ResetScope::MonthlyCost => vec![self.month_cost.clone()],
            ResetScope::All => vec![
                self.minute.clone(),
                self.hour.clone(),
                self.month.clone(),
                self.day_cost.clone(),
                self.month_cost.clone(),
            ],
        }
    }
}

/// Time left until the next multiple of `period_secs` since the epoch.
fn until_boundary(now: DateTime<Utc>, period_secs: i64) -> Duration {
    let into = Duration::from_secs(now.timestamp().rem_euclid(period_secs) as u64)
        + Duration::from_nanos(u64::from(now.timestamp_subsec_nanos()));
    Duration::from_secs(period_secs as u64).saturating_sub(into)
}

pub(crate) fn until_next_minute(now: DateTime<Utc>) -> Duration {
    until_boundary(now, 60)
}

pub(crate) fn until_next_hour(now: DateTime<Utc>) -> Duration {
    until_boundary(now, 3_600)
}

pub(crate) fn until_next_day(now: DateTime<Utc>) -> Duration {
    until_boundary(now, 86_400)
}

pub(crate) fn until_next_month(now: DateTime<Utc>) -> Duration {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|start| crate::clock::elapsed(now, start.and_utc()))
        .unwrap_or(MONTH_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn keys_embed_user_and_bucket() {
        let now = at(2026, 3, 14, 15, 9, 26);
        let keys = WindowKeys::at("alice", now);
        let epoch_min = now.timestamp() / 60;
        assert_eq!(keys.minute, format!("huginn:usage:alice:minute:{epoch_min}"));
        assert_eq!(keys.month, "huginn:usage:alice:month:202603");
        assert_eq!(keys.day_cost, "huginn:usage:alice:daycost:20260314");
        assert_eq!(keys.month_cost, "huginn:usage:alice:monthcost:202603");
    }

    #[test]
    fn same_minute_same_key_next_minute_new_key() {
        let a = WindowKeys::at("u", at(2026, 3, 14, 15, 9, 0));
        let b = WindowKeys::at("u", at(2026, 3, 14, 15, 9, 59));
        let c = WindowKeys::at("u", at(2026, 3, 14, 15, 10, 0));
        assert_eq!(a.minute, b.minute);
        assert_ne!(b.minute, c.minute);
        assert_eq!(a.hour, c.hour);
    }

    #[test]
    fn scopes_select_keys() {
        let keys = WindowKeys::at("u", at(2026, 1, 1, 0, 0, 0));
        assert_eq!(keys.for_scope(ResetScope::Hour), vec![keys.hour.clone()]);
        assert_eq!(keys.for_scope(ResetScope::All).len(), 5);
    }

    #[test]
    fn retry_after_boundaries() {
        let now = at(2026, 12, 31, 23, 59, 30);
        assert_eq!(until_next_minute(now), Duration::from_secs(30));
        assert_eq!(until_next_hour(now), Duration::from_secs(30));
        assert_eq!(until_next_day(now), Duration::from_secs(30));
        assert_eq!(until_next_month(now), Duration::from_secs(30));

        let now = at(2026, 2, 27, 0, 0, 0);
        assert_eq!(until_next_month(now), Duration::from_secs(2 * 86_400));
    }
}
