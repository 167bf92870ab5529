//! Per-user rate limits and spend ceilings.
//!
//! [`UsageGuard`] reads counters from an injected
//! [`CounterStore`](crate::store::CounterStore) before a call and increments
//! them after it succeeds. Counters are bucketed by window in their keys:
//!
//! | class       | key suffix            | expires after |
//! |-------------|-----------------------|---------------|
//! | minute      | `minute:{epoch_min}`  | 60 s          |
//! | hour        | `hour:{epoch_hour}`   | 1 h           |
//! | month quota | `month:{yyyymm}`      | 31 days       |
//! | daily cost  | `daycost:{yyyymmdd}`  | 24 h          |
//! | month cost  | `monthcost:{yyyymm}`  | 31 days       |
//!
//! All keys are prefixed `huginn:usage:{user_id}:`. Cost counters hold whole
//! micro-dollars.

pub mod guard;
pub mod limits;
mod windows;

pub use guard::UsageGuard;
pub use limits::{
    Admission, Denial, DenialReason, ResetScope, UsageLimits, UsageStats, micros_to_usd,
    usd_to_micros,
};
