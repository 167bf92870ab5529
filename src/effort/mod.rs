//! Reasoning-effort selection.
//!
//! - [`EffortSelector`] — weighted heuristic plus deterministic overrides,
//!   returning an [`EffortDecision`] with a human-readable rationale.
//! - [`EffortStats`] — per-tier EMA latency/success estimates fed back from
//!   completed backend calls.
//! - [`EffortKeywords`] — the configurable vocabularies the query score
//!   matches against.

pub mod keywords;
pub mod selector;
pub mod stats;

pub use keywords::EffortKeywords;
pub use selector::{EffortConfig, EffortContext, EffortDecision, EffortSelector};
pub use stats::{EffortStats, TierEstimate};
