//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `level` — cache level that served a hit: "L1" or "L2"
//! - `outcome` — admission outcome: "admit" or "deny"
//! - `reason` — denial reason code (e.g. "minute_limit")
//! - `tier` — effort tier (e.g. "minimal", "high")
//! - `store` — backing store name (e.g. "memory", "redis")

/// Total cache hits.
///
/// Labels: `level` ("L1" | "L2").
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total full cache misses (neither level had a fresh entry).
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total L1 entries evicted because their tier TTL elapsed.
pub const CACHE_EXPIRED_TOTAL: &str = "huginn_cache_expired_total";

/// Total admission decisions.
///
/// Labels: `outcome` ("admit" | "deny"), `reason` (deny only).
pub const ADMISSIONS_TOTAL: &str = "huginn_admissions_total";

/// Total effort tier selections.
///
/// Labels: `tier`.
pub const EFFORT_SELECTIONS_TOTAL: &str = "huginn_effort_selections_total";

/// Total backend invocations.
///
/// Labels: `backend`, `tier`, `status` ("ok" | "error").
pub const BACKEND_REQUESTS_TOTAL: &str = "huginn_backend_requests_total";

/// Backend call duration in seconds.
///
/// Labels: `backend`, `tier`.
pub const BACKEND_DURATION_SECONDS: &str = "huginn_backend_duration_seconds";

/// Total spend recorded, in micro-dollars (counters are integral).
pub const SPEND_MICRO_USD_TOTAL: &str = "huginn_spend_micro_usd_total";

/// Total content signatures that fell back to hashing the reference string.
pub const SIGNATURE_FALLBACKS_TOTAL: &str = "huginn_signature_fallbacks_total";

/// Total store operation failures (errors and timeouts).
///
/// Labels: `store`, `operation`.
pub const STORE_ERRORS_TOTAL: &str = "huginn_store_errors_total";
