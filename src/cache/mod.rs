//! Result caching subsystem.
//!
//! - [`ResultCache`] — content-addressed two-level cache (process-local L1,
//!   shared L2 over a [`CacheStore`](crate::store::CacheStore)). See
//!   [`result`] module docs for the lookup flow.
//!
//! - [`complexity`] — buckets completed results into a
//!   [`ComplexityTier`](crate::types::ComplexityTier) and maps tiers to TTLs
//!   through [`TtlPolicy`].

pub mod complexity;
pub mod result;

pub use complexity::{TtlPolicy, classify_complexity};
pub use result::{CacheConfig, CacheEntry, CacheHit, ResultCache};
