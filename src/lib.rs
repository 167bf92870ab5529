//! Huginn - resource governance for shared visual-analysis backends
//!
//! Visual analysis through a multimodal model is slow and billed per call.
//! This crate sits in front of such a backend and decides, per request:
//!
//! - whether the user may spend anything right now ([`usage`]: per-minute,
//!   per-hour and per-month counts plus per-call, daily and monthly USD
//!   ceilings),
//! - whether a fresh answer already exists ([`cache`]: exact-request L1
//!   plus a content-addressed L2 shared across processes),
//! - how much reasoning effort to buy on a miss ([`effort`]: weighted
//!   heuristic with online latency/success feedback).
//!
//! The backend itself, identity and transport are supplied by the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use huginn::{
//!     AnalysisBackend, AnalysisRequest, BackendOutput, EffortTier, Huginn, ImageRef,
//! };
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl AnalysisBackend for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn analyze(
//!         &self,
//!         _image: &ImageRef,
//!         query: &str,
//!         effort: EffortTier,
//!     ) -> huginn::Result<BackendOutput> {
//!         Ok(BackendOutput {
//!             text: format!("[{effort}] {query}"),
//!             processing_time: std::time::Duration::from_millis(10),
//!             model: "echo-1".into(),
//!             cost_usd: 0.001,
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let gateway = Huginn::builder().backend(Arc::new(Echo)).build()?;
//!
//!     let request = AnalysisRequest::new(
//!         ImageRef::url("https://example.com/chart.png"),
//!         "summarize the trend",
//!     )
//!     .analysis_type("chart");
//!
//!     let response = gateway.analyze("user-42", &request).await?;
//!     println!("{} (cached: {})", response.text, response.is_cached());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod effort;
pub mod error;
pub mod gateway;
pub mod signature;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod usage;

// Re-export main types at crate root
pub use backend::AnalysisBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::HuginnConfig;
pub use effort::{EffortContext, EffortDecision, EffortSelector};
pub use error::{HuginnError, Result};
pub use gateway::{Huginn, HuginnBuilder, VisionGateway};
pub use signature::{ContentSignature, PerceptualSigner};
pub use usage::{Admission, Denial, DenialReason, ResetScope, UsageGuard, UsageStats};

// Re-export all types
pub use types::{
    AnalysisRequest, AnalysisResponse, AnalysisType, BackendOutput, CacheLevel, CacheMeta,
    ComplexityTier, DetailLevel, EffortTier, ImageRef, ImageSource,
};
