//! The expensive visual-analysis capability this crate gates.
//!
//! Huginn never performs analysis itself. Implement [`AnalysisBackend`] over
//! whatever multimodal model client you use and hand it to
//! [`HuginnBuilder::backend`](crate::HuginnBuilder::backend).
//!
//! # Error semantics
//!
//! Errors are propagated to the caller verbatim. Huginn never retries a
//! backend call, and a failed call leaves no cache entry and no usage
//! charge behind.
//!
//! # Example
//!
//! ```ignore
//! struct MyVision { client: VisionClient }
//!
//! #[async_trait]
//! impl AnalysisBackend for MyVision {
//!     fn name(&self) -> &str { "my-vision" }
//!
//!     async fn analyze(&self, image: &ImageRef, query: &str, effort: EffortTier)
//!         -> Result<BackendOutput>
//!     {
//!         let reply = self.client.ask(image.reference(), query, effort.as_str()).await
//!             .map_err(|e| HuginnError::Backend(e.to_string()))?;
//!         Ok(BackendOutput { text: reply.text, processing_time: reply.elapsed,
//!                            model: reply.model, cost_usd: reply.cost })
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::Result;
use crate::types::{BackendOutput, EffortTier, ImageRef};

/// Visual-analysis capability invoked on a cache miss.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Backend name for logging/metrics.
    fn name(&self) -> &str;

    /// Analyse one image at the given effort tier.
    async fn analyze(
        &self,
        image: &ImageRef,
        query: &str,
        effort: EffortTier,
    ) -> Result<BackendOutput>;
}
