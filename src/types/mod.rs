//! Public types for the Huginn API.

mod request;
mod response;
mod tier;

pub use request::{AnalysisRequest, AnalysisType, DetailLevel, ImageRef, ImageSource};
pub use response::{AnalysisResponse, BackendOutput, CacheLevel, CacheMeta};
pub use tier::{ComplexityTier, EffortTier};
