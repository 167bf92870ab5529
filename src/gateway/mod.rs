//! Gateway implementations

mod builder;
mod vision;

pub use builder::{Huginn, HuginnBuilder};
pub use vision::VisionGateway;
