//! Orchestration layer for release publishing
//!
//! The build pipeline produces the package; the release publisher decides
//! whether and what to push.

pub mod pipeline;
pub mod publisher;

pub use pipeline::BuildPipeline;
pub use publisher::{PublishOptions, ReleasePublisher};
