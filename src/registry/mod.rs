//! NuGet v3 registry access
//!
//! Service index discovery, published-version lookups and package push.

pub mod client;
pub mod index;
pub mod versions;

pub use client::NuGetRegistry;
pub use index::{normalize_index_url, RegistryEndpoint, ServiceIndex};
pub use versions::find_collision;
