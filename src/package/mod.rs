//! Package archive handling
//!
//! Reading the identity out of a `.nupkg` manifest and rewriting a staging
//! package into its release version.

pub mod identity;
pub mod rewriter;

pub use identity::{extract_identity, is_manifest_entry};
pub use rewriter::strip_suffix;

/// Package archive file extension
pub const PACKAGE_EXTENSION: &str = ".nupkg";
