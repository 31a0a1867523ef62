//! Release publishing for NuGet packages
//!
//! Extracts a package's identity, checks the registry for a published
//! version sharing its base version, promotes staging packages and pushes.

pub mod build;
pub mod core;
pub mod orchestration;
pub mod package;
pub mod registry;
pub mod security;

pub use core::*;
pub use security::{CommandError, SafeCommandExecutor, SecureTokenManager};
