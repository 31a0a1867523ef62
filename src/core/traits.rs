//! Core traits and types for release publishing
//!
//! This module defines the package identity, the terminal outcome of a run,
//! and the collaborator seams (source checkout, dependency download, build,
//! registry push) the orchestrator is assembled from.

use crate::core::error::PublishError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Versions
// ============================================================================

/// Split a version into its base and optional suffix at the first `-`
///
/// # Examples
///
/// ```
/// use release_publisher::core::split_version;
///
/// assert_eq!(split_version("1.2.3-stg"), ("1.2.3", Some("stg")));
/// assert_eq!(split_version("1.2.3"), ("1.2.3", None));
/// ```
pub fn split_version(version: &str) -> (&str, Option<&str>) {
    match version.split_once('-') {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (version, None),
    }
}

// ============================================================================
// Package Identity
// ============================================================================

/// Package id and full version read from an artifact's manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
    id: String,
    version: String,
}

impl PackageIdentity {
    /// Create an identity; both parts must be non-empty
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let version = version.into();
        if id.trim().is_empty() || version.trim().is_empty() {
            return None;
        }
        Some(Self { id, version })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Version with any `-suffix` removed
    pub fn base_version(&self) -> &str {
        split_version(&self.version).0
    }

    /// Prerelease suffix without the leading `-`
    pub fn suffix(&self) -> Option<&str> {
        split_version(&self.version).1
    }

    pub fn is_suffixed(&self) -> bool {
        self.suffix().is_some()
    }

    /// Identity of the promoted (base-version) package
    pub fn promoted(&self) -> Self {
        Self {
            id: self.id.clone(),
            version: self.base_version().to_string(),
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Why a run ended without pushing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A version sharing the base version is already on the registry
    Duplicate { existing: String },
    /// Dry-run mode; everything up to the push was performed
    DryRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { existing } => write!(f, "duplicate of published {}", existing),
            Self::DryRun => write!(f, "dry-run"),
        }
    }
}

/// Terminal result of one orchestration run
#[derive(Debug)]
pub enum PublishOutcome {
    Skipped {
        identity: PackageIdentity,
        reason: SkipReason,
    },
    Published {
        identity: PackageIdentity,
        artifact: PathBuf,
    },
    Failed(PublishError),
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Process exit status: skips are successes
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Uploads a package archive to the target registry
#[async_trait]
pub trait PackagePusher: Send + Sync {
    /// Registry name used in log output
    fn name(&self) -> &str;

    /// Push the artifact; any error (auth, network, conflict) is returned
    async fn push(&self, artifact: &Path) -> Result<(), PublishError>;
}

/// Obtains a working copy of a source tree
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn clone_repository(
        &self,
        url: &str,
        branch: &str,
        dest: &Path,
    ) -> Result<(), PublishError>;
}

/// Downloads a third-party dependency archive and unpacks it
#[async_trait]
pub trait DependencyFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), PublishError>;
}

/// Runs the external build and waits for it to exit
#[async_trait]
pub trait BuildRunner: Send + Sync {
    async fn build(&self, solution: &Path) -> Result<(), PublishError>;
}
