//! Error handling for release publishing
//!
//! This module provides the error taxonomy shared by the extractor, the
//! registry client, the rewriter and the orchestrator, with recovery guidance
//! using the thiserror crate.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for release publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Local file errors
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed artifact {}: {reason}", path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    #[error("I/O failure on {}: {message}", path.display())]
    IoFailure { path: PathBuf, message: String },

    // Registry errors
    #[error("malformed registry response from {url}: {reason}")]
    MalformedIndex { url: String, reason: String },

    #[error("registry unreachable at {url}: {message}")]
    RegistryUnreachable { url: String, message: String },

    #[error("registry rejected the push (HTTP {status}): {message}")]
    PushRejected { status: u16, message: String },

    #[error("download of {url} failed: {message}")]
    DownloadFailed { url: String, message: String },

    // Credential errors
    #[error("API key environment variable {variable} is not set")]
    TokenMissing { variable: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    ConfigError(String),

    // Command execution errors
    #[error("command `{command}` failed: {message}")]
    CommandError { command: String, message: String },

    // State errors
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl PublishError {
    /// Build an `IoFailure` from any displayable error
    pub fn io(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self::IoFailure {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Build a `RegistryUnreachable` from any displayable error
    pub fn unreachable(url: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::RegistryUnreachable {
            url: url.into(),
            message: error.to_string(),
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::MalformedArtifact { .. } => "MALFORMED_ARTIFACT",
            Self::IoFailure { .. } => "IO_FAILURE",
            Self::MalformedIndex { .. } => "MALFORMED_INDEX",
            Self::RegistryUnreachable { .. } => "REGISTRY_UNREACHABLE",
            Self::PushRejected { .. } => "PUSH_REJECTED",
            Self::TokenMissing { .. } => "TOKEN_MISSING",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::DownloadFailed { .. } => "DOWNLOAD_FAILED",
            Self::CommandError { .. } => "COMMAND_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::NotFound { .. } => vec![
                "Check that the build produced a package in the output directory",
                "Check the artifact path passed on the command line",
            ],
            Self::MalformedArtifact { .. } => vec![
                "Check that the file is a valid package archive",
                "Check that the manifest contains <id> and <version>",
            ],
            Self::IoFailure { .. } => vec![
                "Check file permissions and free disk space",
                "Remove any partially written package before retrying",
            ],
            Self::MalformedIndex { .. } => vec![
                "Check that the registry URL points at a v3 service index",
                "Open the service index in a browser and inspect its resources",
            ],
            Self::RegistryUnreachable { .. } => vec![
                "Check your internet connection",
                "Check the registry status page and try again later",
            ],
            Self::PushRejected { status, .. } => match status {
                401 | 403 => vec![
                    "Check that the API key is valid and not expired",
                    "Check that the key is scoped to push this package id",
                ],
                409 => vec!["Bump the package version; this version already exists"],
                _ => vec!["Read the registry response message for details"],
            },
            Self::DownloadFailed { .. } => vec![
                "Check dependency.urlBase and dependency.archive in the configuration",
                "Check that the archive exists for the descriptor's package kind",
            ],
            Self::TokenMissing { .. } => {
                vec!["Set the API key environment variable (default: NUGETKEY)"]
            }
            Self::ConfigError(_) => vec!["Check .release-publisher.yaml"],
            Self::CommandError { .. } => vec![
                "Check the command output",
                "Check that git and dotnet are installed and on PATH",
            ],
            Self::InvalidTransition { .. } => vec!["Report this as a bug"],
        }
    }
}
