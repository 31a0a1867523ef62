//! Source checkout via `git`

use crate::core::error::PublishError;
use crate::core::traits::SourceFetcher;
use crate::security::SafeCommandExecutor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Clones a repository with the `git` command line
pub struct GitSourceFetcher {
    working_dir: PathBuf,
}

impl GitSourceFetcher {
    /// Run `git` from `working_dir`; relative destinations resolve against it
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

/// Arguments for a single-branch clone of `url` into `dest`
pub(crate) fn clone_args<'a>(url: &'a str, branch: &'a str, dest: &'a str) -> Vec<&'a str> {
    vec!["clone", "--branch", branch, "--single-branch", url, dest]
}

#[async_trait]
impl SourceFetcher for GitSourceFetcher {
    async fn clone_repository(
        &self,
        url: &str,
        branch: &str,
        dest: &Path,
    ) -> Result<(), PublishError> {
        let dest_str = dest
            .to_str()
            .ok_or_else(|| PublishError::io(dest, "destination path is not valid UTF-8"))?;

        let executor = SafeCommandExecutor::new(&self.working_dir)
            .map_err(|e| e.into_publish_error("git"))?;

        info!(url, branch, dest = %dest.display(), "cloning source");
        let output = executor
            .execute("git", &clone_args(url, branch, dest_str))
            .await
            .map_err(|e| e.into_publish_error("git"))?;

        if !output.status.success() {
            return Err(PublishError::CommandError {
                command: "git clone".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
