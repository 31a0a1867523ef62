//! External build invocation and artifact lookup

use crate::core::error::PublishError;
use crate::core::traits::BuildRunner;
use crate::package::PACKAGE_EXTENSION;
use crate::security::SafeCommandExecutor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Runs `dotnet publish <solution>`
pub struct DotnetBuildRunner {
    working_dir: PathBuf,
}

impl DotnetBuildRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl BuildRunner for DotnetBuildRunner {
    /// The exit code is logged, not enforced; a failed build surfaces when
    /// no artifact is found.
    async fn build(&self, solution: &Path) -> Result<(), PublishError> {
        let solution_str = solution
            .to_str()
            .ok_or_else(|| PublishError::io(solution, "solution path is not valid UTF-8"))?;

        let executor = SafeCommandExecutor::new(&self.working_dir)
            .map_err(|e| e.into_publish_error("dotnet"))?;

        info!(solution = %solution.display(), "compiling");
        let output = executor
            .execute("dotnet", &["publish", solution_str])
            .await
            .map_err(|e| e.into_publish_error("dotnet"))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(target: "release_publisher::build::dotnet", "{}", line);
        }

        match output.status.code() {
            Some(0) => info!("build finished"),
            code => warn!(
                exit_code = ?code,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "build exited unsuccessfully"
            ),
        }

        Ok(())
    }
}

/// First package file directly under `dir` whose name contains `name_contains`
///
/// Candidates are sorted by file name; subdirectories are not searched.
pub fn locate_artifact(dir: &Path, name_contains: &str) -> Result<PathBuf, PublishError> {
    let not_found = || PublishError::NotFound {
        path: dir.join(format!("*{}*{}", name_contains, PACKAGE_EXTENSION)),
    };

    if !dir.is_dir() {
        return Err(not_found());
    }

    let artifact = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(name_contains) && name.ends_with(PACKAGE_EXTENSION))
        })
        .ok_or_else(not_found)?;

    info!(path = %artifact.display(), "located artifact");
    Ok(artifact)
}
