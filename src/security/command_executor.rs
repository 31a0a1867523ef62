//! SafeCommandExecutor: whitelisted external command execution
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only `git` and `dotnet` can execute
//! - **Injection prevention**: Uses `tokio::process::Command`, arguments are never
//!   interpolated into a shell string
//! - **Working directory validation**: Validates existence before execution
//!
//! # Example
//!
//! ```rust,no_run
//! use release_publisher::security::SafeCommandExecutor;
//!
//! # async fn demo() {
//! let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
//! let output = executor.execute("git", &["--version"]).await.unwrap();
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # }
//! ```

use crate::core::error::PublishError;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Allowed commands whitelist.
const ALLOWED_COMMANDS: &[&str] = &["git", "dotnet"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
}

impl CommandError {
    /// Convert into a `PublishError` for `command`
    pub fn into_publish_error(self, command: &str) -> PublishError {
        PublishError::CommandError {
            command: command.to_string(),
            message: self.to_string(),
        }
    }
}

/// Safe command executor with a fixed working directory
#[derive(Debug)]
pub struct SafeCommandExecutor {
    working_dir: PathBuf,
}

impl SafeCommandExecutor {
    /// Create an executor; the working directory must exist.
    ///
    /// # Example
    ///
    /// ```rust
    /// use release_publisher::security::SafeCommandExecutor;
    ///
    /// let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
    /// assert!(executor.working_dir().exists());
    /// ```
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self { working_dir })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Execute a whitelisted command and capture its output.
    ///
    /// The exit status is returned as part of the output; a non-zero status is
    /// not an error here.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        if !ALLOWED_COMMANDS.contains(&command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        debug!(command, ?args, dir = %self.working_dir.display(), "executing");

        Command::new(command)
            .args(args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))
    }
}
