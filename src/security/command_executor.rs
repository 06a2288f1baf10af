//! SafeCommandExecutor: whitelisted execution of publishing scripts
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only approved interpreters can execute
//! - **Injection prevention**: Arguments are passed as a vector, never through a shell
//! - **Working directory validation**: Validates existence before execution
//! - **Timeout control**: Optional limit on how long a script may run
//!
//! # Example
//!
//! ```rust,no_run
//! use mapservice_publisher::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! executor.set_timeout(Duration::from_secs(300));
//!
//! let output = executor.execute("python", &["publish.py", "--help"]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Interpreters allowed when no explicit whitelist is configured
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &["python", "python3", "propy"];

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

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    working_dir: PathBuf,
    timeout: Option<Duration>,
    allowed_commands: Vec<String>,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.exists() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
            allowed_commands: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        })
    }

    /// Replace the command whitelist
    pub fn with_allowed_commands(mut self, allowed_commands: Vec<String>) -> Self {
        self.allowed_commands = allowed_commands;
        self
    }

    /// Set command execution timeout.
    ///
    /// Commands exceeding this duration are killed.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Directory commands run in; relative paths resolve against it
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        self.allowed_commands.iter().any(|c| c == command)
    }

    /// Execute a whitelisted command and capture its output.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    /// - `CommandError::Timeout` - Command ran longer than the configured timeout
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        if !self.is_allowed(command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        tracing::debug!(command, ?args, "executing command");

        let mut child = Command::new(command);
        child
            .args(args)
            .current_dir(&self.working_dir)
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.output())
                .await
                .map_err(|_| CommandError::Timeout(limit))?,
            None => child.output().await,
        };

        output.map_err(|e| CommandError::ExecutionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_dir() -> PathBuf {
        std::env::temp_dir()
    }

    #[tokio::test]
    async fn test_rejected_command_rm() {
        let executor = SafeCommandExecutor::new(get_test_dir()).unwrap();
        let result = executor.execute("rm", &["-rf", "/"]).await;
        assert!(
            matches!(result, Err(CommandError::CommandNotAllowed(_))),
            "rm should be rejected as not in whitelist"
        );
    }

    #[test]
    fn test_default_whitelist() {
        let executor = SafeCommandExecutor::new(get_test_dir()).unwrap();
        assert!(executor.is_allowed("python"));
        assert!(executor.is_allowed("propy"));
        assert!(!executor.is_allowed("sh"));
    }

    #[test]
    fn test_invalid_working_directory() {
        let result = SafeCommandExecutor::new("/nonexistent/directory/that/does/not/exist");
        assert!(
            matches!(result, Err(CommandError::InvalidWorkingDirectory(_))),
            "Should reject non-existent working directory"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_capture() {
        let executor = SafeCommandExecutor::new(get_test_dir())
            .unwrap()
            .with_allowed_commands(vec!["echo".to_string()]);

        let output = executor.execute("echo", &["hello; rm -rf /"]).await.unwrap();

        assert_eq!(output.status.code(), Some(0));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello; rm -rf /\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_with_timeout() {
        let mut executor = SafeCommandExecutor::new(get_test_dir())
            .unwrap()
            .with_allowed_commands(vec!["sleep".to_string()]);
        executor.set_timeout(Duration::from_millis(100));

        let result = executor.execute("sleep", &["5"]).await;
        assert!(matches!(result, Err(CommandError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let executor = SafeCommandExecutor::new(get_test_dir())
            .unwrap()
            .with_allowed_commands(vec!["definitely-not-a-real-binary".to_string()]);

        let result = executor.execute("definitely-not-a-real-binary", &[]).await;
        assert!(matches!(result, Err(CommandError::ExecutionFailed(_))));
    }
}
