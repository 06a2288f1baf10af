//! Script-backed document manager
//!
//! Delegates document creation, legacy publishing and service removal to an
//! external helper script run through [`SafeCommandExecutor`]. The helper is
//! invoked as `<interpreter> <script> <operation> --<key> <value> ...`; exit
//! code 0 reports success and stdout carries the result text.
//!
//! Connection-file publishing runs the caller's own publishing script, and
//! file geodatabase removal is done in-process.

use crate::core::config::HelperConfig;
use crate::core::traits::{
    ConnectionFilePublishArgs, CreateDocumentArgs, DocumentManager, DocumentManagerFactory,
    LegacyPublishArgs, UnpublishArgs,
};
use crate::security::command_executor::{CommandError, SafeCommandExecutor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use walkdir::WalkDir;

pub const DEFAULT_INTERPRETER: &str = "python";

/// Outcome of one helper process
#[derive(Debug, Clone)]
struct ScriptOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl From<Output> for ScriptOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

impl ScriptOutput {
    /// Result text: stdout on success, an error text otherwise
    fn into_text(self, operation: &str) -> String {
        if self.success {
            return self.stdout;
        }

        let detail = if self.stderr.is_empty() {
            self.stdout
        } else {
            self.stderr
        };
        if detail.is_empty() {
            format!("Error: {} script failed.", operation)
        } else {
            format!("Error: {}", detail)
        }
    }
}

/// Document manager driving an external helper script
pub struct ScriptDocumentManager {
    executor: SafeCommandExecutor,
    interpreter: String,
    script: Option<String>,
    initialized: bool,
}

impl ScriptDocumentManager {
    pub fn new(executor: SafeCommandExecutor, config: &HelperConfig) -> Self {
        Self {
            executor,
            interpreter: config
                .interpreter
                .clone()
                .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
            script: config.script.clone(),
            initialized: false,
        }
    }

    async fn run_script(&self, script: &str, args: &[String]) -> Result<ScriptOutput, CommandError> {
        let mut argv: Vec<&str> = Vec::with_capacity(args.len() + 1);
        argv.push(script);
        argv.extend(args.iter().map(String::as_str));

        let output = self.executor.execute(&self.interpreter, &argv).await?;
        Ok(ScriptOutput::from(output))
    }

    async fn run_helper(
        &self,
        operation: &str,
        options: &[(&str, String)],
    ) -> anyhow::Result<ScriptOutput> {
        let Some(script) = &self.script else {
            anyhow::bail!("no helper script configured");
        };

        let mut args = vec![operation.to_string()];
        args.extend(flags(options));

        let output = self.run_script(script, &args).await?;
        tracing::debug!(operation, success = output.success, "helper script finished");
        Ok(output)
    }
}

fn flags(options: &[(&str, String)]) -> Vec<String> {
    options
        .iter()
        .flat_map(|(key, value)| [format!("--{}", key), value.clone()])
        .collect()
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl DocumentManager for ScriptDocumentManager {
    fn name(&self) -> &str {
        "script"
    }

    async fn initialize(&mut self, template_path: &str) -> anyhow::Result<bool> {
        self.initialized = false;

        if !self.executor.is_allowed(&self.interpreter) {
            tracing::warn!(interpreter = %self.interpreter, "interpreter is not whitelisted");
            return Ok(false);
        }

        let Some(script) = &self.script else {
            tracing::warn!("no helper script configured");
            return Ok(false);
        };
        if tokio::fs::metadata(script).await.is_err() {
            tracing::warn!(script = %script, "helper script not found");
            return Ok(false);
        }

        if !template_path.is_empty() && tokio::fs::metadata(template_path).await.is_err() {
            tracing::warn!(template = %template_path, "template not found");
            return Ok(false);
        }

        self.initialized = true;
        Ok(true)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn create_document(&self, args: &CreateDocumentArgs<'_>) -> anyhow::Result<bool> {
        let output = self
            .run_helper(
                "create",
                &[
                    ("template", args.template_path.to_string()),
                    ("output-dir", args.output_directory.to_string()),
                    ("server", args.server.to_string()),
                    ("working-path", path_arg(args.working_path)),
                    ("connection", args.connection.to_string()),
                    ("dataset", args.dataset.to_string()),
                    ("enterprise", args.enterprise.to_string()),
                ],
            )
            .await?;

        if !output.success {
            tracing::warn!(stderr = %output.stderr, "create script failed");
        }
        Ok(output.success)
    }

    async fn publish_v1(&self, args: &LegacyPublishArgs<'_>) -> anyhow::Result<String> {
        let capacity = args.capacity;
        let output = self
            .run_helper(
                "publish",
                &[
                    ("name", args.name.to_string()),
                    ("server", args.server.to_string()),
                    ("working-path", path_arg(args.working_path)),
                    ("enterprise", args.enterprise.to_string()),
                    ("min-instances", capacity.min_instances.to_string()),
                    ("max-instances", capacity.max_instances.to_string()),
                    ("wait-timeout", capacity.wait_timeout.to_string()),
                    ("usage-timeout", capacity.usage_timeout.to_string()),
                    ("idle-timeout", capacity.idle_timeout.to_string()),
                ],
            )
            .await?;

        Ok(output.into_text("publish"))
    }

    async fn publish_v2(&self, args: &ConnectionFilePublishArgs<'_>) -> anyhow::Result<String> {
        let options = [
            ("name", args.name.to_string()),
            ("server", args.server.to_string()),
            ("working-path", path_arg(args.working_path)),
            ("output-dir", args.output_directory.to_string()),
            ("connection-file", args.connection_file.to_string()),
        ];

        let output = self.run_script(args.script_file, &flags(&options)).await?;
        Ok(output.into_text("publishing"))
    }

    async fn unpublish(&self, args: &UnpublishArgs<'_>) -> anyhow::Result<bool> {
        let output = self
            .run_helper(
                "unpublish",
                &[
                    ("name", args.name.to_string()),
                    ("server", args.server.to_string()),
                    ("output-dir", args.output_directory.to_string()),
                    ("dataset", args.dataset.to_string()),
                    ("connection", args.connection.to_string()),
                ],
            )
            .await?;

        Ok(output.success)
    }

    async fn delete_storage(&self, connection: &str) -> anyhow::Result<String> {
        let path = self.executor.working_dir().join(connection);
        if !tokio::fs::try_exists(&path).await? {
            tracing::debug!(connection, "storage already gone");
            return Ok(String::new());
        }

        let is_dir = tokio::fs::metadata(&path).await?.is_dir();
        if !is_dir || path.extension().is_none_or(|ext| ext != "gdb") {
            tracing::warn!(connection, "refusing to delete storage that is not a file geodatabase");
            return Ok(format!(
                "Error: {} is not a file geodatabase and was not deleted.",
                connection
            ));
        }

        let locks = lock_files(&path);
        if !locks.is_empty() {
            tracing::warn!(connection, locks = locks.len(), "storage is locked");
            return Ok(format!(
                "Error: {} is locked by {} lock file(s) and was not deleted.",
                connection,
                locks.len()
            ));
        }

        tokio::fs::remove_dir_all(&path).await?;
        tracing::info!(connection, path = %path.display(), "file geodatabase deleted");
        Ok(format!("Deleted {}.", connection))
    }

    fn release(&mut self) {
        self.initialized = false;
    }
}

/// `*.lock` files anywhere below `root`
fn lock_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "lock"))
        .map(|entry| entry.into_path())
        .collect()
}

/// Creates one [`ScriptDocumentManager`] per workflow invocation
#[derive(Debug, Clone)]
pub struct ScriptManagerFactory {
    executor: SafeCommandExecutor,
    config: HelperConfig,
}

impl ScriptManagerFactory {
    /// Build a factory running scripts from `working_dir`
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if `working_dir` does not exist.
    pub fn new<P: AsRef<Path>>(config: HelperConfig, working_dir: P) -> Result<Self, CommandError> {
        let mut executor = SafeCommandExecutor::new(working_dir)?;

        if let Some(allowed) = &config.allowed_interpreters {
            executor = executor.with_allowed_commands(allowed.clone());
        }
        if let Some(seconds) = config.timeout_seconds
            && seconds > 0
        {
            executor.set_timeout(Duration::from_secs(seconds));
        }

        Ok(Self { executor, config })
    }
}

impl DocumentManagerFactory for ScriptManagerFactory {
    fn create(&self) -> Box<dyn DocumentManager> {
        Box::new(ScriptDocumentManager::new(
            self.executor.clone(),
            &self.config,
        ))
    }
}
