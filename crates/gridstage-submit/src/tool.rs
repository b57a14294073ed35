//! Work-creation tool seam.

use std::ffi::OsString;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use gridstage_config::GridConfig;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ToolInvocationError;

/// Arguments for one work-creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Application the work unit belongs to.
    pub app_name: String,
    /// Seed path, as staged or as supplied by the caller.
    pub seed_path: PathBuf,
    /// Basename of the staged command-line file.
    pub cmdline_file: String,
}

impl ToolInvocation {
    /// Command-line arguments understood by `create_work`.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        vec![
            OsString::from("--appname"),
            OsString::from(&self.app_name),
            OsString::from("--verbose"),
            self.seed_path.clone().into_os_string(),
            OsString::from(&self.cmdline_file),
        ]
    }
}

/// What the tool did: its exit status and combined output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Whether the tool exited successfully.
    pub success: bool,
    /// Exit code, when the process was not killed by a signal.
    pub code: Option<i32>,
    /// Combined stdout and stderr, in the order written.
    pub output: Vec<u8>,
}

/// Registers work with the grid controller.
#[async_trait]
pub trait WorkCreationTool: Send + Sync {
    /// Run the tool once and report its exit status and output.
    ///
    /// A non-zero exit is not an error at this level; the submitter
    /// classifies it.
    async fn create_work(&self, invocation: &ToolInvocation)
    -> Result<ToolOutput, ToolInvocationError>;
}

/// Tool backed by the grid controller's `create_work` program.
#[derive(Debug, Clone)]
pub struct CommandWorkCreationTool {
    program: PathBuf,
    project_dir: PathBuf,
    timeout: Duration,
}

impl CommandWorkCreationTool {
    /// Tool that runs `program` from `project_dir`, killed after `timeout`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, project_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            project_dir: project_dir.into(),
            timeout,
        }
    }

    /// Tool described by `config`.
    #[must_use]
    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(
            config.create_work_program_path(),
            config.project_dir.clone(),
            config.tool_timeout,
        )
    }

    /// Program invoked for each submission.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl WorkCreationTool for CommandWorkCreationTool {
    async fn create_work(
        &self,
        invocation: &ToolInvocation,
    ) -> Result<ToolOutput, ToolInvocationError> {
        // stdout and stderr share one file so their interleaving is preserved.
        let capture = tempfile::tempfile().map_err(|source| ToolInvocationError::Capture {
            operation: "create",
            source,
        })?;
        let stdout = clone_capture(&capture)?;
        let stderr = clone_capture(&capture)?;

        debug!(
            program = %self.program.display(),
            app_name = %invocation.app_name,
            seed_path = %invocation.seed_path.display(),
            cmdline_file = %invocation.cmdline_file,
            "invoking work-creation tool"
        );
        let mut child = Command::new(&self.program)
            .args(invocation.args())
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolInvocationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let waited = timeout(self.timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status.map_err(|source| ToolInvocationError::Capture {
                operation: "wait",
                source,
            })?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "work-creation tool timed out; killing it");
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill timed out work-creation tool");
                }
                let output = read_capture(capture).await.unwrap_or_default();
                return Err(ToolInvocationError::TimedOut {
                    timeout: self.timeout,
                    output: String::from_utf8_lossy(&output).into_owned(),
                });
            }
        };

        let output = read_capture(capture).await?;
        Ok(ToolOutput {
            success: status.success(),
            code: status.code(),
            output,
        })
    }
}

fn clone_capture(capture: &std::fs::File) -> Result<std::fs::File, ToolInvocationError> {
    capture
        .try_clone()
        .map_err(|source| ToolInvocationError::Capture {
            operation: "clone",
            source,
        })
}

async fn read_capture(capture: std::fs::File) -> Result<Vec<u8>, ToolInvocationError> {
    let read_failed = |source: std::io::Error| ToolInvocationError::Capture {
        operation: "read",
        source,
    };
    let mut file = tokio::fs::File::from_std(capture);
    file.seek(SeekFrom::Start(0)).await.map_err(read_failed)?;
    let mut output = Vec::new();
    file.read_to_end(&mut output).await.map_err(read_failed)?;
    Ok(output)
}
