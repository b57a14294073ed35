//! Submission pipeline: validate, stage, invoke, parse.

use std::path::PathBuf;
use std::sync::Arc;

use gridstage_staging::ContentStager;
use gridstage_telemetry::Metrics;
use tracing::{info, instrument, warn};

use crate::error::{StagingContext, SubmitError, SubmitResult, ToolInvocationError};
use crate::parse::parse_workunit_id;
use crate::request::{SeedSource, WorkRequest, WorkUnitId};
use crate::tool::{ToolInvocation, WorkCreationTool};

/// Prefix for staged seed content.
pub const SEED_PREFIX: &str = "input";
/// Prefix for staged command-line files.
pub const CMDLINE_PREFIX: &str = "cmdline";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepKind {
    ValidateRequest,
    StageSeed,
    StageCmdline,
    InvokeTool,
    ParseOutput,
}

impl StepKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ValidateRequest => "validate_request",
            Self::StageSeed => "stage_seed",
            Self::StageCmdline => "stage_cmdline",
            Self::InvokeTool => "invoke_tool",
            Self::ParseOutput => "parse_output",
        }
    }
}

/// Registers work units with the grid controller.
#[derive(Clone)]
pub struct JobSubmitter {
    stager: ContentStager,
    tool: Arc<dyn WorkCreationTool>,
    metrics: Option<Metrics>,
}

impl JobSubmitter {
    /// Submitter staging through `stager` and registering through `tool`.
    #[must_use]
    pub fn new(stager: ContentStager, tool: Arc<dyn WorkCreationTool>) -> Self {
        Self {
            stager,
            tool,
            metrics: None,
        }
    }

    /// Record submission outcomes in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Stager used for seeds and command lines.
    #[must_use]
    pub const fn stager(&self) -> &ContentStager {
        &self.stager
    }

    /// Submit from loose caller input, validating the seed choice first.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Configuration`] when both or neither seed forms
    /// are given; otherwise see [`Self::submit`].
    pub async fn submit_parts(
        &self,
        app_name: &str,
        cmdline: &str,
        seed_contents: Option<Vec<u8>>,
        seed_path: Option<PathBuf>,
    ) -> SubmitResult<WorkUnitId> {
        let seed = match SeedSource::from_parts(seed_contents, seed_path) {
            Ok(seed) => seed,
            Err(err) => {
                self.record_failure(StepKind::ValidateRequest, &err);
                return Err(err);
            }
        };
        self.submit(WorkRequest::new(app_name, cmdline, seed)).await
    }

    /// Stage the request's artifacts and register one work unit.
    ///
    /// Not idempotent: every successful call creates a new work unit.
    ///
    /// # Errors
    ///
    /// Returns a [`SubmitError`] classified by [`SubmitError::kind`].
    #[instrument(name = "submit", skip_all, fields(app_name = %request.app_name))]
    pub async fn submit(&self, request: WorkRequest) -> SubmitResult<WorkUnitId> {
        let (step, result) = self.run(request).await;
        match &result {
            Ok(id) => {
                info!(workunit_id = %id, "work unit created");
                self.record("success");
            }
            Err(err) => self.record_failure(step, err),
        }
        result
    }

    async fn run(&self, request: WorkRequest) -> (StepKind, SubmitResult<WorkUnitId>) {
        let WorkRequest {
            app_name,
            cmdline,
            seed,
        } = request;

        if app_name.trim().is_empty() {
            return (
                StepKind::ValidateRequest,
                Err(SubmitError::Configuration {
                    field: "app_name",
                    reason: "application name must not be empty",
                }),
            );
        }

        let seed_path = match seed {
            SeedSource::Inline(bytes) => {
                match self.stager.stage(SEED_PREFIX, &bytes).await.artifact("seed") {
                    Ok(path) => path,
                    Err(err) => return (StepKind::StageSeed, Err(err)),
                }
            }
            SeedSource::Staged(path) => path,
        };

        let cmdline_file = match self.stage_cmdline(&cmdline).await {
            Ok(name) => name,
            Err(err) => return (StepKind::StageCmdline, Err(err)),
        };

        let invocation = ToolInvocation {
            app_name,
            seed_path,
            cmdline_file,
        };
        let output = match self.tool.create_work(&invocation).await {
            Ok(output) => output,
            Err(err) => return (StepKind::InvokeTool, Err(err.into())),
        };

        if !output.success {
            let err = ToolInvocationError::Exited {
                status: output.code,
                output: String::from_utf8_lossy(&output.output).into_owned(),
            };
            return (StepKind::InvokeTool, Err(err.into()));
        }

        let parsed = parse_workunit_id(&output.output).map_err(|violation| {
            SubmitError::ToolProtocol {
                output: String::from_utf8_lossy(&output.output).into_owned(),
                reason: violation.reason(),
            }
        });
        (StepKind::ParseOutput, parsed)
    }

    async fn stage_cmdline(&self, cmdline: &str) -> SubmitResult<String> {
        let path = self
            .stager
            .stage(CMDLINE_PREFIX, cmdline.as_bytes())
            .await
            .artifact("cmdline")?;
        // The tool resolves command-line files through its own storage view.
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| SubmitError::Staging {
                artifact: "cmdline",
                source: gridstage_staging::StagingError::Io {
                    operation: "basename",
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "staged path has no file name",
                    ),
                },
            })
    }

    fn record_failure(&self, step: StepKind, err: &SubmitError) {
        let kind = err.kind();
        warn!(
            step = step.as_str(),
            kind = kind.as_str(),
            error = %err,
            tool_output = err.tool_output().unwrap_or_default(),
            "submission failed"
        );
        self.record(kind.as_str());
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_submission(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gridstage_staging::{OracleError, PathResolver, PlacementOracle, Sha256Digest};
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::error::ErrorKind;
    use crate::tool::ToolOutput;

    struct FlatOracle(PathBuf);

    #[async_trait]
    impl PlacementOracle for FlatOracle {
        async fn place(&self, filename: &str) -> Result<String, OracleError> {
            Ok(self.0.join("download").join(filename).display().to_string())
        }
    }

    struct RecordingTool {
        reply: ToolOutput,
        calls: Mutex<Vec<ToolInvocation>>,
    }

    impl RecordingTool {
        fn new(success: bool, output: &str) -> Self {
            Self {
                reply: ToolOutput {
                    success,
                    code: Some(i32::from(!success)),
                    output: output.as_bytes().to_vec(),
                },
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<ToolInvocation> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl WorkCreationTool for RecordingTool {
        async fn create_work(
            &self,
            invocation: &ToolInvocation,
        ) -> Result<ToolOutput, ToolInvocationError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(invocation.clone());
            Ok(self.reply.clone())
        }
    }

    fn submitter(temp: &TempDir, tool: Arc<RecordingTool>) -> JobSubmitter {
        let resolver = PathResolver::new(Arc::new(FlatOracle(temp.path().to_path_buf())));
        let stager = ContentStager::new(resolver, Arc::new(Sha256Digest));
        JobSubmitter::new(stager, tool)
    }

    #[tokio::test]
    async fn inline_seed_is_staged_and_id_returned() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let tool = Arc::new(RecordingTool::new(true, "created workunit; foo bar, ID 42\n"));
        let submitter = submitter(&temp, tool.clone());

        let id = submitter
            .submit(WorkRequest::new(
                "myapp",
                "run.sh",
                SeedSource::Inline(b"seed".to_vec()),
            ))
            .await?;
        assert_eq!(id, WorkUnitId(42));

        let calls = tool.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.app_name, "myapp");
        assert_eq!(std::fs::read(&call.seed_path)?, b"seed");
        assert!(call.cmdline_file.starts_with("cmdline_"));
        assert!(!call.cmdline_file.contains('/'));
        Ok(())
    }

    #[tokio::test]
    async fn staged_seed_path_is_passed_through() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let tool = Arc::new(RecordingTool::new(true, "created workunit; x, ID 3\n"));
        let submitter = submitter(&temp, tool.clone());

        let seed = PathBuf::from("/already/staged/input_ab");
        submitter
            .submit(WorkRequest::new("app", "cmd", SeedSource::Staged(seed.clone())))
            .await?;
        assert_eq!(tool.calls()[0].seed_path, seed);
        Ok(())
    }

    #[tokio::test]
    async fn empty_app_name_is_a_configuration_error() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let tool = Arc::new(RecordingTool::new(true, "created workunit; x, ID 3\n"));
        let submitter = submitter(&temp, tool.clone());

        let err = submitter
            .submit(WorkRequest::new(" ", "cmd", SeedSource::Inline(b"s".to_vec())))
            .await
            .expect_err("empty app name");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(tool.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_app_name_fails_in_request_validation() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let tool = Arc::new(RecordingTool::new(true, "created workunit; x, ID 3\n"));
        let submitter = submitter(&temp, tool);

        let (step, result) = submitter
            .run(WorkRequest::new("", "cmd", SeedSource::Inline(b"s".to_vec())))
            .await;
        assert_eq!(step, StepKind::ValidateRequest);
        assert_eq!(step.as_str(), "validate_request");
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn metrics_count_outcomes() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let metrics = Metrics::new()?;
        let tool = Arc::new(RecordingTool::new(true, "nothing useful\n"));
        let submitter = submitter(&temp, tool).with_metrics(metrics.clone());

        let err = submitter
            .submit_parts("app", "cmd", Some(b"s".to_vec()), None)
            .await
            .expect_err("no id line");
        assert_eq!(err.kind(), ErrorKind::ToolProtocol);
        let _ = submitter.submit_parts("app", "cmd", None, None).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.submissions_failed, 2);
        assert_eq!(snapshot.submissions_succeeded, 0);
        Ok(())
    }
}
