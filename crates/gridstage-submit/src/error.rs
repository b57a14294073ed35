//! # Design
//!
//! - One error type per submission, with constant messages.
//! - Captured tool output travels verbatim (lossily decoded) as a field for
//!   operator diagnosis.
//! - [`ErrorKind`] flattens the taxonomy so a boundary layer can map caller
//!   misuse, storage inconsistency, and external-tool failures separately.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use gridstage_staging::{StagingError, StagingResult};
use thiserror::Error;

/// Result alias for submission operations.
pub type SubmitResult<T> = Result<T, SubmitError>;

/// Failures running the work-creation tool.
#[derive(Debug, Error)]
pub enum ToolInvocationError {
    /// The tool could not be started.
    #[error("work-creation tool could not be started")]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Setting up or reading the output capture failed.
    #[error("work-creation tool output could not be captured")]
    Capture {
        /// Capture step that failed.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The tool exited with a non-zero status.
    #[error("work-creation tool exited unsuccessfully")]
    Exited {
        /// Exit code, when the process was not killed by a signal.
        status: Option<i32>,
        /// Combined stdout and stderr.
        output: String,
    },
    /// The tool did not finish within the configured timeout and was killed.
    #[error("work-creation tool timed out")]
    TimedOut {
        /// Timeout that expired.
        timeout: Duration,
        /// Output captured before the tool was killed.
        output: String,
    },
}

impl ToolInvocationError {
    /// Captured tool output, when any was collected.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Exited { output, .. } | Self::TimedOut { output, .. } => Some(output),
            Self::Spawn { .. } | Self::Capture { .. } => None,
        }
    }
}

/// Errors produced by a submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The request was invalid; nothing was staged or run.
    #[error("invalid work request")]
    Configuration {
        /// Request field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// Staging the seed or the command line failed.
    #[error("artifact staging failed")]
    Staging {
        /// Artifact being staged (`seed` or `cmdline`).
        artifact: &'static str,
        /// Underlying staging error.
        source: StagingError,
    },
    /// The work-creation tool failed to run to a successful exit.
    #[error("work-creation tool invocation failed")]
    ToolInvocation(#[from] ToolInvocationError),
    /// The tool exited successfully but did not report a work-unit id.
    #[error("work-creation tool output did not contain a work-unit id")]
    ToolProtocol {
        /// Full combined output.
        output: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
}

/// Flat classification of [`SubmitError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied an invalid combination of inputs.
    Configuration,
    /// Same prefix and fingerprint map to divergent content.
    Consistency,
    /// The placement oracle failed or returned unusable output.
    Oracle,
    /// Filesystem failure in the storage tree.
    Storage,
    /// The work-creation tool failed, could not start, or timed out.
    ToolInvocation,
    /// The tool exited successfully without the expected id line.
    ToolProtocol,
}

impl ErrorKind {
    /// Stable label, used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Consistency => "consistency",
            Self::Oracle => "oracle",
            Self::Storage => "storage",
            Self::ToolInvocation => "tool_invocation",
            Self::ToolProtocol => "tool_protocol",
        }
    }

    /// Whether the caller, rather than the system, is at fault.
    #[must_use]
    pub const fn is_caller_error(self) -> bool {
        matches!(self, Self::Configuration)
    }
}

impl SubmitError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Staging { source, .. } => match source {
                StagingError::Consistency { .. } => ErrorKind::Consistency,
                StagingError::Oracle(_) => ErrorKind::Oracle,
                StagingError::Io { .. } | StagingError::Task { .. } => ErrorKind::Storage,
            },
            Self::ToolInvocation(_) => ErrorKind::ToolInvocation,
            Self::ToolProtocol { .. } => ErrorKind::ToolProtocol,
        }
    }

    /// Captured tool output carried by tool failures.
    #[must_use]
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Self::ToolInvocation(err) => err.output(),
            Self::ToolProtocol { output, .. } => Some(output),
            Self::Configuration { .. } | Self::Staging { .. } => None,
        }
    }
}

pub(crate) trait StagingContext<T> {
    fn artifact(self, artifact: &'static str) -> SubmitResult<T>;
}

impl<T> StagingContext<T> for StagingResult<T> {
    fn artifact(self, artifact: &'static str) -> SubmitResult<T> {
        self.map_err(|source| SubmitError::Staging { artifact, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstage_staging::OracleError;

    #[test]
    fn staging_failures_are_classified_by_source() {
        let consistency = SubmitError::Staging {
            artifact: "seed",
            source: StagingError::Consistency {
                filename: "input_00".to_string(),
                path: PathBuf::from("/srv/download/input_00"),
            },
        };
        assert_eq!(consistency.kind(), ErrorKind::Consistency);

        let oracle = SubmitError::Staging {
            artifact: "cmdline",
            source: StagingError::Oracle(OracleError::TimedOut {
                filename: "cmdline_00".to_string(),
                timeout: Duration::from_secs(1),
            }),
        };
        assert_eq!(oracle.kind(), ErrorKind::Oracle);
        assert!(!oracle.kind().is_caller_error());
    }

    #[test]
    fn tool_failures_expose_output() {
        let exited: SubmitError = ToolInvocationError::Exited {
            status: Some(1),
            output: "disk full".to_string(),
        }
        .into();
        assert_eq!(exited.kind(), ErrorKind::ToolInvocation);
        assert_eq!(exited.tool_output(), Some("disk full"));

        let spawn: SubmitError = ToolInvocationError::Spawn {
            program: PathBuf::from("bin/create_work"),
            source: io::Error::other("missing"),
        }
        .into();
        assert_eq!(spawn.tool_output(), None);

        let configuration = SubmitError::Configuration {
            field: "seed",
            reason: "no seed was given",
        };
        assert!(configuration.kind().is_caller_error());
        assert_eq!(configuration.kind().as_str(), "configuration");
    }
}
