//! # Design
//!
//! - Constant messages; filenames, paths and captured output travel as fields.
//! - Oracle failures get their own enum so the resolver can be used without the stager.
//! - A content mismatch is never folded into IO: it is its own variant.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for staging operations.
pub type StagingResult<T> = Result<T, StagingError>;

/// Failures reported by the placement oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle program could not be started.
    #[error("placement oracle could not be started")]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The oracle exited with a non-zero status.
    #[error("placement oracle exited unsuccessfully")]
    Failed {
        /// Filename that was being placed.
        filename: String,
        /// Exit code, when the process was not killed by a signal.
        status: Option<i32>,
        /// Captured diagnostic output.
        output: String,
    },
    /// The oracle did not finish within the configured timeout.
    #[error("placement oracle timed out")]
    TimedOut {
        /// Filename that was being placed.
        filename: String,
        /// Timeout that expired.
        timeout: Duration,
    },
    /// The oracle output could not be used as a storage path.
    #[error("placement oracle returned unusable output")]
    Malformed {
        /// Filename that was being placed.
        filename: String,
        /// Raw output, lossily decoded.
        output: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
}

/// Errors produced while staging content.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Resolving the storage path failed.
    #[error("placement lookup failed")]
    Oracle(#[from] OracleError),
    /// Existing content under the same name differs from the content being staged.
    #[error("staged content conflicts with existing file")]
    Consistency {
        /// Content-derived filename that collided.
        filename: String,
        /// Resolved storage path of the existing file.
        path: PathBuf,
    },
    /// IO failures while interacting with the storage tree.
    #[error("staging io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The blocking filesystem task panicked or was cancelled.
    #[error("staging task failed")]
    Task {
        /// Operation the task was performing.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl StagingError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
