//! Placement oracle seam.
//!
//! The grid controller decides where a filename lives in its download tree
//! (a directory chosen from a hash of the *name*). That decision is delegated
//! to an external helper; [`PlacementOracle`] abstracts it so tests can use a
//! deterministic fake.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use gridstage_config::GridConfig;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::OracleError;

/// Maps a logical filename to raw placement output.
///
/// Implementations return whatever the oracle printed; validation into a
/// path happens in [`parse_oracle_output`] so every implementation is held to
/// the same contract.
#[async_trait]
pub trait PlacementOracle: Send + Sync {
    /// Ask the oracle where `filename` belongs.
    async fn place(&self, filename: &str) -> Result<String, OracleError>;
}

/// Oracle backed by the grid controller's `dir_hier_path` helper.
#[derive(Debug, Clone)]
pub struct CommandPlacementOracle {
    program: PathBuf,
    project_dir: PathBuf,
    timeout: Duration,
}

impl CommandPlacementOracle {
    /// Build an oracle that runs `program` from `project_dir`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, project_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            project_dir: project_dir.into(),
            timeout,
        }
    }

    /// Build the oracle described by `config`.
    #[must_use]
    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(
            config.oracle_program_path(),
            config.project_dir.clone(),
            config.tool_timeout,
        )
    }

    /// Program invoked for each lookup.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl PlacementOracle for CommandPlacementOracle {
    async fn place(&self, filename: &str) -> Result<String, OracleError> {
        debug!(program = %self.program.display(), filename, "invoking placement oracle");
        let child = Command::new(&self.program)
            .arg(filename)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OracleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| OracleError::TimedOut {
                filename: filename.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| OracleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(OracleError::Failed {
                filename: filename.to_string(),
                status: output.status.code(),
                output: combined,
            });
        }

        String::from_utf8(output.stdout).map_err(|err| OracleError::Malformed {
            filename: filename.to_string(),
            output: String::from_utf8_lossy(err.as_bytes()).into_owned(),
            reason: "output is not valid utf-8",
        })
    }
}

/// Validate raw oracle output as exactly one absolute path line.
///
/// Surrounding whitespace is ignored, as the helper terminates its answer
/// with a newline.
///
/// # Errors
///
/// Returns [`OracleError::Malformed`] for empty output, more than one line,
/// or a relative path.
pub fn parse_oracle_output(filename: &str, raw: &str) -> Result<PathBuf, OracleError> {
    let malformed = |reason: &'static str| OracleError::Malformed {
        filename: filename.to_string(),
        output: raw.to_string(),
        reason,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed("empty output"));
    }
    if trimmed.lines().count() != 1 {
        return Err(malformed("expected exactly one line"));
    }
    let path = PathBuf::from(trimmed);
    if !path.is_absolute() {
        return Err(malformed("path is not absolute"));
    }
    Ok(path)
}
