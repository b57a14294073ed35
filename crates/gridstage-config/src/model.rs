//! Typed configuration models.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::validate::{ensure_project_dir, parse_digest, parse_octal_mode, parse_timeout_secs};

/// Digest used to fingerprint staged content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256, 64 hex characters.
    #[default]
    Sha256,
    /// SHA-512, 128 hex characters.
    Sha512,
    /// BLAKE3, 64 hex characters.
    Blake3,
}

impl DigestAlgorithm {
    /// Canonical lowercase name, as accepted in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_digest(value)
    }
}

/// Raw configuration document as read from YAML and the environment.
///
/// Every field is optional so the file and the environment can each supply
/// a subset; [`GridConfigDocument::resolve`] applies defaults and validates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfigDocument {
    /// Grid project working directory (the storage root).
    pub project_dir: Option<PathBuf>,
    /// Placement oracle program.
    pub oracle_program: Option<PathBuf>,
    /// Work-creation program.
    pub create_work_program: Option<PathBuf>,
    /// Timeout for external tool calls, in seconds.
    pub tool_timeout_secs: Option<u64>,
    /// Content digest name.
    pub digest: Option<String>,
    /// Octal file mode for staged files, e.g. `"0755"`.
    pub file_mode: Option<String>,
    /// Marker separating the project path from the public download tree.
    pub download_marker: Option<String>,
}

impl GridConfigDocument {
    /// Apply defaults and validate every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `project_dir` is absent and
    /// [`ConfigError::InvalidField`] when any value fails validation.
    pub fn resolve(self) -> ConfigResult<GridConfig> {
        let project_dir = self
            .project_dir
            .ok_or(ConfigError::MissingField {
                field: "project_dir",
            })?;
        ensure_project_dir(&project_dir)?;

        let tool_timeout =
            parse_timeout_secs(self.tool_timeout_secs.unwrap_or(defaults::TOOL_TIMEOUT_SECS))?;
        let digest = self
            .digest
            .as_deref()
            .map(parse_digest)
            .transpose()?
            .unwrap_or_default();
        let file_mode = self
            .file_mode
            .as_deref()
            .map(parse_octal_mode)
            .transpose()?
            .unwrap_or(defaults::FILE_MODE);
        let download_marker = self
            .download_marker
            .unwrap_or_else(|| defaults::DOWNLOAD_MARKER.to_string());
        if download_marker.is_empty() {
            return Err(ConfigError::invalid(
                "download_marker",
                download_marker,
                "must not be empty",
            ));
        }

        Ok(GridConfig {
            project_dir,
            oracle_program: self
                .oracle_program
                .unwrap_or_else(|| PathBuf::from(defaults::ORACLE_PROGRAM)),
            create_work_program: self
                .create_work_program
                .unwrap_or_else(|| PathBuf::from(defaults::CREATE_WORK_PROGRAM)),
            tool_timeout,
            digest,
            file_mode,
            download_marker,
        })
    }
}

/// Validated configuration shared by the staging and submission services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridConfig {
    /// Grid project working directory; every external tool runs here.
    pub project_dir: PathBuf,
    /// Placement oracle program, absolute or relative to `project_dir`.
    pub oracle_program: PathBuf,
    /// Work-creation program, absolute or relative to `project_dir`.
    pub create_work_program: PathBuf,
    /// Upper bound on a single external tool invocation.
    pub tool_timeout: Duration,
    /// Digest used to fingerprint staged content.
    pub digest: DigestAlgorithm,
    /// Mode applied to newly staged files.
    pub file_mode: u32,
    /// Marker separating the project path from the public download tree.
    pub download_marker: String,
}

impl GridConfig {
    /// Configuration rooted at `project_dir` with every other field defaulted.
    ///
    /// No validation is performed; use [`GridConfigDocument::resolve`] for
    /// operator-supplied input.
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            oracle_program: PathBuf::from(defaults::ORACLE_PROGRAM),
            create_work_program: PathBuf::from(defaults::CREATE_WORK_PROGRAM),
            tool_timeout: Duration::from_secs(defaults::TOOL_TIMEOUT_SECS),
            digest: DigestAlgorithm::default(),
            file_mode: defaults::FILE_MODE,
            download_marker: defaults::DOWNLOAD_MARKER.to_string(),
        }
    }

    /// Absolute location of the placement oracle.
    #[must_use]
    pub fn oracle_program_path(&self) -> PathBuf {
        self.project_path(&self.oracle_program)
    }

    /// Absolute location of the work-creation tool.
    #[must_use]
    pub fn create_work_program_path(&self) -> PathBuf {
        self.project_path(&self.create_work_program)
    }

    fn project_path(&self, program: &Path) -> PathBuf {
        if program.is_absolute() {
            program.to_path_buf()
        } else {
            self.project_dir.join(program)
        }
    }
}
