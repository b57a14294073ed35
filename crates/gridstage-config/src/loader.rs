//! Configuration loading: optional YAML document overlaid by environment variables.
//!
//! # Design
//! - The file is optional; the environment alone can describe a deployment.
//! - Environment values win over the file so operators can override a shared
//!   document per host.
//! - Lookups go through an injectable function so tests never touch the
//!   process environment.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{GridConfig, GridConfigDocument};

/// Environment variable naming the YAML configuration file.
pub const ENV_CONFIG_FILE: &str = "GRIDSTAGE_CONFIG";
/// Environment variable overriding the project directory.
pub const ENV_PROJECT_DIR: &str = "GRIDSTAGE_PROJECT_DIR";
/// Environment variable overriding the placement oracle program.
pub const ENV_ORACLE_PROGRAM: &str = "GRIDSTAGE_ORACLE_PROGRAM";
/// Environment variable overriding the work-creation program.
pub const ENV_CREATE_WORK_PROGRAM: &str = "GRIDSTAGE_CREATE_WORK_PROGRAM";
/// Environment variable overriding the tool timeout in seconds.
pub const ENV_TOOL_TIMEOUT_SECS: &str = "GRIDSTAGE_TOOL_TIMEOUT_SECS";
/// Environment variable overriding the content digest.
pub const ENV_DIGEST: &str = "GRIDSTAGE_DIGEST";
/// Environment variable overriding the staged file mode.
pub const ENV_FILE_MODE: &str = "GRIDSTAGE_FILE_MODE";

/// Load configuration from `file` (or `GRIDSTAGE_CONFIG`) and the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] when the file cannot be read or parsed, or the
/// merged document fails validation.
pub fn load(file: Option<&Path>) -> ConfigResult<GridConfig> {
    load_with(file, |name| std::env::var(name).ok())
}

/// Load configuration using `lookup` in place of the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] when the file cannot be read or parsed, or the
/// merged document fails validation.
pub fn load_with<F>(file: Option<&Path>, lookup: F) -> ConfigResult<GridConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file = file
        .map(Path::to_path_buf)
        .or_else(|| lookup(ENV_CONFIG_FILE).map(PathBuf::from));

    let mut document = match file {
        Some(path) => read_document(&path)?,
        None => GridConfigDocument::default(),
    };
    apply_env(&mut document, &lookup)?;
    document.resolve()
}

/// Parse a YAML configuration document from disk.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn read_document(path: &Path) -> ConfigResult<GridConfigDocument> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document = if raw.trim().is_empty() {
        GridConfigDocument::default()
    } else {
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };
    debug!(path = %path.display(), "loaded configuration document");
    Ok(document)
}

fn apply_env<F>(document: &mut GridConfigDocument, lookup: &F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(value) = var(ENV_PROJECT_DIR) {
        document.project_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = var(ENV_ORACLE_PROGRAM) {
        document.oracle_program = Some(PathBuf::from(value));
    }
    if let Some(value) = var(ENV_CREATE_WORK_PROGRAM) {
        document.create_work_program = Some(PathBuf::from(value));
    }
    if let Some(value) = var(ENV_TOOL_TIMEOUT_SECS) {
        let secs = value.trim().parse::<u64>().map_err(|_| {
            ConfigError::invalid("tool_timeout_secs", value.clone(), "must be an integer")
        })?;
        document.tool_timeout_secs = Some(secs);
    }
    if let Some(value) = var(ENV_DIGEST) {
        document.digest = Some(value);
    }
    if let Some(value) = var(ENV_FILE_MODE) {
        document.file_mode = Some(value);
    }
    Ok(())
}
