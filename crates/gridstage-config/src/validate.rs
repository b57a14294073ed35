//! Validation helpers and parsing utilities for configuration values.

use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::model::DigestAlgorithm;

/// Highest mode accepted for staged files (permission and special bits).
const MAX_FILE_MODE: u32 = 0o7777;

/// Parse an octal mode written as `755`, `0755` or `0o755`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not octal or
/// exceeds `0o7777`.
pub fn parse_octal_mode(value: &str) -> ConfigResult<u32> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| ConfigError::invalid("file_mode", value, "must be an octal mode"))?;
    if mode > MAX_FILE_MODE {
        return Err(ConfigError::invalid(
            "file_mode",
            value,
            "must not exceed 0o7777",
        ));
    }
    Ok(mode)
}

/// Convert a timeout in seconds into a non-zero [`Duration`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for a zero timeout.
pub fn parse_timeout_secs(secs: u64) -> ConfigResult<Duration> {
    if secs == 0 {
        return Err(ConfigError::invalid(
            "tool_timeout_secs",
            secs.to_string(),
            "must be greater than zero",
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Parse a digest name (case-insensitive).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for unknown digests.
pub fn parse_digest(value: &str) -> ConfigResult<DigestAlgorithm> {
    match value.trim().to_ascii_lowercase().as_str() {
        "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
        "sha512" | "sha-512" => Ok(DigestAlgorithm::Sha512),
        "blake3" => Ok(DigestAlgorithm::Blake3),
        _ => Err(ConfigError::invalid(
            "digest",
            value,
            "must be one of sha256, sha512, blake3",
        )),
    }
}

/// Ensure the project directory is absolute and exists.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the path is relative or is not
/// an existing directory.
pub fn ensure_project_dir(path: &Path) -> ConfigResult<()> {
    if !path.is_absolute() {
        return Err(ConfigError::invalid(
            "project_dir",
            path.display().to_string(),
            "must be an absolute path",
        ));
    }
    if !path.is_dir() {
        return Err(ConfigError::invalid(
            "project_dir",
            path.display().to_string(),
            "must be an existing directory",
        ));
    }
    Ok(())
}
