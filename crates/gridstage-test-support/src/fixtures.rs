//! Test fixtures: temporary grid project trees and helper scripts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gridstage_config::GridConfig;
use tempfile::TempDir;

/// A throwaway grid project directory with `bin/` and `download/` subtrees.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Create the project skeleton.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directories cannot be created.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("gridstage-project-")
            .tempdir()
            .context("failed to create project tempdir")?;
        fs::create_dir_all(dir.path().join("bin")).context("failed to create bin dir")?;
        fs::create_dir_all(dir.path().join("download"))
            .context("failed to create download dir")?;
        Ok(Self { dir })
    }

    /// Project root (the storage root).
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Root of the public download tree.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.root().join("download")
    }

    /// Default configuration rooted at this project.
    #[must_use]
    pub fn config(&self) -> GridConfig {
        GridConfig::new(self.root())
    }

    /// Write an executable shell script to `bin/<name>` and return its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be written or made executable.
    pub fn write_script(&self, name: &str, body: &str) -> Result<PathBuf> {
        write_script(&self.root().join("bin").join(name), body)
    }
}

/// Write `body` as an executable `/bin/sh` script at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written or its mode changed.
pub fn write_script(path: &Path, body: &str) -> Result<PathBuf> {
    let script = format!("#!/bin/sh\n{body}\n");
    fs::write(path, script).with_context(|| format!("failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("failed to chmod {}", path.display()))?;
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_fixture_builds_skeleton() -> Result<()> {
        let project = ProjectFixture::new()?;
        assert!(project.root().join("bin").is_dir());
        assert!(project.download_dir().is_dir());
        assert_eq!(project.config().project_dir, project.root());

        let script = project.write_script("hello", "echo hi")?;
        let contents = fs::read_to_string(&script)?;
        assert!(contents.starts_with("#!/bin/sh\n"));
        Ok(())
    }
}
