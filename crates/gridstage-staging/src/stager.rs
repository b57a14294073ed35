//! Idempotent, consistency-checked placement of content under content-derived names.
//!
//! # Design
//! - A file at a resolved path is written at most once and never rewritten.
//! - New content goes to a temp file beside its destination and is published
//!   with a no-clobber rename, so readers never see a partial file and two
//!   concurrent stagers of the same content cannot both write.
//! - Losing that race, or finding the file already present, falls through to
//!   a byte-for-byte comparison; a mismatch is a consistency failure.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gridstage_config::GridConfig;
use gridstage_config::defaults::FILE_MODE;
use gridstage_telemetry::Metrics;
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::digest::{ContentDigest, digest_for};
use crate::error::{StagingError, StagingResult};
use crate::oracle::PlacementOracle;
use crate::resolver::PathResolver;

const TEMP_PREFIX: &str = ".gridstage-";

/// Filename for content with digest `hash_hex` under `prefix`.
#[must_use]
pub fn filename_for(prefix: &str, hash_hex: &str) -> String {
    format!("{prefix}_{hash_hex}")
}

/// Whether a stage call wrote the file or found it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The file did not exist and was written by this call.
    Created,
    /// Identical content was already present; nothing was written.
    AlreadyPresent,
}

impl StageOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyPresent => "reused",
        }
    }
}

/// Result of a staging call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Content-derived filename, `{prefix}_{fingerprint}`.
    pub filename: String,
    /// Hex fingerprint of the content.
    pub fingerprint: String,
    /// Absolute storage path.
    pub path: PathBuf,
    /// Whether this call created the file.
    pub outcome: StageOutcome,
}

enum Placement {
    Written,
    Identical,
    Conflict,
}

/// Writes content into the download tree under content-derived names.
#[derive(Clone)]
pub struct ContentStager {
    resolver: PathResolver,
    digest: Arc<dyn ContentDigest>,
    file_mode: u32,
    metrics: Option<Metrics>,
}

impl ContentStager {
    /// Stager using `resolver` for placement and `digest` for fingerprints.
    #[must_use]
    pub fn new(resolver: PathResolver, digest: Arc<dyn ContentDigest>) -> Self {
        Self {
            resolver,
            digest,
            file_mode: FILE_MODE,
            metrics: None,
        }
    }

    /// Stager configured from `config`, delegating placement to `oracle`.
    #[must_use]
    pub fn from_config(config: &GridConfig, oracle: Arc<dyn PlacementOracle>) -> Self {
        let resolver =
            PathResolver::new(oracle).with_download_marker(config.download_marker.clone());
        Self::new(resolver, digest_for(config.digest)).with_file_mode(config.file_mode)
    }

    /// Mode applied to newly written files.
    #[must_use]
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Record staging outcomes (and oracle lookups) in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.resolver = self.resolver.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Resolver used for placement.
    #[must_use]
    pub const fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Digest used for fingerprints.
    #[must_use]
    pub fn digest(&self) -> &dyn ContentDigest {
        self.digest.as_ref()
    }

    /// Filename `content` would be staged under with `prefix`.
    #[must_use]
    pub fn filename_for_content(&self, prefix: &str, content: &[u8]) -> String {
        filename_for(prefix, &self.digest.hex_digest(content))
    }

    /// Stage `content` under `prefix` and return its absolute path.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Consistency`] when different content already
    /// occupies the derived name, [`StagingError::Oracle`] when placement
    /// fails, and IO variants for filesystem failures.
    pub async fn stage(&self, prefix: &str, content: &[u8]) -> StagingResult<PathBuf> {
        self.stage_detailed(prefix, content)
            .await
            .map(|staged| staged.path)
    }

    /// Stage `content` under `prefix`, reporting whether a write happened.
    ///
    /// # Errors
    ///
    /// See [`Self::stage`].
    pub async fn stage_detailed(&self, prefix: &str, content: &[u8]) -> StagingResult<StagedFile> {
        let result = self.place(prefix, content).await;
        match &result {
            Ok(staged) => self.record(staged.outcome.as_str()),
            Err(_) => self.record("failed"),
        }
        result
    }

    /// Storage path of an artifact already known by `prefix` and digest.
    ///
    /// Nothing is created or checked on disk.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Oracle`] when placement fails.
    pub async fn locate(&self, prefix: &str, hash_hex: &str) -> StagingResult<PathBuf> {
        let filename = filename_for(prefix, hash_hex);
        Ok(self.resolver.resolve(&filename).await?)
    }

    async fn place(&self, prefix: &str, content: &[u8]) -> StagingResult<StagedFile> {
        let fingerprint = self.digest.hex_digest(content);
        let filename = filename_for(prefix, &fingerprint);
        let path = self.resolver.resolve(&filename).await?;

        let target = path.clone();
        let bytes = content.to_vec();
        let mode = self.file_mode;
        let placement = tokio::task::spawn_blocking(move || place_content(&target, &bytes, mode))
            .await
            .map_err(|source| StagingError::Task {
                operation: "stage",
                source,
            })??;

        let outcome = match placement {
            Placement::Written => {
                info!(
                    filename = %filename,
                    path = %path.display(),
                    digest = self.digest.name(),
                    bytes = content.len(),
                    "staged new file"
                );
                StageOutcome::Created
            }
            Placement::Identical => {
                debug!(filename = %filename, path = %path.display(), "content already staged");
                StageOutcome::AlreadyPresent
            }
            Placement::Conflict => {
                warn!(
                    filename = %filename,
                    path = %path.display(),
                    "existing file differs from staged content"
                );
                return Err(StagingError::Consistency { filename, path });
            }
        };

        Ok(StagedFile {
            filename,
            fingerprint,
            path,
            outcome,
        })
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_staged(outcome);
        }
    }
}

fn place_content(path: &Path, content: &[u8], mode: u32) -> StagingResult<Placement> {
    if path
        .try_exists()
        .map_err(|err| StagingError::io("stat", path, err))?
    {
        return compare_existing(path, content);
    }

    let parent = path.parent().ok_or_else(|| {
        StagingError::io(
            "parent",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"),
        )
    })?;
    fs::create_dir_all(parent).map_err(|err| StagingError::io("create_dir", parent, err))?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(parent)
        .map_err(|err| StagingError::io("create_temp", parent, err))?;
    temp.write_all(content)
        .map_err(|err| StagingError::io("write", temp.path(), err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| StagingError::io("sync", temp.path(), err))?;
    set_mode(temp.path(), mode)?;

    match temp.persist_noclobber(path) {
        Ok(_) => Ok(Placement::Written),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
            // Another stager published first; its temp file is dropped here.
            drop(err.file);
            compare_existing(path, content)
        }
        Err(err) => Err(StagingError::io("persist", path, err.error)),
    }
}

fn compare_existing(path: &Path, content: &[u8]) -> StagingResult<Placement> {
    let existing = fs::read(path).map_err(|err| StagingError::io("read", path, err))?;
    if existing == content {
        Ok(Placement::Identical)
    } else {
        Ok(Placement::Conflict)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> StagingResult<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|err| StagingError::io("chmod", path, err))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> StagingResult<()> {
    Ok(())
}
