//! Request and identifier types for work-unit submission.
//!
//! # Design
//! - The seed is a tagged choice; loose caller input is converted through
//!   [`SeedSource::from_parts`], which rejects both/neither before any side effect.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{SubmitError, SubmitResult};

/// Where the seed for a work unit comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    /// Raw seed bytes, staged under the `input` prefix.
    Inline(Vec<u8>),
    /// A path that has already been staged; passed through unchecked.
    Staged(PathBuf),
}

impl SeedSource {
    /// Build a seed source from optional caller inputs.
    ///
    /// Empty contents and empty paths count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Configuration`] when both or neither are given.
    pub fn from_parts(contents: Option<Vec<u8>>, path: Option<PathBuf>) -> SubmitResult<Self> {
        let contents = contents.filter(|bytes| !bytes.is_empty());
        let path = path.filter(|path| !path.as_os_str().is_empty());
        match (contents, path) {
            (Some(_), Some(_)) => Err(SubmitError::Configuration {
                field: "seed",
                reason: "only one of seed contents and seed path may be given",
            }),
            (None, None) => Err(SubmitError::Configuration {
                field: "seed",
                reason: "no seed was given",
            }),
            (Some(bytes), None) => Ok(Self::Inline(bytes)),
            (None, Some(path)) => Ok(Self::Staged(path)),
        }
    }
}

/// A single request to register distributable work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkRequest {
    /// Application name known to the grid controller.
    pub app_name: String,
    /// Command line the client runs against the seed.
    pub cmdline: String,
    /// Seed input for the work unit.
    pub seed: SeedSource,
}

impl WorkRequest {
    /// Assemble a request.
    #[must_use]
    pub fn new(app_name: impl Into<String>, cmdline: impl Into<String>, seed: SeedSource) -> Self {
        Self {
            app_name: app_name.into(),
            cmdline: cmdline.into(),
            seed,
        }
    }
}

/// Identifier the grid controller assigned to a registered work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkUnitId(pub u64);

impl WorkUnitId {
    /// Raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
