//! Deterministic stand-ins for the grid controller's helper programs.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gridstage_staging::{ContentDigest, OracleError, PlacementOracle};
use gridstage_submit::{ToolInvocation, ToolInvocationError, ToolOutput, WorkCreationTool};
use sha2::{Digest as _, Sha256};

/// Oracle mimicking `dir_hier_path`: `<download>/<fanout dir>/<filename>`.
///
/// The fanout directory is derived from a hash of the filename and is
/// created on demand, as the real helper does.
pub struct HashedPlacementOracle {
    download_dir: PathBuf,
    fanout: u32,
    calls: AtomicUsize,
}

impl HashedPlacementOracle {
    /// Oracle placing files under `download_dir` across 1024 directories.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self::with_fanout(download_dir, 1024)
    }

    /// Oracle placing files across `fanout` directories (at least one).
    #[must_use]
    pub fn with_fanout(download_dir: impl Into<PathBuf>, fanout: u32) -> Self {
        Self {
            download_dir: download_dir.into(),
            fanout: fanout.max(1),
            calls: AtomicUsize::new(0),
        }
    }

    /// Path the oracle assigns to `filename`, without creating anything.
    #[must_use]
    pub fn expected_path(&self, filename: &str) -> PathBuf {
        let digest = Sha256::digest(filename.as_bytes());
        let bucket = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % self.fanout;
        self.download_dir
            .join(format!("{bucket:x}"))
            .join(filename)
    }

    /// Number of lookups served.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlacementOracle for HashedPlacementOracle {
    async fn place(&self, filename: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = self.expected_path(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| OracleError::Spawn {
                program: PathBuf::from("hashed-placement-oracle"),
                source,
            })?;
        }
        Ok(format!("{}\n", path.display()))
    }
}

/// Oracle that always answers with the same raw output.
pub struct FixedOutputOracle {
    output: String,
}

impl FixedOutputOracle {
    /// Oracle replying `output` to every lookup.
    #[must_use]
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

#[async_trait]
impl PlacementOracle for FixedOutputOracle {
    async fn place(&self, _filename: &str) -> Result<String, OracleError> {
        Ok(self.output.clone())
    }
}

/// Digest mapping every input to the same fingerprint, to force collisions.
pub struct CollidingDigest {
    fingerprint: &'static str,
}

impl CollidingDigest {
    /// Digest returning `fingerprint` for all content.
    #[must_use]
    pub const fn new(fingerprint: &'static str) -> Self {
        Self { fingerprint }
    }
}

impl ContentDigest for CollidingDigest {
    fn name(&self) -> &'static str {
        "colliding"
    }

    fn hex_digest(&self, _content: &[u8]) -> String {
        self.fingerprint.to_string()
    }
}

/// Work-creation tool replaying a fixed exit status and output.
pub struct ScriptedTool {
    reply: ToolOutput,
    invocations: Mutex<Vec<ToolInvocation>>,
}

impl ScriptedTool {
    /// Tool exiting with `code` and printing `output`.
    #[must_use]
    pub fn new(code: i32, output: impl Into<Vec<u8>>) -> Self {
        Self {
            reply: ToolOutput {
                success: code == 0,
                code: Some(code),
                output: output.into(),
            },
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Tool reporting a successful registration of `id`.
    #[must_use]
    pub fn created(id: u64) -> Self {
        Self::new(0, format!("created workunit; name fixture, ID {id}\n"))
    }

    /// Invocations received so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkCreationTool for ScriptedTool {
    async fn create_work(
        &self,
        invocation: &ToolInvocation,
    ) -> Result<ToolOutput, ToolInvocationError> {
        if let Ok(mut guard) = self.invocations.lock() {
            guard.push(invocation.clone());
        }
        Ok(self.reply.clone())
    }
}
