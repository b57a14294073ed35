//! Default tool locations and limits for a grid project checkout.
//!
//! # Design
//! - Paths are relative to the project directory, matching the layout the
//!   grid controller installs its helper binaries under.
//! - Keep time-based defaults explicit for auditability.

/// Placement oracle helper, relative to the project directory.
pub const ORACLE_PROGRAM: &str = "bin/dir_hier_path";
/// Work-creation helper, relative to the project directory.
pub const CREATE_WORK_PROGRAM: &str = "bin/create_work";
/// Upper bound on a single external tool invocation, in seconds.
pub const TOOL_TIMEOUT_SECS: u64 = 300;
/// Mode applied to newly staged files so grid workers can read and run them.
pub const FILE_MODE: u32 = 0o755;
/// Marker segment separating the private project path from the public download tree.
pub const DOWNLOAD_MARKER: &str = "/download/";
