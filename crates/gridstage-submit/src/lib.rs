#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Work-unit submission to the grid controller.
//!
//! A submission stages the seed and the command line as content-addressed
//! artifacts, runs the controller's work-creation tool once, and turns its
//! textual output into a [`WorkUnitId`] or a classified [`SubmitError`].
//!
//! Submissions are not idempotent: a registration whose result the caller
//! never observes cannot be told apart from a failed one, so retrying may
//! create duplicate work units.
//!
//! Layout: `request.rs` (request model), `tool.rs` (work-creation tool seam
//! and subprocess implementation), `parse.rs` (output protocol),
//! `submitter.rs` (`JobSubmitter`), `error.rs` (`SubmitError`).

pub mod error;
pub mod parse;
pub mod request;
pub mod submitter;
pub mod tool;

pub use error::{ErrorKind, SubmitError, SubmitResult, ToolInvocationError};
pub use parse::{ProtocolViolation, parse_workunit_id};
pub use request::{SeedSource, WorkRequest, WorkUnitId};
pub use submitter::JobSubmitter;
pub use tool::{CommandWorkCreationTool, ToolInvocation, ToolOutput, WorkCreationTool};
