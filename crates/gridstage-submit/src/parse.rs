//! Output protocol of the work-creation tool.
//!
//! On success the tool prints, among other diagnostics, a line of the form
//! `created workunit; <text>, ID <integer>`. Lines are scanned in order and
//! the first match wins. A bare `\r` ends a line too, so progress output
//! rewritten in place does not hide the id line.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::request::WorkUnitId;

// `(?-u)` so `.` also matches bytes that are not valid UTF-8.
static WORKUNIT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u)^created workunit; .*, ID ([0-9]+)").unwrap_or_else(|err| {
        unreachable!("work-unit pattern is a valid regex: {err}")
    })
});

/// Why tool output did not yield an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// No line matched the success pattern.
    MissingIdLine,
    /// The first matching line carried an id outside the `u64` range.
    IdOutOfRange,
}

impl ProtocolViolation {
    /// Static description, carried on the resulting error.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::MissingIdLine => "no 'created workunit' line in output",
            Self::IdOutOfRange => "work-unit id does not fit in 64 bits",
        }
    }
}

/// Extract the work-unit id from combined tool output.
///
/// # Errors
///
/// Returns a [`ProtocolViolation`] when no line matches or the first
/// matching id overflows.
pub fn parse_workunit_id(output: &[u8]) -> Result<WorkUnitId, ProtocolViolation> {
    let captured = output
        .split(|byte| matches!(*byte, b'\n' | b'\r'))
        .find_map(|line| WORKUNIT_LINE.captures(line))
        .and_then(|captures| captures.get(1))
        .ok_or(ProtocolViolation::MissingIdLine)?;

    // The capture is ASCII digits only.
    std::str::from_utf8(captured.as_bytes())
        .ok()
        .and_then(|digits| digits.parse::<u64>().ok())
        .map(WorkUnitId)
        .ok_or(ProtocolViolation::IdOutOfRange)
}
