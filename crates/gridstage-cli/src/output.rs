//! Output renderers for command results.

use std::path::Path;

use anyhow::anyhow;
use gridstage_staging::StagedFile;
use gridstage_submit::WorkUnitId;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::context::{CliError, CliResult};

#[derive(Serialize)]
struct PathView<'a> {
    filename: &'a str,
    path: String,
}

#[derive(Serialize)]
struct StagedView<'a> {
    filename: &'a str,
    fingerprint: &'a str,
    path: String,
    created: bool,
}

#[derive(Serialize)]
struct SubmissionView {
    workunit_id: WorkUnitId,
}

pub(crate) fn render_path(filename: &str, path: &Path, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&PathView {
            filename,
            path: path.display().to_string(),
        }),
        OutputFormat::Text => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

pub(crate) fn render_relative(filename: &str, relative: &str, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&PathView {
            filename,
            path: relative.to_string(),
        }),
        OutputFormat::Text => {
            println!("{relative}");
            Ok(())
        }
    }
}

pub(crate) fn render_staged(staged: &StagedFile, format: OutputFormat) -> CliResult<()> {
    let view = StagedView {
        filename: &staged.filename,
        fingerprint: &staged.fingerprint,
        path: staged.path.display().to_string(),
        created: matches!(staged.outcome, gridstage_staging::StageOutcome::Created),
    };
    match format {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            println!("{}\t{}", view.path, view.filename);
            Ok(())
        }
    }
}

pub(crate) fn render_submission(id: WorkUnitId, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&SubmissionView { workunit_id: id }),
        OutputFormat::Text => {
            println!("{id}");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn submission_view_serialises_id_as_number() {
        let text = serde_json::to_string(&SubmissionView {
            workunit_id: WorkUnitId(42),
        })
        .expect("serialise");
        assert_eq!(text, r#"{"workunit_id":42}"#);
    }

    #[test]
    fn renderers_accept_both_formats() {
        let path = PathBuf::from("/srv/project/download/1a/input_ab");
        for format in [OutputFormat::Text, OutputFormat::Json] {
            assert!(render_path("input_ab", &path, format).is_ok());
            assert!(render_relative("input_ab", "1a/input_ab", format).is_ok());
            assert!(render_submission(WorkUnitId(7), format).is_ok());
        }
    }
}
