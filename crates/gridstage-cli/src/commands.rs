//! Command handlers.

use std::path::Path;

use anyhow::anyhow;
use gridstage_staging::{OracleError, StagingError};
use gridstage_submit::SubmitError;
use tokio::io::AsyncReadExt;

use crate::cli::{FilenameArgs, LocateArgs, StageArgs, SubmitArgs};
use crate::context::{AppContext, CliError, CliResult};
use crate::output::{render_path, render_relative, render_staged, render_submission};

pub(crate) async fn handle_resolve(ctx: &AppContext, args: FilenameArgs) -> CliResult<()> {
    let path = ctx
        .stager()
        .resolver()
        .resolve(&args.filename)
        .await
        .map_err(|err| oracle_failure(&err))?;
    render_path(&args.filename, &path, ctx.output)
}

pub(crate) async fn handle_download_path(ctx: &AppContext, args: FilenameArgs) -> CliResult<()> {
    let relative = ctx
        .stager()
        .resolver()
        .download_path(&args.filename)
        .await
        .map_err(|err| oracle_failure(&err))?;
    render_relative(&args.filename, &relative, ctx.output)
}

pub(crate) async fn handle_stage(ctx: &AppContext, args: StageArgs) -> CliResult<()> {
    if args.prefix.trim().is_empty() {
        return Err(CliError::validation("prefix must not be empty"));
    }
    let content = read_source(&args.source).await?;
    let staged = ctx
        .stager()
        .stage_detailed(&args.prefix, &content)
        .await
        .map_err(|err| staging_failure(&err))?;
    render_staged(&staged, ctx.output)
}

pub(crate) async fn handle_locate(ctx: &AppContext, args: LocateArgs) -> CliResult<()> {
    if args.hash.is_empty() || !args.hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CliError::validation("hash must be a hex digest"));
    }
    let hash = args.hash.to_ascii_lowercase();
    let path = ctx
        .stager()
        .locate(&args.prefix, &hash)
        .await
        .map_err(|err| staging_failure(&err))?;
    let filename = gridstage_staging::filename_for(&args.prefix, &hash);
    render_path(&filename, &path, ctx.output)
}

pub(crate) async fn handle_submit(ctx: &AppContext, args: SubmitArgs) -> CliResult<()> {
    let seed_contents = match &args.seed_file {
        Some(path) => Some(read_source(path).await?),
        None => None,
    };
    let id = ctx
        .submitter()
        .submit_parts(&args.app_name, &args.cmdline, seed_contents, args.seed_path)
        .await
        .map_err(|err| submit_failure(&err))?;
    render_submission(id, ctx.output)
}

async fn read_source(source: &Path) -> CliResult<Vec<u8>> {
    if source == Path::new("-") {
        let mut content = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut content)
            .await
            .map_err(|err| CliError::failure(anyhow!("failed to read stdin: {err}")))?;
        return Ok(content);
    }
    tokio::fs::read(source).await.map_err(|err| {
        CliError::validation(format!("failed to read {}: {err}", source.display()))
    })
}

fn oracle_failure(err: &OracleError) -> CliError {
    CliError::failure(anyhow!(oracle_detail(err)))
}

fn staging_failure(err: &StagingError) -> CliError {
    CliError::failure(anyhow!(staging_detail(err)))
}

fn submit_failure(err: &SubmitError) -> CliError {
    match err {
        SubmitError::Configuration { field, reason } => {
            CliError::validation(format!("{err}: {field}: {reason}"))
        }
        SubmitError::Staging { artifact, source } => {
            CliError::failure(anyhow!("{err} ({artifact}): {}", staging_detail(source)))
        }
        SubmitError::ToolInvocation(_) | SubmitError::ToolProtocol { .. } => {
            let mut message = error_chain(err);
            if let SubmitError::ToolProtocol { reason, .. } = err {
                message = format!("{message} ({reason})");
            }
            if let Some(output) = err.tool_output().filter(|out| !out.trim().is_empty()) {
                message = format!("{message}\ntool output:\n{}", output.trim_end());
            }
            CliError::failure(anyhow!(message))
        }
    }
}

fn oracle_detail(err: &OracleError) -> String {
    match err {
        OracleError::Spawn { program, source } => {
            format!("{err}: {}: {source}", program.display())
        }
        OracleError::Failed {
            filename,
            status,
            output,
        } => format!(
            "{err} for {filename} (status {}):\n{}",
            status.map_or_else(|| "signal".to_string(), |code| code.to_string()),
            output.trim_end()
        ),
        OracleError::TimedOut { filename, timeout } => {
            format!("{err} for {filename} after {timeout:?}")
        }
        OracleError::Malformed {
            filename,
            output,
            reason,
        } => format!("{err} for {filename} ({reason}): {output:?}"),
    }
}

fn staging_detail(err: &StagingError) -> String {
    match err {
        StagingError::Oracle(source) => oracle_detail(source),
        StagingError::Consistency { filename, path } => format!(
            "{err}: {filename} at {} holds different content",
            path.display()
        ),
        StagingError::Io {
            operation,
            path,
            source,
        } => format!("{err}: {operation} {}: {source}", path.display()),
        StagingError::Task { operation, source } => format!("{err}: {operation}: {source}"),
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstage_submit::{ProtocolViolation, ToolInvocationError};

    #[test]
    fn seed_misuse_is_a_validation_error() {
        let err = SubmitError::Configuration {
            field: "seed",
            reason: "no seed was given",
        };
        let cli = submit_failure(&err);
        assert_eq!(cli.exit_code(), 2);
        assert_eq!(cli.display_message(), "invalid work request: seed: no seed was given");
    }

    #[test]
    fn tool_failures_include_captured_output() {
        let err = SubmitError::ToolInvocation(ToolInvocationError::Exited {
            status: Some(1),
            output: "error: disk full\n".to_string(),
        });
        let cli = submit_failure(&err);
        assert_eq!(cli.exit_code(), 1);
        let message = cli.display_message();
        assert!(message.starts_with(
            "work-creation tool invocation failed: work-creation tool exited unsuccessfully"
        ));
        assert!(message.ends_with("tool output:\nerror: disk full"));
    }

    #[test]
    fn protocol_failures_carry_reason() {
        let err = SubmitError::ToolProtocol {
            output: "ok, nothing created\n".to_string(),
            reason: ProtocolViolation::MissingIdLine.reason(),
        };
        let message = submit_failure(&err).display_message();
        assert!(message.contains(&format!(
            "({})",
            ProtocolViolation::MissingIdLine.reason()
        )));
        assert!(message.contains("ok, nothing created"));
    }
}
