//! Argument parsing and command dispatch.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gridstage_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use tracing::debug;

use crate::commands::{
    handle_download_path, handle_locate, handle_resolve, handle_stage, handle_submit,
};
use crate::context::{AppContext, CliResult};

/// Parses process arguments, runs the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    run_from(std::env::args_os()).await
}

/// Like [`run`], with an explicit argument list (the first item is the
/// program name).
pub async fn run_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };

    let logging = LoggingConfig::new(cli.log_format.map_or_else(LogFormat::infer, LogFormat::from))
        .with_level(cli.log_level.clone());
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    let command_name = command_label(&cli.command);
    let print_metrics = cli.print_metrics;
    let result = match AppContext::from_cli(&cli) {
        Ok(ctx) => {
            let result = dispatch(cli.command, &ctx).await;
            if print_metrics {
                match ctx.metrics.render() {
                    Ok(text) => eprint!("{text}"),
                    Err(err) => eprintln!("warning: metrics unavailable: {err}"),
                }
            }
            result
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            debug!(command = command_name, "command completed");
            0
        }
        Err(err) => {
            let exit_code = err.exit_code();
            debug!(command = command_name, exit_code, "command failed");
            eprintln!("error: {}", err.display_message());
            exit_code
        }
    }
}

async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Resolve(args) => handle_resolve(ctx, args).await,
        Command::DownloadPath(args) => handle_download_path(ctx, args).await,
        Command::Stage(args) => handle_stage(ctx, args).await,
        Command::Locate(args) => handle_locate(ctx, args).await,
        Command::Submit(args) => handle_submit(ctx, args).await,
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Resolve(_) => "resolve",
        Command::DownloadPath(_) => "download_path",
        Command::Stage(_) => "stage",
        Command::Locate(_) => "locate",
        Command::Submit(_) => "submit",
    }
}

#[derive(Parser)]
#[command(
    name = "gridstage",
    about = "Stage artifacts and submit work units to a volunteer-computing grid"
)]
pub(crate) struct Cli {
    /// YAML configuration file (defaults to `GRIDSTAGE_CONFIG`).
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,
    /// Grid project directory, overriding the configuration.
    #[arg(long, global = true)]
    pub(crate) project_dir: Option<PathBuf>,
    /// Log output format (defaults to pretty on a terminal, JSON otherwise).
    #[arg(long, global = true, value_enum)]
    pub(crate) log_format: Option<LogFormatArg>,
    /// Log filter directive; `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(
        long = "output",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Select output format for command results"
    )]
    pub(crate) output: OutputFormat,
    /// Print Prometheus counters to stderr when the command finishes.
    #[arg(long, global = true)]
    pub(crate) print_metrics: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Absolute storage path for a filename.
    Resolve(FilenameArgs),
    /// Storage path relative to the public download root.
    DownloadPath(FilenameArgs),
    /// Stage a file (or stdin) under a content-derived name.
    Stage(StageArgs),
    /// Storage path of an artifact known by prefix and digest.
    Locate(LocateArgs),
    /// Stage a job's artifacts and register a work unit.
    Submit(SubmitArgs),
}

#[derive(Args)]
pub(crate) struct FilenameArgs {
    pub(crate) filename: String,
}

#[derive(Args)]
pub(crate) struct StageArgs {
    #[arg(long)]
    pub(crate) prefix: String,
    /// File to stage, or `-` for stdin.
    pub(crate) source: PathBuf,
}

#[derive(Args)]
pub(crate) struct LocateArgs {
    #[arg(long)]
    pub(crate) prefix: String,
    #[arg(long)]
    pub(crate) hash: String,
}

#[derive(Args)]
pub(crate) struct SubmitArgs {
    #[arg(long = "app")]
    pub(crate) app_name: String,
    /// Command line passed to the application.
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) cmdline: String,
    /// Local file whose bytes become the seed.
    #[arg(long)]
    pub(crate) seed_file: Option<PathBuf>,
    /// Storage path of an already staged seed.
    #[arg(long)]
    pub(crate) seed_path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormatArg {
    Json,
    Pretty,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments parse")
    }

    #[test]
    fn submit_arguments_parse() {
        let cli = parse(&[
            "gridstage",
            "--project-dir",
            "/srv/project",
            "submit",
            "--app",
            "fold",
            "--cmdline",
            "--steps 4",
            "--seed-file",
            "seed.bin",
        ]);
        assert_eq!(cli.project_dir, Some(PathBuf::from("/srv/project")));
        assert_eq!(command_label(&cli.command), "submit");
        let Command::Submit(args) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(args.app_name, "fold");
        assert_eq!(args.cmdline, "--steps 4");
        assert_eq!(args.seed_file, Some(PathBuf::from("seed.bin")));
        assert!(args.seed_path.is_none());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = parse(&["gridstage", "locate", "--prefix", "input", "--hash", "ab", "--output", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(command_label(&cli.command), "locate");
    }

    #[test]
    fn log_format_maps_to_telemetry() {
        assert_eq!(LogFormat::from(LogFormatArg::Json), LogFormat::Json);
        assert_eq!(LogFormat::from(LogFormatArg::Pretty), LogFormat::Pretty);
        assert_eq!(LogFormat::from(LogFormatArg::Compact), LogFormat::Compact);
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["gridstage", "frobnicate"]).is_err());
    }
}
