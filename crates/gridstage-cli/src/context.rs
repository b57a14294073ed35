//! Component wiring and CLI error handling.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use gridstage_config::{ConfigError, GridConfig};
use gridstage_config::loader::{ENV_PROJECT_DIR, load_with};
use gridstage_staging::{CommandPlacementOracle, ContentStager};
use gridstage_submit::{CommandWorkCreationTool, JobSubmitter};
use gridstage_telemetry::Metrics;

use crate::cli::{Cli, OutputFormat};

/// Error type used by CLI handlers, mapped to an exit code at the edge.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 1,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Resolved configuration plus shared telemetry for one CLI invocation.
pub(crate) struct AppContext {
    pub(crate) config: GridConfig,
    pub(crate) metrics: Metrics,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    pub(crate) fn from_cli(cli: &Cli) -> CliResult<Self> {
        let project_dir = cli
            .project_dir
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());
        let config = load_with(cli.config.as_deref(), |name| {
            if name == ENV_PROJECT_DIR && project_dir.is_some() {
                return project_dir.clone();
            }
            std::env::var(name).ok()
        })
        .map_err(|err| CliError::validation(describe_config_error(&err)))?;
        let metrics = Metrics::new().map_err(CliError::failure)?;
        Ok(Self {
            config,
            metrics,
            output: cli.output,
        })
    }

    pub(crate) fn stager(&self) -> ContentStager {
        let oracle = Arc::new(CommandPlacementOracle::from_config(&self.config));
        ContentStager::from_config(&self.config, oracle).with_metrics(self.metrics.clone())
    }

    pub(crate) fn submitter(&self) -> JobSubmitter {
        let tool = Arc::new(CommandWorkCreationTool::from_config(&self.config));
        JobSubmitter::new(self.stager(), tool).with_metrics(self.metrics.clone())
    }
}

fn describe_config_error(err: &ConfigError) -> String {
    match err {
        ConfigError::Read { path, source } => {
            format!("{err}: {}: {source}", path.display())
        }
        ConfigError::Parse { path, source } => {
            format!("{err}: {}: {source}", path.display())
        }
        ConfigError::MissingField { field } => format!("{err}: {field}"),
        ConfigError::InvalidField {
            field,
            value,
            reason,
        } => match value {
            Some(value) => format!("{err}: {field}={value:?} ({reason})"),
            None => format!("{err}: {field} ({reason})"),
        },
    }
}
