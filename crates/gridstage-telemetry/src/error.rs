//! Error types for telemetry setup and metrics rendering.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing logging or handling metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter directive could not be parsed.
    #[error("invalid log filter directive")]
    InvalidFilter {
        /// Directive taken from `RUST_LOG` or the configured level.
        directive: String,
        /// Parser error.
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed")]
    SubscriberInstall {
        /// Underlying install error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A counter could not be created or registered.
    #[error("metrics collector setup failed")]
    Collector {
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// The registry could not be rendered as text.
    #[error("metrics rendering failed")]
    Render {
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// Rendered metrics were not UTF-8.
    #[error("rendered metrics were not utf-8")]
    NonUtf8 {
        /// Conversion error.
        source: std::string::FromUtf8Error,
    },
}
