//! Logical filename → storage path resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gridstage_config::defaults::DOWNLOAD_MARKER;
use gridstage_telemetry::Metrics;
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::oracle::{PlacementOracle, parse_oracle_output};

/// Resolves filenames into the hash-partitioned download tree.
#[derive(Clone)]
pub struct PathResolver {
    oracle: Arc<dyn PlacementOracle>,
    download_marker: String,
    metrics: Option<Metrics>,
}

impl PathResolver {
    /// Resolver delegating to `oracle`, using the default `/download/` marker.
    #[must_use]
    pub fn new(oracle: Arc<dyn PlacementOracle>) -> Self {
        Self {
            oracle,
            download_marker: DOWNLOAD_MARKER.to_string(),
            metrics: None,
        }
    }

    /// Replace the marker that separates private and public path segments.
    #[must_use]
    pub fn with_download_marker(mut self, marker: impl Into<String>) -> Self {
        self.download_marker = marker.into();
        self
    }

    /// Record oracle lookups in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Marker used by [`Self::to_relative`].
    #[must_use]
    pub fn download_marker(&self) -> &str {
        &self.download_marker
    }

    /// Absolute storage path for `filename`.
    ///
    /// # Errors
    ///
    /// Returns an [`OracleError`] if the oracle fails or its answer is not a
    /// single absolute path.
    pub async fn resolve(&self, filename: &str) -> Result<PathBuf, OracleError> {
        let result = self
            .oracle
            .place(filename)
            .await
            .and_then(|raw| parse_oracle_output(filename, &raw));

        match &result {
            Ok(path) => {
                debug!(filename, path = %path.display(), "resolved storage path");
                self.record("success");
            }
            Err(err) => {
                warn!(filename, error = ?err, "placement lookup failed");
                self.record("failed");
            }
        }
        result
    }

    /// Path of `path` relative to the public download root.
    ///
    /// Everything up to and including the last occurrence of the marker is
    /// removed. Input without the marker is returned unchanged; use
    /// [`Self::to_relative_strict`] when that must be rejected.
    #[must_use]
    pub fn to_relative(&self, path: &Path) -> String {
        let rendered = path.to_string_lossy();
        relative_to_marker(&rendered, &self.download_marker).to_string()
    }

    /// Like [`Self::to_relative`], but `None` when the marker is absent.
    #[must_use]
    pub fn to_relative_strict(&self, path: &Path) -> Option<String> {
        path.to_string_lossy()
            .rsplit_once(self.download_marker.as_str())
            .map(|(_, relative)| relative.to_string())
    }

    /// Resolve `filename` and return its path relative to the download root.
    ///
    /// # Errors
    ///
    /// Returns an [`OracleError`] if resolution fails.
    pub async fn download_path(&self, filename: &str) -> Result<String, OracleError> {
        let absolute = self.resolve(filename).await?;
        Ok(self.to_relative(&absolute))
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_oracle_call(outcome);
        }
    }
}

/// Strip everything through the last `marker` in `path`; unchanged when absent.
#[must_use]
pub fn relative_to_marker<'a>(path: &'a str, marker: &str) -> &'a str {
    path.rsplit_once(marker).map_or(path, |(_, relative)| relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedOracle(&'static str);

    #[async_trait]
    impl PlacementOracle for FixedOracle {
        async fn place(&self, _filename: &str) -> Result<String, OracleError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn relative_to_marker_strips_through_last_marker() {
        assert_eq!(
            relative_to_marker("/srv/project/download/3a/input_ff", "/download/"),
            "3a/input_ff"
        );
        assert_eq!(
            relative_to_marker("/download/old/download/3a/input_ff", "/download/"),
            "3a/input_ff"
        );
        assert_eq!(relative_to_marker("/srv/upload/x", "/download/"), "/srv/upload/x");
    }

    #[test]
    fn strict_relative_rejects_missing_marker() {
        let resolver = PathResolver::new(Arc::new(FixedOracle("/unused")));
        assert_eq!(
            resolver.to_relative_strict(Path::new("/srv/project/download/aa/f")),
            Some("aa/f".to_string())
        );
        assert_eq!(resolver.to_relative_strict(Path::new("/srv/project/f")), None);
        assert_eq!(
            resolver.to_relative(Path::new("/srv/project/f")),
            "/srv/project/f"
        );
    }

    #[tokio::test]
    async fn resolve_validates_oracle_output() {
        let resolver = PathResolver::new(Arc::new(FixedOracle("relative/path\n")));
        let err = resolver.resolve("input_ab").await.expect_err("relative path");
        assert!(matches!(err, OracleError::Malformed { .. }));
    }

    #[tokio::test]
    async fn download_path_combines_resolve_and_relative() -> Result<(), OracleError> {
        let metrics = Metrics::new().expect("metrics registry");
        let resolver = PathResolver::new(Arc::new(FixedOracle(
            "/srv/project/download/2c/cmdline_00\n",
        )))
        .with_metrics(metrics.clone());
        assert_eq!(resolver.download_path("cmdline_00").await?, "2c/cmdline_00");
        assert!(
            metrics
                .render()
                .expect("render")
                .contains(r#"oracle_calls_total{outcome="success"} 1"#)
        );
        Ok(())
    }

    #[test]
    fn custom_marker_is_respected() {
        let resolver =
            PathResolver::new(Arc::new(FixedOracle("/unused"))).with_download_marker("/public/");
        assert_eq!(resolver.download_marker(), "/public/");
        assert_eq!(resolver.to_relative(Path::new("/srv/public/ab/f")), "ab/f");
    }
}
