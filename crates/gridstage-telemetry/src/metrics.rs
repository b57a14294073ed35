//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters relevant to staging and submission.

use std::sync::Arc;

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Failure labels recorded by `workunit_submissions_total`.
pub const SUBMISSION_FAILURE_OUTCOMES: &[&str] = &[
    "configuration",
    "consistency",
    "oracle",
    "storage",
    "tool_invocation",
    "tool_protocol",
];

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    staged_files_total: IntCounterVec,
    workunit_submissions_total: IntCounterVec,
    oracle_calls_total: IntCounterVec,
}

/// Snapshot of aggregated counters for health reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Files written for the first time.
    pub staged_created: u64,
    /// Stage calls that found identical content already in place.
    pub staged_reused: u64,
    /// Work units registered with the grid controller.
    pub submissions_succeeded: u64,
    /// Submissions that ended in any error.
    pub submissions_failed: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let staged_files_total = counter_vec(
            "staged_files_total",
            "Content staging calls by outcome",
            &["outcome"],
        )?;
        let workunit_submissions_total = counter_vec(
            "workunit_submissions_total",
            "Work-unit submissions by outcome",
            &["outcome"],
        )?;
        let oracle_calls_total = counter_vec(
            "oracle_calls_total",
            "Placement oracle lookups by outcome",
            &["outcome"],
        )?;

        register(&registry, "staged_files_total", &staged_files_total)?;
        register(
            &registry,
            "workunit_submissions_total",
            &workunit_submissions_total,
        )?;
        register(&registry, "oracle_calls_total", &oracle_calls_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                staged_files_total,
                workunit_submissions_total,
                oracle_calls_total,
            }),
        })
    }

    /// Count a staging call by outcome (`created`, `reused` or `failed`).
    pub fn inc_staged(&self, outcome: &str) {
        self.inner
            .staged_files_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count a submission outcome (`success` or one of the failure labels).
    pub fn inc_submission(&self, outcome: &str) {
        self.inner
            .workunit_submissions_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count a placement oracle lookup (`success` or `failed`).
    pub fn inc_oracle_call(&self, outcome: &str) {
        self.inner
            .oracle_calls_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::NonUtf8 { source })
    }

    /// Take a point-in-time snapshot of the aggregated counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let staged = |outcome: &str| {
            self.inner
                .staged_files_total
                .with_label_values(&[outcome])
                .get()
        };
        let submissions = |outcome: &str| {
            self.inner
                .workunit_submissions_total
                .with_label_values(&[outcome])
                .get()
        };
        MetricsSnapshot {
            staged_created: staged("created"),
            staged_reused: staged("reused"),
            submissions_succeeded: submissions("success"),
            submissions_failed: SUBMISSION_FAILURE_OUTCOMES
                .iter()
                .map(|outcome| submissions(*outcome))
                .sum(),
        }
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::Collector { name, source })
}

fn register(registry: &Registry, name: &'static str, collector: &IntCounterVec) -> Result<()> {
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Collector { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_staged("created");
        metrics.inc_staged("created");
        metrics.inc_staged("reused");
        metrics.inc_submission("success");
        metrics.inc_submission("tool_protocol");
        metrics.inc_oracle_call("success");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.staged_created, 2);
        assert_eq!(snapshot.staged_reused, 1);
        assert_eq!(snapshot.submissions_succeeded, 1);
        assert_eq!(snapshot.submissions_failed, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains(r#"staged_files_total{outcome="created"} 2"#));
        assert!(rendered.contains("workunit_submissions_total"));
        assert!(rendered.contains("oracle_calls_total"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_submission("success");
        assert_eq!(first.snapshot().submissions_succeeded, 1);
        assert_eq!(second.snapshot().submissions_succeeded, 0);
        Ok(())
    }
}
