//! Report builder: the single entry point the HTTP layer calls.
//!
//! [`HealthEngine::build_report`] has two modes:
//!
//! - **minimal** (`verbose = false`): no probes, no introspection, no I/O.
//!   Returns `{status: "healthy", message, timestamp}` and nothing else.
//! - **verbose**: fans out over the registry, rolls the results up, and attaches
//!   the diagnostic sections from the [`EnvironmentSnapshot`]. The sections
//!   never influence `status`.
//!
//! The engine is generic over the service: backend, admin and player differ only
//! in the registry, greeting and snapshot they are constructed with.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    executor::{run_probes, ProbeResults},
    introspection::{
        BuildInfo, EnvironmentInfo, EnvironmentSnapshot, RuntimeInfo, ServiceMetrics, SystemInfo,
        VersionInfo,
    },
    registry::ProbeRegistry,
    rollup::{rollup, OverallStatus},
};

/// One health response. Built fresh per request and never mutated afterwards.
///
/// Optional sections are omitted from the JSON entirely (not `null`) when absent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub status: OverallStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_metrics: Option<ServiceMetrics>,
    /// Per-probe results, present only in verbose mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<ProbeResults>,
}

impl AggregateReport {
    fn minimal(message: &str) -> Self {
        Self {
            status: OverallStatus::Healthy,
            message: message.to_string(),
            timestamp: Utc::now(),
            version: None,
            runtime: None,
            environment: None,
            system: None,
            build: None,
            service_metrics: None,
            dependencies: None,
        }
    }
}

/// Aggregation engine for one service. Cheap to share behind an `Arc`.
pub struct HealthEngine {
    greeting: String,
    registry: Arc<ProbeRegistry>,
    snapshot: Arc<dyn EnvironmentSnapshot>,
    probe_timeout: Duration,
}

impl HealthEngine {
    pub fn new(
        greeting: impl Into<String>,
        registry: ProbeRegistry,
        snapshot: Arc<dyn EnvironmentSnapshot>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            greeting: greeting.into(),
            registry: Arc::new(registry),
            snapshot,
            probe_timeout,
        }
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Assemble a report.
    ///
    /// Probe failures never surface as `Err`; they are part of the report. The
    /// only error path is a fault in the introspection collaborator, which the
    /// HTTP boundary turns into a 500.
    #[tracing::instrument(skip(self), fields(status = tracing::field::Empty))]
    pub async fn build_report(&self, verbose: bool) -> anyhow::Result<AggregateReport> {
        let mut report = AggregateReport::minimal(&self.greeting);
        if !verbose {
            return Ok(report);
        }

        // Introspection reads /proc and friends synchronously.
        let snapshot = Arc::clone(&self.snapshot);
        let (results, diagnostics) = tokio::join!(
            run_probes(&self.registry, self.probe_timeout),
            tokio::task::spawn_blocking(move || snapshot.capture())
        );
        let diagnostics = diagnostics.context("introspection task failed")??;

        let status = rollup(self.registry.iter().filter_map(|descriptor| {
            results
                .get(&descriptor.name)
                .map(|result| (descriptor.criticality, result))
        }));
        tracing::Span::current().record("status", tracing::field::display(status));
        debug!(%status, probes = results.len(), "health rolled up");

        report.status = status;
        report.version = Some(diagnostics.version);
        report.runtime = Some(diagnostics.runtime);
        report.environment = Some(diagnostics.environment);
        report.system = Some(diagnostics.system);
        report.build = diagnostics.build;
        report.service_metrics = diagnostics.service_metrics;
        report.dependencies = Some(results);
        Ok(report)
    }
}
