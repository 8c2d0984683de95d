//! The probe contract and the concrete dependency checks.
//!
//! A [`Probe`] is a single asynchronous check against one dependency. Ordinary
//! failures (connection refused, non-2xx response, missing configuration) are
//! *values*, not errors: they come back as a [`ProbeResult`] with status
//! [`ProbeStatus::Disconnected`] or [`ProbeStatus::Error`]. Returning `Err` is
//! reserved for faults outside that contract; the executor contains those too.

mod http;
mod tcp;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

pub use http::HttpProbe;
pub use tcp::TcpProbe;

/// Message recorded when a probe is cut off by the executor's timeout.
pub const TIMEOUT_MESSAGE: &str = "Request timeout";

/// Tri-state outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The dependency answered and reported itself healthy.
    Connected,
    /// The dependency could not be reached at all, or is not configured.
    Disconnected,
    /// The dependency answered but indicated an unhealthy condition.
    Error,
}

/// Result of a single probe. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    /// Round-trip latency in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    /// Failure description when `status` is not `Connected`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn connected(latency_ms: u64) -> Self {
        Self {
            status: ProbeStatus::Connected,
            latency: Some(latency_ms),
            error: None,
        }
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Disconnected,
            latency: None,
            error: Some(reason.into()),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            latency: None,
            error: Some(reason.into()),
        }
    }

    /// Attach the latency of a response that was received but judged unhealthy.
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency = Some(latency_ms);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status != ProbeStatus::Connected
    }
}

/// One dependency check.
///
/// Implementations must settle promptly once `cancel` fires; the executor
/// cancels the token when the probe's timeout elapses.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, cancel: CancellationToken) -> anyhow::Result<ProbeResult>;
}

/// Stand-in for a dependency that is intentionally absent from this deployment.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    label: String,
}

impl Unconfigured {
    /// `label` is the human name used in the message, e.g. `"Database"`.
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

#[async_trait]
impl Probe for Unconfigured {
    async fn check(&self, _cancel: CancellationToken) -> anyhow::Result<ProbeResult> {
        Ok(ProbeResult::disconnected(format!("{} not configured", self.label)))
    }
}

/// Milliseconds elapsed since `started`, saturating.
pub(crate) fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
