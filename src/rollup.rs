//! Status rollup. Reduces per-probe results to one overall status.
//!
//! Precedence:
//! 1. any `Critical` probe failed → `Unhealthy`
//! 2. any `Advisory` probe failed → `Degraded`
//! 3. otherwise → `Healthy`
//!
//! The reduction is a `max` over an ordered enum, so it is independent of the
//! order the results are visited in. An empty input is `Healthy`.

use axum::http::StatusCode;
use serde::Serialize;

use crate::{probes::ProbeResult, registry::Criticality};

/// Overall service status, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    /// Transport status for a report with this status.
    ///
    /// `Degraded` deliberately maps to 200 so non-critical degradation does not
    /// trip load-balancer checks or page anyone.
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::Healthy | Self::Degraded => StatusCode::OK,
            Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// Status contributed by a single probe.
fn contribution(criticality: Criticality, result: &ProbeResult) -> OverallStatus {
    match (result.is_failure(), criticality) {
        (false, _) => OverallStatus::Healthy,
        (true, Criticality::Critical) => OverallStatus::Unhealthy,
        (true, Criticality::Advisory) => OverallStatus::Degraded,
    }
}

pub fn rollup<'a, I>(results: I) -> OverallStatus
where
    I: IntoIterator<Item = (Criticality, &'a ProbeResult)>,
{
    results
        .into_iter()
        .map(|(criticality, result)| contribution(criticality, result))
        .max()
        .unwrap_or_default()
}
