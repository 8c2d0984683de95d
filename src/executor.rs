//! Fan-out executor. Runs every registered probe concurrently.
//!
//! All probes of one request are polled together on the calling task; nothing
//! is spawned. Each probe gets its own timeout and [`CancellationToken`], so a
//! hung probe is cut off at the deadline without touching its siblings. Faults
//! that escape a probe (an `Err` return or a panic) are converted into results
//! here and never reach the rollup.

use std::{any::Any, collections::BTreeMap, panic::AssertUnwindSafe, time::{Duration, Instant}};

use futures_util::{future::join_all, FutureExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    probes::{elapsed_ms, ProbeResult, ProbeStatus, TIMEOUT_MESSAGE},
    registry::{ProbeDescriptor, ProbeRegistry},
};

/// Probe name → result, for every probe in the registry.
pub type ProbeResults = BTreeMap<String, ProbeResult>;

/// Run every probe in `registry` and wait until all have settled or timed out.
///
/// The returned map always has exactly one entry per registered probe.
pub async fn run_probes(registry: &ProbeRegistry, timeout: Duration) -> ProbeResults {
    let started = Instant::now();

    let results = join_all(registry.iter().map(|descriptor| async move {
        (descriptor.name.clone(), run_probe(descriptor, timeout).await)
    }))
    .await;

    debug!(
        probes = results.len(),
        elapsed_ms = elapsed_ms(started),
        "probe fan-out complete"
    );

    results.into_iter().collect()
}

async fn run_probe(descriptor: &ProbeDescriptor, timeout: Duration) -> ProbeResult {
    let cancel = CancellationToken::new();
    let started = Instant::now();

    let check = AssertUnwindSafe(descriptor.probe.check(cancel.clone())).catch_unwind();

    let result = match tokio::time::timeout(timeout, check).await {
        Ok(Ok(Ok(result))) => fill_latency(result, elapsed_ms(started)),
        Ok(Ok(Err(e))) => {
            error!(probe = %descriptor.name, error = %e, "probe failed outside its contract");
            ProbeResult::error(format!("{e:#}"))
        }
        Ok(Err(panic)) => {
            let message = panic_message(panic.as_ref());
            error!(probe = %descriptor.name, panic = %message, "probe panicked");
            ProbeResult::error(format!("probe panicked: {message}"))
        }
        Err(_) => {
            cancel.cancel();
            ProbeResult::disconnected(TIMEOUT_MESSAGE)
        }
    };

    if result.is_failure() {
        warn!(
            probe = %descriptor.name,
            criticality = ?descriptor.criticality,
            status = ?result.status,
            error = result.error.as_deref().unwrap_or_default(),
            "dependency check failed"
        );
    }

    result
}

/// Connected results always carry a latency; measure it here if the probe did not.
fn fill_latency(result: ProbeResult, measured_ms: u64) -> ProbeResult {
    match (result.status, result.latency) {
        (ProbeStatus::Connected, None) => result.with_latency(measured_ms),
        _ => result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
