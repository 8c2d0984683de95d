//! HTTP probe for upstream services and OAuth providers.
//!
//! A single `GET` is issued per check. Any 2xx is healthy; any other status
//! means the service answered but is not well (`Error`); a transport failure
//! means it could not be reached (`Disconnected`).

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::{elapsed_ms, Probe, ProbeResult, TIMEOUT_MESSAGE};

pub struct HttpProbe {
    client: Client,
    url: String,
    label: String,
}

impl HttpProbe {
    /// Probe `GET {base_url}/health` on an upstream service.
    pub fn health_endpoint(
        label: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        Self::new(label, url, timeout)
    }

    /// Probe an exact URL, e.g. an OAuth provider's discovery document.
    ///
    /// `timeout` bounds the client itself; the executor's timeout still applies
    /// on top of it.
    pub fn new(label: impl Into<String>, url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;

        Ok(Self {
            client,
            url: url.into(),
            label: label.into(),
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, cancel: CancellationToken) -> anyhow::Result<ProbeResult> {
        let started = Instant::now();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Ok(ProbeResult::disconnected(TIMEOUT_MESSAGE)),
            response = self.client.get(&self.url).send() => response,
        };
        let latency = elapsed_ms(started);

        Ok(match response {
            Ok(resp) if resp.status().is_success() => ProbeResult::connected(latency),
            Ok(resp) => ProbeResult::error(format!(
                "{} returned {}",
                self.label,
                resp.status().as_u16()
            ))
            .with_latency(latency),
            Err(e) if e.is_timeout() => ProbeResult::disconnected(TIMEOUT_MESSAGE),
            // reqwest keeps the OS-level cause (refused, DNS) in the source chain.
            Err(e) => ProbeResult::disconnected(format!("{:#}", anyhow::Error::new(e))),
        })
    }
}
