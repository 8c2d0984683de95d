//! Socket-level reachability probe for the database and cache.
//!
//! Opening a TCP connection proves the server is listening; it does not
//! authenticate or run a query.

use std::time::Instant;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::{elapsed_ms, Probe, ProbeResult, TIMEOUT_MESSAGE};

#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
}

impl TcpProbe {
    /// `address` is `host:port`; host names are resolved on every check.
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into() }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self, cancel: CancellationToken) -> anyhow::Result<ProbeResult> {
        let started = Instant::now();

        let connect = tokio::select! {
            _ = cancel.cancelled() => return Ok(ProbeResult::disconnected(TIMEOUT_MESSAGE)),
            connect = TcpStream::connect(self.address.as_str()) => connect,
        };

        Ok(match connect {
            Ok(_stream) => ProbeResult::connected(elapsed_ms(started)),
            Err(e) => ProbeResult::disconnected(format!("{}: {e}", self.address)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ProbeStatus;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_socket_is_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = TcpProbe::new(addr.to_string())
            .check(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, ProbeStatus::Connected);
        assert!(result.latency.is_some());
    }

    #[tokio::test]
    async fn closed_port_is_disconnected_with_reason() {
        // Bind then drop to obtain a port that is free but not listening.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let result = TcpProbe::new(addr.to_string())
            .check(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, ProbeStatus::Disconnected);
        assert!(result.error.unwrap().contains(&addr.to_string()));
    }

    #[tokio::test]
    async fn unresolvable_host_is_disconnected() {
        let result = TcpProbe::new("no-such-host.invalid:5432")
            .check(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, ProbeStatus::Disconnected);
    }
}
