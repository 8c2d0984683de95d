//! The fixed, per-service list of named probes.
//!
//! A [`ProbeRegistry`] is built once at startup and is read-only afterwards, so
//! it can be shared across concurrent requests behind an `Arc` without locking.

use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    config::{Config, ServiceKind},
    probes::{HttpProbe, Probe, TcpProbe, Unconfigured},
};

/// How much a probe's failure counts against the overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Failure makes the whole service `Unhealthy`.
    Critical,
    /// Failure makes the service at most `Degraded`.
    Advisory,
}

/// A named probe and its criticality.
pub struct ProbeDescriptor {
    pub name: String,
    pub criticality: Criticality,
    pub probe: Arc<dyn Probe>,
}

impl std::fmt::Debug for ProbeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeDescriptor")
            .field("name", &self.name)
            .field("criticality", &self.criticality)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("probe `{0}` is already registered")]
    DuplicateProbe(String),
}

#[derive(Debug, Default)]
pub struct ProbeRegistry {
    probes: Vec<ProbeDescriptor>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a probe. Names must be unique within the registry.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        criticality: Criticality,
        probe: impl Probe + 'static,
    ) -> Result<&mut Self, RegistryError> {
        let name = name.into();
        if self.probes.iter().any(|d| d.name == name) {
            return Err(RegistryError::DuplicateProbe(name));
        }
        self.probes.push(ProbeDescriptor {
            name,
            criticality,
            probe: Arc::new(probe),
        });
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeDescriptor> {
        self.probes.iter()
    }

    /// Build the registry for the service selected in `config`.
    ///
    /// | service | probes                                              |
    /// |---------|-----------------------------------------------------|
    /// | backend | `database` (critical), `redis` (advisory)           |
    /// | admin   | `backend` (critical), `auth.<provider>` (advisory)  |
    /// | player  | `backend` (critical)                                |
    ///
    /// Dependencies missing from the config are still registered, as probes that
    /// always report "not configured".
    pub fn for_service(config: &Config) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(config.server.probe_timeout_ms);
        let deps = &config.dependencies;
        let mut registry = Self::new();

        match config.server.service {
            ServiceKind::Backend => {
                match &deps.database {
                    Some(db) => registry.register("database", Criticality::Critical, TcpProbe::new(&db.address))?,
                    None => registry.register("database", Criticality::Critical, Unconfigured::new("Database"))?,
                };
                match &deps.redis {
                    Some(redis) => registry.register("redis", Criticality::Advisory, TcpProbe::new(&redis.address))?,
                    None => registry.register("redis", Criticality::Advisory, Unconfigured::new("Redis"))?,
                };
            }
            ServiceKind::Admin | ServiceKind::Player => {
                match &deps.backend {
                    Some(backend) => registry.register(
                        "backend",
                        Criticality::Critical,
                        HttpProbe::health_endpoint("Backend", &backend.base_url, timeout)?,
                    )?,
                    None => registry.register("backend", Criticality::Critical, Unconfigured::new("Backend"))?,
                };
            }
        }

        if config.server.service == ServiceKind::Admin {
            for provider in OAUTH_PROVIDERS {
                let name = format!("auth.{provider}");
                match deps.oauth.get(provider) {
                    Some(oauth) => registry.register(
                        name,
                        Criticality::Advisory,
                        HttpProbe::new(provider_label(provider), &oauth.url, timeout)?,
                    )?,
                    None => registry.register(name, Criticality::Advisory, Unconfigured::new("OAuth"))?,
                };
            }
        }

        Ok(registry)
    }
}

/// Providers the admin service always reports on, configured or not.
pub const OAUTH_PROVIDERS: [&str; 2] = ["google", "facebook"];

/// `google` -> `Google`, for probe messages such as "Google returned 500".
fn provider_label(provider: &str) -> String {
    let mut chars = provider.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
