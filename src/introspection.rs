//! Process, host and build introspection for verbose reports.
//!
//! The report builder never reads process-wide state directly; it asks an
//! [`EnvironmentSnapshot`] for the diagnostic sections. [`ProcessSnapshot`] is
//! the live implementation backed by `sysinfo`; tests substitute their own.

use std::{collections::BTreeMap, time::Instant};

use anyhow::Context;
use serde::Serialize;
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind,
    System,
};

use crate::{
    config::{Config, ServiceKind},
    registry::OAUTH_PROVIDERS,
};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionInfo {
    pub app: String,
    pub package: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryInfo {
    /// Resident memory of this process, MiB.
    pub used: u64,
    /// Total system memory, MiB.
    pub total: u64,
    /// `used / total` as a percentage, two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeInfo {
    /// Seconds since the snapshot collaborator was created.
    pub uptime: u64,
    pub memory: MemoryInfo,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub env: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    /// Whitelisted environment variables that are set.
    #[serde(flatten)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    pub platform: String,
    pub hostname: String,
    pub cpus: usize,
    pub arch: String,
    pub release: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub active_sessions: u64,
    pub auth_providers: Vec<String>,
}

/// Everything a verbose report carries besides the probe results.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub version: VersionInfo,
    pub runtime: RuntimeInfo,
    pub environment: EnvironmentInfo,
    pub system: SystemInfo,
    pub build: Option<BuildInfo>,
    pub service_metrics: Option<ServiceMetrics>,
}

/// Read-only view of the process environment, injected into the report builder.
pub trait EnvironmentSnapshot: Send + Sync {
    fn capture(&self) -> anyhow::Result<Diagnostics>;
}

/// Live snapshot of the running process and host.
pub struct ProcessSnapshot {
    started_at: Instant,
    service: ServiceKind,
    environment: String,
    port: u16,
    base_path: Option<String>,
    exposed_vars: Vec<String>,
    exposed_prefix: Option<String>,
    auth_providers: Vec<String>,
}

impl ProcessSnapshot {
    pub fn new(config: &Config) -> Self {
        let service = config.server.service;
        Self {
            started_at: Instant::now(),
            service,
            environment: config.server.environment.clone(),
            port: config.port(),
            base_path: config.server.base_path.clone(),
            exposed_vars: config.introspection.exposed_vars(service),
            exposed_prefix: config.introspection.exposed_prefix(service),
            auth_providers: OAUTH_PROVIDERS
                .iter()
                .filter(|p| config.dependencies.oauth.contains_key(**p))
                .map(|p| p.to_string())
                .collect(),
        }
    }

    fn version() -> VersionInfo {
        VersionInfo {
            app: env!("CARGO_PKG_VERSION").to_string(),
            package: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    fn runtime(&self, sys: &System, pid: Pid) -> anyhow::Result<RuntimeInfo> {
        let used_bytes = sys
            .process(pid)
            .map(|p| p.memory())
            .context("current process missing from process table")?;
        let total_bytes = sys.total_memory();

        Ok(RuntimeInfo {
            uptime: self.started_at.elapsed().as_secs(),
            memory: memory_info(used_bytes, total_bytes),
            pid: pid.as_u32(),
        })
    }

    fn environment(&self) -> EnvironmentInfo {
        EnvironmentInfo {
            env: self.environment.clone(),
            port: self.port,
            base_path: self.base_path.clone(),
            variables: select_variables(
                std::env::vars_os().filter_map(|(k, v)| {
                    Some((k.into_string().ok()?, v.into_string().ok()?))
                }),
                &self.exposed_vars,
                self.exposed_prefix.as_deref(),
            ),
        }
    }

    fn system(sys: &System) -> SystemInfo {
        SystemInfo {
            platform: std::env::consts::OS.to_string(),
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            cpus: sys.cpus().len(),
            arch: std::env::consts::ARCH.to_string(),
            release: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
        }
    }

    fn build() -> BuildInfo {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        BuildInfo {
            build_id: var("BUILD_ID"),
            build_time: var("BUILD_TIME"),
            git_commit: var("GIT_COMMIT"),
        }
    }
}

impl EnvironmentSnapshot for ProcessSnapshot {
    fn capture(&self) -> anyhow::Result<Diagnostics> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| anyhow::anyhow!("resolving current pid: {e}"))?;

        // Only this process is refreshed; walking the whole process table scales
        // with host load. CPU usage is not reported, only the core count.
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_memory(MemoryRefreshKind::new().with_ram())
                .with_cpu(CpuRefreshKind::new()),
        );
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::new().with_memory(),
        );

        Ok(Diagnostics {
            version: Self::version(),
            runtime: self.runtime(&sys, pid)?,
            environment: self.environment(),
            system: Self::system(&sys),
            build: self.service.reports_build().then(Self::build),
            service_metrics: self.service.reports_metrics().then(|| ServiceMetrics {
                active_sessions: 0,
                auth_providers: self.auth_providers.clone(),
            }),
        })
    }
}

fn memory_info(used_bytes: u64, total_bytes: u64) -> MemoryInfo {
    let percentage = if total_bytes == 0 {
        0.0
    } else {
        (used_bytes as f64 / total_bytes as f64 * 100.0 * 100.0).round() / 100.0
    };
    MemoryInfo {
        used: (used_bytes as f64 / MIB).round() as u64,
        total: (total_bytes as f64 / MIB).round() as u64,
        percentage,
    }
}

/// Keep variables named in `names` or starting with `prefix`.
fn select_variables(
    vars: impl Iterator<Item = (String, String)>,
    names: &[String],
    prefix: Option<&str>,
) -> BTreeMap<String, String> {
    vars.filter(|(key, value)| {
        !value.is_empty()
            && (names.iter().any(|n| n == key) || prefix.is_some_and(|p| key.starts_with(p)))
    })
    .collect()
}
