//! Configuration types for svc-health.
//!
//! Config is loaded once at startup from a TOML file and validated before the
//! server opens any ports. Invalid configs are rejected with a clear error
//! rather than silently falling back to defaults.
//!
//! # Example
//! ```toml
//! [server]
//! service = "admin"
//! port    = 3001
//!
//! [dependencies.backend]
//! base_url = "http://localhost/api"
//!
//! [dependencies.oauth.google]
//! url = "https://accounts.google.com/.well-known/openid-configuration"
//! ```

use std::{collections::BTreeMap, path::Path};

use anyhow::Context;
use serde::Deserialize;

/// Which service this process is reporting health for.
///
/// The variants share one aggregation engine; they differ only in the probes
/// they register, their greeting, and which optional report sections they carry.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// API backend: database (critical) and cache (advisory).
    #[default]
    Backend,
    /// Admin front-end: upstream backend (critical) and OAuth providers (advisory).
    Admin,
    /// Player front-end: upstream backend only.
    Player,
}

impl ServiceKind {
    pub fn default_greeting(self) -> &'static str {
        match self {
            Self::Backend => "Hello from Scavenger Hunt Backend!",
            Self::Admin => "Admin dashboard is running",
            Self::Player => "Player app is running",
        }
    }

    pub fn default_route(self) -> &'static str {
        match self {
            Self::Backend => "/api/health",
            Self::Admin => "/admin/health",
            Self::Player => "/health",
        }
    }

    /// Whether verbose reports carry the `build` section.
    pub fn reports_build(self) -> bool {
        matches!(self, Self::Admin | Self::Player)
    }

    /// Whether verbose reports carry the `serviceMetrics` section.
    pub fn reports_metrics(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Backend => "backend",
            Self::Admin => "admin",
            Self::Player => "player",
        })
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Addresses of the downstream dependencies probed in verbose mode.
    #[serde(default)]
    pub dependencies: DependenciesConfig,

    #[serde(default)]
    pub introspection: IntrospectionConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay deployment environment variables on top of the file contents.
    ///
    /// `lookup` is injected so tests do not have to mutate the process environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = Some(port);
        }
        if let Some(env) = get("APP_ENV") {
            self.server.environment = env;
        }
        if let Some(url) = get("BACKEND_BASE_URL") {
            self.dependencies.backend = Some(HttpDependency { base_url: url });
        }
        if let Some(addr) = get("DATABASE_ADDR") {
            self.dependencies.database = Some(TcpDependency { address: addr });
        }
        if let Some(addr) = get("REDIS_ADDR") {
            self.dependencies.redis = Some(TcpDependency { address: addr });
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.probe_timeout_ms > 0,
            "server.probe_timeout_ms must be greater than zero"
        );

        if let Some(route) = &self.server.route {
            anyhow::ensure!(
                route.starts_with('/'),
                "server.route `{}` must start with `/`",
                route
            );
        }

        if let Some(backend) = &self.dependencies.backend {
            anyhow::ensure!(
                !backend.base_url.trim().is_empty(),
                "dependencies.backend.base_url must not be empty"
            );
        }

        for (name, dep) in [
            ("database", &self.dependencies.database),
            ("redis", &self.dependencies.redis),
        ] {
            if let Some(dep) = dep {
                anyhow::ensure!(
                    !dep.address.trim().is_empty(),
                    "dependencies.{}.address must not be empty",
                    name
                );
            }
        }

        for (provider, oauth) in &self.dependencies.oauth {
            anyhow::ensure!(
                !oauth.url.trim().is_empty(),
                "dependencies.oauth.{}.url must not be empty",
                provider
            );
        }

        Ok(())
    }

    /// The port to listen on, falling back to the service's default.
    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(match self.server.service {
            ServiceKind::Admin => 3001,
            ServiceKind::Backend | ServiceKind::Player => 3000,
        })
    }

    pub fn route(&self) -> &str {
        self.server
            .route
            .as_deref()
            .unwrap_or_else(|| self.server.service.default_route())
    }

    pub fn greeting(&self) -> &str {
        self.server
            .greeting
            .as_deref()
            .unwrap_or_else(|| self.server.service.default_greeting())
    }

    /// Raw fault messages are only exposed outside production.
    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }
}

/// Core server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Which registry, greeting and report sections to use.
    #[serde(default)]
    pub service: ServiceKind,

    /// Listen port (default: 3000, or 3001 for the admin service).
    #[serde(default)]
    pub port: Option<u16>,

    /// Deployment environment name, e.g. `development` or `production`.
    #[serde(default = "defaults::environment")]
    pub environment: String,

    /// Path the health endpoint is mounted on. Defaults per service.
    #[serde(default)]
    pub route: Option<String>,

    /// Base path the front-end is served under, reported in the environment section.
    #[serde(default)]
    pub base_path: Option<String>,

    /// Message returned in every report. Defaults per service.
    #[serde(default)]
    pub greeting: Option<String>,

    /// Per-probe timeout in milliseconds (default: 5 000).
    #[serde(default = "defaults::probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: ServiceKind::default(),
            port: None,
            environment: defaults::environment(),
            route: None,
            base_path: None,
            greeting: None,
            probe_timeout_ms: defaults::probe_timeout_ms(),
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Downstream dependency addresses. An absent entry is reported as
/// `Disconnected` with a "not configured" message rather than skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependenciesConfig {
    #[serde(default)]
    pub database: Option<TcpDependency>,

    #[serde(default)]
    pub redis: Option<TcpDependency>,

    /// Upstream API probed by the front-end services.
    #[serde(default)]
    pub backend: Option<HttpDependency>,

    /// OAuth providers keyed by provider name (`google`, `facebook`).
    #[serde(default)]
    pub oauth: BTreeMap<String, OAuthProvider>,
}

/// A dependency reached over a raw TCP socket (database, cache).
#[derive(Debug, Clone, Deserialize)]
pub struct TcpDependency {
    /// `host:port` to connect to.
    pub address: String,
}

/// An HTTP service probed with `GET {base_url}/health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpDependency {
    pub base_url: String,
}

/// An OAuth provider probed with `GET {url}`, typically its discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProvider {
    pub url: String,
}

/// Which environment variables the verbose report may disclose.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntrospectionConfig {
    /// Variables reported verbatim when set.
    #[serde(default)]
    pub expose_env: Option<Vec<String>>,

    /// Every variable whose name starts with this prefix is reported.
    #[serde(default)]
    pub expose_env_prefix: Option<String>,
}

impl IntrospectionConfig {
    /// Variables to expose, falling back to the service's defaults.
    pub fn exposed_vars(&self, service: ServiceKind) -> Vec<String> {
        match &self.expose_env {
            Some(vars) => vars.clone(),
            None if service == ServiceKind::Admin => {
                ["API_URL", "BACKEND_BASE_URL", "BASE_PATH", "OAUTH_ENABLED"]
                    .into_iter()
                    .map(String::from)
                    .collect()
            }
            None => Vec::new(),
        }
    }

    pub fn exposed_prefix(&self, service: ServiceKind) -> Option<String> {
        match &self.expose_env_prefix {
            Some(prefix) => Some(prefix.clone()),
            None if service == ServiceKind::Player => Some("NEXT_PUBLIC_".to_string()),
            None => None,
        }
    }
}

mod defaults {
    pub fn environment() -> String { "development".to_string() }
    pub fn probe_timeout_ms() -> u64 { 5_000 }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn admin_config() -> Config {
        toml::from_str(
            r#"
            [server]
            service = "admin"

            [dependencies.backend]
            base_url = "http://localhost/api"

            [dependencies.oauth.google]
            url = "https://accounts.google.com/.well-known/openid-configuration"
            "#,
        )
        .expect("admin config should parse")
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    // -----------------------------------------------------------------------
    // Parsing & validation
    // -----------------------------------------------------------------------

    #[test]
    fn parse_example_config() {
        let content = include_str!("../config.example.toml");
        let config: Config = toml::from_str(content).expect("example config should parse");
        config.validate().expect("example config should be valid");
    }

    #[test]
    fn empty_file_yields_backend_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        config.validate().unwrap();
        assert_eq!(config.server.service, ServiceKind::Backend);
        assert_eq!(config.server.probe_timeout_ms, 5_000);
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.port(), 3000);
        assert_eq!(config.route(), "/api/health");
        assert_eq!(config.greeting(), "Hello from Scavenger Hunt Backend!");
    }

    #[test]
    fn admin_defaults_follow_service_kind() {
        let config = admin_config();
        assert_eq!(config.port(), 3001);
        assert_eq!(config.route(), "/admin/health");
        assert_eq!(config.greeting(), "Admin dashboard is running");
        assert!(config.dependencies.oauth.contains_key("google"));
    }

    #[test]
    fn validation_rejects_zero_timeout() {
        let mut config = admin_config();
        config.server.probe_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_relative_route() {
        let mut config = admin_config();
        config.server.route = Some("health".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_blank_backend_url() {
        let mut config = admin_config();
        config.dependencies.backend = Some(HttpDependency { base_url: "  ".into() });
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_blank_database_address() {
        let mut config = Config::default();
        config.dependencies.database = Some(TcpDependency { address: String::new() });
        assert!(config.validate().is_err());
    }

    #[test]
    fn service_kind_deserializes_from_snake_case() {
        let config: Config = toml::from_str("[server]\nservice = \"player\"").unwrap();
        assert_eq!(config.server.service, ServiceKind::Player);
        assert!(toml::from_str::<Config>("[server]\nservice = \"other\"").is_err());
    }

    // -----------------------------------------------------------------------
    // Environment overrides
    // -----------------------------------------------------------------------

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = admin_config();
        config.apply_env_overrides(env(&[
            ("PORT", "8088"),
            ("APP_ENV", "production"),
            ("BACKEND_BASE_URL", "http://backend:3000/api"),
            ("DATABASE_ADDR", "db:5432"),
        ]));
        assert_eq!(config.port(), 8088);
        assert!(config.is_production());
        assert_eq!(
            config.dependencies.backend.unwrap().base_url,
            "http://backend:3000/api"
        );
        assert_eq!(config.dependencies.database.unwrap().address, "db:5432");
    }

    #[test]
    fn env_overrides_ignore_empty_and_unparsable_values() {
        let mut config = admin_config();
        config.apply_env_overrides(env(&[("PORT", "not-a-port"), ("APP_ENV", "")]));
        assert_eq!(config.port(), 3001);
        assert_eq!(config.server.environment, "development");
    }

    // -----------------------------------------------------------------------
    // Introspection defaults
    // -----------------------------------------------------------------------

    #[test]
    fn exposed_env_defaults_per_service() {
        let intro = IntrospectionConfig::default();
        assert!(intro.exposed_vars(ServiceKind::Admin).contains(&"OAUTH_ENABLED".to_string()));
        assert!(intro.exposed_vars(ServiceKind::Backend).is_empty());
        assert_eq!(
            intro.exposed_prefix(ServiceKind::Player).as_deref(),
            Some("NEXT_PUBLIC_")
        );
        assert!(intro.exposed_prefix(ServiceKind::Admin).is_none());
    }

    #[test]
    fn explicit_exposed_env_overrides_defaults() {
        let intro = IntrospectionConfig {
            expose_env: Some(vec!["FOO".into()]),
            expose_env_prefix: Some("APP_".into()),
        };
        assert_eq!(intro.exposed_vars(ServiceKind::Admin), vec!["FOO".to_string()]);
        assert_eq!(intro.exposed_prefix(ServiceKind::Player).as_deref(), Some("APP_"));
    }
}
