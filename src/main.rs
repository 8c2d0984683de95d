use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::signal;
use tracing::info;

mod api;
mod config;
mod error;
mod executor;
mod introspection;
mod probes;
mod registry;
mod report;
mod rollup;

pub use config::Config;

use config::LogFormat;
use introspection::ProcessSnapshot;
use registry::ProbeRegistry;
use report::HealthEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("SVC_HEALTH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/svc-health/config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // When invoked as a container HEALTHCHECK, hit the minimal endpoint and exit.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck(&config).await;
    }

    init_tracing(config.server.log_format);

    let registry = ProbeRegistry::for_service(&config).context("building probe registry")?;
    let engine = HealthEngine::new(
        config.greeting(),
        registry,
        Arc::new(ProcessSnapshot::new(&config)),
        Duration::from_millis(config.server.probe_timeout_ms),
    );

    let probe_names: Vec<&str> = engine.registry().iter().map(|d| d.name.as_str()).collect();
    info!(
        service = %config.server.service,
        port = config.port(),
        route = config.route(),
        probes = ?probe_names,
        "svc-health starting"
    );
    let state = Arc::new(api::AppState {
        engine,
        redact_errors: config.is_production(),
    });

    let app = api::router(state, config.route())
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
        );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port()).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("server closed");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "svc_health=info,tower_http=warn".into());

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, closing HTTP server");
}

/// Lightweight self-probe: GET the minimal endpoint and exit 0 on 2xx, 1 otherwise.
/// Invoked via `svc-health --healthcheck` from a container HEALTHCHECK.
async fn healthcheck(config: &Config) -> anyhow::Result<()> {
    let url = format!("http://127.0.0.1:{}{}", config.port(), config.route());
    let ok = match reqwest::get(&url).await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    };

    std::process::exit(if ok { 0 } else { 1 });
}
