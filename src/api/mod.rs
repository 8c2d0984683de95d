//! HTTP surface, a thin layer over [`HealthEngine`].
//!
//! Handlers translate the query string into a verbosity flag and the report
//! status into a transport code; all aggregation logic lives in
//! [`crate::report`].

pub mod health;

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::report::HealthEngine;

/// Shared state injected into every handler via [`axum::extract::State`].
pub struct AppState {
    pub engine: HealthEngine,
    /// Hide fault details from failure responses (production deployments).
    pub redact_errors: bool,
}

/// Build the axum router with the health endpoint mounted at `route`.
pub fn router(state: Arc<AppState>, route: &str) -> Router {
    Router::new()
        .route(route, get(health::health))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested resource was not found",
        })),
    )
}
