//! Failure boundary for the health endpoint.
//!
//! [`AppError`] wraps [`anyhow::Error`] and renders it as the fixed failure
//! report with status 500:
//!
//! ```json
//! { "status": "unhealthy", "message": "Health check failed",
//!   "timestamp": "...", "error": "..." }
//! ```
//!
//! The raw error text is only shown outside production; in production the
//! `error` field is the constant `"Internal error"`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rollup::OverallStatus;

pub const FAILURE_MESSAGE: &str = "Health check failed";
pub const REDACTED_ERROR: &str = "Internal error";

#[derive(Debug)]
pub struct AppError {
    source: anyhow::Error,
    redact: bool,
}

impl AppError {
    /// `redact` hides the error text from the response body; it is still logged.
    pub fn new(source: impl Into<anyhow::Error>, redact: bool) -> Self {
        Self { source: source.into(), redact }
    }
}

#[derive(Debug, Serialize)]
struct FailureReport {
    status: OverallStatus,
    message: &'static str,
    timestamp: DateTime<Utc>,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %format!("{:#}", self.source), "health check failed");
        let error = if self.redact {
            REDACTED_ERROR.to_string()
        } else {
            self.source.to_string()
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(FailureReport {
                status: OverallStatus::Unhealthy,
                message: FAILURE_MESSAGE,
                timestamp: Utc::now(),
                error,
            }),
        )
            .into_response()
    }
}
