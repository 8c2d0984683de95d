//! The health endpoint.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// Only the literal `true` selects verbose mode.
    #[serde(default)]
    verbose: Option<String>,
}

impl HealthQuery {
    fn is_verbose(&self) -> bool {
        self.verbose.as_deref() == Some("true")
    }
}

/// `GET <route>[?verbose=true]`: minimal liveness or full dependency report.
///
/// Status code: 200 for healthy and degraded, 503 for unhealthy, 500 when the
/// report itself could not be assembled. A query string that does not parse
/// (repeated `verbose`, bad encoding) gets the minimal report, not a 400.
pub async fn health(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HealthQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let report = state
        .engine
        .build_report(query.is_verbose())
        .await
        .map_err(|e| AppError::new(e, state.redact_errors))?;

    Ok((report.status.http_status(), Json(report)))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt; // oneshot

    use crate::{
        api::{router, AppState},
        probes::ProbeResult,
        registry::{Criticality, ProbeRegistry},
        report::{
            tests::{BrokenSnapshot, StaticSnapshot},
            HealthEngine,
        },
    };

    // -----------------------------------------------------------------------
    // Test helpers
    // -----------------------------------------------------------------------

    fn app(entries: Vec<(&str, Criticality, ProbeResult)>, redact_errors: bool) -> Router {
        let mut registry = ProbeRegistry::new();
        for (name, criticality, result) in entries {
            registry
                .register(name, criticality, crate::executor::tests::Fixed::new(result))
                .unwrap();
        }
        let engine = HealthEngine::new(
            "Player app is running",
            registry,
            Arc::new(StaticSnapshot),
            Duration::from_millis(200),
        );
        router(Arc::new(AppState { engine, redact_errors }), "/health")
    }

    fn broken_app(redact_errors: bool) -> Router {
        let engine = HealthEngine::new(
            "Player app is running",
            ProbeRegistry::new(),
            Arc::new(BrokenSnapshot),
            Duration::from_millis(200),
        );
        router(Arc::new(AppState { engine, redact_errors }), "/health")
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn minimal_request_returns_only_status_message_timestamp() {
        let app = app(
            vec![("backend", Criticality::Critical, ProbeResult::disconnected("refused"))],
            false,
        );
        let (status, json) = get(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["message"], "Player app is running");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn verbose_other_than_true_is_minimal() {
        let app = app(
            vec![("backend", Criticality::Critical, ProbeResult::disconnected("refused"))],
            false,
        );
        let (status, json) = get(app, "/health?verbose=1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("dependencies").is_none());
    }

    #[tokio::test]
    async fn unparsable_query_falls_back_to_minimal() {
        for uri in ["/health?verbose=true&verbose=false", "/health?verbose=%FF%FE"] {
            let app = app(
                vec![("backend", Criticality::Critical, ProbeResult::disconnected("refused"))],
                false,
            );
            let (status, json) = get(app, uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(json.as_object().unwrap().len(), 3, "{uri}");
        }
    }

    #[tokio::test]
    async fn verbose_critical_failure_returns_503() {
        let app = app(
            vec![("backend", Criticality::Critical, ProbeResult::disconnected("refused"))],
            false,
        );
        let (status, json) = get(app, "/health?verbose=true").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["dependencies"]["backend"]["status"], "disconnected");
        assert_eq!(json["dependencies"]["backend"]["error"], "refused");
    }

    #[tokio::test]
    async fn verbose_advisory_failure_returns_200_degraded() {
        let app = app(
            vec![
                ("backend", Criticality::Critical, ProbeResult::connected(4)),
                ("auth.google", Criticality::Advisory, ProbeResult::error("Google returned 500")),
            ],
            false,
        );
        let (status, json) = get(app, "/health?verbose=true").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["dependencies"]["backend"]["latency"], 4);
    }

    #[tokio::test]
    async fn introspection_fault_returns_500_with_detail_in_development() {
        let (status, json) = get(broken_app(false), "/health?verbose=true").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["message"], "Health check failed");
        assert_eq!(json["error"], "process table unavailable");
    }

    #[tokio::test]
    async fn introspection_fault_is_redacted_in_production() {
        let (status, json) = get(broken_app(true), "/health?verbose=true").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal error");
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let (status, json) = get(app(vec![], false), "/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Not Found");
    }
}
