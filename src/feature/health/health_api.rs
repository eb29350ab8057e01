//! APIs for checking on the running application.

use crate::infra::{extract::Json, state::AppState};
use axum::{extract::State, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The health, readiness and metrics endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
}

/// How the application is doing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Health {
    /// `UP` while the application serves requests.
    pub status: String,
    /// Seconds since the application started.
    pub uptime_seconds: u64,
    /// Requests served by the greeting service.
    pub requests: u64,
}

/// Reports the health of the application.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Success", body = Health),
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "UP".to_string(),
        uptime_seconds: state.started().elapsed().as_secs(),
        requests: state.greetings().request_count(),
    })
}

/// Tells load balancers that requests may be sent our way.
#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Ready", body = String),
    )
)]
pub async fn ready() -> &'static str {
    "Ready!"
}

/// Renders metrics in the Prometheus text format.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
