//! Health and banner handlers for service monitoring.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Optional error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Database reachable, service operational
    Ok,
    /// Database connectivity failing
    Unavailable,
}

/// Health check endpoint.
///
/// Runs a lightweight connectivity check against the event store.
/// Designed for frequent polling by load balancers, so nothing
/// expensive happens here.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let timestamp = state.clock.now_utc();

    match state.store.health_check().await {
        Ok(()) => {
            debug!("health check passed");
            let body = HealthResponse { status: HealthStatus::Ok, timestamp, message: None };
            (StatusCode::OK, Json(body)).into_response()
        },
        Err(e) => {
            error!(error = %e, "health check failed");
            let body = HealthResponse {
                status: HealthStatus::Unavailable,
                timestamp,
                message: Some("database connectivity check failed".to_string()),
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        },
    }
}

/// Root endpoint confirming the service is up.
#[instrument(name = "service_banner")]
pub async fn service_banner() -> Response {
    let body = serde_json::json!({
        "message": "Webhook service is running."
    });

    (StatusCode::OK, Json(body)).into_response()
}
