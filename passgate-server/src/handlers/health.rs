//! Liveness and readiness probes
//!
//! Readiness also reflects whether the credential store answers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Body of `/health`
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Whether credentials survive a restart
    pub persistent_store: bool,
    /// Always `passgate-server`
    pub service: &'static str,
}

/// `GET /health`: the process is up
///
/// Liveness only; does not touch the credential store.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        persistent_store: state.orchestrator.store().is_persistent(),
        service: "passgate-server",
    })
}

/// Body of `/ready`
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// True when ceremonies can be served
    pub ready: bool,
    /// Why the service is not ready, if it isn't
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// `GET /ready`: the credential store is reachable
///
/// Returns 503 while the credential store is unreachable.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to accept traffic", body = ReadyResponse),
        (status = 503, description = "Credential store unavailable", body = ReadyResponse)
    )
)]
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    match state.orchestrator.store().health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    message: Some("credential store unavailable"),
                }),
            )
        }
    }
}
