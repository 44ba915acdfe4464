//! Health check handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// Liveness text served at the root, kept for existing clients.
pub const ROOT_MESSAGE: &str = "PDF Tools Backend is running!";

/// GET /
pub async fn root() -> &'static str {
    ROOT_MESSAGE
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let orchestrator = &state.orchestrator;

    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        operations: orchestrator
            .registry()
            .operations()
            .into_iter()
            .map(|op| op.id().to_string())
            .collect(),
        conversions: orchestrator.metrics().snapshot(),
    }))
}
