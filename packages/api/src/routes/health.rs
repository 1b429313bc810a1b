use axum::extract::State;
use axum::{Json, Router, routing::get};
use gen_core::QueueStats;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the dispatcher is down.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub dispatcher_running: bool,
    pub queue: QueueStats,
}

/// GET /health -- service liveness plus a queue snapshot.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let dispatcher_running = state.service.is_running();

    Json(HealthResponse {
        status: if dispatcher_running { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        dispatcher_running,
        queue: state.service.stats(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
