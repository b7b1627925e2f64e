//! Liveness and data-store connectivity

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use tracing::warn;

use super::AppState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub plant: String,
    pub store: &'static str,
    pub chat_enabled: bool,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct DbCheckResponse {
    pub status: &'static str,
    pub backend: &'static str,
}

/// GET /health
///
/// Always 200 while the process is serving; does not touch the store.
pub async fn health(State(state): State<AppState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        plant: state.config.plant.name.clone(),
        store: state.store.backend_name(),
        chat_enabled: state.chat.is_some(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /db-check
pub async fn db_check(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => ApiResponse::ok(DbCheckResponse {
            status: "connected",
            backend: state.store.backend_name(),
        }),
        Err(e) => {
            warn!(backend = state.store.backend_name(), error = %e, "Data store check failed");
            ApiErrorResponse::service_unavailable(format!("Data store unreachable: {e}"))
        }
    }
}
