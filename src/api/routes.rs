//! API route definitions
//!
//! - /health, /db-check - liveness and store connectivity
//! - /api/analytics/* - process metrics, quality, opportunities, KPIs
//! - /api/data/:table - raw telemetry rows
//! - /api/locations/* - plant catalogue and proximity search
//! - /api/ai/* - chat assistant and tool invocation

use axum::{routing::{get, post}, Router};

use super::handlers::{self, AppState};

/// Routes mounted under `/api`.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        // Analytics
        .route("/analytics/efficiency", get(handlers::plant_efficiency))
        .route("/analytics/efficiency/:process", get(handlers::process_efficiency))
        .route("/analytics/quality-trends", get(handlers::quality_trends_handler))
        .route("/analytics/opportunities", get(handlers::opportunities))
        .route("/analytics/kpis", get(handlers::kpis))
        // Raw telemetry
        .route("/data/:table", get(handlers::table_records))
        // Locations (static segments before the parameterized lookup)
        .route("/locations", get(handlers::list_locations))
        .route("/locations/stats/summary", get(handlers::location_stats))
        .route("/locations/map/markers", get(handlers::location_markers))
        .route("/locations/nearby/:code", get(handlers::nearby_locations))
        .route("/locations/state/:state", get(handlers::locations_by_state))
        .route("/locations/:code", get(handlers::get_location))
        // Chat assistant
        .route("/ai/chat", post(handlers::chat))
        .route("/ai/chat/stats", get(handlers::chat_stats))
        .route("/ai/chat/history/:session_id", get(handlers::chat_history))
        .route("/ai/tools", get(handlers::list_tools))
        .route("/ai/tools/:name", post(handlers::invoke_tool))
        .with_state(state)
}

/// Top-level operational endpoints.
pub fn root_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/db-check", get(handlers::db_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlantConfig;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        AppState::new(
            Arc::new(MemoryStore::demo()),
            Arc::new(PlantConfig::default()),
        )
        .unwrap()
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn static_location_routes_win_over_code_lookup() {
        let app = api_routes(create_test_state());
        assert_eq!(get_status(app.clone(), "/locations/stats/summary").await, StatusCode::OK);
        assert_eq!(get_status(app.clone(), "/locations/map/markers").await, StatusCode::OK);
        assert_eq!(get_status(app.clone(), "/locations/NMB").await, StatusCode::OK);
        assert_eq!(get_status(app, "/locations/NOPE").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_health_route() {
        let app = root_routes(create_test_state());
        assert_eq!(get_status(app.clone(), "/health").await, StatusCode::OK);
        assert_eq!(get_status(app, "/db-check").await, StatusCode::OK);
    }
}
