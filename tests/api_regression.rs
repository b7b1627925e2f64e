//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! every route using `tower::ServiceExt::oneshot()` against `MemoryStore`.
//! No binary spawn, no network port, no database.

use cement_ops::api::{create_app, AppState};
use cement_ops::config::PlantConfig;
use cement_ops::store::MemoryStore;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn demo_state() -> AppState {
    AppState::new(Arc::new(MemoryStore::demo()), Arc::new(PlantConfig::default())).unwrap()
}

fn offline_state() -> AppState {
    AppState::new(Arc::new(MemoryStore::offline()), Arc::new(PlantConfig::default())).unwrap()
}

async fn get(state: AppState, uri: &str) -> Response {
    create_app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// GET and unwrap the envelope's `data`, asserting 200.
async fn get_data(state: AppState, uri: &str) -> Value {
    let resp = get(state, uri).await;
    assert_eq!(resp.status(), StatusCode::OK, "GET {uri}");
    let v = body_json(resp).await;
    assert!(v["meta"]["timestamp"].is_string(), "GET {uri} missing meta");
    v["data"].clone()
}

async fn error_code(state: AppState, uri: &str) -> (StatusCode, String) {
    let resp = get(state, uri).await;
    let status = resp.status();
    let v = body_json(resp).await;
    (status, v["error"]["code"].as_str().unwrap_or_default().to_string())
}

// ============================================================================
// Smoke
// ============================================================================

/// All GET endpoints should return 200 with the envelope.
#[tokio::test]
async fn test_get_endpoints_return_200() {
    let endpoints = [
        "/health",
        "/db-check",
        "/api/analytics/efficiency",
        "/api/analytics/efficiency/kiln",
        "/api/analytics/efficiency/raw_material",
        "/api/analytics/quality-trends",
        "/api/analytics/opportunities",
        "/api/analytics/kpis",
        "/api/data/kiln-operations",
        "/api/data/ai_recommendations",
        "/api/locations",
        "/api/locations/NMB",
        "/api/locations/nearby/NMB",
        "/api/locations/stats/summary",
        "/api/locations/state/Rajasthan",
        "/api/locations/map/markers",
        "/api/ai/chat/stats",
        "/api/ai/chat/history/session_missing",
        "/api/ai/tools",
    ];

    for endpoint in endpoints {
        let resp = get(demo_state(), endpoint).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {endpoint}");
        let v = body_json(resp).await;
        assert!(v.get("data").is_some(), "GET {endpoint} missing data");
        assert_eq!(v["meta"]["version"], "1");
    }
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let (status, code) = error_code(demo_state(), "/api/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code, "NOT_FOUND");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let resp = get(demo_state(), "/health").await;
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_health_reports_store_and_chat() {
    let data = get_data(demo_state(), "/health").await;
    assert_eq!(data["status"], "healthy");
    assert_eq!(data["store"], "memory");
    assert_eq!(data["chat_enabled"], false);
}

// ============================================================================
// Analytics
// ============================================================================

#[tokio::test]
async fn test_kiln_efficiency_flags_low_alternative_fuel() {
    let data = get_data(demo_state(), "/api/analytics/efficiency/kiln?hours=48").await;
    assert_eq!(data["process"], "kiln");
    assert_eq!(data["window_hours"], 48);
    let afr = &data["metrics"]["alternative_fuel_rate_pct"];
    assert_eq!(afr["value"], 25.0);
    assert_eq!(afr["status"], "needs-attention");
    assert_eq!(data["metrics"]["thermal_efficiency"]["value"], 14.4);
}

#[tokio::test]
async fn test_raw_mix_lsf_below_band() {
    let data = get_data(demo_state(), "/api/analytics/efficiency/raw-material").await;
    let lsf = &data["metrics"]["lsf"];
    assert_eq!(lsf["status"], "needs-attention");
    assert!(lsf["message"].as_str().unwrap().contains("92-96"));
}

#[tokio::test]
async fn test_plant_efficiency_lists_every_process() {
    let data = get_data(demo_state(), "/api/analytics/efficiency?hours=12").await;
    assert_eq!(data["window_hours"], 12);
    assert_eq!(data["processes"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_bad_analytics_input_is_400() {
    for uri in [
        "/api/analytics/efficiency/furnace",
        "/api/analytics/efficiency/kiln?hours=0",
        "/api/analytics/efficiency/kiln?hours=-5",
        "/api/analytics/efficiency/kiln?hours=lots",
        "/api/analytics/quality-trends?days=0",
    ] {
        let (status, code) = error_code(demo_state(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "GET {uri}");
        assert_eq!(code, "BAD_REQUEST", "GET {uri}");
    }
}

#[tokio::test]
async fn test_oversized_window_is_clamped() {
    let data = get_data(demo_state(), "/api/analytics/efficiency/grinding?hours=100000").await;
    assert_eq!(data["window_hours"], 8760);
}

#[tokio::test]
async fn test_quality_trends_default_week() {
    let data = get_data(demo_state(), "/api/analytics/quality-trends").await;
    assert_eq!(data["days"], 7);
    assert_eq!(data["quality_status"], "Excellent");
    assert_eq!(data["metrics"]["defect_rate_pct"]["value"], 1.0);
}

#[tokio::test]
async fn test_opportunities_include_fuel_and_total() {
    let data = get_data(demo_state(), "/api/analytics/opportunities").await;
    let ops = data["opportunities"].as_array().unwrap();
    assert!(ops.iter().any(|o| o["category"] == "Fuel Optimization" && o["priority"] == "High"));
    let total: f64 = ops.iter().map(|o| o["estimated_savings"].as_f64().unwrap()).sum();
    assert_eq!(data["total_estimated_savings"].as_f64().unwrap(), total);
}

#[tokio::test]
async fn test_kpis_from_demo_data() {
    let data = get_data(demo_state(), "/api/analytics/kpis").await;
    assert_eq!(data["production_efficiency"]["value"], 180.0);
    assert_eq!(data["quality_score"]["value"], 99.0);
    assert_eq!(data["alternative_fuel_rate"]["target"], 30.0);
}

/// A failed store degrades metric endpoints to unavailable readings.
#[tokio::test]
async fn test_analytics_degrade_when_store_offline() {
    let data = get_data(offline_state(), "/api/analytics/efficiency/kiln").await;
    assert_eq!(data["data_available"], false);
    assert!(data["upstream_error"].is_string());
    assert_eq!(data["metrics"]["thermal_efficiency"]["available"], false);

    let data = get_data(offline_state(), "/api/analytics/kpis").await;
    assert_eq!(data["production_efficiency"]["available"], false);
}

// ============================================================================
// Raw telemetry
// ============================================================================

#[tokio::test]
async fn test_records_newest_first_with_limit() {
    let data = get_data(demo_state(), "/api/data/alternative-fuels?limit=2").await;
    assert_eq!(data["table"], "alternative-fuels");
    assert_eq!(data["count"], 2);
    assert_eq!(data["records"][0]["fuel_type"], "Tyre chips");
}

#[tokio::test]
async fn test_record_filters_apply_per_table() {
    let data = get_data(demo_state(), "/api/data/optimization-results?type=FUEL").await;
    assert_eq!(data["count"], 1);
    assert_eq!(data["records"][0]["optimization_type"], "fuel_mix");

    let data = get_data(demo_state(), "/api/data/ai-recommendations?status=pending").await;
    assert_eq!(data["count"], 1);

    // Tables without a filter ignore it
    let data = get_data(demo_state(), "/api/data/alternative-fuels?status=pending").await;
    assert_eq!(data["count"], 3);
}

#[tokio::test]
async fn test_record_input_validation() {
    for uri in [
        "/api/data/users",
        "/api/data/kiln-operations?limit=0",
        "/api/data/kiln-operations?limit=1001",
    ] {
        let (status, _) = error_code(demo_state(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "GET {uri}");
    }
}

#[tokio::test]
async fn test_records_empty_when_store_offline() {
    let data = get_data(offline_state(), "/api/data/kiln-operations").await;
    assert_eq!(data["count"], 0);
}

// ============================================================================
// Locations
// ============================================================================

#[tokio::test]
async fn test_location_list_and_filter() {
    let data = get_data(demo_state(), "/api/locations").await;
    let names: Vec<&str> = data
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);

    let data = get_data(demo_state(), "/api/locations?plant_type=Grinding%20Unit").await;
    assert_eq!(data.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_location_lookup() {
    let data = get_data(demo_state(), "/api/locations/GTN").await;
    assert_eq!(data["name"], "Gotan Plant");

    let (status, code) = error_code(demo_state(), "/api/locations/XYZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code, "NOT_FOUND");

    let (status, code) = error_code(offline_state(), "/api/locations/GTN").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(code, "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_nearby_sorted_by_distance() {
    let data = get_data(demo_state(), "/api/locations/nearby/NMB?radius_km=300").await;
    assert_eq!(data["reference_plant"]["code"], "NMB");
    assert_eq!(data["search_radius_km"], 300.0);
    assert_eq!(data["count"], 3);
    let codes: Vec<&str> = data["nearby_plants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["MGR", "BLS", "GTN"]);

    let distances: Vec<f64> = data["nearby_plants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["distance_km"].as_f64().unwrap())
        .collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_nearby_default_radius_and_errors() {
    let data = get_data(demo_state(), "/api/locations/nearby/JHR").await;
    assert_eq!(data["search_radius_km"], 500.0);

    for uri in [
        "/api/locations/nearby/NMB?radius_km=0",
        "/api/locations/nearby/NMB?radius_km=2001",
        "/api/locations/nearby/NMB?radius_km=far",
    ] {
        let (status, _) = error_code(demo_state(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "GET {uri}");
    }

    let (status, _) = error_code(demo_state(), "/api/locations/nearby/XYZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_location_stats_and_state() {
    let data = get_data(demo_state(), "/api/locations/stats/summary").await;
    assert_eq!(data["total_plants"], 5);
    assert_eq!(data["operational_plants"], 5);
    assert_eq!(data["total_capacity_tpd"], 45_000);
    assert_eq!(data["states_covered"], 3);
    assert_eq!(data["plants_by_state"]["Rajasthan"], 3);

    let data = get_data(demo_state(), "/api/locations/state/Rajasthan").await;
    assert_eq!(data["count"], 3);
    assert_eq!(data["total_capacity_tpd"], 35_000);
}

#[tokio::test]
async fn test_map_markers_centre() {
    let data = get_data(demo_state(), "/api/locations/map/markers").await;
    assert_eq!(data["count"], 5);
    assert_eq!(data["center"]["latitude"], 23.0225);
    assert_eq!(data["center"]["longitude"], 72.5714);
}

#[tokio::test]
async fn test_location_lists_empty_when_store_offline() {
    let data = get_data(offline_state(), "/api/locations").await;
    assert_eq!(data.as_array().unwrap().len(), 0);
    let data = get_data(offline_state(), "/api/locations/stats/summary").await;
    assert_eq!(data["total_plants"], 0);

    let (status, _) = error_code(offline_state(), "/db-check").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Chat surface without a model
// ============================================================================

#[tokio::test]
async fn test_chat_without_key_is_503() {
    let resp = create_app(demo_state())
        .oneshot(
            Request::post("/api/ai/chat")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"message":"How is the kiln?"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_tools_listed_and_invocable() {
    let data = get_data(demo_state(), "/api/ai/tools").await;
    assert_eq!(data.as_array().unwrap().len(), 6);

    let resp = create_app(demo_state())
        .oneshot(
            Request::post("/api/ai/tools/find_nearby_plants")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"plant_code":"NMB","radius_km":300}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["data"]["count"], 3);

    let resp = create_app(demo_state())
        .oneshot(
            Request::post("/api/ai/tools/find_optimization_opportunities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = create_app(demo_state())
        .oneshot(Request::post("/api/ai/tools/self_destruct").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
