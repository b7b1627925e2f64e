//! Process analytics endpoints
//!
//! Store failures never surface as errors here: the engine turns them into
//! unavailable readings so dashboards keep rendering.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::api::envelope::{engine_error_response, path_rejection, query_rejection, ApiResponse};
use crate::kpi_engine::{
    efficiency_report, find_opportunities, kpi_summary, quality_trends, ProcessMetrics,
};
use crate::types::{ProcessType, Window};

#[derive(Debug, Default, Deserialize)]
pub struct HoursQuery {
    pub hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

/// Every process over one window.
#[derive(Debug, Serialize)]
pub struct PlantEfficiency {
    pub window_hours: u32,
    pub processes: Vec<ProcessMetrics>,
}

fn lookback(state: &AppState, hours: Option<i64>) -> Result<Window, Response> {
    let cfg = &state.config;
    let hours = hours.unwrap_or(i64::from(cfg.opportunities.lookback_hours));
    Window::hours_clamped(hours, cfg.formulas.max_window_hours).map_err(engine_error_response)
}

/// GET /api/analytics/efficiency/:process?hours=
pub async fn process_efficiency(
    State(state): State<AppState>,
    process: Result<Path<String>, PathRejection>,
    query: Result<Query<HoursQuery>, QueryRejection>,
) -> Response {
    let Path(process) = match process {
        Ok(p) => p,
        Err(r) => return path_rejection(r),
    };
    let Query(query) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(r),
    };
    let process: ProcessType = match process.parse() {
        Ok(p) => p,
        Err(e) => return engine_error_response(e),
    };
    let window = match lookback(&state, query.hours) {
        Ok(w) => w,
        Err(resp) => return resp,
    };

    let report = efficiency_report(state.store.as_ref(), &state.config, process, window).await;
    ApiResponse::ok(report)
}

/// GET /api/analytics/efficiency?hours=
pub async fn plant_efficiency(
    State(state): State<AppState>,
    query: Result<Query<HoursQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(r),
    };
    let window = match lookback(&state, query.hours) {
        Ok(w) => w,
        Err(resp) => return resp,
    };

    let store = state.store.as_ref();
    let config = state.config.as_ref();
    let processes = join_all(
        ProcessType::ALL
            .into_iter()
            .map(|p| efficiency_report(store, config, p, window)),
    )
    .await;

    ApiResponse::ok(PlantEfficiency {
        window_hours: window.as_hours(),
        processes,
    })
}

/// GET /api/analytics/quality-trends?days=
pub async fn quality_trends_handler(
    State(state): State<AppState>,
    query: Result<Query<DaysQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(r),
    };
    let cfg = &state.config;
    let default_days = i64::from((cfg.opportunities.quality_lookback_hours / 24).max(1));
    let window = match Window::days(query.days.unwrap_or(default_days), cfg.formulas.max_window_hours)
    {
        Ok(w) => w,
        Err(e) => return engine_error_response(e),
    };

    ApiResponse::ok(quality_trends(state.store.as_ref(), cfg, window).await)
}

/// GET /api/analytics/opportunities
pub async fn opportunities(State(state): State<AppState>) -> Response {
    match find_opportunities(state.store.as_ref(), &state.config).await {
        Ok(report) => ApiResponse::ok(report),
        Err(e) => engine_error_response(e),
    }
}

/// GET /api/analytics/kpis
pub async fn kpis(State(state): State<AppState>) -> Response {
    match kpi_summary(state.store.as_ref(), &state.config).await {
        Ok(summary) => ApiResponse::ok(summary),
        Err(e) => engine_error_response(e),
    }
}
