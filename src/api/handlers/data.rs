//! Raw telemetry listing

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AppState;
use crate::api::envelope::{engine_error_response, query_rejection, ApiResponse};
use crate::store::{RecordQuery, RecordTable};

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    pub limit: Option<i64>,
    /// Optimisation type substring (optimization-results only)
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Recommendation status (ai-recommendations only)
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub table: RecordTable,
    pub count: usize,
    pub records: Vec<serde_json::Value>,
}

/// GET /api/data/:table?limit=&type=&status=
pub async fn table_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(r),
    };
    let table: RecordTable = match table.parse() {
        Ok(t) => t,
        Err(e) => return engine_error_response(e),
    };

    let filter = match table {
        RecordTable::OptimizationResults => query.kind,
        RecordTable::AiRecommendations => query.status,
        _ => None,
    };
    let record_query = match RecordQuery::new(query.limit, filter) {
        Ok(q) => q,
        Err(e) => return engine_error_response(e),
    };

    let records = match state.store.recent_records(table, &record_query).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(table = %table, error = %e, "Record listing failed; returning empty list");
            Vec::new()
        }
    };
    debug!(table = %table, count = records.len(), limit = record_query.limit, "Records listed");

    ApiResponse::ok(RecordsResponse {
        table,
        count: records.len(),
        records,
    })
}
