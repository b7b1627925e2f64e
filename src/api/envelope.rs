//! Consistent response envelope for all API endpoints.
//!
//! Every response is wrapped in either [`ApiResponse`] (success) or
//! [`ApiErrorResponse`] (error), ensuring a uniform JSON shape.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::agent::AgentError;
use crate::kpi_engine::EngineError;
use crate::store::StoreError;

/// Envelope schema version.
pub const API_VERSION: &str = "1";

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub version: &'static str,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: API_VERSION,
        }
    }
}

/// Successful response: `{ "data": T, "meta": { ... } }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::default(),
        };
        (StatusCode::OK, axum::Json(body)).into_response()
    }
}

/// Error detail inside [`ApiErrorResponse`].
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Error response: `{ "error": { "code": "...", "message": "..." }, "meta": { ... } }`
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, code: &str, msg: impl Into<String>) -> Response {
        let body = Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: msg.into(),
            },
            meta: ResponseMeta::default(),
        };
        (status, axum::Json(body)).into_response()
    }

    pub fn not_found(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
    }
}

// ============================================================================
// Error mapping
// ============================================================================

/// Bad input is the caller's fault (400); a failed store is ours (503).
pub fn engine_error_response(err: EngineError) -> Response {
    match err {
        EngineError::InvalidInput(msg) => ApiErrorResponse::bad_request(msg),
        EngineError::Upstream(e) => store_error_response(e),
    }
}

pub fn store_error_response(err: StoreError) -> Response {
    warn!(error = %err, "Data store request failed");
    ApiErrorResponse::service_unavailable(err.to_string())
}

pub fn agent_error_response(err: AgentError) -> Response {
    match err {
        AgentError::RateLimited(_) | AgentError::BudgetExceeded => {
            ApiErrorResponse::too_many_requests(err.to_string())
        }
        AgentError::InvalidMessage(_) | AgentError::InvalidArguments { .. } => {
            ApiErrorResponse::bad_request(err.to_string())
        }
        AgentError::UnknownTool(_) => ApiErrorResponse::not_found(err.to_string()),
        AgentError::NotConfigured => ApiErrorResponse::service_unavailable(err.to_string()),
        AgentError::Engine(e) => engine_error_response(e),
        AgentError::Store(e) => store_error_response(e),
        AgentError::Http(_)
        | AgentError::Status(_)
        | AgentError::Malformed(_)
        | AgentError::ToolRoundsExhausted(_) => {
            warn!(error = %err, "Chat backend failed");
            ApiErrorResponse::bad_gateway(err.to_string())
        }
        AgentError::Pattern(_) | AgentError::Serialization(_) => {
            ApiErrorResponse::internal(err.to_string())
        }
    }
}

pub fn query_rejection(rejection: QueryRejection) -> Response {
    ApiErrorResponse::bad_request(rejection.body_text())
}

pub fn json_rejection(rejection: JsonRejection) -> Response {
    ApiErrorResponse::bad_request(rejection.body_text())
}

pub fn path_rejection(rejection: PathRejection) -> Response {
    ApiErrorResponse::bad_request(rejection.body_text())
}
