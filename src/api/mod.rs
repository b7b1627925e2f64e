//! REST API module using Axum
//!
//! Every JSON response uses the envelope in [`envelope`]. Routes live in
//! [`routes`]; the shared handler state is [`AppState`].

pub mod envelope;
pub mod handlers;
pub mod middleware;
mod routes;

pub use handlers::AppState;

use axum::http::{header, HeaderValue, Method, Uri};
use axum::middleware as axum_mw;
use axum::response::Response;
use axum::Router;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use envelope::ApiErrorResponse;

/// Largest accepted request body (chat messages are capped far below this).
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Unmatched paths get the error envelope rather than an empty 404.
async fn not_found(uri: Uri) -> Response {
    ApiErrorResponse::not_found(format!("No route for {}", uri.path()))
}

/// Build the CORS layer from configured origins.
///
/// `["*"]` allows any origin; an empty list allows none (same-origin only).
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        tracing::info!("CORS: allowing any origin");
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "CORS: ignoring unparseable origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        base
    } else {
        tracing::info!(origins = ?origins, "CORS: allowing configured origins");
        base.allow_origin(allowed)
    }
}

/// Create the complete application router.
pub fn create_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_origins);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .nest("/api", routes::api_routes(state.clone()))
        .merge(routes::root_routes(state))
        .fallback(not_found)
        // Middleware
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(axum_mw::from_fn(middleware::propagate_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
