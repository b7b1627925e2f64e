//! API middleware layers.
//!
//! Request correlation: every response carries an `x-request-id`, echoed
//! from the request when the caller sent one.

use axum::http::header::HeaderName;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Axum middleware that tags the request span and response with a request id.
pub async fn propagate_request_id(request: axum::extract::Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let span = tracing::debug_span!(
        "request",
        request_id = id.as_ref().and_then(|v| v.to_str().ok()).unwrap_or("")
    );
    let mut response = next.run(request).instrument(span).await;

    if let Some(id) = id {
        response.headers_mut().insert(REQUEST_ID_HEADER, id);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(middleware::from_fn(propagate_request_id))
    }

    #[tokio::test]
    async fn generates_request_id_when_absent() {
        let resp = app()
            .oneshot(Request::get("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn echoes_caller_request_id() {
        let resp = app()
            .oneshot(
                Request::get("/test")
                    .header("x-request-id", "kiln-dash-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.headers().get("x-request-id").unwrap(), "kiln-dash-42");
    }
}
