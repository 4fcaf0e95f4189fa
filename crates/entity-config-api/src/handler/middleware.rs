//! Request logging middleware

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Header carrying the request id, echoed on every response
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Id of the request being handled, as echoed in `x-request-id`.
///
/// Outside [`request_logging_middleware`] a fresh id is generated.
pub fn current_request_id() -> String {
    REQUEST_ID
        .try_with(Clone::clone)
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
}

/// Log the start and completion of every request.
///
/// Uses the caller's `x-request-id` when present and generates one otherwise.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let start = Instant::now();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = REQUEST_ID.scope(request_id.clone(), next.run(request)).await;
    let duration = start.elapsed();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_current_request_id_inside_scope() {
        let id = REQUEST_ID
            .scope("req-42".to_string(), async { current_request_id() })
            .await;
        assert_eq!(id, "req-42");
    }

    #[test]
    fn test_current_request_id_outside_scope() {
        let id = current_request_id();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_ne!(id, current_request_id());
    }
}
