//! Middleware implementations for the proxy service

use crate::proxy::headers::X_REQUEST_ID;
use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Request ID middleware - ensures every request has a unique ID for tracing
///
/// A valid UUID supplied by the client is kept; anything else is replaced
/// with a fresh UUIDv7.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::now_v7);

    // Hyphenated UUIDs are plain ASCII, so this never falls through
    let Ok(header_value) = HeaderValue::from_str(&request_id.hyphenated().to_string()) else {
        return next.run(request).await;
    };

    request
        .headers_mut()
        .insert(X_REQUEST_ID, header_value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(X_REQUEST_ID, header_value);
    response
}

/// Logging middleware - logs request/response details with timing
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        "Incoming request"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        status = response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

/// Error logging wrapper; 1xx-3xx responses pass through untouched
pub async fn error_handling_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    warn!(
        request_id = request_id,
        status = status.as_u16(),
        "Request failed"
    );

    // Ensure request ID is in error response
    if !response.headers().contains_key(X_REQUEST_ID) {
        if let Ok(header_value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(X_REQUEST_ID, header_value);
        }
    }
    response
}
