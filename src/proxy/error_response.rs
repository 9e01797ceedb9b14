//! Unified error response handling for the proxy service
//!
//! Every failed read becomes a small JSON document carrying a stable code,
//! a human-readable message and the request ID used for log correlation.

use crate::proxy::headers::X_REQUEST_ID;
use crate::proxy::types::{ErrorKind, ProxyError};
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Unique error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Request ID for correlation
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Add request ID for correlation
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Convert to HTTP response with proper headers
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        let request_id = self.request_id.clone();
        let mut response = (status, Json(self)).into_response();

        if let Some(id) = request_id {
            if let Ok(header_value) = HeaderValue::from_str(&id) {
                response.headers_mut().insert(X_REQUEST_ID, header_value);
            }
        }

        response
    }
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidRange => "RANGE_NOT_SATISFIABLE",
            ErrorKind::PermissionDenied => "FORBIDDEN",
            ErrorKind::Upstream => "BAD_GATEWAY",
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRange => StatusCode::RANGE_NOT_SATISFIABLE,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        }
    }
}

impl ProxyError {
    /// Envelope for this error, without a request ID
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.kind().code(), self.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}

/// Render a proxy error for the request it failed
pub fn error_response(error: &ProxyError, request_id: Option<&str>) -> Response {
    let mut body = error.to_error_response();
    if let Some(id) = request_id {
        body = body.with_request_id(id);
    }
    body.into_response_with_status(error.status_code())
}

/// Helper to extract request ID from headers
pub fn extract_request_id(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}
