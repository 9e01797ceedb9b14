//! HTTP header constants and utilities for the proxy service
//!
//! This module centralizes the header names and header-related constants
//! used by the interpreter, the relay and the middleware stack.

use ::http::header;

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

/// Content type used when the object carries none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Value of `Accept-Ranges` on served objects
pub const ACCEPT_RANGES_BYTES: &str = "bytes";

/// Plain-text body of the 405 response
pub const METHOD_NOT_ALLOWED_BODY: &str = "405 - Method Not Allowed";

/// Standard header re-exports for convenience
pub use header::{
    ACCEPT_RANGES, ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    IF_NONE_MATCH, LAST_MODIFIED, RANGE,
};
