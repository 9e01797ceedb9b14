//! Type definitions for the proxy module

use crate::proxy::range::ByteRange;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ========== Object Types ==========

/// Bucket-relative key naming a single object
#[nutype(
    validate(not_empty),
    derive(Clone, Debug, Display, Hash, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef)
)]
pub struct ObjectKey(String);

/// Opaque version token of an object
///
/// Kept byte-for-byte as the store or the client supplied it, quotes and
/// weak prefix included.
#[nutype(
    validate(not_empty),
    derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef)
)]
pub struct ETag(String);

impl ETag {
    /// Whether an `If-None-Match` value selects this ETag
    ///
    /// The value may be `*` or a comma separated list of entity tags.
    pub fn is_selected_by(&self, if_none_match: &ETag) -> bool {
        if_none_match
            .as_ref()
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == "*" || strip_weak(candidate) == strip_weak(self.as_ref()))
    }
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

// ========== Configuration Types ==========

/// Leading URL path segment(s) removed before the object key is derived
///
/// Stored without a trailing slash; the empty prefix serves the bucket root.
#[nutype(
    sanitize(trim, with = |s: String| s.trim_end_matches('/').to_string()),
    validate(predicate = |s: &str| s.is_empty() || s.starts_with('/')),
    derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef)
)]
pub struct RoutePrefix(String);

impl RoutePrefix {
    /// Prefix that maps the whole URL path to the bucket
    pub fn root() -> Self {
        Self::try_new(String::new()).expect("empty prefix is valid")
    }
}

impl Default for RoutePrefix {
    fn default() -> Self {
        Self::root()
    }
}

/// Object name appended to directory-style keys, e.g. `index.html`
#[nutype(
    sanitize(trim),
    validate(predicate = |s: &str| !s.is_empty() && !s.contains('/')),
    derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef)
)]
pub struct IndexDocument(String);

/// Capacity of a single body chunk read from the object store
#[nutype(
    validate(predicate = |size: &usize| *size > 0),
    derive(Clone, Copy, Debug, Display, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef)
)]
pub struct StreamBufferSize(usize);

impl Default for StreamBufferSize {
    fn default() -> Self {
        Self::try_new(DEFAULT_STREAM_BUFFER_SIZE).expect("64KB is valid")
    }
}

// ========== Constants ==========

/// Default chunk capacity for streamed bodies
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Default time allowed for the object store to answer a read
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Proxy configuration
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Prefix stripped from the URL path before key resolution
    pub route_prefix: RoutePrefix,
    /// Object served for directory-style paths; `None` rejects them
    pub index_document: Option<IndexDocument>,
    /// Upper bound on waiting for the store to start answering
    pub request_timeout: Duration,
    /// Chunk capacity used when streaming bodies
    pub stream_buffer_size: StreamBufferSize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            route_prefix: RoutePrefix::root(),
            index_document: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_buffer_size: StreamBufferSize::default(),
        }
    }
}

// ========== Request Types ==========

/// Normalized read derived from one inbound request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadIntent {
    pub object_key: ObjectKey,
    pub range: Option<ByteRange>,
    pub if_none_match: Option<ETag>,
}

impl ReadIntent {
    /// Read of the whole object without conditions
    pub fn whole(object_key: ObjectKey) -> Self {
        Self {
            object_key,
            range: None,
            if_none_match: None,
        }
    }

    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_if_none_match(mut self, etag: ETag) -> Self {
        self.if_none_match = Some(etag);
        self
    }
}

// ========== Errors ==========

/// Category of a failed request, one per mapped HTTP status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    InvalidRange,
    PermissionDenied,
    Upstream,
}

/// Errors that can occur while serving a request
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Range not satisfiable: {0}")]
    InvalidRange(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidRange(_) => ErrorKind::InvalidRange,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Upstream(_) => ErrorKind::Upstream,
        }
    }

    /// Detail text without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(msg)
            | Self::NotFound(msg)
            | Self::InvalidRange(msg)
            | Self::PermissionDenied(msg)
            | Self::Upstream(msg) => msg,
        }
    }
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
