//! Object store abstraction
//!
//! The proxy reads objects through the [`ObjectStore`] trait so the request
//! path never depends on a concrete backend. [`s3::S3ObjectStore`] talks to
//! any S3-compatible service; [`memory::MemoryObjectStore`] keeps objects in
//! process for tests and local runs.

pub mod memory;
pub mod s3;

use crate::proxy::range::ContentRange;
use crate::proxy::types::{ETag, ObjectKey, ProxyError, ReadIntent};
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use std::fmt;
use std::pin::Pin;

pub use memory::{MemoryObjectStore, StoredObject};
pub use s3::S3ObjectStore;

/// Lazy, finite, non-restartable object body
pub type ObjectBody = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;

/// Object bytes and metadata returned by a successful read
pub struct ObjectReadResult {
    /// Number of body bytes, when the store reports it
    pub content_length: Option<u64>,
    /// Span actually served for a ranged read, already clamped by the store
    pub content_range: Option<ContentRange>,
    pub etag: Option<ETag>,
    pub content_type: Option<String>,
    /// HTTP-date of the last modification
    pub last_modified: Option<String>,
    pub cache_control: Option<String>,
    pub body: ObjectBody,
}

impl ObjectReadResult {
    /// Whether this result serves only part of the object
    pub fn is_partial(&self) -> bool {
        self.content_range.is_some()
    }
}

impl fmt::Debug for ObjectReadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReadResult")
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .field("etag", &self.etag)
            .field("content_type", &self.content_type)
            .field("last_modified", &self.last_modified)
            .field("cache_control", &self.cache_control)
            .finish_non_exhaustive()
    }
}

/// Outcome of a read that did not fail
#[derive(Debug)]
pub enum ReadOutcome {
    /// The object, or the requested part of it
    Object(ObjectReadResult),
    /// The conditional read matched the current version
    NotModified { etag: Option<ETag> },
}

/// Store-side failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no object named '{key}'")]
    NotFound { key: ObjectKey },

    #[error("range does not overlap object '{key}'")]
    InvalidRange { key: ObjectKey },

    #[error("access to '{key}' denied: {detail}")]
    PermissionDenied { key: ObjectKey, detail: String },

    #[error("{0}")]
    Upstream(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ProxyError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::NotFound { .. } => ProxyError::NotFound(message),
            StoreError::InvalidRange { .. } => ProxyError::InvalidRange(message),
            StoreError::PermissionDenied { .. } => ProxyError::PermissionDenied(message),
            StoreError::Upstream(_) => ProxyError::Upstream(message),
        }
    }
}

/// Read access to a bucket of objects
///
/// Implementations are shared by every in-flight request and must not keep
/// per-request state.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Read an object honoring the intent's range and `If-None-Match`
    async fn read(&self, intent: &ReadIntent) -> StoreResult<ReadOutcome>;
}
