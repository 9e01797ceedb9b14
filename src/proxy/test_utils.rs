//! Test utilities for proxy module testing

use crate::proxy::types::ObjectKey;
use crate::proxy::{ProxyConfig, ProxyService};
use crate::store::memory::MemoryObjectStoreBuilder;
use crate::store::{MemoryObjectStore, StoredObject};
use axum::{body::Body, http::Request, response::Response, Router};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Small text object used by most router tests
pub const GREETING: &[u8] = b"Hello, bucket proxy!";

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::try_new(name).expect("test keys are non-empty")
}

/// Create a test proxy configuration with sensible defaults
pub fn test_proxy_config() -> ProxyConfig {
    ProxyConfig {
        request_timeout: Duration::from_secs(5),
        ..ProxyConfig::default()
    }
}

/// Store holding `greeting.txt` plus whatever the caller adds
pub fn test_store(
    extra: impl FnOnce(MemoryObjectStoreBuilder) -> MemoryObjectStoreBuilder,
) -> Arc<MemoryObjectStore> {
    let builder = MemoryObjectStore::builder().chunk_size(4).object(
        key("greeting.txt"),
        StoredObject::new(GREETING).with_content_type("text/plain"),
    );
    Arc::new(extra(builder).build())
}

pub fn test_router(store: Arc<MemoryObjectStore>) -> Router {
    ProxyService::new(test_proxy_config(), store).into_router()
}

/// Build a request with the given method, path and headers
pub fn request(method: &str, path: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).expect("test request is valid")
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

/// Collect a response body, failing on a truncated transfer
pub async fn body_bytes(response: Response) -> Result<bytes::Bytes, axum::Error> {
    Ok(response.into_body().collect().await?.to_bytes())
}
