//! Main proxy service implementation
//!
//! The `ProxyService` wires the request interpreter, the object reader and
//! the response relay into a single axum fallback handler, so every path
//! below the route prefix names an object.
//!
//! ```rust,ignore
//! use bucket_proxy::proxy::{ProxyConfig, ProxyService};
//! use bucket_proxy::store::MemoryObjectStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryObjectStore::builder().build());
//! let router = ProxyService::new(ProxyConfig::default(), store).into_router();
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use crate::proxy::error_response::{error_response, extract_request_id};
use crate::proxy::headers::{ALLOW, CONTENT_TYPE, METHOD_NOT_ALLOWED_BODY};
use crate::proxy::interpreter::RequestInterpreter;
use crate::proxy::middleware_stack::ProxyMiddlewareStack;
use crate::proxy::reader::ObjectReader;
use crate::proxy::relay::relay;
use crate::proxy::types::*;
use crate::store::ObjectStore;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode},
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Read-only object proxy
pub struct ProxyService {
    interpreter: RequestInterpreter,
    reader: ObjectReader,
    middleware: ProxyMiddlewareStack,
}

impl ProxyService {
    pub fn new(config: ProxyConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            interpreter: RequestInterpreter::from_config(&config),
            reader: ObjectReader::new(store, config.request_timeout),
            middleware: ProxyMiddlewareStack::new(),
        }
    }

    /// Replace the default middleware stack
    pub fn with_middleware(mut self, middleware: ProxyMiddlewareStack) -> Self {
        self.middleware = middleware;
        self
    }

    /// Handle one request; never fails, errors become responses
    pub async fn handle(&self, request: Request) -> Response {
        if request.method() != Method::GET {
            return method_not_allowed();
        }

        let request_id = extract_request_id(request.headers());
        let intent = self.interpreter.interpret(request.uri(), request.headers());
        drop(request);

        let result = match intent {
            Ok(intent) => self.serve(intent).await,
            Err(error) => Err(error),
        };

        result.unwrap_or_else(|error| {
            debug!(kind = ?error.kind(), error = %error, "Read failed");
            error_response(&error, request_id.as_deref())
        })
    }

    async fn serve(&self, intent: ReadIntent) -> ProxyResult<Response> {
        debug!(key = %intent.object_key, range = ?intent.range, "Interpreted read");
        let outcome = self.reader.read(&intent).await?;
        Ok(relay(&intent.object_key, outcome))
    }

    /// Create an Axum router for the proxy service with middleware
    pub fn into_router(self) -> axum::Router {
        let middleware = self.middleware;
        let router = axum::Router::new()
            .fallback(proxy_handler)
            .with_state(Arc::new(self));

        middleware.apply_to_router(router)
    }
}

/// Axum handler for every proxied path
async fn proxy_handler(State(proxy): State<Arc<ProxyService>>, request: Request) -> Response {
    proxy.handle(request).await
}

fn method_not_allowed() -> Response {
    let mut response = Response::new(Body::from(METHOD_NOT_ALLOWED_BODY));
    *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    let headers = response.headers_mut();
    headers.insert(ALLOW, HeaderValue::from_static("GET"));
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
