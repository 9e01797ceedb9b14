//! Middleware stack builder for clean composition

use crate::proxy::middleware::*;
use axum::{middleware::from_fn, Router};

/// Builder for composing the proxy middleware stack
#[derive(Clone, Copy, Debug)]
pub struct ProxyMiddlewareStack {
    enable_logging: bool,
}

impl Default for ProxyMiddlewareStack {
    fn default() -> Self {
        Self {
            enable_logging: true,
        }
    }
}

impl ProxyMiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to disable request logging
    pub fn disable_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }

    /// Apply the complete middleware stack to a router
    ///
    /// The middleware are applied in the following order (outer to inner):
    /// 1. Request ID generation/propagation
    /// 2. Logging (with request ID)
    /// 3. Error logging
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = router.layer(from_fn(error_handling_middleware));
        let router = if self.enable_logging {
            router.layer(from_fn(logging_middleware))
        } else {
            router
        };
        router.layer(from_fn(request_id_middleware))
    }
}
