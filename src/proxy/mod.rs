//! Proxy module for serving bucket objects over HTTP
//!
//! A request flows through three stages:
//! - Interpreter: URL path and headers to a `ReadIntent`
//! - Reader: one bounded call to the object store
//! - Relay: status, headers and a streamed body for the client
//!
//! Failures at any stage are mapped to a status by `error_response`.

pub mod error_response;
pub mod headers;
pub mod interpreter;
pub mod key_resolver;
pub mod middleware;
pub mod middleware_stack;
pub mod range;
pub mod reader;
pub mod relay;
pub mod service;
pub mod types;

#[cfg(test)]
mod test_utils;


pub use service::ProxyService;
pub use types::{ProxyConfig, ProxyError, ProxyResult};
