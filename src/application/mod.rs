//! Application wiring and server lifecycle
//!
//! This module builds the object store and the proxy router from settings
//! and runs the HTTP server until a shutdown signal arrives.

pub mod app;

pub use app::Application;
