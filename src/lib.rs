//! Bucket Proxy - a read-only HTTP front for an S3-compatible bucket
//!
//! Every GET path names an object. Byte ranges and `If-None-Match` are
//! passed to the store, and bodies are streamed back without buffering.

pub mod application;
pub mod config;
pub mod error;
pub mod proxy;
pub mod store;

pub use application::Application;
pub use error::{Error, Result};
