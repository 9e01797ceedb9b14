use thiserror::Error;

/// Bucket proxy application error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
