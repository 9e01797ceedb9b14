use crate::proxy::types::{IndexDocument, ProxyConfig, RoutePrefix, StreamBufferSize};
use config::{Config, ConfigError, Environment, File};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Prefix of structured environment overrides, e.g. `BUCKET_PROXY_STORAGE__REGION`
pub const ENV_PREFIX: &str = "BUCKET_PROXY";

/// Plain variable naming the bucket, kept for drop-in deployments
pub const BUCKET_NAME_VAR: &str = "BUCKET_NAME";

/// Plain variable naming the listening port
pub const PORT_VAR: &str = "PORT";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub storage: StorageSettings,
    pub proxy: ProxySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: Host,
    pub port: Port,
    pub environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub bucket: BucketName,
    pub region: Option<String>,
    pub endpoint_url: Option<EndpointUrl>,
    pub force_path_style: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    pub route_prefix: RoutePrefix,
    pub index_document: Option<IndexDocument>,
    pub request_timeout_ms: TimeoutMillis,
    pub stream_buffer_size: StreamBufferSize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    /// Log every request on entry and completion
    pub access_log: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Host address for network services
#[nutype(
    validate(not_empty, len_char_max = 255),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, AsRef, Display)
)]
pub struct Host(String);

/// Port number for network services
#[nutype(
    validate(predicate = |port| *port > 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRef, Display)
)]
pub struct Port(u16);

/// Name of the bucket being served
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, AsRef, Display)
)]
pub struct BucketName(String);

/// Custom S3 endpoint, for MinIO, LocalStack and similar services
#[nutype(
    sanitize(trim),
    validate(predicate = |url: &str| url.starts_with("http://") || url.starts_with("https://")),
    derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct EndpointUrl(String);

/// Store read timeout in milliseconds
#[nutype(
    validate(predicate = |ms| *ms > 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct TimeoutMillis(u64);

impl Settings {
    /// Load settings from `config/` and the process environment
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"), std::env::vars().collect())
    }

    /// Load settings from a config directory and an explicit environment
    ///
    /// Later layers win: defaults, `default`, `{environment}`, `local`,
    /// `BUCKET_PROXY_*` variables, then `BUCKET_NAME` and `PORT`.
    pub fn load_from(
        config_dir: &Path,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let environment = env
            .get("ENVIRONMENT")
            .cloned()
            .unwrap_or_else(|| "development".to_string());
        let bucket_override = env.get(BUCKET_NAME_VAR).cloned();
        let port_override = env.get(PORT_VAR).cloned();

        let config = Config::builder()
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 8080)?
            .set_default("application.environment", environment.clone())?
            .set_default("storage.force_path_style", false)?
            .set_default("proxy.route_prefix", "")?
            .set_default("proxy.request_timeout_ms", 30_000)?
            .set_default("proxy.stream_buffer_size", 64 * 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("logging.access_log", true)?
            .add_source(
                File::with_name(&config_dir.join("default").to_string_lossy()).required(false),
            )
            .add_source(
                File::with_name(&config_dir.join(&environment).to_string_lossy()).required(false),
            )
            .add_source(
                File::with_name(&config_dir.join("local").to_string_lossy()).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env.into_iter().collect())),
            )
            .set_override_option("storage.bucket", bucket_override)?
            .set_override_option("application.port", port_override)?
            .build()?;

        config.try_deserialize()
    }
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ProxySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(*self.request_timeout_ms.as_ref())
    }

    pub fn to_proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            route_prefix: self.route_prefix.clone(),
            index_document: self.index_document.clone(),
            request_timeout: self.request_timeout(),
            stream_buffer_size: self.stream_buffer_size,
        }
    }
}
