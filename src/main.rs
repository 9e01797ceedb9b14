use anyhow::Result;
use bucket_proxy::config::{LogFormat, LoggingSettings, Settings, PORT_VAR};
use bucket_proxy::Application;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(&LoggingSettings {
                level: "info".to_string(),
                format: LogFormat::Pretty,
                access_log: false,
            });
            error!(error = %e, "Invalid configuration; set BUCKET_NAME or storage.bucket");
            return Err(e.into());
        }
    };
    init_tracing(&settings.logging);

    info!("Starting bucket proxy");
    if std::env::var_os(PORT_VAR).is_none() {
        warn!(port = %settings.application.port, "PORT not set, using configured port");
    }
    info!(bucket = %settings.storage.bucket, port = %settings.application.port, "Configured");

    let app = match Application::build(settings).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to start");
            return Err(e.into());
        }
    };
    app.run().await?;

    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
