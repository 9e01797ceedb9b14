use crate::config::Settings;
use crate::proxy::middleware_stack::ProxyMiddlewareStack;
use crate::proxy::ProxyService;
use crate::store::{ObjectStore, S3ObjectStore};
use crate::Result;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

/// Main application struct that owns the listener and the proxy router
pub struct Application {
    settings: Settings,
    listener: TcpListener,
    router: axum::Router,
}

impl Application {
    /// Build the S3-backed application described by `settings`
    #[instrument(skip_all, fields(bucket = %settings.storage.bucket))]
    pub async fn build(settings: Settings) -> Result<Self> {
        let store =
            S3ObjectStore::from_settings(&settings.storage, settings.proxy.stream_buffer_size)
                .await?;
        Self::with_store(settings, Arc::new(store)).await
    }

    /// Build the application around an already constructed store
    pub async fn with_store(settings: Settings, store: Arc<dyn ObjectStore>) -> Result<Self> {
        info!(store = store.name(), "Using object store");
        let middleware = if settings.logging.access_log {
            ProxyMiddlewareStack::new()
        } else {
            ProxyMiddlewareStack::new().disable_logging()
        };
        let router = ProxyService::new(settings.proxy.to_proxy_config(), store)
            .with_middleware(middleware)
            .into_router();

        let listener = TcpListener::bind(settings.application.address()).await?;
        info!(address = %listener.local_addr()?, "Listening");

        Ok(Self {
            settings,
            listener,
            router,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes, then drain in-flight requests
    #[instrument(skip_all)]
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        info!(
            bucket = %self.settings.storage.bucket,
            environment = %self.settings.application.environment,
            "Serving bucket"
        );

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Failed to install signal handlers; falling back to Ctrl+C");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Received Ctrl+C, initiating graceful shutdown");
}
