//! HTTP server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::service::SimulationService;

use super::routes::routes;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed to call the API from a browser.
    pub cors_origin: String,
    /// Where saved configurations persist. `None` keeps them in memory.
    pub config_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origin: "http://localhost:3000".to_string(),
            config_path: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `TICKETPOOL_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("TICKETPOOL_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("TICKETPOOL_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("invalid TICKETPOOL_PORT: {port}"))?;
        }
        if let Some(origin) = lookup("TICKETPOOL_CORS_ORIGIN") {
            config.cors_origin = origin;
        }
        config.config_path = lookup("TICKETPOOL_CONFIG_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    fn cors_layer(&self) -> anyhow::Result<CorsLayer> {
        let origin: HeaderValue = self
            .cors_origin
            .parse()
            .with_context(|| format!("invalid CORS origin: {}", self.cors_origin))?;
        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true))
    }
}

/// Start the HTTP server with provided service.
pub async fn serve(config: ServerConfig, service: Arc<SimulationService>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, config, service).await
}

/// Serve on an already bound listener.
pub async fn serve_listener(
    listener: TcpListener,
    config: ServerConfig,
    service: Arc<SimulationService>,
) -> anyhow::Result<()> {
    let shutdown_rx = service.shutdown_rx();
    let app = routes(service.clone()).layer(config.cors_layer()?);

    let actual_addr = listener.local_addr()?;
    info!("Starting ticketpool server on {}", actual_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await?;

    info!("Server shutdown complete");

    // Release any workers still running
    service.shutdown().await;

    Ok(())
}

/// Resolve on SIGINT, SIGTERM, or [`SimulationService::trigger_shutdown`].
async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let requested = async {
        // A dropped sender means no trigger can ever arrive.
        if shutdown_rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await
        }
    };

    let reason = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
        _ = requested => "service request",
    };
    info!(reason, "Shutting down");
}
