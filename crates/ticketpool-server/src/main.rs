//! ticketpool server binary.
//!
//! Configuration comes from the environment:
//! - `TICKETPOOL_HOST` / `TICKETPOOL_PORT`: bind address (default 0.0.0.0:8080)
//! - `TICKETPOOL_CORS_ORIGIN`: browser origin allowed to call the API
//! - `TICKETPOOL_CONFIG_PATH`: JSON file for saved configurations
//! - `TICKETPOOL_LOG` / `RUST_LOG`: log filter
//! - `LOG_FORMAT=json`: structured log output

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ticketpool::transport::{ServerConfig, serve};
use ticketpool::{ConfigStore, FileConfigStore, MemoryConfigStore, SimulationService};

fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let base_level = match std::env::var("TICKETPOOL_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("trace") => "trace",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };

        EnvFilter::new(format!(
            "ticketpool={level},ticketpool_server={level},tower_http=warn",
            level = base_level
        ))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServerConfig::from_env()?;

    let store: Arc<dyn ConfigStore> = match &config.config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Persisting configurations to file");
            Arc::new(FileConfigStore::new(path.clone()))
        }
        None => Arc::new(MemoryConfigStore::new()),
    };

    let service = Arc::new(SimulationService::new(store));
    serve(config, service).await
}
