//! HTTP front end for the invoicy extraction queue.

mod error;
mod routes;
mod state;

use std::path::Path;
use std::sync::Arc;

use log::info;
use tracing_subscriber::layer::SubscriberExt;

use invoicy::{load_config, Config, JobQueue, WorkerPool};

use crate::error::ServerError;
use crate::state::AppState;

const CONFIG_ENV_VAR: &str = "INVOICY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "invoicy.json";

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoicy=info,invoicy_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer());
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
    // route `log` records from the worker pool into tracing
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn read_config() -> Result<Config, ServerError> {
    let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        info!("Loading configuration from {}", path);
        Ok(load_config(&path)?)
    } else {
        info!("No configuration at {}, using defaults", path);
        Ok(Config::default())
    }
}

async fn run() -> Result<(), ServerError> {
    info!("Starting invoicy-server v{}", env!("CARGO_PKG_VERSION"));

    let config = read_config()?;
    let secret = config.auth.secret.resolve()?;

    let queue = Arc::new(JobQueue::from_config(&config)?);
    let pool = WorkerPool::start(Arc::clone(&queue), config.queue.worker_count);

    let state = AppState::new(queue, secret, &config)?;
    let app = routes::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("Listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve);

    info!("Draining job queue");
    pool.shutdown();
    pool.wait().await;
    info!("Shutdown complete");

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
