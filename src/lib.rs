pub mod config;
pub mod db;
pub mod history;
pub mod sensing;
pub mod validation;
pub mod web;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};
use tokio::{net::TcpListener, time::Duration};

use config::Config;
use db::Database;
use sensing::{LiveCache, SamplerController, SensorReader};

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub live: Arc<LiveCache>,
    pub config: Arc<Config>,
}

pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("pitemp starting up...");

    let config = Config::from_env().context("failed to load configuration")?;
    let database = Database::new(config.db_path.clone())?;
    let reader = SensorReader::from_config(&config.sensor);

    let mut sampler = SamplerController::new();
    sampler.start(
        database.clone(),
        reader.clone(),
        config.sensor_id.clone(),
        Duration::from_secs(config.sample_interval_secs.max(1)),
    )?;

    let state = AppState {
        db: database,
        live: Arc::new(LiveCache::new(reader, config.cache_ttl_ms)),
        config: Arc::new(config),
    };

    let listener = TcpListener::bind(&state.config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", state.config.bind_addr))?;
    info!("Serving on http://{}", listener.local_addr()?);

    let served = axum::serve(listener, web::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed");

    if let Err(err) = sampler.stop().await {
        error!("Failed to stop sampler: {err:?}");
    }

    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
