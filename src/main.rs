//! Customer & Business Analytics Engine
//!
//! Runs the engine's periodic work over a ClickHouse fact store:
//! - customer RFM scoring, segmentation and churn risk recompute
//! - KPI refresh against freshness windows
//! - engine metrics flush next to the analytic tables
//!
//! Interactive operations (dashboards, reports, forecasts, cohorts) are
//! exposed through `analytics::AnalyticsEngine` to an embedding service.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info};

use analytics::{AnalyticsEngine, AnalyticsSettings};
use clickhouse_client::{
    check_connection, init_schema, ClickHouseClient, ClickHouseConfig, ClickHouseFactReader,
    ClickHouseQueryExecutor, ClickHouseStore,
};
use engine_core::SystemClock;
use telemetry::{health, init_tracing, LoggingConfig};
use worker::{WorkerConfig, WorkerScheduler};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Config {
    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    analytics: AnalyticsSettings,

    #[serde(default)]
    worker: WorkerConfig,

    #[serde(default)]
    logging: LoggingConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.logging.clone().with_env_overrides());

    info!("Starting Analytics Engine v{}", env!("CARGO_PKG_VERSION"));
    info!(
        url = %config.clickhouse.url,
        database = %config.clickhouse.database,
        tenants = config.worker.tenants.len(),
        "Loaded configuration"
    );

    let clickhouse = ClickHouseClient::new(config.clickhouse.clone())
        .context("Failed to create ClickHouse client")?;

    if let Err(e) = init_schema(&clickhouse).await {
        error!("Failed to initialize ClickHouse schema: {}", e);
        // Tables may already exist; the health check below decides.
    }

    check_health(&clickhouse).await;

    let engine = AnalyticsEngine::new(
        Arc::new(ClickHouseFactReader::new(clickhouse.clone())),
        Arc::new(ClickHouseStore::new(clickhouse.clone())),
        Arc::new(ClickHouseQueryExecutor::new(clickhouse.clone())),
        Arc::new(SystemClock),
        config.analytics.clone(),
    );

    let scheduler = Arc::new(WorkerScheduler::with_metrics_sink(
        config.worker.clone(),
        engine,
        Arc::new(clickhouse),
    ));
    let handles = scheduler.start();

    shutdown_signal().await;

    info!("Shutting down...");
    for handle in handles {
        handle.abort();
    }
    health().scheduler.set_unhealthy("Stopped");

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. ANALYTICS_CLICKHOUSE__URL
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ANALYTICS")
                .prefix_separator("_")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides for the connection settings most deployments set
    if let Ok(url) = std::env::var("ANALYTICS_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("ANALYTICS_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("ANALYTICS_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("ANALYTICS_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    config.clickhouse.validate().context("Invalid ClickHouse configuration")?;
    Ok(config)
}

/// Check component health on startup.
async fn check_health(clickhouse: &ClickHouseClient) {
    if check_connection(clickhouse).await {
        health().clickhouse.set_healthy();
        info!("ClickHouse connection: healthy");
    } else {
        health().clickhouse.set_unhealthy("Connection failed");
        error!("ClickHouse connection: unhealthy");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
