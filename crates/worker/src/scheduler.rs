//! Worker scheduler for background tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::interval;
use tracing::{error, info, warn};

use analytics::AnalyticsEngine;
use clickhouse_client::{insert_metrics, ClickHouseClient};
use engine_core::{Result, TenantId};
use telemetry::{health, metrics};

/// Worker scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Customer recompute interval in seconds
    pub recompute_interval_secs: u64,
    /// KPI refresh interval in seconds
    pub kpi_refresh_interval_secs: u64,
    /// Metrics flush interval in seconds
    pub metrics_flush_interval_secs: u64,
    /// Restrict scheduled work to these tenants. Empty means all.
    pub tenants: Vec<TenantId>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            recompute_interval_secs: 3600,   // 1 hour
            kpi_refresh_interval_secs: 300,  // 5 minutes
            metrics_flush_interval_secs: 60, // 1 minute
            tenants: Vec::new(),
        }
    }
}

impl WorkerConfig {
    pub fn recompute_interval(&self) -> Duration {
        Duration::from_secs(self.recompute_interval_secs.max(1))
    }

    pub fn kpi_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.kpi_refresh_interval_secs.max(1))
    }

    pub fn metrics_flush_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_flush_interval_secs.max(1))
    }
}

/// Totals for one pass over all tenants.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleSummary {
    pub tenants: u64,
    pub tenants_failed: u64,
    pub customers_updated: u64,
    pub kpis_computed: u64,
    pub kpis_failed: u64,
}

/// Keeps the tenants named in `allow`, or all of them when `allow` is empty.
pub fn select_tenants(known: Vec<TenantId>, allow: &[TenantId]) -> Vec<TenantId> {
    if allow.is_empty() {
        return known;
    }
    known.into_iter().filter(|t| allow.contains(t)).collect()
}

/// Recomputes every customer of every selected tenant. A failing tenant is
/// logged and counted; the pass continues.
pub async fn recompute_customers(engine: &AnalyticsEngine, allow: &[TenantId]) -> Result<CycleSummary> {
    let tenants = select_tenants(engine.list_tenants().await?, allow);
    let mut summary = CycleSummary::default();

    for tenant in tenants {
        summary.tenants += 1;
        match engine.recompute_all_customers(tenant).await {
            Ok(result) => summary.customers_updated += result.customers_updated,
            Err(e) => {
                summary.tenants_failed += 1;
                error!(tenant_id = %tenant, error = %e, "Customer recompute failed");
            }
        }
    }

    metrics().tenants_processed.set(summary.tenants);
    Ok(summary)
}

/// Refreshes every KPI of every selected tenant.
pub async fn refresh_kpis(engine: &AnalyticsEngine, allow: &[TenantId]) -> Result<CycleSummary> {
    let tenants = select_tenants(engine.list_tenants().await?, allow);
    let mut summary = CycleSummary::default();

    for tenant in tenants {
        summary.tenants += 1;
        match engine.refresh_all_kpis(tenant).await {
            Ok(result) => {
                summary.kpis_computed += result.computed;
                summary.kpis_failed += result.failed;
            }
            Err(e) => {
                summary.tenants_failed += 1;
                error!(tenant_id = %tenant, error = %e, "KPI refresh failed");
            }
        }
    }
    Ok(summary)
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    engine: AnalyticsEngine,
    clickhouse: Option<Arc<ClickHouseClient>>,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig, engine: AnalyticsEngine) -> Self {
        Self {
            config,
            engine,
            clickhouse: None,
        }
    }

    /// Creates a scheduler that also flushes metric snapshots to ClickHouse.
    pub fn with_metrics_sink(
        config: WorkerConfig,
        engine: AnalyticsEngine,
        clickhouse: Arc<ClickHouseClient>,
    ) -> Self {
        Self {
            config,
            engine,
            clickhouse: Some(clickhouse),
        }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_recompute_worker().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_kpi_worker().await;
        }));

        if self.clickhouse.is_some() {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_metrics_flush().await;
            }));
        }

        health().scheduler.set_healthy();
        info!(
            recompute_secs = self.config.recompute_interval_secs,
            kpi_secs = self.config.kpi_refresh_interval_secs,
            tenants = self.config.tenants.len(),
            "Background workers started"
        );
        handles
    }

    async fn run_recompute_worker(&self) {
        let mut ticker = interval(self.config.recompute_interval());

        loop {
            ticker.tick().await;

            let start = Instant::now();
            match recompute_customers(&self.engine, &self.config.tenants).await {
                Ok(summary) => {
                    health().scheduler.set_healthy();
                    info!(
                        tenants = summary.tenants,
                        failed = summary.tenants_failed,
                        customers = summary.customers_updated,
                        elapsed_ms = %start.elapsed().as_millis(),
                        "Customer recompute pass complete"
                    );
                }
                Err(e) => {
                    health().scheduler.set_unhealthy(e.to_string());
                    error!("Customer recompute pass failed: {}", e);
                }
            }
        }
    }

    async fn run_kpi_worker(&self) {
        let mut ticker = interval(self.config.kpi_refresh_interval());

        loop {
            ticker.tick().await;

            match refresh_kpis(&self.engine, &self.config.tenants).await {
                Ok(summary) => {
                    if summary.kpis_failed > 0 {
                        warn!(failed = summary.kpis_failed, "Some KPIs failed to refresh");
                    }
                    info!(
                        tenants = summary.tenants,
                        computed = summary.kpis_computed,
                        "KPI refresh pass complete"
                    );
                }
                Err(e) => {
                    health().scheduler.set_unhealthy(e.to_string());
                    error!("KPI refresh pass failed: {}", e);
                }
            }
        }
    }

    async fn run_metrics_flush(&self) {
        let Some(clickhouse) = self.clickhouse.as_ref() else {
            return;
        };
        let mut ticker = interval(self.config.metrics_flush_interval());

        loop {
            ticker.tick().await;

            let snapshot = metrics().snapshot();
            if let Err(e) = insert_metrics(clickhouse, snapshot).await {
                error!("Failed to flush metrics: {}", e);
            }
        }
    }
}
