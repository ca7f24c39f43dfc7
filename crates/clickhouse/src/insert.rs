//! Batch insert helpers for facts, customers and engine metrics.
//!
//! Facts are normally written by the surrounding application; these helpers
//! exist for seeding and integration tests.

use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::Serialize;
use tracing::debug;

use crate::client::{write_err, ClickHouseClient};
use crate::rows::{CustomerRow, FactEventRow};
use engine_core::{CustomerId, FactRow, Result, TenantId};
use telemetry::MetricsSnapshot;

async fn insert_batch<T: Row + Serialize>(
    client: &ClickHouseClient,
    table: &str,
    rows: &[T],
) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut insert = client.inner().insert::<T>(table).map_err(write_err)?;
    for row in rows {
        insert.write(row).await.map_err(write_err)?;
    }
    insert.end().await.map_err(write_err)?;

    debug!(table, count = rows.len(), "Inserted batch");
    Ok(rows.len())
}

/// Insert facts for one tenant.
pub async fn insert_facts(
    client: &ClickHouseClient,
    tenant: TenantId,
    facts: &[FactRow],
) -> Result<usize> {
    let rows: Vec<FactEventRow> = facts
        .iter()
        .map(|f| FactEventRow::from_fact(tenant, f))
        .collect();
    insert_batch(client, "business_events", &rows).await
}

/// Register customers for one tenant.
pub async fn insert_customers(
    client: &ClickHouseClient,
    tenant: TenantId,
    customers: &[CustomerId],
    created_at: DateTime<Utc>,
) -> Result<usize> {
    let rows: Vec<CustomerRow> = customers
        .iter()
        .map(|&customer_id| CustomerRow {
            tenant_id: tenant.to_string(),
            customer_id,
            created_at: created_at.timestamp_millis(),
        })
        .collect();
    insert_batch(client, "customers", &rows).await
}

/// Row of `engine_metrics`.
#[derive(Debug, Clone, Row, Serialize)]
pub struct EngineMetricsRow {
    pub timestamp: i64,
    pub customers_recomputed: u64,
    pub fact_rows_skipped: u64,
    pub kpi_cache_hits: u64,
    pub kpi_recomputes: u64,
    pub widgets_rendered: u64,
    pub widget_cache_hits: u64,
    pub widget_failures: u64,
    pub reports_generated: u64,
    pub forecasts_generated: u64,
    pub forecasts_insufficient: u64,
    pub cohort_scans: u64,
    pub queries_executed: u64,
    pub query_failures: u64,
    pub store_writes: u64,
    pub store_write_errors: u64,
    pub recompute_latency_mean_ms: f64,
    pub kpi_latency_mean_ms: f64,
    pub dashboard_latency_mean_ms: f64,
    pub query_latency_mean_ms: f64,
    pub comparison_population: u64,
    pub tenants_processed: u64,
}

impl From<MetricsSnapshot> for EngineMetricsRow {
    fn from(s: MetricsSnapshot) -> Self {
        Self {
            timestamp: s.timestamp.timestamp_millis(),
            customers_recomputed: s.customers_recomputed,
            fact_rows_skipped: s.fact_rows_skipped,
            kpi_cache_hits: s.kpi_cache_hits,
            kpi_recomputes: s.kpi_recomputes,
            widgets_rendered: s.widgets_rendered,
            widget_cache_hits: s.widget_cache_hits,
            widget_failures: s.widget_failures,
            reports_generated: s.reports_generated,
            forecasts_generated: s.forecasts_generated,
            forecasts_insufficient: s.forecasts_insufficient,
            cohort_scans: s.cohort_scans,
            queries_executed: s.queries_executed,
            query_failures: s.query_failures,
            store_writes: s.store_writes,
            store_write_errors: s.store_write_errors,
            recompute_latency_mean_ms: s.recompute_latency_mean_ms,
            kpi_latency_mean_ms: s.kpi_latency_mean_ms,
            dashboard_latency_mean_ms: s.dashboard_latency_mean_ms,
            query_latency_mean_ms: s.query_latency_mean_ms,
            comparison_population: s.comparison_population,
            tenants_processed: s.tenants_processed,
        }
    }
}

/// Insert an engine metrics snapshot.
pub async fn insert_metrics(client: &ClickHouseClient, snapshot: MetricsSnapshot) -> Result<()> {
    insert_batch(client, "engine_metrics", &[EngineMetricsRow::from(snapshot)]).await?;
    Ok(())
}
