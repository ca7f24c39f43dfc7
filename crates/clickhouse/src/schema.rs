//! ClickHouse table schemas.
//!
//! - tenant_id on every table, first in the sort key
//! - ReplacingMergeTree keyed by natural key for every upserted table,
//!   read back with FINAL
//! - Date32 for calendar dates, DateTime64(3) for timestamps
//! - JSON strings for widget sources, cached payloads and report output

use tracing::debug;

use crate::client::{write_err, ClickHouseClient};
use engine_core::Result;

/// Transactional facts. Written by the surrounding application; the engine
/// only reads them.
pub const CREATE_BUSINESS_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS business_events (
    tenant_id String,
    customer_id UInt64,
    amount Float64,
    event_date Date32,
    status LowCardinality(String),
    event_type LowCardinality(String),
    category Nullable(String),
    provider Nullable(String),
    created_at DateTime DEFAULT now()
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(event_date)
ORDER BY (tenant_id, event_date, customer_id)
SETTINGS index_granularity = 8192
"#;

/// Customer registry, including customers without facts.
pub const CREATE_CUSTOMERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    tenant_id String,
    customer_id UInt64,
    created_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(created_at)
ORDER BY (tenant_id, customer_id)
"#;

/// One row per customer, overwritten on every recompute.
pub const CREATE_CUSTOMER_ANALYTICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS customer_analytics (
    tenant_id String,
    customer_id UInt64,
    total_events UInt64,
    total_revenue Float64,
    avg_event_value Float64,
    lifetime_value Float64,
    first_event_date Nullable(Date32),
    last_event_date Nullable(Date32),
    days_since_last_event Nullable(Int64),
    event_frequency Float64,
    cancellation_rate Float64,
    rfm_score LowCardinality(String),
    segment LowCardinality(String),
    churn_risk_score Float64,
    favorite_categories Array(String),
    favorite_providers Array(String),
    calculated_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(calculated_at)
ORDER BY (tenant_id, customer_id)
"#;

pub const CREATE_KPI_DEFINITIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kpi_definitions (
    tenant_id String,
    kpi_id UInt64,
    name String,
    description Nullable(String),
    data_source_query String,
    target_value Nullable(Float64),
    threshold_green Nullable(Float64),
    threshold_yellow Nullable(Float64),
    threshold_red Nullable(Float64),
    aggregation_period LowCardinality(String),
    unit Nullable(String),
    updated_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY (tenant_id, kpi_id)
"#;

/// One row per KPI and period; the latest calculation wins.
pub const CREATE_KPI_VALUES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kpi_values (
    tenant_id String,
    kpi_id UInt64,
    period_start Date32,
    period_end Date32,
    period_type LowCardinality(String),
    actual_value Float64,
    target_value Nullable(Float64),
    variance Nullable(Float64),
    variance_percentage Nullable(Float64),
    previous_period_value Float64,
    change_value Float64,
    change_percentage Nullable(Float64),
    trend_direction LowCardinality(String),
    status LowCardinality(String),
    calculated_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(calculated_at)
ORDER BY (tenant_id, kpi_id, period_start, period_end)
"#;

pub const CREATE_DASHBOARDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS dashboards (
    tenant_id String,
    dashboard_id UInt64,
    name String,
    description Nullable(String),
    updated_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY (tenant_id, dashboard_id)
"#;

/// Widget definitions. `data_source` is the JSON-encoded source.
pub const CREATE_DASHBOARD_WIDGETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS dashboard_widgets (
    tenant_id String,
    dashboard_id UInt64,
    widget_id UInt64,
    title String,
    widget_type LowCardinality(String),
    display_order Int32,
    position_row Int32,
    position_col Int32,
    is_visible Bool,
    data_source String,
    date_range Nullable(String),
    cache_enabled Bool,
    cache_ttl_seconds UInt32,
    updated_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY (tenant_id, dashboard_id, widget_id)
"#;

/// Widget payload cache. Payload and timestamp are replaced together by a
/// single insert.
pub const CREATE_WIDGET_CACHE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS widget_cache (
    tenant_id String,
    widget_id UInt64,
    cached_data String,
    cached_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(cached_at)
ORDER BY (tenant_id, widget_id)
"#;

pub const CREATE_REPORT_TEMPLATES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS report_templates (
    tenant_id String,
    template_id UInt64,
    report_name String,
    description Nullable(String),
    query_template String,
    default_date_range Nullable(String),
    updated_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY (tenant_id, template_id)
"#;

pub const CREATE_GENERATED_REPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS generated_reports (
    report_id String,
    tenant_id String,
    template_id UInt64,
    report_name String,
    parameters String,
    period_start Nullable(Date32),
    period_end Nullable(Date32),
    data String,
    row_count UInt64,
    execution_time_ms UInt64,
    generated_at DateTime64(3)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(generated_at)
ORDER BY (tenant_id, generated_at, report_id)
TTL toDateTime(generated_at) + INTERVAL 90 DAY
"#;

/// Engine self-metrics flushed by the worker.
pub const CREATE_ENGINE_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS engine_metrics (
    timestamp DateTime64(3),
    customers_recomputed UInt64,
    fact_rows_skipped UInt64,
    kpi_cache_hits UInt64,
    kpi_recomputes UInt64,
    widgets_rendered UInt64,
    widget_cache_hits UInt64,
    widget_failures UInt64,
    reports_generated UInt64,
    forecasts_generated UInt64,
    forecasts_insufficient UInt64,
    cohort_scans UInt64,
    queries_executed UInt64,
    query_failures UInt64,
    store_writes UInt64,
    store_write_errors UInt64,
    recompute_latency_mean_ms Float64,
    kpi_latency_mean_ms Float64,
    dashboard_latency_mean_ms Float64,
    query_latency_mean_ms Float64,
    comparison_population UInt64,
    tenants_processed UInt64
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY timestamp
TTL toDateTime(timestamp) + INTERVAL 30 DAY
"#;

/// All table creation statements, in dependency-free order.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_BUSINESS_EVENTS_TABLE,
        CREATE_CUSTOMERS_TABLE,
        CREATE_CUSTOMER_ANALYTICS_TABLE,
        CREATE_KPI_DEFINITIONS_TABLE,
        CREATE_KPI_VALUES_TABLE,
        CREATE_DASHBOARDS_TABLE,
        CREATE_DASHBOARD_WIDGETS_TABLE,
        CREATE_WIDGET_CACHE_TABLE,
        CREATE_REPORT_TEMPLATES_TABLE,
        CREATE_GENERATED_REPORTS_TABLE,
        CREATE_ENGINE_METRICS_TABLE,
    ]
}

/// Initialize the database schema.
///
/// Creates the configured database and all tables if they don't exist.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    let database = &client.config().database;
    client
        .server()
        .query(&format!("CREATE DATABASE IF NOT EXISTS {database}"))
        .execute()
        .await
        .map_err(write_err)?;

    for sql in all_tables() {
        client.inner().query(sql).execute().await.map_err(write_err)?;
    }
    debug!(database = %database, tables = all_tables().len(), "ClickHouse schema initialized");
    Ok(())
}

/// Tables emptied by [`crate::query::truncate_all`].
pub const ANALYTIC_TABLES: &[&str] = &[
    "business_events",
    "customers",
    "customer_analytics",
    "kpi_definitions",
    "kpi_values",
    "dashboards",
    "dashboard_widgets",
    "widget_cache",
    "report_templates",
    "generated_reports",
];
