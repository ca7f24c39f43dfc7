//! Analytic store over ReplacingMergeTree tables.
//!
//! Upserts are plain inserts; the newest version per natural key wins at
//! merge time and reads use FINAL, so concurrent writers never need a
//! read-modify-write cycle.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::Serialize;
use tracing::debug;

use engine_core::{
    AnalyticsStore, CustomerAnalyticsRecord, CustomerId, Dashboard, DashboardId, DateRange,
    GeneratedReport, KpiDefinition, KpiId, KpiValue, ReportTemplate, ReportTemplateId, Result,
    TenantId, Widget, WidgetData, WidgetId,
};

use crate::client::{read_err, write_err, ClickHouseClient};
use crate::rows::{
    date_param, CustomerAnalyticsRow, DashboardRow, GeneratedReportRow, KpiDefinitionRow,
    KpiValueRow, ReportTemplateRow, WidgetCacheRow, WidgetRow,
};

/// [`AnalyticsStore`] backed by ClickHouse.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: ClickHouseClient,
}

impl ClickHouseStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    async fn insert_rows<T: Row + Serialize>(&self, table: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        let mut insert = self.client.inner().insert::<T>(table).map_err(write_err)?;
        for row in rows {
            insert.write(row).await.map_err(write_err)?;
        }
        insert.end().await.map_err(write_err)?;

        debug!(
            table,
            count = rows.len(),
            latency_ms = %start.elapsed().as_millis(),
            "Inserted rows"
        );
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for ClickHouseStore {
    async fn upsert_customer_analytics(&self, records: &[CustomerAnalyticsRecord]) -> Result<()> {
        let rows: Vec<CustomerAnalyticsRow> = records.iter().map(CustomerAnalyticsRow::from).collect();
        self.insert_rows("customer_analytics", &rows).await
    }

    async fn get_customer_analytics(
        &self,
        tenant: TenantId,
        customer: CustomerId,
    ) -> Result<Option<CustomerAnalyticsRecord>> {
        let row: Option<CustomerAnalyticsRow> = self
            .client
            .inner()
            .query("SELECT ?fields FROM customer_analytics FINAL WHERE tenant_id = ? AND customer_id = ?")
            .bind(tenant.to_string())
            .bind(customer)
            .fetch_optional()
            .await
            .map_err(read_err)?;
        row.map(CustomerAnalyticsRecord::try_from).transpose()
    }

    async fn list_customer_analytics(
        &self,
        tenant: TenantId,
    ) -> Result<Vec<CustomerAnalyticsRecord>> {
        let rows: Vec<CustomerAnalyticsRow> = self
            .client
            .inner()
            .query("SELECT ?fields FROM customer_analytics FINAL WHERE tenant_id = ? ORDER BY customer_id")
            .bind(tenant.to_string())
            .fetch_all()
            .await
            .map_err(read_err)?;
        rows.into_iter().map(CustomerAnalyticsRecord::try_from).collect()
    }

    async fn save_kpi_definition(&self, definition: &KpiDefinition) -> Result<()> {
        let row = KpiDefinitionRow::new(definition, Utc::now());
        self.insert_rows("kpi_definitions", &[row]).await
    }

    async fn get_kpi_definition(
        &self,
        tenant: TenantId,
        kpi: KpiId,
    ) -> Result<Option<KpiDefinition>> {
        let row: Option<KpiDefinitionRow> = self
            .client
            .inner()
            .query("SELECT ?fields FROM kpi_definitions FINAL WHERE tenant_id = ? AND kpi_id = ?")
            .bind(tenant.to_string())
            .bind(kpi)
            .fetch_optional()
            .await
            .map_err(read_err)?;
        row.map(KpiDefinition::try_from).transpose()
    }

    async fn list_kpi_definitions(&self, tenant: TenantId) -> Result<Vec<KpiDefinition>> {
        let rows: Vec<KpiDefinitionRow> = self
            .client
            .inner()
            .query("SELECT ?fields FROM kpi_definitions FINAL WHERE tenant_id = ? ORDER BY kpi_id")
            .bind(tenant.to_string())
            .fetch_all()
            .await
            .map_err(read_err)?;
        rows.into_iter().map(KpiDefinition::try_from).collect()
    }

    async fn get_kpi_value(
        &self,
        tenant: TenantId,
        kpi: KpiId,
        period: DateRange,
    ) -> Result<Option<KpiValue>> {
        let row: Option<KpiValueRow> = self
            .client
            .inner()
            .query(
                "SELECT ?fields FROM kpi_values FINAL \
                 WHERE tenant_id = ? AND kpi_id = ? AND period_start = ? AND period_end = ? \
                 ORDER BY calculated_at DESC LIMIT 1",
            )
            .bind(tenant.to_string())
            .bind(kpi)
            .bind(date_param(period.start))
            .bind(date_param(period.end))
            .fetch_optional()
            .await
            .map_err(read_err)?;
        row.map(KpiValue::try_from).transpose()
    }

    async fn upsert_kpi_value(&self, value: &KpiValue) -> Result<()> {
        self.insert_rows("kpi_values", &[KpiValueRow::from(value)]).await
    }

    async fn save_dashboard(&self, dashboard: &Dashboard) -> Result<()> {
        self.insert_rows("dashboards", &[DashboardRow::new(dashboard, Utc::now())])
            .await
    }

    async fn get_dashboard(
        &self,
        tenant: TenantId,
        dashboard: DashboardId,
    ) -> Result<Option<Dashboard>> {
        let row: Option<DashboardRow> = self
            .client
            .inner()
            .query("SELECT ?fields FROM dashboards FINAL WHERE tenant_id = ? AND dashboard_id = ?")
            .bind(tenant.to_string())
            .bind(dashboard)
            .fetch_optional()
            .await
            .map_err(read_err)?;
        row.map(Dashboard::try_from).transpose()
    }

    async fn save_widget(&self, tenant: TenantId, widget: &Widget) -> Result<()> {
        let row = WidgetRow::new(tenant, widget, Utc::now())?;
        self.insert_rows("dashboard_widgets", &[row]).await?;

        if let (Some(data), Some(at)) = (&widget.cache.cached_data, widget.cache.cached_at) {
            self.update_widget_cache(tenant, widget.id, data, at).await?;
        }
        Ok(())
    }

    async fn list_widgets(&self, tenant: TenantId, dashboard: DashboardId) -> Result<Vec<Widget>> {
        let rows: Vec<WidgetRow> = self
            .client
            .inner()
            .query("SELECT ?fields FROM dashboard_widgets FINAL WHERE tenant_id = ? AND dashboard_id = ?")
            .bind(tenant.to_string())
            .bind(dashboard)
            .fetch_all()
            .await
            .map_err(read_err)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<WidgetId> = rows.iter().map(|r| r.widget_id).collect();
        let caches: Vec<WidgetCacheRow> = self
            .client
            .inner()
            .query("SELECT ?fields FROM widget_cache FINAL WHERE tenant_id = ? AND has(?, widget_id)")
            .bind(tenant.to_string())
            .bind(&ids)
            .fetch_all()
            .await
            .map_err(read_err)?;
        let mut caches: HashMap<WidgetId, WidgetCacheRow> =
            caches.into_iter().map(|c| (c.widget_id, c)).collect();

        rows.into_iter()
            .map(|row| {
                let cache = caches.remove(&row.widget_id);
                row.into_widget(cache)
            })
            .collect()
    }

    async fn update_widget_cache(
        &self,
        tenant: TenantId,
        widget: WidgetId,
        data: &WidgetData,
        cached_at: DateTime<Utc>,
    ) -> Result<()> {
        let row = WidgetCacheRow {
            tenant_id: tenant.to_string(),
            widget_id: widget,
            cached_data: serde_json::to_string(data)?,
            cached_at: cached_at.timestamp_millis(),
        };
        self.insert_rows("widget_cache", &[row]).await
    }

    async fn save_report_template(&self, template: &ReportTemplate) -> Result<()> {
        self.insert_rows("report_templates", &[ReportTemplateRow::new(template, Utc::now())])
            .await
    }

    async fn get_report_template(
        &self,
        tenant: TenantId,
        template: ReportTemplateId,
    ) -> Result<Option<ReportTemplate>> {
        let row: Option<ReportTemplateRow> = self
            .client
            .inner()
            .query("SELECT ?fields FROM report_templates FINAL WHERE tenant_id = ? AND template_id = ?")
            .bind(tenant.to_string())
            .bind(template)
            .fetch_optional()
            .await
            .map_err(read_err)?;
        row.map(ReportTemplate::try_from).transpose()
    }

    async fn save_generated_report(&self, report: &GeneratedReport) -> Result<()> {
        let row = GeneratedReportRow::try_from(report)?;
        self.insert_rows("generated_reports", &[row]).await
    }
}
