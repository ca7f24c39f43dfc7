//! Storage seams.
//!
//! The engine reads transactional facts through [`FactReader`], persists
//! derived records through [`AnalyticsStore`] and runs ad-hoc report
//! queries through [`QueryExecutor`]. Every method is tenant-scoped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::customer::CustomerAnalyticsRecord;
use crate::dashboard::{
    Dashboard, DashboardId, GeneratedReport, ReportTemplate, ReportTemplateId, Widget, WidgetData,
    WidgetId,
};
use crate::date_range::DateRange;
use crate::error::Result;
use crate::facts::{CustomerSummary, FactRow, FactStatus, FirstEvent, MonthlyRevenue};
use crate::kpi::{KpiDefinition, KpiId, KpiValue};
use crate::query::BoundQuery;
use crate::tenant::{CustomerId, TenantId};

/// Read-only access to the transactional fact store.
#[async_trait]
pub trait FactReader: Send + Sync {
    /// Tenants that have any facts or customers.
    async fn list_tenants(&self) -> Result<Vec<TenantId>>;

    /// Registered customers, including ones with no facts yet.
    async fn list_customers(&self, tenant: TenantId) -> Result<Vec<CustomerId>>;

    /// Facts dated within `range`, optionally filtered by status.
    async fn list_events(
        &self,
        tenant: TenantId,
        range: DateRange,
        status: Option<FactStatus>,
    ) -> Result<Vec<FactRow>>;

    /// Completed-fact totals for one customer. Zeroed when there are none.
    async fn customer_summary(
        &self,
        tenant: TenantId,
        customer: CustomerId,
    ) -> Result<CustomerSummary>;

    /// First completed fact per customer.
    async fn first_completed_events(&self, tenant: TenantId) -> Result<Vec<FirstEvent>>;

    /// Distinct customers from `customers` with a completed fact in `range`.
    async fn count_active_customers(
        &self,
        tenant: TenantId,
        customers: &[CustomerId],
        range: DateRange,
    ) -> Result<u64>;

    /// Completed revenue per calendar month, ascending.
    async fn monthly_revenue(&self, tenant: TenantId, range: DateRange)
        -> Result<Vec<MonthlyRevenue>>;

    /// Completed facts in `range`.
    async fn count_completed_events(&self, tenant: TenantId, range: DateRange) -> Result<u64>;
}

/// Derived records, definitions and caches.
///
/// Writes are idempotent upserts keyed by natural keys; concurrent writers
/// for the same key resolve as last-writer-wins.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn upsert_customer_analytics(&self, records: &[CustomerAnalyticsRecord]) -> Result<()>;

    async fn get_customer_analytics(
        &self,
        tenant: TenantId,
        customer: CustomerId,
    ) -> Result<Option<CustomerAnalyticsRecord>>;

    async fn list_customer_analytics(&self, tenant: TenantId)
        -> Result<Vec<CustomerAnalyticsRecord>>;

    async fn save_kpi_definition(&self, definition: &KpiDefinition) -> Result<()>;

    async fn get_kpi_definition(
        &self,
        tenant: TenantId,
        kpi: KpiId,
    ) -> Result<Option<KpiDefinition>>;

    async fn list_kpi_definitions(&self, tenant: TenantId) -> Result<Vec<KpiDefinition>>;

    /// Latest value for exactly this period.
    async fn get_kpi_value(
        &self,
        tenant: TenantId,
        kpi: KpiId,
        period: DateRange,
    ) -> Result<Option<KpiValue>>;

    async fn upsert_kpi_value(&self, value: &KpiValue) -> Result<()>;

    async fn save_dashboard(&self, dashboard: &Dashboard) -> Result<()>;

    async fn get_dashboard(
        &self,
        tenant: TenantId,
        dashboard: DashboardId,
    ) -> Result<Option<Dashboard>>;

    async fn save_widget(&self, tenant: TenantId, widget: &Widget) -> Result<()>;

    /// Visible and hidden widgets of a dashboard, unordered.
    async fn list_widgets(&self, tenant: TenantId, dashboard: DashboardId) -> Result<Vec<Widget>>;

    /// Overwrites the cached payload and timestamp in a single write.
    async fn update_widget_cache(
        &self,
        tenant: TenantId,
        widget: WidgetId,
        data: &WidgetData,
        cached_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn save_report_template(&self, template: &ReportTemplate) -> Result<()>;

    async fn get_report_template(
        &self,
        tenant: TenantId,
        template: ReportTemplateId,
    ) -> Result<Option<ReportTemplate>>;

    async fn save_generated_report(&self, report: &GeneratedReport) -> Result<()>;
}

/// Runs bound report/widget/KPI queries.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Rows as JSON objects keyed by column name.
    async fn execute(&self, tenant: TenantId, query: &BoundQuery) -> Result<Vec<Value>>;
}
