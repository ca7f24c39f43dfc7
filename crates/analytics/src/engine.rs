//! Tenant-scoped entry points.
//!
//! [`AnalyticsEngine`] owns the shared service handles and builds a fresh
//! [`AnalyticsContext`] for every call, so a call can only ever see the
//! tenant it was made for.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::Validate;

use engine_core::{
    AnalyticsStore, Clock, CohortGranularity, CohortRecord, CohortRequest, CustomerAnalyticsRecord,
    CustomerId, CustomerLtv, DashboardId, DateRange, DateRangeKeyword, FactReader, ForecastOutcome,
    ForecastRequest, GeneratedReport, KpiDefinition, KpiId, KpiReading, QueryExecutor,
    RecomputeSummary, RenderedDashboard, ReportParameters, ReportTemplate, ReportTemplateId,
    Result, Segment, SegmentSummary, TenantId,
};

use crate::context::{AnalyticsContext, Services};
use crate::forecast::SeasonalIndex;
use crate::funnel::SalesFunnel;
use crate::kpi::KpiRefreshSummary;
use crate::settings::AnalyticsSettings;
use crate::{cohort, customers, dashboard, forecast, funnel, kpi, reports};

/// Result of [`AnalyticsEngine::get_customer_analytics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomerAnalytics {
    One(CustomerAnalyticsRecord),
    Many(Vec<CustomerAnalyticsRecord>),
}

impl CustomerAnalytics {
    pub fn into_one(self) -> Option<CustomerAnalyticsRecord> {
        match self {
            Self::One(record) => Some(record),
            Self::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Vec<CustomerAnalyticsRecord> {
        match self {
            Self::One(record) => vec![record],
            Self::Many(records) => records,
        }
    }
}

/// Customer and business analytics over a fact store.
#[derive(Clone)]
pub struct AnalyticsEngine {
    services: Services,
}

impl AnalyticsEngine {
    pub fn new(
        facts: Arc<dyn FactReader>,
        store: Arc<dyn AnalyticsStore>,
        executor: Arc<dyn QueryExecutor>,
        clock: Arc<dyn Clock>,
        settings: AnalyticsSettings,
    ) -> Self {
        Self {
            services: Services::new(facts, store, executor, clock, settings),
        }
    }

    pub fn from_services(services: Services) -> Self {
        Self { services }
    }

    pub fn settings(&self) -> &AnalyticsSettings {
        &self.services.settings
    }

    /// Context for one call scoped to `tenant`.
    pub fn context(&self, tenant: TenantId) -> AnalyticsContext {
        AnalyticsContext::new(tenant, self.services.clone())
    }

    /// Tenants known to the fact store.
    pub async fn list_tenants(&self) -> Result<Vec<TenantId>> {
        self.services.facts.list_tenants().await
    }

    // Customers

    /// With a customer id: recomputes, stores and returns that record.
    /// Without: the stored records of the tenant.
    pub async fn get_customer_analytics(
        &self,
        tenant: TenantId,
        customer: Option<CustomerId>,
    ) -> Result<CustomerAnalytics> {
        let ctx = self.context(tenant);
        match customer {
            Some(id) => customers::recompute_customer(&ctx, id)
                .await
                .map(CustomerAnalytics::One),
            None => customers::list_records(&ctx).await.map(CustomerAnalytics::Many),
        }
    }

    pub async fn recompute_customer(
        &self,
        tenant: TenantId,
        customer: CustomerId,
    ) -> Result<CustomerAnalyticsRecord> {
        customers::recompute_customer(&self.context(tenant), customer).await
    }

    pub async fn recompute_all_customers(&self, tenant: TenantId) -> Result<RecomputeSummary> {
        customers::recompute_all(&self.context(tenant)).await
    }

    pub async fn get_segment_distribution(&self, tenant: TenantId) -> Result<Vec<SegmentSummary>> {
        customers::segment_distribution(&self.context(tenant)).await
    }

    /// Churning customers with a risk of at least `min_churn_risk`
    /// (configured default when `None`).
    pub async fn get_at_risk_customers(
        &self,
        tenant: TenantId,
        min_churn_risk: Option<f64>,
    ) -> Result<Vec<CustomerAnalyticsRecord>> {
        let min = min_churn_risk.unwrap_or(self.settings().customers.min_churn_risk);
        customers::at_risk(&self.context(tenant), min).await
    }

    /// `segment` is a segment name such as `at_risk`.
    pub async fn get_customers_by_segment(
        &self,
        tenant: TenantId,
        segment: &str,
    ) -> Result<Vec<CustomerAnalyticsRecord>> {
        let segment: Segment = segment.parse()?;
        customers::by_segment(&self.context(tenant), segment).await
    }

    pub async fn get_high_value_customers(
        &self,
        tenant: TenantId,
        limit: Option<usize>,
    ) -> Result<Vec<CustomerAnalyticsRecord>> {
        let limit = limit.unwrap_or(self.settings().customers.high_value_limit);
        customers::high_value(&self.context(tenant), limit).await
    }

    pub async fn customer_lifetime_value(
        &self,
        tenant: TenantId,
        customer: CustomerId,
    ) -> Result<CustomerLtv> {
        customers::lifetime_value(&self.context(tenant), customer).await
    }

    // Cohorts and forecasts

    pub async fn get_cohort_analysis(
        &self,
        tenant: TenantId,
        granularity: CohortGranularity,
        periods: Option<u32>,
    ) -> Result<Vec<CohortRecord>> {
        let request = CohortRequest {
            granularity,
            periods: periods.unwrap_or(self.settings().cohorts.default_periods),
        };
        cohort::analyze(&self.context(tenant), request).await
    }

    pub async fn forecast_revenue(
        &self,
        tenant: TenantId,
        months: Option<u32>,
    ) -> Result<ForecastOutcome> {
        let request = ForecastRequest {
            months: months.unwrap_or(self.settings().forecast.default_months),
        };
        forecast::forecast_revenue(&self.context(tenant), request, None).await
    }

    /// Forecast with caller-supplied seasonal multipliers.
    pub async fn forecast_revenue_with_index(
        &self,
        tenant: TenantId,
        months: Option<u32>,
        index: &SeasonalIndex,
    ) -> Result<ForecastOutcome> {
        let request = ForecastRequest {
            months: months.unwrap_or(self.settings().forecast.default_months),
        };
        forecast::forecast_revenue(&self.context(tenant), request, Some(index)).await
    }

    // KPIs

    /// `period` optionally overrides the KPI's default range with a
    /// date-range keyword such as `last_month`.
    pub async fn get_kpi_value(
        &self,
        tenant: TenantId,
        kpi_id: KpiId,
        period: Option<&str>,
    ) -> Result<KpiReading> {
        let keyword = period.map(str::parse::<DateRangeKeyword>).transpose()?;
        kpi::get_value(&self.context(tenant), kpi_id, keyword).await
    }

    pub async fn refresh_all_kpis(&self, tenant: TenantId) -> Result<KpiRefreshSummary> {
        kpi::refresh_all(&self.context(tenant)).await
    }

    /// Validates and stores a KPI definition, dropping any cached copy.
    pub async fn save_kpi_definition(&self, definition: &KpiDefinition) -> Result<()> {
        definition.validate()?;
        self.services.store.save_kpi_definition(definition).await?;
        self.services
            .definitions
            .invalidate_kpi(definition.tenant_id, definition.id)
            .await;
        Ok(())
    }

    /// Validates and stores a report template, dropping any cached copy.
    pub async fn save_report_template(&self, template: &ReportTemplate) -> Result<()> {
        template.validate()?;
        self.services.store.save_report_template(template).await?;
        self.services
            .definitions
            .invalidate_template(template.tenant_id, template.id)
            .await;
        Ok(())
    }

    // Dashboards and reports

    pub async fn render_dashboard(
        &self,
        tenant: TenantId,
        dashboard_id: DashboardId,
    ) -> Result<RenderedDashboard> {
        dashboard::render(&self.context(tenant), dashboard_id).await
    }

    pub async fn generate_report(
        &self,
        tenant: TenantId,
        template_id: ReportTemplateId,
        params: ReportParameters,
    ) -> Result<GeneratedReport> {
        reports::generate_report(&self.context(tenant), template_id, params).await
    }

    pub async fn sales_funnel(&self, tenant: TenantId, period: DateRange) -> Result<SalesFunnel> {
        funnel::sales_funnel(&self.context(tenant), period).await
    }
}
