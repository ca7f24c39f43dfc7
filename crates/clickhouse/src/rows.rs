//! Row types for the analytic tables and conversions to domain types.
//!
//! Dates travel as `Date32` day numbers and timestamps as milliseconds
//! since the epoch. Enums are stored by name.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

use engine_core::{
    CustomerAnalyticsRecord, Dashboard, DataSource, Error, FactRow, GeneratedReport,
    KpiDefinition, KpiThresholds, KpiValue, QueryTemplate, ReportTemplate, Result, TenantId,
    Widget, WidgetCache, WidgetData,
};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Day number of a date, as stored in `Date32` columns.
pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub fn days_to_date(days: i32) -> NaiveDate {
    epoch() + Duration::days(i64::from(days))
}

pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// `YYYY-MM-DD`, for binding against date columns.
pub fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_tenant(raw: &str) -> Result<TenantId> {
    raw.parse()
        .map_err(|_| Error::internal(format!("stored tenant id {raw:?} is not a UUID")))
}

fn parse_column<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::internal(format!("unexpected {column} value {raw:?}")))
}

/// Row of `business_events`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct FactEventRow {
    pub tenant_id: String,
    pub customer_id: u64,
    pub amount: f64,
    pub event_date: i32,
    pub status: String,
    pub event_type: String,
    pub category: Option<String>,
    pub provider: Option<String>,
}

impl FactEventRow {
    pub fn from_fact(tenant: TenantId, fact: &FactRow) -> Self {
        Self {
            tenant_id: tenant.to_string(),
            customer_id: fact.customer_id,
            amount: fact.amount,
            event_date: date_to_days(fact.event_date),
            status: fact.status.as_str().to_string(),
            event_type: fact.event_type.clone(),
            category: fact.category.clone(),
            provider: fact.provider.clone(),
        }
    }

    /// `None` when the status is not one the engine understands.
    pub fn into_fact(self) -> Option<FactRow> {
        Some(FactRow {
            customer_id: self.customer_id,
            amount: self.amount,
            event_date: days_to_date(self.event_date),
            status: self.status.parse().ok()?,
            event_type: self.event_type,
            category: self.category,
            provider: self.provider,
        })
    }
}

/// Row of `customers`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct CustomerRow {
    pub tenant_id: String,
    pub customer_id: u64,
    pub created_at: i64,
}

/// Row of `customer_analytics`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct CustomerAnalyticsRow {
    pub tenant_id: String,
    pub customer_id: u64,
    pub total_events: u64,
    pub total_revenue: f64,
    pub avg_event_value: f64,
    pub lifetime_value: f64,
    pub first_event_date: Option<i32>,
    pub last_event_date: Option<i32>,
    pub days_since_last_event: Option<i64>,
    pub event_frequency: f64,
    pub cancellation_rate: f64,
    pub rfm_score: String,
    pub segment: String,
    pub churn_risk_score: f64,
    pub favorite_categories: Vec<String>,
    pub favorite_providers: Vec<String>,
    pub calculated_at: i64,
}

impl From<&CustomerAnalyticsRecord> for CustomerAnalyticsRow {
    fn from(r: &CustomerAnalyticsRecord) -> Self {
        Self {
            tenant_id: r.tenant_id.to_string(),
            customer_id: r.customer_id,
            total_events: r.total_events,
            total_revenue: r.total_revenue,
            avg_event_value: r.avg_event_value,
            lifetime_value: r.lifetime_value,
            first_event_date: r.first_event_date.map(date_to_days),
            last_event_date: r.last_event_date.map(date_to_days),
            days_since_last_event: r.days_since_last_event,
            event_frequency: r.event_frequency,
            cancellation_rate: r.cancellation_rate,
            rfm_score: r.rfm_score.to_string(),
            segment: r.segment.as_str().to_string(),
            churn_risk_score: r.churn_risk_score,
            favorite_categories: r.favorite_categories.clone(),
            favorite_providers: r.favorite_providers.clone(),
            calculated_at: r.calculated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<CustomerAnalyticsRow> for CustomerAnalyticsRecord {
    type Error = Error;

    fn try_from(row: CustomerAnalyticsRow) -> Result<Self> {
        Ok(Self {
            tenant_id: parse_tenant(&row.tenant_id)?,
            customer_id: row.customer_id,
            total_events: row.total_events,
            total_revenue: row.total_revenue,
            avg_event_value: row.avg_event_value,
            lifetime_value: row.lifetime_value,
            first_event_date: row.first_event_date.map(days_to_date),
            last_event_date: row.last_event_date.map(days_to_date),
            days_since_last_event: row.days_since_last_event,
            event_frequency: row.event_frequency,
            cancellation_rate: row.cancellation_rate,
            rfm_score: parse_column("rfm_score", &row.rfm_score)?,
            segment: parse_column("segment", &row.segment)?,
            churn_risk_score: row.churn_risk_score,
            favorite_categories: row.favorite_categories,
            favorite_providers: row.favorite_providers,
            calculated_at: millis_to_datetime(row.calculated_at),
        })
    }
}

/// Row of `kpi_definitions`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct KpiDefinitionRow {
    pub tenant_id: String,
    pub kpi_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub data_source_query: String,
    pub target_value: Option<f64>,
    pub threshold_green: Option<f64>,
    pub threshold_yellow: Option<f64>,
    pub threshold_red: Option<f64>,
    pub aggregation_period: String,
    pub unit: Option<String>,
    pub updated_at: i64,
}

impl KpiDefinitionRow {
    pub fn new(d: &KpiDefinition, updated_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: d.tenant_id.to_string(),
            kpi_id: d.id,
            name: d.name.clone(),
            description: d.description.clone(),
            data_source_query: d.data_source_query.as_str().to_string(),
            target_value: d.target_value,
            threshold_green: d.thresholds.green,
            threshold_yellow: d.thresholds.yellow,
            threshold_red: d.thresholds.red,
            aggregation_period: d.aggregation_period.as_str().to_string(),
            unit: d.unit.clone(),
            updated_at: updated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<KpiDefinitionRow> for KpiDefinition {
    type Error = Error;

    fn try_from(row: KpiDefinitionRow) -> Result<Self> {
        Ok(Self {
            id: row.kpi_id,
            tenant_id: parse_tenant(&row.tenant_id)?,
            name: row.name,
            description: row.description,
            data_source_query: QueryTemplate::parse(row.data_source_query)?,
            target_value: row.target_value,
            thresholds: KpiThresholds {
                green: row.threshold_green,
                yellow: row.threshold_yellow,
                red: row.threshold_red,
            },
            aggregation_period: parse_column("aggregation_period", &row.aggregation_period)?,
            unit: row.unit,
        })
    }
}

/// Row of `kpi_values`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct KpiValueRow {
    pub tenant_id: String,
    pub kpi_id: u64,
    pub period_start: i32,
    pub period_end: i32,
    pub period_type: String,
    pub actual_value: f64,
    pub target_value: Option<f64>,
    pub variance: Option<f64>,
    pub variance_percentage: Option<f64>,
    pub previous_period_value: f64,
    pub change_value: f64,
    pub change_percentage: Option<f64>,
    pub trend_direction: String,
    pub status: String,
    pub calculated_at: i64,
}

impl From<&KpiValue> for KpiValueRow {
    fn from(v: &KpiValue) -> Self {
        Self {
            tenant_id: v.tenant_id.to_string(),
            kpi_id: v.kpi_id,
            period_start: date_to_days(v.period_start),
            period_end: date_to_days(v.period_end),
            period_type: v.period_type.as_str().to_string(),
            actual_value: v.actual_value,
            target_value: v.target_value,
            variance: v.variance,
            variance_percentage: v.variance_percentage,
            previous_period_value: v.previous_period_value,
            change_value: v.change_value,
            change_percentage: v.change_percentage,
            trend_direction: v.trend_direction.as_str().to_string(),
            status: v.status.as_str().to_string(),
            calculated_at: v.calculated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<KpiValueRow> for KpiValue {
    type Error = Error;

    fn try_from(row: KpiValueRow) -> Result<Self> {
        Ok(Self {
            tenant_id: parse_tenant(&row.tenant_id)?,
            kpi_id: row.kpi_id,
            period_start: days_to_date(row.period_start),
            period_end: days_to_date(row.period_end),
            period_type: parse_column("period_type", &row.period_type)?,
            actual_value: row.actual_value,
            target_value: row.target_value,
            variance: row.variance,
            variance_percentage: row.variance_percentage,
            previous_period_value: row.previous_period_value,
            change_value: row.change_value,
            change_percentage: row.change_percentage,
            trend_direction: parse_column("trend_direction", &row.trend_direction)?,
            status: parse_column("status", &row.status)?,
            calculated_at: millis_to_datetime(row.calculated_at),
        })
    }
}

/// Row of `dashboards`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct DashboardRow {
    pub tenant_id: String,
    pub dashboard_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub updated_at: i64,
}

impl DashboardRow {
    pub fn new(d: &Dashboard, updated_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: d.tenant_id.to_string(),
            dashboard_id: d.id,
            name: d.name.clone(),
            description: d.description.clone(),
            updated_at: updated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<DashboardRow> for Dashboard {
    type Error = Error;

    fn try_from(row: DashboardRow) -> Result<Self> {
        Ok(Self {
            id: row.dashboard_id,
            tenant_id: parse_tenant(&row.tenant_id)?,
            name: row.name,
            description: row.description,
        })
    }
}

/// Row of `dashboard_widgets`. The cache lives in `widget_cache`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct WidgetRow {
    pub tenant_id: String,
    pub dashboard_id: u64,
    pub widget_id: u64,
    pub title: String,
    pub widget_type: String,
    pub display_order: i32,
    pub position_row: i32,
    pub position_col: i32,
    pub is_visible: bool,
    pub data_source: String,
    pub date_range: Option<String>,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u32,
    pub updated_at: i64,
}

impl WidgetRow {
    pub fn new(tenant: TenantId, w: &Widget, updated_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            tenant_id: tenant.to_string(),
            dashboard_id: w.dashboard_id,
            widget_id: w.id,
            title: w.title.clone(),
            widget_type: w.widget_type.clone(),
            display_order: w.display_order,
            position_row: w.position_row,
            position_col: w.position_col,
            is_visible: w.is_visible,
            data_source: serde_json::to_string(&w.data_source)?,
            date_range: w.date_range.map(|k| k.as_str().to_string()),
            cache_enabled: w.cache.enabled,
            cache_ttl_seconds: w.cache.ttl_seconds,
            updated_at: updated_at.timestamp_millis(),
        })
    }

    pub fn into_widget(self, cache: Option<WidgetCacheRow>) -> Result<Widget> {
        let data_source: DataSource = serde_json::from_str(&self.data_source)?;
        let (cached_data, cached_at) = match cache {
            Some(c) => (
                Some(serde_json::from_str::<WidgetData>(&c.cached_data)?),
                Some(millis_to_datetime(c.cached_at)),
            ),
            None => (None, None),
        };
        Ok(Widget {
            id: self.widget_id,
            dashboard_id: self.dashboard_id,
            title: self.title,
            widget_type: self.widget_type,
            display_order: self.display_order,
            position_row: self.position_row,
            position_col: self.position_col,
            is_visible: self.is_visible,
            data_source,
            date_range: self
                .date_range
                .as_deref()
                .map(|k| parse_column("date_range", k))
                .transpose()?,
            cache: WidgetCache {
                enabled: self.cache_enabled,
                ttl_seconds: self.cache_ttl_seconds,
                cached_data,
                cached_at,
            },
        })
    }
}

/// Row of `widget_cache`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct WidgetCacheRow {
    pub tenant_id: String,
    pub widget_id: u64,
    pub cached_data: String,
    pub cached_at: i64,
}

/// Row of `report_templates`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ReportTemplateRow {
    pub tenant_id: String,
    pub template_id: u64,
    pub report_name: String,
    pub description: Option<String>,
    pub query_template: String,
    pub default_date_range: Option<String>,
    pub updated_at: i64,
}

impl ReportTemplateRow {
    pub fn new(t: &ReportTemplate, updated_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: t.tenant_id.to_string(),
            template_id: t.id,
            report_name: t.report_name.clone(),
            description: t.description.clone(),
            query_template: t.query_template.as_str().to_string(),
            default_date_range: t.default_date_range.map(|k| k.as_str().to_string()),
            updated_at: updated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<ReportTemplateRow> for ReportTemplate {
    type Error = Error;

    fn try_from(row: ReportTemplateRow) -> Result<Self> {
        Ok(Self {
            id: row.template_id,
            tenant_id: parse_tenant(&row.tenant_id)?,
            report_name: row.report_name,
            description: row.description,
            query_template: QueryTemplate::parse(row.query_template)?,
            default_date_range: row
                .default_date_range
                .as_deref()
                .map(|k| parse_column("default_date_range", k))
                .transpose()?,
        })
    }
}

/// Row of `generated_reports`.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct GeneratedReportRow {
    pub report_id: String,
    pub tenant_id: String,
    pub template_id: u64,
    pub report_name: String,
    pub parameters: String,
    pub period_start: Option<i32>,
    pub period_end: Option<i32>,
    pub data: String,
    pub row_count: u64,
    pub execution_time_ms: u64,
    pub generated_at: i64,
}

impl TryFrom<&GeneratedReport> for GeneratedReportRow {
    type Error = Error;

    fn try_from(r: &GeneratedReport) -> Result<Self> {
        Ok(Self {
            report_id: r.report_id.to_string(),
            tenant_id: r.tenant_id.to_string(),
            template_id: r.template_id,
            report_name: r.report_name.clone(),
            parameters: serde_json::to_string(&r.parameters)?,
            period_start: r.period.map(|p| date_to_days(p.start)),
            period_end: r.period.map(|p| date_to_days(p.end)),
            data: serde_json::to_string(&r.data)?,
            row_count: r.row_count as u64,
            execution_time_ms: r.execution_time_ms,
            generated_at: r.generated_at.timestamp_millis(),
        })
    }
}
