//! Dashboards, widgets and report templates.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::date_range::{DateRange, DateRangeKeyword};
use crate::query::QueryTemplate;
use crate::tenant::TenantId;

pub type DashboardId = u64;
pub type WidgetId = u64;
pub type ReportTemplateId = u64;

/// Dashboard metadata. Widgets are stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Dashboard {
    pub id: DashboardId,
    pub tenant_id: TenantId,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Where a widget's payload comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "data_source_type", rename_all = "snake_case")]
pub enum DataSource {
    ReportTemplate { template_id: Option<ReportTemplateId> },
    /// Raw ad-hoc query text, parsed at render time so a malformed query
    /// fails only its own widget.
    CustomQuery { query: String },
    Static { payload: Value },
}

impl DataSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReportTemplate { .. } => "report_template",
            Self::CustomQuery { .. } => "custom_query",
            Self::Static { .. } => "static",
        }
    }
}

/// Persisted widget cache blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetCache {
    pub enabled: bool,
    pub ttl_seconds: u32,
    pub cached_data: Option<WidgetData>,
    pub cached_at: Option<DateTime<Utc>>,
}

impl WidgetCache {
    /// Cached payload if caching is on and it is younger than the TTL.
    pub fn fresh_payload(&self, now: DateTime<Utc>) -> Option<&WidgetData> {
        if !self.enabled {
            return None;
        }
        let (data, at) = (self.cached_data.as_ref()?, self.cached_at?);
        let age = now.signed_duration_since(at).num_milliseconds();
        (age >= 0 && age < i64::from(self.ttl_seconds) * 1000).then_some(data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_widget_source"))]
pub struct Widget {
    pub id: WidgetId,
    pub dashboard_id: DashboardId,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Presentation hint (chart, table, number...). Opaque to the engine.
    #[serde(default)]
    pub widget_type: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub position_row: i32,
    #[serde(default)]
    pub position_col: i32,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(flatten)]
    pub data_source: DataSource,
    #[serde(default)]
    pub date_range: Option<DateRangeKeyword>,
    #[serde(default)]
    pub cache: WidgetCache,
}

fn default_visible() -> bool {
    true
}

fn validate_widget_source(widget: &Widget) -> Result<(), ValidationError> {
    match &widget.data_source {
        DataSource::CustomQuery { query } if query.len() > 20_000 => {
            Err(ValidationError::new("custom_query_too_long"))
        }
        _ => Ok(()),
    }
}

impl Widget {
    /// Render order: display order, then grid position.
    pub fn sort_key(&self) -> (i32, i32, i32, WidgetId) {
        (self.display_order, self.position_row, self.position_col, self.id)
    }
}

/// Payload served for one widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetData {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WidgetData {
    pub fn rows(rows: Vec<Value>) -> Self {
        let count = rows.len();
        Self {
            success: true,
            data: Value::Array(rows),
            count: Some(count),
            error: None,
        }
    }

    pub fn literal(payload: Value) -> Self {
        Self {
            success: true,
            data: payload,
            count: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            count: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedWidget {
    pub widget: Widget,
    pub data: WidgetData,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedDashboard {
    pub dashboard: Dashboard,
    pub widgets: Vec<RenderedWidget>,
}

/// Named, reusable query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReportTemplate {
    pub id: ReportTemplateId,
    pub tenant_id: TenantId,
    #[validate(length(min = 1, max = 200))]
    pub report_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub query_template: QueryTemplate,
    #[serde(default)]
    pub default_date_range: Option<DateRangeKeyword>,
}

/// Inputs to report generation. A keyword wins over explicit dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportParameters {
    #[serde(default)]
    pub date_range: Option<DateRangeKeyword>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Additional named text parameters, bound like any other value.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    #[serde(default)]
    pub requested_by: Option<String>,
}

/// Persisted output of a report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReport {
    pub report_id: Uuid,
    pub tenant_id: TenantId,
    pub template_id: ReportTemplateId,
    pub report_name: String,
    pub parameters: ReportParameters,
    pub period: Option<DateRange>,
    pub data: Vec<Value>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub generated_at: DateTime<Utc>,
}
