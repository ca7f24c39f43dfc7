//! Test fixtures and fact generators.

use chrono::{Duration, NaiveDate};
use serde_json::json;

use engine_core::{
    AggregationPeriod, Dashboard, DashboardId, DataSource, DateRangeKeyword, FactRow, FactStatus,
    KpiDefinition, KpiId, KpiThresholds, QueryTemplate, ReportTemplate, ReportTemplateId, TenantId,
    Widget, WidgetCache, WidgetId,
};

/// Date every scenario is evaluated on.
pub fn today() -> NaiveDate {
    date(2024, 6, 15)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

pub fn days_ago(days: i64) -> NaiveDate {
    today() - Duration::days(days)
}

/// A completed order.
pub fn completed(customer_id: u64, amount: f64, event_date: NaiveDate) -> FactRow {
    FactRow {
        customer_id,
        amount,
        event_date,
        status: FactStatus::Completed,
        event_type: "order".into(),
        category: None,
        provider: None,
    }
}

pub fn cancelled(customer_id: u64, event_date: NaiveDate) -> FactRow {
    FactRow {
        status: FactStatus::Cancelled,
        ..completed(customer_id, 0.0, event_date)
    }
}

pub const OCCASIONAL: u64 = 1;
pub const VIP: u64 = 2;
pub const LOST: u64 = 3;

/// Three customers:
/// - one $100 order ten days ago
/// - twelve orders worth $1000 in total, the latest two days ago
/// - one $50 order four hundred days ago
pub fn three_customer_facts() -> Vec<FactRow> {
    let mut facts = vec![completed(OCCASIONAL, 100.0, days_ago(10))];
    for i in 0..12 {
        let amount = if i == 0 { 120.0 } else { 80.0 };
        facts.push(FactRow {
            category: Some(if i % 3 == 0 { "spa" } else { "hair" }.into()),
            provider: Some("studio-a".into()),
            ..completed(VIP, amount, days_ago(2 + 15 * i))
        });
    }
    facts.push(completed(LOST, 50.0, days_ago(400)));
    facts
}

/// Monthly revenue of 100, 200, 300, 400 for February to May.
pub fn linear_revenue_facts() -> Vec<FactRow> {
    (0..4)
        .map(|i| completed(10 + i as u64, 100.0 * (i + 1) as f64, date(2024, 2 + i, 10)))
        .collect()
}

pub fn kpi_definition(
    tenant: TenantId,
    id: KpiId,
    period: AggregationPeriod,
    target: Option<f64>,
) -> KpiDefinition {
    KpiDefinition {
        id,
        tenant_id: tenant,
        name: format!("Revenue {id}"),
        description: None,
        data_source_query: QueryTemplate::parse(
            "SELECT sum(amount) AS value FROM business_events \
             WHERE tenant_id = {{tenant_id}} AND event_date BETWEEN {{start_date}} AND {{end_date}}",
        )
        .expect("valid KPI query"),
        target_value: target,
        thresholds: KpiThresholds {
            green: Some(1000.0),
            yellow: Some(800.0),
            red: Some(0.0),
        },
        aggregation_period: period,
        unit: Some("USD".into()),
    }
}

pub fn report_template(tenant: TenantId, id: ReportTemplateId) -> ReportTemplate {
    ReportTemplate {
        id,
        tenant_id: tenant,
        report_name: "Revenue by provider".into(),
        description: None,
        query_template: QueryTemplate::parse(
            "SELECT provider, sum(amount) AS revenue FROM business_events \
             WHERE tenant_id = {{tenant_id}} AND event_date BETWEEN {{start_date}} AND {{end_date}} \
             GROUP BY provider",
        )
        .expect("valid report query"),
        default_date_range: Some(DateRangeKeyword::LastMonth),
    }
}

pub fn dashboard(tenant: TenantId, id: DashboardId) -> Dashboard {
    Dashboard {
        id,
        tenant_id: tenant,
        name: "Overview".into(),
        description: None,
    }
}

pub fn widget(id: WidgetId, dashboard_id: DashboardId, data_source: DataSource) -> Widget {
    Widget {
        id,
        dashboard_id,
        title: format!("Widget {id}"),
        widget_type: "table".into(),
        display_order: id as i32,
        position_row: 0,
        position_col: 0,
        is_visible: true,
        data_source,
        date_range: None,
        cache: WidgetCache::default(),
    }
}

pub fn static_source() -> DataSource {
    DataSource::Static {
        payload: json!({ "headline": "Welcome" }),
    }
}

pub fn custom_query_source(sql: &str) -> DataSource {
    DataSource::CustomQuery { query: sql.into() }
}
