//! Dashboard rendering, widget caching, report generation and the sales
//! funnel.

use chrono::Duration;
use serde_json::json;

use engine_core::{
    AnalyticsStore, Clock, DataSource, DateRange, DateRangeKeyword, QueryParam, ReportParameters,
    TenantId, WidgetCache,
};
use integration_tests::fixtures::{
    completed, custom_query_source, dashboard, date, report_template, static_source, today,
    widget,
};
use integration_tests::setup::TestContext;

const DASHBOARD: u64 = 1;
const TEMPLATE: u64 = 5;

async fn save_dashboard(ctx: &TestContext) {
    ctx.store
        .save_dashboard(&dashboard(ctx.tenant, DASHBOARD))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_render_order_and_hidden_widgets() {
    let ctx = TestContext::new();
    save_dashboard(&ctx).await;

    let mut hidden = widget(2, DASHBOARD, static_source());
    hidden.is_visible = false;
    let mut last = widget(3, DASHBOARD, static_source());
    last.display_order = 10;
    let mut first = widget(4, DASHBOARD, custom_query_source(
        "SELECT 1 AS value FROM business_events WHERE tenant_id = {{tenant_id}} LIMIT 1",
    ));
    first.display_order = 0;

    for w in [last, hidden, first, widget(5, 99, static_source())] {
        ctx.store.save_widget(ctx.tenant, &w).await.unwrap();
    }
    ctx.executor.respond("SELECT 1", vec![json!({ "value": 1 })]);

    let rendered = ctx
        .engine
        .render_dashboard(ctx.tenant, DASHBOARD)
        .await
        .expect("render failed");
    assert_eq!(rendered.dashboard.name, "Overview");

    let ids: Vec<u64> = rendered.widgets.iter().map(|w| w.widget.id).collect();
    assert_eq!(ids, vec![4, 3]);

    let query = &rendered.widgets[0].data;
    assert!(query.success);
    assert_eq!(query.count, Some(1));
    assert_eq!(query.data, json!([{ "value": 1 }]));

    let literal = &rendered.widgets[1].data;
    assert!(literal.success);
    assert_eq!(literal.data, json!({ "headline": "Welcome" }));
    assert_eq!(literal.count, None);
}

#[tokio::test]
async fn test_failing_widgets_do_not_break_dashboard() {
    let ctx = TestContext::new();
    save_dashboard(&ctx).await;

    let widgets = [
        widget(
            1,
            DASHBOARD,
            custom_query_source("SELECT * FROM broken WHERE tenant_id = {{tenant_id}}"),
        ),
        widget(2, DASHBOARD, static_source()),
        widget(3, DASHBOARD, custom_query_source("SELECT {{oops")),
        widget(4, DASHBOARD, DataSource::ReportTemplate { template_id: None }),
        widget(5, DASHBOARD, DataSource::ReportTemplate { template_id: Some(404) }),
    ];
    for w in &widgets {
        ctx.store.save_widget(ctx.tenant, w).await.unwrap();
    }
    ctx.executor.fail("FROM broken", "Table broken doesn't exist");

    let rendered = ctx.engine.render_dashboard(ctx.tenant, DASHBOARD).await.unwrap();
    assert_eq!(rendered.widgets.len(), 5);

    let success: Vec<bool> = rendered.widgets.iter().map(|w| w.data.success).collect();
    assert_eq!(success, vec![false, true, false, false, false]);

    let broken = &rendered.widgets[0].data;
    assert!(broken.error.as_deref().unwrap().contains("doesn't exist"));
    assert!(broken.data.is_null());
    assert!(rendered.widgets[2].data.error.is_some());
}

#[tokio::test]
async fn test_query_without_tenant_filter_is_refused() {
    let ctx = TestContext::new();
    save_dashboard(&ctx).await;

    let unscoped = widget(
        1,
        DASHBOARD,
        custom_query_source("SELECT sum(amount) AS value FROM business_events"),
    );
    ctx.store.save_widget(ctx.tenant, &unscoped).await.unwrap();
    ctx.executor
        .respond("FROM business_events", vec![json!({ "value": 9000 })]);

    let rendered = ctx.engine.render_dashboard(ctx.tenant, DASHBOARD).await.unwrap();
    let data = &rendered.widgets[0].data;
    assert!(!data.success);
    assert!(data.data.is_null());
    assert!(data.error.as_deref().unwrap().contains("{{tenant_id}}"));
    assert_eq!(ctx.executor.execution_count(), 0);
}

#[tokio::test]
async fn test_widget_cache_respects_ttl() {
    let ctx = TestContext::new();
    save_dashboard(&ctx).await;

    let mut cached = widget(
        1,
        DASHBOARD,
        custom_query_source("SELECT count() AS value FROM t WHERE tenant_id = {{tenant_id}}"),
    );
    cached.cache = WidgetCache {
        enabled: true,
        ttl_seconds: 60,
        ..Default::default()
    };
    ctx.store.save_widget(ctx.tenant, &cached).await.unwrap();
    ctx.executor.respond("FROM t", vec![json!({ "value": 3 })]);

    let first = ctx.engine.render_dashboard(ctx.tenant, DASHBOARD).await.unwrap();
    assert!(!first.widgets[0].from_cache);
    assert_eq!(ctx.store.widget_cache_writes(), 1);
    assert_eq!(ctx.executor.execution_count(), 1);

    let stored = ctx.store.widget(ctx.tenant, 1).unwrap();
    assert_eq!(stored.cache.cached_data.as_ref(), Some(&first.widgets[0].data));
    assert_eq!(stored.cache.cached_at, Some(ctx.clock.now()));

    ctx.clock.advance(Duration::seconds(30));
    let second = ctx.engine.render_dashboard(ctx.tenant, DASHBOARD).await.unwrap();
    assert!(second.widgets[0].from_cache);
    assert_eq!(second.widgets[0].data, first.widgets[0].data);
    assert_eq!(ctx.executor.execution_count(), 1);

    ctx.clock.advance(Duration::seconds(30));
    let third = ctx.engine.render_dashboard(ctx.tenant, DASHBOARD).await.unwrap();
    assert!(!third.widgets[0].from_cache);
    assert_eq!(ctx.executor.execution_count(), 2);
    assert_eq!(ctx.store.widget_cache_writes(), 2);
}

#[tokio::test]
async fn test_uncached_widget_never_writes_cache() {
    let ctx = TestContext::new();
    save_dashboard(&ctx).await;
    ctx.store
        .save_widget(ctx.tenant, &widget(1, DASHBOARD, static_source()))
        .await
        .unwrap();

    ctx.engine.render_dashboard(ctx.tenant, DASHBOARD).await.unwrap();
    ctx.engine.render_dashboard(ctx.tenant, DASHBOARD).await.unwrap();
    assert_eq!(ctx.store.widget_cache_writes(), 0);
}

#[tokio::test]
async fn test_report_widget_uses_template_default_range() {
    let ctx = TestContext::new();
    save_dashboard(&ctx).await;
    ctx.engine
        .save_report_template(&report_template(ctx.tenant, TEMPLATE))
        .await
        .unwrap();
    let source = DataSource::ReportTemplate {
        template_id: Some(TEMPLATE),
    };
    ctx.store
        .save_widget(ctx.tenant, &widget(1, DASHBOARD, source))
        .await
        .unwrap();
    ctx.executor.respond(
        "GROUP BY provider",
        vec![json!({ "provider": "studio-a", "revenue": 120.0 })],
    );

    let rendered = ctx.engine.render_dashboard(ctx.tenant, DASHBOARD).await.unwrap();
    assert!(rendered.widgets[0].data.success);
    assert_eq!(rendered.widgets[0].data.count, Some(1));

    let (_, query) = ctx.executor.executed().pop().unwrap();
    assert!(query.params.contains(&QueryParam::Date(date(2024, 5, 1))));
    assert!(query.params.contains(&QueryParam::Date(date(2024, 5, 31))));
}

#[tokio::test]
async fn test_missing_dashboard() {
    let ctx = TestContext::new();
    let err = ctx
        .engine
        .render_dashboard(ctx.tenant, 404)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("NF_002"));

    save_dashboard(&ctx).await;
    let err = ctx
        .engine
        .render_dashboard(TenantId::random(), DASHBOARD)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("NF_002"));
}

#[tokio::test]
async fn test_generate_report_with_default_period() {
    let ctx = TestContext::new();
    ctx.engine
        .save_report_template(&report_template(ctx.tenant, TEMPLATE))
        .await
        .unwrap();
    ctx.executor.respond(
        "GROUP BY provider",
        vec![
            json!({ "provider": "studio-a", "revenue": 120.0 }),
            json!({ "provider": "studio-b", "revenue": 80.0 }),
        ],
    );

    let report = ctx
        .engine
        .generate_report(ctx.tenant, TEMPLATE, ReportParameters::default())
        .await
        .expect("report failed");

    assert_eq!(report.template_id, TEMPLATE);
    assert_eq!(report.report_name, "Revenue by provider");
    assert_eq!(report.row_count, 2);
    assert_eq!(
        report.period,
        Some(DateRangeKeyword::LastMonth.resolve(today()))
    );
    assert_eq!(report.generated_at, ctx.clock.now());

    let saved = ctx.store.generated_reports();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].report_id, report.report_id);

    let (tenant, query) = ctx.executor.executed().pop().unwrap();
    assert_eq!(tenant, ctx.tenant);
    assert_eq!(query.params[0], QueryParam::Text(ctx.tenant.to_string()));
    assert!(!query.sql.contains("{{"));
}

#[tokio::test]
async fn test_generate_report_explicit_dates_and_extras() {
    let ctx = TestContext::new();
    ctx.engine
        .save_report_template(&report_template(ctx.tenant, TEMPLATE))
        .await
        .unwrap();

    let mut params = ReportParameters {
        start_date: Some(date(2024, 1, 1)),
        end_date: Some(date(2024, 3, 31)),
        requested_by: Some("ops".into()),
        ..Default::default()
    };
    params.extra.insert("provider".into(), "studio-a".into());

    let report = ctx
        .engine
        .generate_report(ctx.tenant, TEMPLATE, params.clone())
        .await
        .unwrap();
    assert_eq!(
        report.period,
        Some(DateRange::new(date(2024, 1, 1), date(2024, 3, 31)).unwrap())
    );
    assert_eq!(report.parameters, params);
    assert_eq!(report.row_count, 0);
}

#[tokio::test]
async fn test_generate_report_rejects_bad_parameters() {
    let ctx = TestContext::new();
    ctx.engine
        .save_report_template(&report_template(ctx.tenant, TEMPLATE))
        .await
        .unwrap();

    let half_open = ReportParameters {
        start_date: Some(date(2024, 1, 1)),
        ..Default::default()
    };
    let err = ctx
        .engine
        .generate_report(ctx.tenant, TEMPLATE, half_open)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("INPUT_001"));

    let reversed = ReportParameters {
        start_date: Some(date(2024, 3, 1)),
        end_date: Some(date(2024, 1, 1)),
        ..Default::default()
    };
    let err = ctx
        .engine
        .generate_report(ctx.tenant, TEMPLATE, reversed)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("INPUT_001"));

    let mut spoofed = ReportParameters::default();
    spoofed
        .extra
        .insert("tenant_id".into(), TenantId::random().to_string());
    let err = ctx
        .engine
        .generate_report(ctx.tenant, TEMPLATE, spoofed)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("INPUT_003"));

    let err = ctx
        .engine
        .generate_report(ctx.tenant, 404, ReportParameters::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("NF_003"));

    assert!(ctx.store.generated_reports().is_empty());
    assert_eq!(ctx.executor.execution_count(), 0);
}

#[tokio::test]
async fn test_sales_funnel_counts_completed_orders() {
    let ctx = TestContext::new();
    ctx.facts.add_events(
        ctx.tenant,
        vec![
            completed(1, 10.0, date(2024, 6, 1)),
            completed(2, 10.0, date(2024, 6, 10)),
            completed(3, 10.0, date(2024, 5, 31)),
        ],
    );

    let period = DateRangeKeyword::ThisMonth.resolve(today());
    let funnel = ctx.engine.sales_funnel(ctx.tenant, period).await.unwrap();
    assert_eq!(funnel.period, period);
    assert_eq!(funnel.orders_completed.value(), Some(2));
    assert!(!funnel.website_visitors.is_available());
    assert!(!funnel.add_to_cart.is_available());
    assert_eq!(funnel.visitor_to_order_rate.value(), None);
}
