//! Round-trip tests against a real ClickHouse server.
//!
//! Facts are written with the insert helpers, the engine runs on the
//! ClickHouse-backed reader, store and executor, and results are read back
//! through the same store.
//!
//! Requires Docker, or `ANALYTICS_TEST_CLICKHOUSE_URL` pointing at a
//! running server. Run with `--ignored`.

use std::sync::Arc;

use analytics::{AnalyticsEngine, AnalyticsSettings};
use clickhouse_client::{
    check_connection, count_customer_analytics, count_facts, count_generated_reports,
    delete_tenant, init_schema, insert_customers, insert_facts, ClickHouseClient,
    ClickHouseFactReader, ClickHouseQueryExecutor, ClickHouseStore,
};
use engine_core::{
    AggregationPeriod, AnalyticsStore, Clock, DataSource, DateRangeKeyword, FixedClock,
    ReportParameters, Segment, TenantId, ValueSource, WidgetCache,
};
use integration_tests::containers::TestContainers;
use integration_tests::fixtures::{
    self, custom_query_source, dashboard, kpi_definition, report_template, static_source, widget,
    LOST, OCCASIONAL, VIP,
};

struct Harness {
    _containers: TestContainers,
    client: ClickHouseClient,
    clock: Arc<FixedClock>,
    engine: AnalyticsEngine,
    tenant: TenantId,
}

impl Harness {
    async fn start() -> Self {
        let containers = TestContainers::start().await;
        let client = ClickHouseClient::new(containers.config()).expect("client config");
        init_schema(&client).await.expect("schema init failed");
        assert!(check_connection(&client).await);

        let clock = Arc::new(FixedClock::at_date(fixtures::today()));
        let engine = AnalyticsEngine::new(
            Arc::new(ClickHouseFactReader::new(client.clone())),
            Arc::new(ClickHouseStore::new(client.clone())),
            Arc::new(ClickHouseQueryExecutor::new(client.clone())),
            clock.clone(),
            AnalyticsSettings::default(),
        );

        Self {
            _containers: containers,
            client,
            clock,
            engine,
            tenant: TenantId::random(),
        }
    }

    fn store(&self) -> ClickHouseStore {
        ClickHouseStore::new(self.client.clone())
    }

    async fn seed_three_customers(&self) {
        let facts = fixtures::three_customer_facts();
        let written = insert_facts(&self.client, self.tenant, &facts)
            .await
            .expect("fact insert failed");
        assert_eq!(written, facts.len());
        insert_customers(&self.client, self.tenant, &[OCCASIONAL, VIP, LOST, 42], self.clock.now())
            .await
            .expect("customer insert failed");
    }

    async fn cleanup(&self) {
        delete_tenant(&self.client, self.tenant).await.ok();
    }
}

#[tokio::test]
#[ignore]
async fn test_customer_recompute_roundtrip() {
    let h = Harness::start().await;
    h.seed_three_customers().await;
    assert_eq!(count_facts(&h.client, h.tenant).await.unwrap(), 14);

    let summary = h.engine.recompute_all_customers(h.tenant).await.unwrap();
    assert_eq!(summary.customers_updated, 4);

    // A second pass replaces rather than duplicates.
    h.engine.recompute_all_customers(h.tenant).await.unwrap();
    assert_eq!(count_customer_analytics(&h.client, h.tenant).await.unwrap(), 4);

    let records = h
        .engine
        .get_customer_analytics(h.tenant, None)
        .await
        .unwrap()
        .into_many();
    let segments: Vec<(u64, Segment)> = records.iter().map(|r| (r.customer_id, r.segment)).collect();
    assert_eq!(
        segments,
        vec![
            (OCCASIONAL, Segment::Occasional),
            (VIP, Segment::Vip),
            (LOST, Segment::Lost),
            (42, Segment::New),
        ]
    );

    let vip = &records[1];
    assert_eq!(vip.total_revenue, 1000.0);
    assert_eq!(vip.favorite_providers, vec!["studio-a".to_string()]);

    let at_risk = h.engine.get_at_risk_customers(h.tenant, Some(60.0)).await.unwrap();
    assert_eq!(at_risk.len(), 1);
    assert_eq!(at_risk[0].customer_id, LOST);

    h.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_kpi_roundtrip() {
    let h = Harness::start().await;
    h.seed_three_customers().await;

    let definition = kpi_definition(h.tenant, 1, AggregationPeriod::Monthly, Some(500.0));
    h.engine.save_kpi_definition(&definition).await.unwrap();

    let first = h.engine.get_kpi_value(h.tenant, 1, None).await.unwrap();
    assert_eq!(first.source, ValueSource::Computed);
    assert!(first.value.actual_value > 0.0);

    let second = h.engine.get_kpi_value(h.tenant, 1, None).await.unwrap();
    assert_eq!(second.source, ValueSource::Cache);
    assert_eq!(second.value.actual_value, first.value.actual_value);

    h.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_dashboard_and_report_roundtrip() {
    let h = Harness::start().await;
    h.seed_three_customers().await;
    let store = h.store();

    store.save_dashboard(&dashboard(h.tenant, 1)).await.unwrap();
    let mut cached = widget(
        1,
        1,
        custom_query_source(
            "SELECT count() AS value FROM business_events WHERE tenant_id = {{tenant_id}}",
        ),
    );
    cached.cache = WidgetCache {
        enabled: true,
        ttl_seconds: 300,
        ..Default::default()
    };
    store.save_widget(h.tenant, &cached).await.unwrap();
    store
        .save_widget(h.tenant, &widget(2, 1, static_source()))
        .await
        .unwrap();
    store
        .save_widget(
            h.tenant,
            &widget(
                3,
                1,
                custom_query_source("SELECT * FROM no_such_table WHERE tenant_id = {{tenant_id}}"),
            ),
        )
        .await
        .unwrap();

    let rendered = h.engine.render_dashboard(h.tenant, 1).await.unwrap();
    let success: Vec<bool> = rendered.widgets.iter().map(|w| w.data.success).collect();
    assert_eq!(success, vec![true, true, false]);
    assert_eq!(rendered.widgets[0].data.count, Some(1));

    let again = h.engine.render_dashboard(h.tenant, 1).await.unwrap();
    assert!(again.widgets[0].from_cache);

    h.engine
        .save_report_template(&report_template(h.tenant, 9))
        .await
        .unwrap();
    let report = h
        .engine
        .generate_report(
            h.tenant,
            9,
            ReportParameters {
                date_range: Some(DateRangeKeyword::ThisYear),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(report.row_count, report.data.len());
    assert_eq!(count_generated_reports(&h.client, h.tenant).await.unwrap(), 1);

    let source = DataSource::ReportTemplate { template_id: Some(9) };
    store.save_widget(h.tenant, &widget(4, 1, source)).await.unwrap();
    let rendered = h.engine.render_dashboard(h.tenant, 1).await.unwrap();
    assert_eq!(rendered.widgets.len(), 4);
    assert!(rendered.widgets[3].data.success);

    h.cleanup().await;
}
