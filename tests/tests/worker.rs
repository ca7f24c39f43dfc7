//! Background pass tests: tenant selection, failure accounting and the
//! scheduler loop.

use std::sync::Arc;
use std::time::Duration;

use engine_core::{AggregationPeriod, TenantId};
use integration_tests::fixtures::{completed, days_ago, kpi_definition};
use integration_tests::setup::TestContext;
use worker::{recompute_customers, refresh_kpis, WorkerConfig, WorkerScheduler};

/// Context with a second tenant holding one customer.
fn two_tenants() -> (TestContext, TenantId) {
    let ctx = TestContext::with_three_customers();
    let other = TenantId::random();
    ctx.facts
        .add_events(other, vec![completed(1, 50.0, days_ago(5))]);
    (ctx, other)
}

#[tokio::test]
async fn test_recompute_pass_covers_every_tenant() {
    let (ctx, other) = two_tenants();

    let summary = recompute_customers(&ctx.engine, &[]).await.unwrap();
    assert_eq!(summary.tenants, 2);
    assert_eq!(summary.tenants_failed, 0);
    assert_eq!(summary.customers_updated, 4);
    assert_eq!(ctx.store.customer_record_count(ctx.tenant), 3);
    assert_eq!(ctx.store.customer_record_count(other), 1);
}

#[tokio::test]
async fn test_recompute_pass_honours_allow_list() {
    let (ctx, other) = two_tenants();

    let summary = recompute_customers(&ctx.engine, &[other]).await.unwrap();
    assert_eq!(summary.tenants, 1);
    assert_eq!(summary.customers_updated, 1);
    assert_eq!(ctx.store.customer_record_count(ctx.tenant), 0);
}

#[tokio::test]
async fn test_failing_tenants_are_counted_not_fatal() {
    let (ctx, _) = two_tenants();
    ctx.store.set_fail_writes(true);

    let summary = recompute_customers(&ctx.engine, &[]).await.unwrap();
    assert_eq!(summary.tenants, 2);
    assert_eq!(summary.tenants_failed, 2);
    assert_eq!(summary.customers_updated, 0);
}

#[tokio::test]
async fn test_unreadable_fact_store_fails_the_pass() {
    let ctx = TestContext::with_three_customers();
    ctx.facts.set_should_fail(true);

    let err = recompute_customers(&ctx.engine, &[]).await.unwrap_err();
    assert_eq!(err.error_code(), Some("DB_001"));
}

#[tokio::test]
async fn test_kpi_refresh_pass() {
    let ctx = TestContext::with_three_customers();
    for id in [1, 2] {
        ctx.engine
            .save_kpi_definition(&kpi_definition(ctx.tenant, id, AggregationPeriod::Daily, None))
            .await
            .unwrap();
    }

    let summary = refresh_kpis(&ctx.engine, &[]).await.unwrap();
    assert_eq!(summary.tenants, 1);
    assert_eq!(summary.kpis_computed, 2);
    assert_eq!(summary.kpis_failed, 0);
    assert_eq!(ctx.store.kpi_upserts(), 2);

    // Still fresh on the next pass.
    let summary = refresh_kpis(&ctx.engine, &[]).await.unwrap();
    assert_eq!(summary.kpis_computed, 0);
    assert_eq!(ctx.store.kpi_upserts(), 2);
}

#[tokio::test]
async fn test_scheduler_runs_first_pass_immediately() {
    let ctx = TestContext::with_three_customers();
    let config = WorkerConfig {
        recompute_interval_secs: 3600,
        kpi_refresh_interval_secs: 3600,
        tenants: vec![ctx.tenant],
        ..Default::default()
    };

    let scheduler = Arc::new(WorkerScheduler::new(config, ctx.engine.clone()));
    let handles = scheduler.start();
    assert_eq!(handles.len(), 2);

    let mut updated = 0;
    for _ in 0..50 {
        updated = ctx.store.customer_record_count(ctx.tenant);
        if updated == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for handle in handles {
        handle.abort();
    }
    assert_eq!(updated, 3);
}
