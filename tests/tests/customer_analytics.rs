//! End-to-end tests for customer analytics: RFM scoring, segmentation,
//! churn risk and the listings built on the stored records.
//!
//! Runs against the in-memory fact reader and store with the clock pinned
//! to `fixtures::today()`.

use engine_core::{Segment, TenantId};
use integration_tests::fixtures::{completed, days_ago, LOST, OCCASIONAL, VIP};
use integration_tests::setup::TestContext;

#[tokio::test]
async fn test_three_customer_scenario() {
    let ctx = TestContext::with_three_customers();

    let summary = ctx
        .engine
        .recompute_all_customers(ctx.tenant)
        .await
        .expect("recompute failed");
    assert_eq!(summary.customers_updated, 3);
    assert_eq!(summary.records_skipped, 0);

    let records = ctx
        .engine
        .get_customer_analytics(ctx.tenant, None)
        .await
        .unwrap()
        .into_many();
    assert_eq!(records.len(), 3);

    let occasional = &records[0];
    assert_eq!(occasional.customer_id, OCCASIONAL);
    assert_eq!(occasional.segment, Segment::Occasional);
    assert_eq!(occasional.rfm_score.to_string(), "412");
    assert_eq!(occasional.days_since_last_event, Some(10));

    let vip = &records[1];
    assert_eq!(vip.customer_id, VIP);
    assert_eq!(vip.segment, Segment::Vip);
    assert_eq!(vip.total_events, 12);
    assert_eq!(vip.total_revenue, 1000.0);
    assert_eq!(vip.avg_event_value, 83.33);
    assert_eq!(vip.favorite_categories, vec!["hair".to_string(), "spa".to_string()]);
    assert_eq!(vip.favorite_providers, vec!["studio-a".to_string()]);

    let lost = &records[2];
    assert_eq!(lost.customer_id, LOST);
    assert_eq!(lost.segment, Segment::Lost);
    assert_eq!(lost.rfm_score.to_string(), "211");
    assert_eq!(lost.churn_risk_score, 70.0);

    let at_risk = ctx
        .engine
        .get_at_risk_customers(ctx.tenant, Some(60.0))
        .await
        .unwrap();
    let ids: Vec<u64> = at_risk.iter().map(|r| r.customer_id).collect();
    assert_eq!(ids, vec![LOST]);
}

#[tokio::test]
async fn test_purchase_outside_activity_window_still_counts() {
    let ctx = TestContext::with_three_customers();
    ctx.facts
        .add_events(ctx.tenant, vec![completed(7, 500.0, days_ago(6 * 365))]);

    let summary = ctx.engine.recompute_all_customers(ctx.tenant).await.unwrap();
    assert_eq!(summary.customers_updated, 4);

    let record = ctx
        .engine
        .get_customer_analytics(ctx.tenant, Some(7))
        .await
        .unwrap()
        .into_one()
        .expect("single record");
    assert_eq!(record.segment, Segment::Lost);
    assert_eq!(record.total_events, 1);
    assert_eq!(record.total_revenue, 500.0);
    assert_eq!(record.lifetime_value, 500.0);
    assert_eq!(record.first_event_date, Some(days_ago(6 * 365)));
    assert_eq!(record.days_since_last_event, Some(6 * 365));
    assert_eq!(record.rfm_score.to_string(), "214");
    assert_eq!(record.churn_risk_score, 70.0);

    // The idle customer does not shift the scores of the active ones.
    let lost = ctx
        .engine
        .get_customer_analytics(ctx.tenant, Some(LOST))
        .await
        .unwrap()
        .into_one()
        .expect("single record");
    assert_eq!(lost.rfm_score.to_string(), "211");

    let at_risk = ctx
        .engine
        .get_at_risk_customers(ctx.tenant, Some(60.0))
        .await
        .unwrap();
    let mut ids: Vec<u64> = at_risk.iter().map(|r| r.customer_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![LOST, 7]);
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let ctx = TestContext::with_three_customers();

    ctx.engine.recompute_all_customers(ctx.tenant).await.unwrap();
    let first = ctx
        .engine
        .get_customer_analytics(ctx.tenant, None)
        .await
        .unwrap()
        .into_many();

    ctx.engine.recompute_all_customers(ctx.tenant).await.unwrap();
    let second = ctx
        .engine
        .get_customer_analytics(ctx.tenant, None)
        .await
        .unwrap()
        .into_many();

    assert_eq!(first, second);
    assert_eq!(ctx.store.customer_record_count(ctx.tenant), 3);
}

#[tokio::test]
async fn test_registered_customer_without_facts_is_new() {
    let ctx = TestContext::with_three_customers();
    ctx.facts.add_customers(ctx.tenant, [42]);

    let summary = ctx.engine.recompute_all_customers(ctx.tenant).await.unwrap();
    assert_eq!(summary.customers_updated, 4);

    let record = ctx
        .engine
        .get_customer_analytics(ctx.tenant, Some(42))
        .await
        .unwrap()
        .into_one()
        .expect("single record");
    assert_eq!(record.segment, Segment::New);
    assert_eq!(record.days_since_last_event, None);
    assert_eq!(record.rfm_score.recency(), 1);

    // High churn risk, but new customers are not churning.
    assert!(record.churn_risk_score >= 60.0);
    let at_risk = ctx.engine.get_at_risk_customers(ctx.tenant, None).await.unwrap();
    assert!(at_risk.iter().all(|r| r.customer_id != 42));
}

#[tokio::test]
async fn test_single_customer_recompute_upserts() {
    let ctx = TestContext::with_three_customers();

    let record = ctx
        .engine
        .get_customer_analytics(ctx.tenant, Some(VIP))
        .await
        .unwrap()
        .into_one()
        .unwrap();
    assert_eq!(record.segment, Segment::Vip);
    assert_eq!(ctx.store.customer_record_count(ctx.tenant), 1);
}

#[tokio::test]
async fn test_unknown_customer_not_found() {
    let ctx = TestContext::with_three_customers();

    let err = ctx
        .engine
        .get_customer_analytics(ctx.tenant, Some(999))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("NF_004"));
}

#[tokio::test]
async fn test_malformed_rows_are_skipped_and_counted() {
    let ctx = TestContext::with_three_customers();
    ctx.facts
        .add_events(ctx.tenant, [completed(OCCASIONAL, f64::NAN, days_ago(3))]);

    let summary = ctx.engine.recompute_all_customers(ctx.tenant).await.unwrap();
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(summary.customers_updated, 3);

    let record = ctx
        .engine
        .get_customer_analytics(ctx.tenant, None)
        .await
        .unwrap()
        .into_many()
        .into_iter()
        .find(|r| r.customer_id == OCCASIONAL)
        .unwrap();
    assert_eq!(record.total_events, 1);
    assert_eq!(record.total_revenue, 100.0);
}

#[tokio::test]
async fn test_segment_distribution_by_revenue() {
    let ctx = TestContext::with_three_customers();
    ctx.engine.recompute_all_customers(ctx.tenant).await.unwrap();

    let distribution = ctx.engine.get_segment_distribution(ctx.tenant).await.unwrap();
    let segments: Vec<Segment> = distribution.iter().map(|s| s.segment).collect();
    assert_eq!(segments, vec![Segment::Vip, Segment::Occasional, Segment::Lost]);
    assert!(distribution.iter().all(|s| s.customer_count == 1));
    assert_eq!(distribution[0].segment_revenue, 1000.0);
    assert_eq!(distribution[2].avg_churn_risk, 70.0);
}

#[tokio::test]
async fn test_segment_and_value_listings() {
    let ctx = TestContext::with_three_customers();
    ctx.engine.recompute_all_customers(ctx.tenant).await.unwrap();

    let lost = ctx
        .engine
        .get_customers_by_segment(ctx.tenant, "lost")
        .await
        .unwrap();
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].customer_id, LOST);

    let err = ctx
        .engine
        .get_customers_by_segment(ctx.tenant, "whales")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("INPUT_002"));

    let top = ctx
        .engine
        .get_high_value_customers(ctx.tenant, Some(2))
        .await
        .unwrap();
    let ids: Vec<u64> = top.iter().map(|r| r.customer_id).collect();
    assert_eq!(ids, vec![VIP, OCCASIONAL]);

    let err = ctx
        .engine
        .get_high_value_customers(ctx.tenant, Some(0))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("INPUT_003"));
}

#[tokio::test]
async fn test_at_risk_threshold_validated() {
    let ctx = TestContext::with_three_customers();
    let err = ctx
        .engine
        .get_at_risk_customers(ctx.tenant, Some(150.0))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("INPUT_003"));
}

#[tokio::test]
async fn test_lifetime_value() {
    let ctx = TestContext::with_three_customers();

    let ltv = ctx.engine.customer_lifetime_value(ctx.tenant, VIP).await.unwrap();
    assert_eq!(ltv.total_spent, 1000.0);
    assert_eq!(ltv.order_count, 12);
    assert_eq!(ltv.avg_order_value, 83.33);
    assert_eq!(ltv.lifespan_days, 165);
    assert_eq!(ltv.estimated_ltv, 1000.0);

    let err = ctx
        .engine
        .customer_lifetime_value(ctx.tenant, 999)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("NF_004"));
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let ctx = TestContext::with_three_customers();
    ctx.engine.recompute_all_customers(ctx.tenant).await.unwrap();

    let other = TenantId::random();
    let records = ctx
        .engine
        .get_customer_analytics(other, None)
        .await
        .unwrap()
        .into_many();
    assert!(records.is_empty());

    let err = ctx
        .engine
        .get_customer_analytics(other, Some(VIP))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("NF_004"));
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let ctx = TestContext::with_three_customers();
    ctx.store.set_fail_writes(true);

    let err = ctx
        .engine
        .recompute_all_customers(ctx.tenant)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("DB_002"));
    assert_eq!(ctx.store.customer_record_count(ctx.tenant), 0);
}

#[tokio::test]
async fn test_fact_reader_failure_propagates() {
    let ctx = TestContext::new();
    ctx.facts.set_should_fail(true);

    let err = ctx
        .engine
        .recompute_all_customers(ctx.tenant)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("DB_001"));
}
