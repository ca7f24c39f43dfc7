//! Cohort retention and revenue forecast tests against in-memory facts.

use engine_core::{CohortGranularity, ForecastOutcome, SeasonalityMode, Trend};
use analytics::SeasonalIndex;
use integration_tests::fixtures::{self, completed, date};
use integration_tests::setup::TestContext;

fn seed_cohorts(ctx: &TestContext) {
    ctx.facts.add_events(
        ctx.tenant,
        vec![
            // April cohort
            completed(1, 10.0, date(2024, 4, 3)),
            completed(1, 10.0, date(2024, 5, 10)),
            completed(1, 10.0, date(2024, 6, 1)),
            completed(2, 10.0, date(2024, 4, 20)),
            // May cohort
            completed(3, 10.0, date(2024, 5, 2)),
            completed(3, 10.0, date(2024, 6, 10)),
            // First purchase before the requested windows
            completed(4, 10.0, date(2024, 1, 1)),
            completed(4, 10.0, date(2024, 4, 5)),
        ],
    );
}

#[tokio::test]
async fn test_monthly_cohort_retention() {
    let ctx = TestContext::new();
    seed_cohorts(&ctx);

    let cohorts = ctx
        .engine
        .get_cohort_analysis(ctx.tenant, CohortGranularity::Monthly, Some(3))
        .await
        .expect("cohort analysis failed");

    // June has no first purchases and is omitted.
    assert_eq!(cohorts.len(), 2);

    let april = &cohorts[0];
    assert_eq!(april.cohort_period, "2024-04");
    assert_eq!(april.cohort_size, 2);
    let april_pct: Vec<f64> = april.retention.iter().map(|r| r.percentage).collect();
    assert_eq!(april_pct, vec![100.0, 50.0, 50.0]);

    let may = &cohorts[1];
    assert_eq!(may.cohort_period, "2024-05");
    assert_eq!(may.cohort_size, 1);
    assert_eq!(may.retention.len(), 2);
    assert!(may.retention.iter().all(|r| r.percentage == 100.0));

    for cohort in &cohorts {
        assert_eq!(cohort.retention[0].offset, 0);
        assert!(cohort.retention.iter().all(|r| r.percentage <= 100.0));
        assert!(cohort
            .retention
            .iter()
            .all(|r| r.active_count <= cohort.cohort_size));
    }
}

#[tokio::test]
async fn test_quarterly_cohort() {
    let ctx = TestContext::new();
    seed_cohorts(&ctx);

    let cohorts = ctx
        .engine
        .get_cohort_analysis(ctx.tenant, CohortGranularity::Quarterly, Some(2))
        .await
        .unwrap();

    // Q1 holds customer 4, Q2 holds 1, 2 and 3.
    assert_eq!(cohorts.len(), 2);
    assert_eq!(cohorts[0].cohort_period, "2024-Q1");
    assert_eq!(cohorts[0].cohort_size, 1);
    assert_eq!(cohorts[0].retention[1].active_count, 1);
    assert_eq!(cohorts[1].cohort_period, "2024-Q2");
    assert_eq!(cohorts[1].cohort_size, 3);
    assert_eq!(cohorts[1].retention.len(), 1);
}

#[tokio::test]
async fn test_cohort_periods_validated() {
    let ctx = TestContext::new();
    let err = ctx
        .engine
        .get_cohort_analysis(ctx.tenant, CohortGranularity::Monthly, Some(0))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("INPUT_003"));

    let cohorts = ctx
        .engine
        .get_cohort_analysis(ctx.tenant, CohortGranularity::Monthly, Some(500))
        .await
        .unwrap();
    assert!(cohorts.is_empty());
}

#[tokio::test]
async fn test_linear_forecast() {
    let ctx = TestContext::new();
    ctx.facts
        .add_events(ctx.tenant, fixtures::linear_revenue_facts());

    let outcome = ctx
        .engine
        .forecast_revenue(ctx.tenant, Some(3))
        .await
        .expect("forecast failed");
    let forecast = outcome.forecast().expect("expected a forecast");

    assert_eq!(forecast.historical.len(), 4);
    assert_eq!(forecast.trend, Trend::Growth);
    assert_eq!(forecast.growth_rate, Some(100.0));
    assert_eq!(forecast.seasonality, SeasonalityMode::Disabled);
    assert_eq!(forecast.forecast.len(), 3);

    let first = &forecast.forecast[0];
    assert_eq!(first.period_label, "2024-07");
    assert_eq!(first.predicted_value, 500.0);
    assert_eq!(first.lower_bound, 425.0);
    assert_eq!(first.upper_bound, 575.0);
    assert_eq!(first.confidence_percent, 80.0);

    let confidences: Vec<f64> = forecast
        .forecast
        .iter()
        .map(|p| p.confidence_percent)
        .collect();
    assert_eq!(confidences, vec![80.0, 75.0, 70.0]);
}

#[tokio::test]
async fn test_supplied_seasonal_index() {
    let ctx = TestContext::new();
    ctx.facts
        .add_events(ctx.tenant, fixtures::linear_revenue_facts());

    let mut factors = [1.0; 12];
    factors[6] = 1.5; // July
    let outcome = ctx
        .engine
        .forecast_revenue_with_index(ctx.tenant, Some(2), &SeasonalIndex::new(factors))
        .await
        .unwrap();
    let forecast = outcome.forecast().unwrap();

    assert_eq!(forecast.seasonality, SeasonalityMode::Supplied);
    assert_eq!(forecast.forecast[0].predicted_value, 750.0);
    assert_eq!(forecast.forecast[1].predicted_value, 600.0);
}

#[tokio::test]
async fn test_forecast_insufficient_history() {
    let ctx = TestContext::new();
    ctx.facts.add_events(
        ctx.tenant,
        vec![
            completed(1, 100.0, date(2024, 4, 1)),
            completed(1, 200.0, date(2024, 5, 1)),
        ],
    );

    let outcome = ctx.engine.forecast_revenue(ctx.tenant, None).await.unwrap();
    assert_eq!(
        outcome,
        ForecastOutcome::InsufficientData {
            required: 3,
            available: 2
        }
    );
}

#[tokio::test]
async fn test_forecast_months_validated() {
    let ctx = TestContext::new();
    let err = ctx
        .engine
        .forecast_revenue(ctx.tenant, Some(0))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("INPUT_003"));
}
