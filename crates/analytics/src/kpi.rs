//! KPI evaluation with freshness-gated caching.
//!
//! Each `(kpi, period)` value moves stale → calculating → fresh. A stored
//! value younger than the aggregation period's freshness window is served
//! as is; anything else is recomputed from the current and previous period
//! and upserted under its natural key.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use engine_core::{
    AggregationPeriod, DateRange, DateRangeKeyword, KpiDefinition, KpiId, KpiReading, KpiState,
    KpiStatus, KpiThresholds, KpiValue, QueryParams, Result, TrendDirection, ValueSource,
};
use telemetry::metrics;

use crate::context::AnalyticsContext;
use crate::query::{run_template, scalar_value};
use crate::settings::{KpiFreshness, KpiSettings};

/// Period a KPI is evaluated over. An explicit keyword overrides the
/// aggregation period's default range.
pub fn resolve_period(
    definition: &KpiDefinition,
    keyword: Option<DateRangeKeyword>,
    settings: &KpiSettings,
    today: NaiveDate,
) -> DateRange {
    keyword
        .unwrap_or_else(|| settings.period_ranges.for_period(definition.aggregation_period))
        .resolve(today)
}

/// Whether a value calculated at `calculated_at` can still be served.
pub fn is_fresh(
    calculated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    period: AggregationPeriod,
    freshness: &KpiFreshness,
) -> bool {
    let age_ms = now.signed_duration_since(calculated_at).num_milliseconds();
    let window_ms = i64::try_from(freshness.window_secs(period))
        .unwrap_or(i64::MAX / 1000)
        .saturating_mul(1000);
    (0..window_ms).contains(&age_ms)
}

/// Traffic-light status. Neutral without a target; absent bands are skipped.
pub fn compute_status(actual: f64, target: Option<f64>, thresholds: &KpiThresholds) -> KpiStatus {
    if target.is_none() {
        return KpiStatus::Neutral;
    }
    let bands = [
        (thresholds.green, KpiStatus::Green),
        (thresholds.yellow, KpiStatus::Yellow),
        (thresholds.red, KpiStatus::Red),
    ];
    bands
        .into_iter()
        .find_map(|(bound, status)| bound.filter(|b| actual >= *b).map(|_| status))
        .unwrap_or(KpiStatus::Red)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(delta: f64, base: f64) -> Option<f64> {
    (base != 0.0).then(|| round2(delta / base * 100.0))
}

/// Derives a full KPI value from the measured actual and previous values.
pub fn build_value(
    definition: &KpiDefinition,
    period: DateRange,
    actual: f64,
    previous: f64,
    calculated_at: DateTime<Utc>,
) -> KpiValue {
    let target = definition.target_value;
    let variance = target.map(|t| actual - t);
    let change = actual - previous;

    KpiValue {
        tenant_id: definition.tenant_id,
        kpi_id: definition.id,
        period_start: period.start,
        period_end: period.end,
        period_type: definition.aggregation_period,
        actual_value: actual,
        target_value: target,
        variance,
        variance_percentage: variance.zip(target).and_then(|(v, t)| percentage(v, t)),
        previous_period_value: previous,
        change_value: change,
        change_percentage: percentage(change, previous),
        trend_direction: TrendDirection::from_change(change),
        status: compute_status(actual, target, &definition.thresholds),
        calculated_at,
    }
}

async fn measure(ctx: &AnalyticsContext, definition: &KpiDefinition, period: DateRange) -> Result<f64> {
    let rows = run_template(
        ctx,
        &definition.data_source_query,
        QueryParams::for_range(period),
    )
    .await?;
    Ok(scalar_value(&rows))
}

/// Current value of a KPI, served from the store while fresh.
#[instrument(skip(ctx), fields(tenant_id = %ctx.tenant()))]
pub async fn get_value(
    ctx: &AnalyticsContext,
    kpi_id: KpiId,
    keyword: Option<DateRangeKeyword>,
) -> Result<KpiReading> {
    let start = Instant::now();
    let definition = ctx.kpi_definition(kpi_id).await?;
    let settings = &ctx.settings().kpi;
    let now = ctx.clock().now();
    let period = resolve_period(&definition, keyword, settings, now.date_naive());

    let cached = ctx.store().get_kpi_value(ctx.tenant(), kpi_id, period).await?;
    if let Some(value) = cached.filter(|v| {
        v.tenant_id == ctx.tenant()
            && is_fresh(
                v.calculated_at,
                now,
                definition.aggregation_period,
                &settings.freshness,
            )
    }) {
        metrics().kpi_cache_hits.inc();
        debug!(kpi_id, period = %period, state = KpiState::Fresh.as_str(), "KPI cache hit");
        return Ok(KpiReading {
            kpi: (*definition).clone(),
            value,
            period,
            source: ValueSource::Cache,
        });
    }

    debug!(kpi_id, period = %period, state = KpiState::Stale.as_str(), "KPI value stale");
    debug!(kpi_id, period = %period, state = KpiState::Calculating.as_str(), "Computing KPI");

    let actual = measure(ctx, &definition, period).await?;
    let previous = measure(ctx, &definition, period.previous()).await?;
    let value = build_value(&definition, period, actual, previous, now);

    match ctx.store().upsert_kpi_value(&value).await {
        Ok(()) => metrics().store_writes.inc(),
        Err(e) => {
            metrics().store_write_errors.inc();
            return Err(e);
        }
    }

    metrics().kpi_recomputes.inc();
    metrics().kpi_latency_ms.observe_since(start);
    info!(
        kpi_id,
        period = %period,
        actual = value.actual_value,
        status = value.status.as_str(),
        trend = value.trend_direction.as_str(),
        state = KpiState::Fresh.as_str(),
        "KPI computed"
    );

    Ok(KpiReading {
        kpi: (*definition).clone(),
        value,
        period,
        source: ValueSource::Computed,
    })
}

/// Outcome of refreshing every KPI of a tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiRefreshSummary {
    pub computed: u64,
    pub cached: u64,
    pub failed: u64,
}

/// Brings every KPI of the tenant up to date. One failing KPI does not
/// stop the others.
#[instrument(skip(ctx), fields(tenant_id = %ctx.tenant()))]
pub async fn refresh_all(ctx: &AnalyticsContext) -> Result<KpiRefreshSummary> {
    let definitions = ctx.store().list_kpi_definitions(ctx.tenant()).await?;
    let mut summary = KpiRefreshSummary::default();

    for definition in definitions.iter().filter(|d| d.tenant_id == ctx.tenant()) {
        match get_value(ctx, definition.id, None).await {
            Ok(reading) if reading.source == ValueSource::Cache => summary.cached += 1,
            Ok(_) => summary.computed += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(kpi_id = definition.id, error = %e, "KPI refresh failed");
            }
        }
    }

    info!(
        computed = summary.computed,
        cached = summary.cached,
        failed = summary.failed,
        "KPI refresh complete"
    );
    Ok(summary)
}
