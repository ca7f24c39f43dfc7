//! Cohort retention.
//!
//! Customers belong to the cohort of their first completed event and are
//! never reassigned. Retention at each offset counts cohort members with at
//! least one completed event in the shifted window, using one batched
//! lookup per (cohort, offset).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, instrument};
use validator::Validate;

use engine_core::error::InputErrorCode;
use engine_core::{
    CohortGranularity, CohortRecord, CohortRequest, CustomerId, DateRange, Error, FirstEvent,
    Result, RetentionPoint,
};
use telemetry::metrics;

use crate::context::AnalyticsContext;

/// A cohort window and the customers that joined in it.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortWindow {
    /// 0 is the oldest requested period.
    pub index: u32,
    pub window: DateRange,
    pub members: Vec<CustomerId>,
}

/// Windows of the `periods` trailing cohorts ending with the one that
/// contains `today`, oldest first.
pub fn cohort_windows(
    granularity: CohortGranularity,
    periods: u32,
    today: NaiveDate,
) -> Vec<DateRange> {
    let current = granularity.window_of(today);
    (0..periods)
        .map(|i| {
            let back = (periods - 1 - i) as i32 * granularity.months();
            current.shift_months(-back)
        })
        .collect()
}

/// Assigns each first event to the window containing it.
pub fn assign_members(windows: &[DateRange], firsts: &[FirstEvent]) -> Vec<CohortWindow> {
    let mut members: BTreeMap<usize, Vec<CustomerId>> = BTreeMap::new();
    for first in firsts {
        if let Some(idx) = windows.iter().position(|w| w.contains(first.first_event_date)) {
            members.entry(idx).or_default().push(first.customer_id);
        }
    }
    members
        .into_iter()
        .map(|(idx, mut ids)| {
            ids.sort_unstable();
            ids.dedup();
            CohortWindow {
                index: idx as u32,
                window: windows[idx],
                members: ids,
            }
        })
        .collect()
}

/// Retention percentage, two decimals, capped at 100.
pub fn retention_percentage(active: u64, cohort_size: u64) -> f64 {
    if cohort_size == 0 {
        return 0.0;
    }
    let pct = active as f64 / cohort_size as f64 * 100.0;
    ((pct * 100.0).round() / 100.0).min(100.0)
}

/// Requested periods after validation and clamping.
pub fn effective_periods(request: &CohortRequest, max_periods: u32) -> Result<u32> {
    request.validate().map_err(|e| {
        Error::invalid_input(
            InputErrorCode::InvalidParameter,
            format!("invalid cohort request: {e}"),
        )
    })?;
    Ok(request.periods.min(max_periods.max(1)))
}

/// Computes every requested non-empty cohort.
#[instrument(skip(ctx), fields(tenant_id = %ctx.tenant()))]
pub async fn analyze(ctx: &AnalyticsContext, request: CohortRequest) -> Result<Vec<CohortRecord>> {
    let periods = effective_periods(&request, ctx.settings().cohorts.max_periods)?;
    let granularity = request.granularity;
    let today = ctx.clock().today();

    let windows = cohort_windows(granularity, periods, today);
    let firsts = ctx.facts().first_completed_events(ctx.tenant()).await?;
    let cohorts = assign_members(&windows, &firsts);

    let mut records = Vec::with_capacity(cohorts.len());
    for cohort in cohorts {
        let size = cohort.members.len() as u64;
        let max_offset = periods - 1 - cohort.index;

        let mut retention = Vec::with_capacity(max_offset as usize + 1);
        for offset in 0..=max_offset {
            let active_window = cohort
                .window
                .shift_months(offset as i32 * granularity.months());
            let active = ctx
                .facts()
                .count_active_customers(ctx.tenant(), &cohort.members, active_window)
                .await?
                .min(size);
            retention.push(RetentionPoint {
                offset,
                active_count: active,
                percentage: retention_percentage(active, size),
            });
        }

        debug!(
            cohort = %granularity.label(cohort.window.start),
            size,
            offsets = retention.len(),
            "Cohort computed"
        );
        records.push(CohortRecord {
            tenant_id: ctx.tenant(),
            cohort_period: granularity.label(cohort.window.start),
            granularity,
            period_start: cohort.window.start,
            period_end: cohort.window.end,
            cohort_size: size,
            retention,
        });
    }

    metrics().cohort_scans.inc();
    Ok(records)
}
