//! Customer analytics: aggregation, RFM scoring, segmentation, churn risk
//! and the listings built on the persisted records.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use engine_core::error::{InputErrorCode, NotFoundCode};
use engine_core::{
    CustomerAnalyticsRecord, CustomerId, CustomerLtv, DateRange, Error, FactRow, FactStatus,
    RecomputeSummary, Result, Segment, SegmentSummary,
};
use telemetry::metrics;

use crate::churn::churn_risk;
use crate::context::AnalyticsContext;
use crate::rfm::{ComparisonPopulation, RfmInputs};
use crate::segment::classify;
use crate::settings::CustomerSettings;

/// Raw per-customer aggregates over the customer's full history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerActivity {
    pub completed: u64,
    pub cancelled: u64,
    pub revenue: f64,
    pub first_completed: Option<NaiveDate>,
    pub last_completed: Option<NaiveDate>,
    categories: HashMap<String, u64>,
    providers: HashMap<String, u64>,
}

impl CustomerActivity {
    fn record(&mut self, row: &FactRow) {
        match row.status {
            FactStatus::Completed => {
                self.completed += 1;
                self.revenue += row.amount;
                self.first_completed = Some(
                    self.first_completed
                        .map_or(row.event_date, |d| d.min(row.event_date)),
                );
                self.last_completed = Some(
                    self.last_completed
                        .map_or(row.event_date, |d| d.max(row.event_date)),
                );
                if let Some(category) = row.category.as_deref().filter(|c| !c.is_empty()) {
                    *self.categories.entry(category.to_string()).or_default() += 1;
                }
                if let Some(provider) = row.provider.as_deref().filter(|p| !p.is_empty()) {
                    *self.providers.entry(provider.to_string()).or_default() += 1;
                }
            }
            FactStatus::Cancelled => self.cancelled += 1,
            FactStatus::Pending | FactStatus::Refunded => {}
        }
    }

    pub fn days_since_last(&self, today: NaiveDate) -> Option<i64> {
        self.last_completed
            .map(|last| (today - last).num_days().max(0))
    }

    /// Completed events per 30-day month since the first completed event,
    /// with at least one month in the denominator.
    pub fn events_per_month(&self, today: NaiveDate) -> f64 {
        let Some(first) = self.first_completed else {
            return 0.0;
        };
        let months = ((today - first).num_days().max(0) as f64 / 30.0).max(1.0);
        self.completed as f64 / months
    }

    /// Cancelled share of completed plus cancelled events, percent.
    pub fn cancellation_rate(&self) -> f64 {
        let decided = self.completed + self.cancelled;
        if decided == 0 {
            0.0
        } else {
            self.cancelled as f64 / decided as f64 * 100.0
        }
    }

    fn rfm_inputs(&self, today: NaiveDate) -> RfmInputs {
        RfmInputs {
            recency_days: self.days_since_last(today),
            frequency: self.completed,
            monetary: self.revenue,
        }
    }
}

/// Facts grouped per customer plus the count of rows that were skipped.
#[derive(Debug, Default)]
pub struct ActivityIndex {
    pub customers: BTreeMap<CustomerId, CustomerActivity>,
    pub skipped: u64,
}

impl ActivityIndex {
    /// Groups rows by customer. Malformed rows are skipped and counted.
    pub fn from_rows(rows: &[FactRow]) -> Self {
        let mut index = Self::default();
        for row in rows {
            if !row.is_well_formed() {
                index.skipped += 1;
                continue;
            }
            index
                .customers
                .entry(row.customer_id)
                .or_default()
                .record(row);
        }
        index
    }

    /// Comparison population of customers with completed activity inside
    /// `window`, capped to the most recently active ones.
    fn population(&self, today: NaiveDate, window: DateRange, cap: usize) -> ComparisonPopulation {
        let mut inputs: Vec<RfmInputs> = self
            .customers
            .values()
            .filter(|a| a.last_completed.is_some_and(|d| window.contains(d)))
            .map(|a| a.rfm_inputs(today))
            .collect();
        if inputs.len() > cap {
            inputs.sort_by_key(|i| i.recency_days.unwrap_or(i64::MAX));
            inputs.truncate(cap);
        }
        ComparisonPopulation::new(&inputs)
    }
}

/// Top entries by count, ties broken by name.
fn favorites(counts: &HashMap<String, u64>, limit: usize) -> Vec<String> {
    let mut entries: Vec<(&String, &u64)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(limit)
        .map(|(name, _)| name.clone())
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds one record from its activity and the shared population.
fn build_record(
    ctx: &AnalyticsContext,
    customer_id: CustomerId,
    activity: &CustomerActivity,
    population: &ComparisonPopulation,
    today: NaiveDate,
) -> CustomerAnalyticsRecord {
    let settings = ctx.settings();
    let days_since_last = activity.days_since_last(today);
    let frequency = activity.events_per_month(today);
    let cancellation_rate = activity.cancellation_rate();

    let rfm_score = population.score(&activity.rfm_inputs(today));
    let segment = classify(
        activity.completed,
        rfm_score.recency(),
        days_since_last,
        &settings.segments,
    );
    let churn_risk_score = churn_risk(days_since_last, frequency, cancellation_rate, &settings.churn);

    let avg_event_value = if activity.completed > 0 {
        activity.revenue / activity.completed as f64
    } else {
        0.0
    };

    CustomerAnalyticsRecord {
        tenant_id: ctx.tenant(),
        customer_id,
        total_events: activity.completed,
        total_revenue: round2(activity.revenue),
        avg_event_value: round2(avg_event_value),
        lifetime_value: round2(activity.revenue),
        first_event_date: activity.first_completed,
        last_event_date: activity.last_completed,
        days_since_last_event: days_since_last,
        event_frequency: round2(frequency),
        cancellation_rate: round2(cancellation_rate),
        rfm_score,
        segment,
        churn_risk_score,
        favorite_categories: favorites(&activity.categories, settings.customers.favorites_limit),
        favorite_providers: favorites(&activity.providers, settings.customers.favorites_limit),
        calculated_at: ctx.clock().now(),
    }
}

fn population_window(settings: &CustomerSettings, today: NaiveDate) -> DateRange {
    DateRange::trailing_days(today, settings.history_window_days)
}

fn comparison_population(
    index: &ActivityIndex,
    settings: &CustomerSettings,
    today: NaiveDate,
) -> ComparisonPopulation {
    index.population(
        today,
        population_window(settings, today),
        settings.max_comparison_population,
    )
}

async fn load_activity(ctx: &AnalyticsContext, today: NaiveDate) -> Result<ActivityIndex> {
    let rows = ctx
        .facts()
        .list_events(ctx.tenant(), DateRange::until(today), None)
        .await?;
    let index = ActivityIndex::from_rows(&rows);
    if index.skipped > 0 {
        metrics().fact_rows_skipped.inc_by(index.skipped);
        warn!(
            tenant_id = %ctx.tenant(),
            skipped = index.skipped,
            "Skipped malformed fact rows"
        );
    }
    Ok(index)
}

async fn persist(ctx: &AnalyticsContext, records: &[CustomerAnalyticsRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    match ctx.store().upsert_customer_analytics(records).await {
        Ok(()) => {
            metrics().store_writes.inc();
            Ok(())
        }
        Err(e) => {
            metrics().store_write_errors.inc();
            Err(e)
        }
    }
}

/// Recomputes and upserts the record of every customer of the tenant.
#[instrument(skip(ctx), fields(tenant_id = %ctx.tenant()))]
pub async fn recompute_all(ctx: &AnalyticsContext) -> Result<RecomputeSummary> {
    let start = Instant::now();
    let today = ctx.clock().today();
    let index = load_activity(ctx, today).await?;

    let mut customer_ids: BTreeSet<CustomerId> =
        ctx.facts().list_customers(ctx.tenant()).await?.into_iter().collect();
    customer_ids.extend(index.customers.keys().copied());

    let population = comparison_population(&index, &ctx.settings().customers, today);
    metrics().comparison_population.set(population.len() as u64);

    let empty = CustomerActivity::default();
    let records: Vec<CustomerAnalyticsRecord> = customer_ids
        .iter()
        .map(|id| {
            let activity = index.customers.get(id).unwrap_or(&empty);
            build_record(ctx, *id, activity, &population, today)
        })
        .collect();

    persist(ctx, &records).await?;

    let summary = RecomputeSummary {
        customers_updated: records.len() as u64,
        records_skipped: index.skipped,
    };
    metrics().customers_recomputed.inc_by(summary.customers_updated);
    metrics().recompute_latency_ms.observe_since(start);
    info!(
        customers_updated = summary.customers_updated,
        records_skipped = summary.records_skipped,
        population = population.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Customer analytics recomputed"
    );
    Ok(summary)
}

/// Recomputes and upserts one customer's record.
#[instrument(skip(ctx), fields(tenant_id = %ctx.tenant()))]
pub async fn recompute_customer(
    ctx: &AnalyticsContext,
    customer_id: CustomerId,
) -> Result<CustomerAnalyticsRecord> {
    let today = ctx.clock().today();
    let index = load_activity(ctx, today).await?;

    let activity = match index.customers.get(&customer_id) {
        Some(activity) => activity.clone(),
        None => {
            let known = ctx.facts().list_customers(ctx.tenant()).await?;
            if !known.contains(&customer_id) {
                return Err(Error::not_found(
                    NotFoundCode::Customer,
                    format!("customer {customer_id} not found"),
                ));
            }
            CustomerActivity::default()
        }
    };

    let population = comparison_population(&index, &ctx.settings().customers, today);
    let record = build_record(ctx, customer_id, &activity, &population, today);
    persist(ctx, std::slice::from_ref(&record)).await?;

    metrics().customers_recomputed.inc();
    debug!(
        customer_id,
        segment = %record.segment,
        rfm = %record.rfm_score,
        churn = record.churn_risk_score,
        "Customer analytics recomputed"
    );
    Ok(record)
}

/// Persisted records of the tenant, ordered by customer id.
pub async fn list_records(ctx: &AnalyticsContext) -> Result<Vec<CustomerAnalyticsRecord>> {
    let mut records: Vec<CustomerAnalyticsRecord> = ctx
        .store()
        .list_customer_analytics(ctx.tenant())
        .await?
        .into_iter()
        .filter(|r| r.tenant_id == ctx.tenant())
        .collect();
    records.sort_by_key(|r| r.customer_id);
    Ok(records)
}

/// Per-segment counts, revenue and averages, by revenue descending.
pub async fn segment_distribution(ctx: &AnalyticsContext) -> Result<Vec<SegmentSummary>> {
    let records = list_records(ctx).await?;
    Ok(summarize_segments(&records))
}

pub fn summarize_segments(records: &[CustomerAnalyticsRecord]) -> Vec<SegmentSummary> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        revenue: f64,
        ltv: f64,
        churn: f64,
    }

    let mut by_segment: BTreeMap<Segment, Acc> = BTreeMap::new();
    for r in records {
        let acc = by_segment.entry(r.segment).or_default();
        acc.count += 1;
        acc.revenue += r.total_revenue;
        acc.ltv += r.lifetime_value;
        acc.churn += r.churn_risk_score;
    }

    let mut summaries: Vec<SegmentSummary> = by_segment
        .into_iter()
        .map(|(segment, acc)| {
            let n = acc.count.max(1) as f64;
            SegmentSummary {
                segment,
                customer_count: acc.count,
                segment_revenue: round2(acc.revenue),
                avg_ltv: round2(acc.ltv / n),
                avg_churn_risk: round2(acc.churn / n),
            }
        })
        .collect();
    summaries.sort_by(|a, b| {
        b.segment_revenue
            .partial_cmp(&a.segment_revenue)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.segment.cmp(&b.segment))
    });
    summaries
}

/// Churning customers at or above `min_churn_risk`, riskiest first.
pub async fn at_risk(
    ctx: &AnalyticsContext,
    min_churn_risk: f64,
) -> Result<Vec<CustomerAnalyticsRecord>> {
    if !(0.0..=100.0).contains(&min_churn_risk) {
        return Err(Error::invalid_input(
            InputErrorCode::InvalidParameter,
            format!("min_churn_risk must be within 0..=100, got {min_churn_risk}"),
        ));
    }
    let mut records: Vec<CustomerAnalyticsRecord> = list_records(ctx)
        .await?
        .into_iter()
        .filter(|r| r.churn_risk_score >= min_churn_risk && r.segment.is_churning())
        .collect();
    records.sort_by(|a, b| {
        b.churn_risk_score
            .total_cmp(&a.churn_risk_score)
            .then_with(|| b.lifetime_value.total_cmp(&a.lifetime_value))
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    Ok(records)
}

/// Records of a single segment, by lifetime value descending.
pub async fn by_segment(
    ctx: &AnalyticsContext,
    segment: Segment,
) -> Result<Vec<CustomerAnalyticsRecord>> {
    let mut records: Vec<CustomerAnalyticsRecord> = list_records(ctx)
        .await?
        .into_iter()
        .filter(|r| r.segment == segment)
        .collect();
    records.sort_by(|a, b| b.lifetime_value.total_cmp(&a.lifetime_value));
    Ok(records)
}

/// Highest lifetime value first.
pub async fn high_value(
    ctx: &AnalyticsContext,
    limit: usize,
) -> Result<Vec<CustomerAnalyticsRecord>> {
    if limit == 0 {
        return Err(Error::invalid_input(
            InputErrorCode::InvalidParameter,
            "limit must be at least 1",
        ));
    }
    let mut records = list_records(ctx).await?;
    records.sort_by(|a, b| {
        b.lifetime_value
            .total_cmp(&a.lifetime_value)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    records.truncate(limit);
    Ok(records)
}

/// Lifetime value summary from the fact reader's customer summary.
pub async fn lifetime_value(ctx: &AnalyticsContext, customer_id: CustomerId) -> Result<CustomerLtv> {
    let summary = ctx
        .facts()
        .customer_summary(ctx.tenant(), customer_id)
        .await?;
    let (Some(first), Some(last)) = (summary.first_event_date, summary.last_event_date) else {
        return Err(Error::not_found(
            NotFoundCode::Customer,
            format!("customer {customer_id} has no completed events"),
        ));
    };

    let lifespan_days = (last - first).num_days().max(1);
    let avg_order_value = summary.total_revenue / summary.total_events.max(1) as f64;

    Ok(CustomerLtv {
        customer_id,
        total_spent: round2(summary.total_revenue),
        order_count: summary.total_events,
        avg_order_value: round2(avg_order_value),
        lifespan_days,
        estimated_ltv: round2(summary.total_revenue),
    })
}
