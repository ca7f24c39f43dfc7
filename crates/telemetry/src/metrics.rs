//! In-process metrics.
//!
//! Collected with relaxed atomics and flushed to ClickHouse as snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Last-value gauge.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Millisecond latency histogram.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 5ms, 25ms, 100ms, 250ms, 1s, 5s, 30s, 2m, overflow
    buckets: [AtomicU64; 9],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 8] = [5, 25, 100, 250, 1_000, 5_000, 30_000, 120_000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Records the time elapsed since `start`.
    pub fn observe_since(&self, start: Instant) {
        let ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.observe(ms);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// `(upper bound, count)` pairs; the overflow bucket reports `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Engine metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Customer analytics
    pub customers_recomputed: Counter,
    pub fact_rows_skipped: Counter,

    // KPI engine
    pub kpi_cache_hits: Counter,
    pub kpi_recomputes: Counter,

    // Dashboards and reports
    pub widgets_rendered: Counter,
    pub widget_cache_hits: Counter,
    pub widget_failures: Counter,
    pub reports_generated: Counter,

    // Forecasts and cohorts
    pub forecasts_generated: Counter,
    pub forecasts_insufficient: Counter,
    pub cohort_scans: Counter,

    // Store
    pub queries_executed: Counter,
    pub query_failures: Counter,
    pub store_writes: Counter,
    pub store_write_errors: Counter,

    // Latency histograms
    pub recompute_latency_ms: Histogram,
    pub kpi_latency_ms: Histogram,
    pub dashboard_latency_ms: Histogram,
    pub query_latency_ms: Histogram,

    // Gauges
    pub comparison_population: Gauge,
    pub tenants_processed: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub customers_recomputed: u64,
    pub fact_rows_skipped: u64,
    pub kpi_cache_hits: u64,
    pub kpi_recomputes: u64,
    pub widgets_rendered: u64,
    pub widget_cache_hits: u64,
    pub widget_failures: u64,
    pub reports_generated: u64,
    pub forecasts_generated: u64,
    pub forecasts_insufficient: u64,
    pub cohort_scans: u64,
    pub queries_executed: u64,
    pub query_failures: u64,
    pub store_writes: u64,
    pub store_write_errors: u64,
    pub recompute_latency_mean_ms: f64,
    pub kpi_latency_mean_ms: f64,
    pub dashboard_latency_mean_ms: f64,
    pub query_latency_mean_ms: f64,
    pub comparison_population: u64,
    pub tenants_processed: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            customers_recomputed: self.customers_recomputed.get(),
            fact_rows_skipped: self.fact_rows_skipped.get(),
            kpi_cache_hits: self.kpi_cache_hits.get(),
            kpi_recomputes: self.kpi_recomputes.get(),
            widgets_rendered: self.widgets_rendered.get(),
            widget_cache_hits: self.widget_cache_hits.get(),
            widget_failures: self.widget_failures.get(),
            reports_generated: self.reports_generated.get(),
            forecasts_generated: self.forecasts_generated.get(),
            forecasts_insufficient: self.forecasts_insufficient.get(),
            cohort_scans: self.cohort_scans.get(),
            queries_executed: self.queries_executed.get(),
            query_failures: self.query_failures.get(),
            store_writes: self.store_writes.get(),
            store_write_errors: self.store_write_errors.get(),
            recompute_latency_mean_ms: self.recompute_latency_ms.mean(),
            kpi_latency_mean_ms: self.kpi_latency_ms.mean(),
            dashboard_latency_mean_ms: self.dashboard_latency_ms.mean(),
            query_latency_mean_ms: self.query_latency_ms.mean(),
            comparison_population: self.comparison_population.get(),
            tenants_processed: self.tenants_processed.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
