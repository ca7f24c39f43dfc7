//! Bounds that keep a single request's latency predictable.
//!
//! These are hard caps. Thresholds that are business rules (churn bands,
//! segment cut-offs, freshness windows) live in the analytics settings and
//! are configurable; only their defaults are declared here.

// === Cohorts ===

/// Default number of trailing cohort periods.
pub const DEFAULT_COHORT_PERIODS: u32 = 12;

/// Maximum number of trailing cohort periods per request.
pub const MAX_COHORT_PERIODS: u32 = 24;

// === Forecasts ===

/// Default forecast horizon in months.
pub const DEFAULT_FORECAST_MONTHS: u32 = 6;

/// Maximum forecast horizon in months.
pub const MAX_FORECAST_MONTHS: u32 = 24;

/// Minimum number of historical monthly points required to forecast.
pub const MIN_FORECAST_POINTS: usize = 3;

/// Months of history fed to the regression.
pub const FORECAST_HISTORY_MONTHS: u32 = 24;

/// Months of history needed to derive a seasonal index table.
pub const MIN_SEASONAL_HISTORY_MONTHS: usize = 24;

// === Customers ===

/// Maximum size of the RFM comparison population per call.
///
/// When exceeded, the most recently active customers are kept.
pub const MAX_COMPARISON_POPULATION: usize = 50_000;

/// Default activity window for the RFM comparison population (5 years).
pub const DEFAULT_HISTORY_WINDOW_DAYS: u32 = 5 * 365;

/// Default churn threshold for the at-risk listing.
pub const DEFAULT_MIN_CHURN_RISK: f64 = 60.0;

/// Default limit for the high-value listing.
pub const DEFAULT_HIGH_VALUE_LIMIT: usize = 50;

/// Number of entries kept in favourite category/provider lists.
pub const MAX_FAVORITES: usize = 5;

// === Definitions cache ===

/// In-process cache TTL for static definitions (seconds).
pub const DEFINITION_CACHE_TTL_SECS: u64 = 30;

/// Maximum in-process cached definitions.
pub const DEFINITION_CACHE_MAX_CAPACITY: u64 = 10_000;
