//! Tunable business rules.
//!
//! Defaults reproduce the established thresholds exactly; every value can be
//! overridden through the `analytics` configuration section.

use serde::{Deserialize, Serialize};

use engine_core::limits::{
    DEFAULT_COHORT_PERIODS, DEFAULT_FORECAST_MONTHS, DEFAULT_HIGH_VALUE_LIMIT,
    DEFAULT_HISTORY_WINDOW_DAYS, DEFAULT_MIN_CHURN_RISK, DEFINITION_CACHE_MAX_CAPACITY,
    DEFINITION_CACHE_TTL_SECS, FORECAST_HISTORY_MONTHS, MAX_COHORT_PERIODS,
    MAX_COMPARISON_POPULATION, MAX_FAVORITES,
};
use engine_core::{AggregationPeriod, DateRangeKeyword, SeasonalityMode};

/// All analytics settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub customers: CustomerSettings,
    pub segments: SegmentRules,
    pub churn: ChurnRules,
    pub cohorts: CohortSettings,
    pub forecast: ForecastSettings,
    pub kpi: KpiSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerSettings {
    /// Customers idle for longer than this stay out of the RFM comparison
    /// population. Their own totals still cover the full history.
    pub history_window_days: u32,
    /// Upper bound of the RFM comparison population.
    pub max_comparison_population: usize,
    pub favorites_limit: usize,
    pub high_value_limit: usize,
    pub min_churn_risk: f64,
}

impl Default for CustomerSettings {
    fn default() -> Self {
        Self {
            history_window_days: DEFAULT_HISTORY_WINDOW_DAYS,
            max_comparison_population: MAX_COMPARISON_POPULATION,
            favorites_limit: MAX_FAVORITES,
            high_value_limit: DEFAULT_HIGH_VALUE_LIMIT,
            min_churn_risk: DEFAULT_MIN_CHURN_RISK,
        }
    }
}

/// Segmentation cut-offs, evaluated in precedence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentRules {
    pub vip_min_events: u64,
    pub loyal_min_events: u64,
    /// Minimum recency score for vip and loyal.
    pub engaged_min_recency_score: u8,
    pub lost_after_days: i64,
    pub lost_max_recency_score: u8,
    pub at_risk_after_days: i64,
    pub at_risk_max_recency_score: u8,
    pub regular_min_events: u64,
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self {
            vip_min_events: 10,
            loyal_min_events: 5,
            engaged_min_recency_score: 4,
            lost_after_days: 180,
            lost_max_recency_score: 2,
            at_risk_after_days: 90,
            at_risk_max_recency_score: 3,
            regular_min_events: 3,
        }
    }
}

/// A threshold and the risk points it contributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub threshold: f64,
    pub points: f64,
}

const fn band(threshold: f64, points: f64) -> Band {
    Band { threshold, points }
}

/// Churn risk bands. Each list is checked in order and the first band
/// that matches contributes its points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnRules {
    /// Matches when days since last event is strictly above the threshold.
    pub recency_bands: Vec<Band>,
    /// Points when there is no completed event at all.
    pub missing_recency_points: f64,
    /// Matches when events per month is strictly below the threshold.
    pub frequency_bands: Vec<Band>,
    /// Matches when the cancellation percentage is strictly above the threshold.
    pub cancellation_bands: Vec<Band>,
    pub max_score: f64,
}

impl Default for ChurnRules {
    fn default() -> Self {
        Self {
            recency_bands: vec![
                band(365.0, 40.0),
                band(180.0, 30.0),
                band(90.0, 20.0),
                band(60.0, 10.0),
            ],
            missing_recency_points: 40.0,
            frequency_bands: vec![band(0.5, 30.0), band(1.0, 20.0), band(2.0, 10.0)],
            cancellation_bands: vec![band(50.0, 30.0), band(30.0, 20.0), band(10.0, 10.0)],
            max_score: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortSettings {
    pub default_periods: u32,
    pub max_periods: u32,
}

impl Default for CohortSettings {
    fn default() -> Self {
        Self {
            default_periods: DEFAULT_COHORT_PERIODS,
            max_periods: MAX_COHORT_PERIODS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub default_months: u32,
    pub history_months: u32,
    pub lower_bound_factor: f64,
    pub upper_bound_factor: f64,
    pub base_confidence: f64,
    pub confidence_decay: f64,
    /// `disabled` or `historical`.
    pub seasonality: SeasonalityMode,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            default_months: DEFAULT_FORECAST_MONTHS,
            history_months: FORECAST_HISTORY_MONTHS,
            lower_bound_factor: 0.85,
            upper_bound_factor: 1.15,
            base_confidence: 85.0,
            confidence_decay: 5.0,
            seasonality: SeasonalityMode::Disabled,
        }
    }
}

/// Default date range per aggregation period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiPeriodRanges {
    pub real_time: DateRangeKeyword,
    pub daily: DateRangeKeyword,
    pub weekly: DateRangeKeyword,
    pub monthly: DateRangeKeyword,
}

impl Default for KpiPeriodRanges {
    fn default() -> Self {
        Self {
            real_time: DateRangeKeyword::Today,
            daily: DateRangeKeyword::Last7Days,
            weekly: DateRangeKeyword::ThisMonth,
            monthly: DateRangeKeyword::ThisYear,
        }
    }
}

impl KpiPeriodRanges {
    pub fn for_period(&self, period: AggregationPeriod) -> DateRangeKeyword {
        match period {
            AggregationPeriod::RealTime => self.real_time,
            AggregationPeriod::Daily => self.daily,
            AggregationPeriod::Weekly => self.weekly,
            AggregationPeriod::Monthly => self.monthly,
        }
    }
}

/// Maximum cache age per aggregation period, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiFreshness {
    pub real_time_secs: u64,
    pub daily_secs: u64,
    pub weekly_secs: u64,
    pub monthly_secs: u64,
}

impl Default for KpiFreshness {
    fn default() -> Self {
        Self {
            real_time_secs: 300,
            daily_secs: 3600,
            weekly_secs: 86_400,
            monthly_secs: 86_400,
        }
    }
}

impl KpiFreshness {
    pub fn window_secs(&self, period: AggregationPeriod) -> u64 {
        match period {
            AggregationPeriod::RealTime => self.real_time_secs,
            AggregationPeriod::Daily => self.daily_secs,
            AggregationPeriod::Weekly => self.weekly_secs,
            AggregationPeriod::Monthly => self.monthly_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiSettings {
    pub period_ranges: KpiPeriodRanges,
    pub freshness: KpiFreshness,
}

/// In-process cache for static definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub definition_ttl_secs: u64,
    pub definition_max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            definition_ttl_secs: DEFINITION_CACHE_TTL_SECS,
            definition_max_capacity: DEFINITION_CACHE_MAX_CAPACITY,
        }
    }
}
