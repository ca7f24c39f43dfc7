//! Revenue forecast types.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::facts::MonthlyRevenue;
use crate::limits::DEFAULT_FORECAST_MONTHS;

/// One projected month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// `YYYY-MM`.
    pub period_label: String,
    pub predicted_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence_percent: f64,
}

/// Direction of the fitted regression line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Growth,
    Decline,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Growth => f.write_str("growth"),
            Self::Decline => f.write_str("decline"),
        }
    }
}

/// How seasonality was applied to the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    /// Multiplier fixed at 1.0; no seasonal table configured.
    #[default]
    Disabled,
    /// Multipliers derived from at least two years of history.
    Historical,
    /// Multipliers supplied by the caller.
    Supplied,
}

/// Forecast request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ForecastRequest {
    #[validate(range(min = 1, max = 24))]
    pub months: u32,
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self {
            months: DEFAULT_FORECAST_MONTHS,
        }
    }
}

/// Successful forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueForecast {
    pub historical: Vec<MonthlyRevenue>,
    pub forecast: Vec<ForecastPoint>,
    pub trend: Trend,
    pub slope: f64,
    pub intercept: f64,
    /// Slope relative to intercept, percent. `None` when the intercept is 0.
    pub growth_rate: Option<f64>,
    pub seasonality: SeasonalityMode,
}

/// Forecast result. Too little history is an expected state, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Forecast(RevenueForecast),
    InsufficientData { required: usize, available: usize },
}

impl ForecastOutcome {
    pub fn forecast(&self) -> Option<&RevenueForecast> {
        match self {
            Self::Forecast(f) => Some(f),
            Self::InsufficientData { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}
