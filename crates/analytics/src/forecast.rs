//! Revenue forecasting by least-squares regression over monthly revenue.

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument};
use validator::Validate;

use engine_core::error::InputErrorCode;
use engine_core::limits::{MIN_FORECAST_POINTS, MIN_SEASONAL_HISTORY_MONTHS};
use engine_core::{
    add_months, first_of_month, month_label, DateRange, Error, ForecastOutcome, ForecastPoint,
    ForecastRequest, MonthlyRevenue, Result, RevenueForecast, SeasonalityMode, Trend,
};
use telemetry::metrics;

use crate::context::AnalyticsContext;
use crate::settings::ForecastSettings;

/// Fitted line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

impl Regression {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Slope as a percentage of the intercept, two decimals.
    pub fn growth_rate(&self) -> Option<f64> {
        if self.intercept == 0.0 {
            return None;
        }
        Some(round2(self.slope / self.intercept * 100.0))
    }

    pub fn trend(&self) -> Trend {
        if self.slope > 0.0 {
            Trend::Growth
        } else {
            Trend::Decline
        }
    }
}

/// Ordinary least squares over `x = 0..n`. `None` for fewer than two points.
pub fn linear_regression(values: &[f64]) -> Option<Regression> {
    let n = values.len() as f64;
    if values.len() < 2 {
        return None;
    }
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }
    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    Some(Regression { slope, intercept })
}

/// Per-calendar-month multipliers applied to the regression output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonalIndex {
    factors: [f64; 12],
}

impl SeasonalIndex {
    /// Index from explicit factors, January first. Non-finite or
    /// non-positive factors fall back to 1.0.
    pub fn new(factors: [f64; 12]) -> Self {
        Self {
            factors: factors.map(|f| if f.is_finite() && f > 0.0 { f } else { 1.0 }),
        }
    }

    /// Average revenue of each calendar month relative to the overall
    /// monthly average. Needs at least two years of history.
    pub fn from_history(history: &[MonthlyRevenue]) -> Option<Self> {
        if history.len() < MIN_SEASONAL_HISTORY_MONTHS {
            return None;
        }
        let overall = history.iter().map(|m| m.revenue).sum::<f64>() / history.len() as f64;
        if overall <= 0.0 {
            return None;
        }

        let mut sums = [0.0; 12];
        let mut counts = [0u32; 12];
        for m in history {
            let idx = m.month.month0() as usize;
            sums[idx] += m.revenue;
            counts[idx] += 1;
        }
        let mut factors = [1.0; 12];
        for idx in 0..12 {
            if counts[idx] > 0 {
                factors[idx] = sums[idx] / f64::from(counts[idx]) / overall;
            }
        }
        Some(Self::new(factors))
    }

    pub fn factor(&self, month: NaiveDate) -> f64 {
        self.factors[month.month0() as usize]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Projects `months` points after the last historical month.
///
/// Labels count from the month containing `today`, so the first projected
/// month is the one after today's. The regression x keeps counting from the
/// last historical point and months without revenue are not filled, so when
/// history ends before today's month step `i` is labelled later than the
/// month its x stands for.
pub fn project(
    history: &[MonthlyRevenue],
    months: u32,
    today: NaiveDate,
    seasonal: Option<(&SeasonalIndex, SeasonalityMode)>,
    settings: &ForecastSettings,
) -> ForecastOutcome {
    if history.len() < MIN_FORECAST_POINTS {
        return ForecastOutcome::InsufficientData {
            required: MIN_FORECAST_POINTS,
            available: history.len(),
        };
    }
    let values: Vec<f64> = history.iter().map(|m| m.revenue).collect();
    let Some(regression) = linear_regression(&values) else {
        return ForecastOutcome::InsufficientData {
            required: MIN_FORECAST_POINTS,
            available: history.len(),
        };
    };

    let last_index = (history.len() - 1) as f64;
    let base_month = first_of_month(today);
    let forecast = (1..=months)
        .map(|i| {
            let month = add_months(base_month, i as i32);
            let factor = seasonal.map_or(1.0, |(index, _)| index.factor(month));
            let predicted = regression.predict(last_index + f64::from(i)) * factor;
            ForecastPoint {
                period_label: month_label(month),
                predicted_value: round2(predicted),
                lower_bound: round2(predicted * settings.lower_bound_factor),
                upper_bound: round2(predicted * settings.upper_bound_factor),
                confidence_percent: (settings.base_confidence
                    - settings.confidence_decay * f64::from(i))
                .max(0.0),
            }
        })
        .collect();

    ForecastOutcome::Forecast(RevenueForecast {
        historical: history.to_vec(),
        forecast,
        trend: regression.trend(),
        slope: regression.slope,
        intercept: regression.intercept,
        growth_rate: regression.growth_rate(),
        seasonality: seasonal.map_or(SeasonalityMode::Disabled, |(_, mode)| mode),
    })
}

/// Forecasts the tenant's revenue. A caller-supplied index takes precedence
/// over the configured seasonality mode.
#[instrument(skip(ctx, supplied), fields(tenant_id = %ctx.tenant()))]
pub async fn forecast_revenue(
    ctx: &AnalyticsContext,
    request: ForecastRequest,
    supplied: Option<&SeasonalIndex>,
) -> Result<ForecastOutcome> {
    request.validate().map_err(|e| {
        Error::invalid_input(
            InputErrorCode::InvalidParameter,
            format!("invalid forecast request: {e}"),
        )
    })?;

    let settings = &ctx.settings().forecast;
    let today = ctx.clock().today();
    let history_start = add_months(first_of_month(today), -(settings.history_months as i32 - 1));
    let history = ctx
        .facts()
        .monthly_revenue(ctx.tenant(), DateRange::new(history_start, today)?)
        .await?;

    let derived;
    let seasonal = match (supplied, settings.seasonality) {
        (Some(index), _) => Some((index, SeasonalityMode::Supplied)),
        (None, SeasonalityMode::Historical) => {
            derived = SeasonalIndex::from_history(&history);
            if derived.is_none() {
                debug!(months = history.len(), "Not enough history for seasonal index");
            }
            derived.as_ref().map(|i| (i, SeasonalityMode::Historical))
        }
        (None, _) => None,
    };

    let outcome = project(&history, request.months, today, seasonal, settings);
    match &outcome {
        ForecastOutcome::Forecast(f) => {
            metrics().forecasts_generated.inc();
            info!(
                months = request.months,
                history = f.historical.len(),
                trend = %f.trend,
                seasonality = ?f.seasonality,
                "Revenue forecast generated"
            );
        }
        ForecastOutcome::InsufficientData { available, .. } => {
            metrics().forecasts_insufficient.inc();
            info!(available, "Insufficient history for revenue forecast");
        }
    }
    Ok(outcome)
}
