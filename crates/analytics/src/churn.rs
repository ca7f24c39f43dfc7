//! Rule-based churn risk.
//!
//! A deterministic weighted score, not a learned model. Recency, frequency
//! and cancellation components are evaluated independently, summed, then
//! clamped to `0..=max_score`.

use crate::settings::{Band, ChurnRules};

/// Churn risk for the given behaviour, `0..=100` with default rules.
pub fn churn_risk(
    days_since_last: Option<i64>,
    events_per_month: f64,
    cancellation_rate: f64,
    rules: &ChurnRules,
) -> f64 {
    let recency = match days_since_last {
        None => rules.missing_recency_points,
        Some(days) => first_above(&rules.recency_bands, days as f64),
    };
    let frequency = first_below(&rules.frequency_bands, events_per_month);
    let cancellation = first_above(&rules.cancellation_bands, cancellation_rate);

    (recency + frequency + cancellation).clamp(0.0, rules.max_score.max(0.0))
}

fn first_above(bands: &[Band], value: f64) -> f64 {
    bands
        .iter()
        .find(|b| value > b.threshold)
        .map_or(0.0, |b| b.points)
}

fn first_below(bands: &[Band], value: f64) -> f64 {
    bands
        .iter()
        .find(|b| value < b.threshold)
        .map_or(0.0, |b| b.points)
}
