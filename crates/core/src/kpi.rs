//! KPI definitions and computed values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::date_range::DateRange;
use crate::error::{Error, InputErrorCode, Result};
use crate::query::QueryTemplate;
use crate::tenant::TenantId;

pub type KpiId = u64;

/// How often a KPI is expected to move. Drives its default period and its
/// cache freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPeriod {
    RealTime,
    Daily,
    Weekly,
    Monthly,
}

impl AggregationPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RealTime => "real_time",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for AggregationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "real_time" | "realtime" => Ok(Self::RealTime),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(Error::invalid_input(
                InputErrorCode::InvalidParameter,
                format!("unknown aggregation period {other:?}"),
            )),
        }
    }
}

/// Lower bounds for the traffic-light status. Any band may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiThresholds {
    pub green: Option<f64>,
    pub yellow: Option<f64>,
    pub red: Option<f64>,
}

/// Static KPI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_kpi_numbers"))]
pub struct KpiDefinition {
    pub id: KpiId,
    pub tenant_id: TenantId,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: Option<String>,
    /// Query returning a single row with a `value` column.
    pub data_source_query: QueryTemplate,
    /// `None` means the KPI has no target and its status is neutral.
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub thresholds: KpiThresholds,
    pub aggregation_period: AggregationPeriod,
    #[validate(length(max = 32))]
    #[serde(default)]
    pub unit: Option<String>,
}

fn validate_kpi_numbers(def: &KpiDefinition) -> std::result::Result<(), ValidationError> {
    let numbers = [
        def.target_value,
        def.thresholds.green,
        def.thresholds.yellow,
        def.thresholds.red,
    ];
    if numbers.iter().flatten().any(|n| !n.is_finite()) {
        return Err(ValidationError::new("non_finite_number"));
    }
    Ok(())
}

/// Sign of the change against the previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Self::Up
        } else if change < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Flat => "flat",
        }
    }
}

/// Traffic-light status derived from thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiStatus {
    Green,
    Yellow,
    Red,
    Neutral,
}

impl KpiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Neutral => "neutral",
        }
    }
}

impl FromStr for KpiStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "red" => Ok(Self::Red),
            "neutral" => Ok(Self::Neutral),
            other => Err(Error::internal(format!("unknown KPI status {other:?}"))),
        }
    }
}

impl FromStr for TrendDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "flat" => Ok(Self::Flat),
            other => Err(Error::internal(format!("unknown trend direction {other:?}"))),
        }
    }
}

/// Lifecycle of a `(kpi_id, period)` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiState {
    Stale,
    Calculating,
    Fresh,
}

impl KpiState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stale => "stale",
            Self::Calculating => "calculating",
            Self::Fresh => "fresh",
        }
    }
}

/// Computed KPI value for one period. Natural key:
/// `(tenant_id, kpi_id, period_start, period_end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiValue {
    pub tenant_id: TenantId,
    pub kpi_id: KpiId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub period_type: AggregationPeriod,
    pub actual_value: f64,
    pub target_value: Option<f64>,
    pub variance: Option<f64>,
    pub variance_percentage: Option<f64>,
    pub previous_period_value: f64,
    pub change_value: f64,
    pub change_percentage: Option<f64>,
    pub trend_direction: TrendDirection,
    pub status: KpiStatus,
    pub calculated_at: DateTime<Utc>,
}

impl KpiValue {
    pub fn period(&self) -> DateRange {
        DateRange {
            start: self.period_start,
            end: self.period_end,
        }
    }
}

/// Where a returned KPI value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Cache,
    Computed,
}

/// Response of a KPI lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReading {
    pub kpi: KpiDefinition,
    pub value: KpiValue,
    pub period: DateRange,
    pub source: ValueSource,
}
