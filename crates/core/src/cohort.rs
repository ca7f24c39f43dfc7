//! Cohort retention types.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::date_range::{month_label, DateRange};
use crate::error::{Error, InputErrorCode, Result};
use crate::limits::DEFAULT_COHORT_PERIODS;
use crate::tenant::TenantId;

/// Width of a cohort window and of each retention offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CohortGranularity {
    #[default]
    Monthly,
    Quarterly,
}

impl CohortGranularity {
    pub fn months(&self) -> i32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
        }
    }

    /// Window of this granularity that contains `date`.
    pub fn window_of(&self, date: NaiveDate) -> DateRange {
        match self {
            Self::Monthly => DateRange::month_of(date),
            Self::Quarterly => DateRange::quarter_of(date),
        }
    }

    /// Display label of the window starting at `start`.
    pub fn label(&self, start: NaiveDate) -> String {
        match self {
            Self::Monthly => month_label(start),
            Self::Quarterly => format!("{:04}-Q{}", start.year(), start.month0() / 3 + 1),
        }
    }
}

impl fmt::Display for CohortGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => f.write_str("monthly"),
            Self::Quarterly => f.write_str("quarterly"),
        }
    }
}

impl FromStr for CohortGranularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            other => Err(Error::invalid_input(
                InputErrorCode::InvalidParameter,
                format!("unknown cohort granularity {other:?}"),
            )),
        }
    }
}

/// Cohort analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CohortRequest {
    #[serde(default)]
    pub granularity: CohortGranularity,
    /// Trailing periods ending at the current one. Values above the
    /// per-request cap are clamped, zero is rejected.
    #[validate(range(min = 1))]
    #[serde(default = "default_periods")]
    pub periods: u32,
}

fn default_periods() -> u32 {
    DEFAULT_COHORT_PERIODS
}

impl Default for CohortRequest {
    fn default() -> Self {
        Self {
            granularity: CohortGranularity::Monthly,
            periods: DEFAULT_COHORT_PERIODS,
        }
    }
}

/// Retention at one offset from the cohort start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPoint {
    /// Offset in granularity units (0 = the cohort's own window).
    pub offset: u32,
    pub active_count: u64,
    /// `0..=100`, two decimals.
    pub percentage: f64,
}

/// Customers grouped by the period of their first completed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRecord {
    pub tenant_id: TenantId,
    pub cohort_period: String,
    pub granularity: CohortGranularity,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub cohort_size: u64,
    pub retention: Vec<RetentionPoint>,
}
