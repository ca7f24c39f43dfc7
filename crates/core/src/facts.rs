//! Read-only transactional facts and the aggregates derived from them.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, InputErrorCode};
use crate::tenant::CustomerId;

/// Lifecycle status of a business event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactStatus {
    Completed,
    Cancelled,
    Pending,
    Refunded,
}

impl FactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Pending => "pending",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for FactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "pending" => Ok(Self::Pending),
            "refunded" => Ok(Self::Refunded),
            other => Err(Error::invalid_input(
                InputErrorCode::InvalidParameter,
                format!("unknown fact status {other:?}"),
            )),
        }
    }
}

/// A single immutable business event (booking, order, payment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub customer_id: CustomerId,
    pub amount: f64,
    pub event_date: NaiveDate,
    pub status: FactStatus,
    pub event_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl FactRow {
    /// Rows with a non-finite or negative amount cannot be aggregated.
    pub fn is_well_formed(&self) -> bool {
        self.amount.is_finite() && self.amount >= 0.0
    }

    pub fn is_completed(&self) -> bool {
        self.status == FactStatus::Completed
    }
}

/// Per-customer totals over completed facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: CustomerId,
    pub first_event_date: Option<NaiveDate>,
    pub last_event_date: Option<NaiveDate>,
    pub total_events: u64,
    pub total_revenue: f64,
    /// Cancelled facts, counted separately from `total_events`.
    #[serde(default)]
    pub cancelled_events: u64,
}

impl CustomerSummary {
    pub fn has_activity(&self) -> bool {
        self.total_events > 0 || self.cancelled_events > 0
    }
}

/// First completed event of a customer (cohort membership).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstEvent {
    pub customer_id: CustomerId,
    pub first_event_date: NaiveDate,
}

/// Completed revenue aggregated for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// First day of the month.
    pub month: NaiveDate,
    pub revenue: f64,
    pub transactions: u64,
}
