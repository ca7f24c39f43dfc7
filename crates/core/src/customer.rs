//! Derived per-customer analytic records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, InputErrorCode, Result};
use crate::tenant::{CustomerId, TenantId};

/// Behavioural customer segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    New,
    Occasional,
    Regular,
    Loyal,
    Vip,
    AtRisk,
    Lost,
}

impl Segment {
    pub const ALL: [Segment; 7] = [
        Self::New,
        Self::Occasional,
        Self::Regular,
        Self::Loyal,
        Self::Vip,
        Self::AtRisk,
        Self::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Occasional => "occasional",
            Self::Regular => "regular",
            Self::Loyal => "loyal",
            Self::Vip => "vip",
            Self::AtRisk => "at_risk",
            Self::Lost => "lost",
        }
    }

    /// Segments that count as churning for the at-risk listing.
    pub fn is_churning(&self) -> bool {
        matches!(self, Self::AtRisk | Self::Lost)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|seg| seg.as_str() == wanted)
            .ok_or_else(|| {
                Error::invalid_input(
                    InputErrorCode::UnknownSegment,
                    format!("unknown customer segment {s:?}"),
                )
            })
    }
}

/// Recency/frequency/monetary quintile scores, each in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RfmScore {
    recency: u8,
    frequency: u8,
    monetary: u8,
}

impl RfmScore {
    /// Neutral score used when there is nothing to compare against.
    pub const NEUTRAL: RfmScore = RfmScore {
        recency: 3,
        frequency: 3,
        monetary: 3,
    };

    /// Builds a score, clamping each digit into `1..=5`.
    pub fn new(recency: u8, frequency: u8, monetary: u8) -> Self {
        Self {
            recency: recency.clamp(1, 5),
            frequency: frequency.clamp(1, 5),
            monetary: monetary.clamp(1, 5),
        }
    }

    pub fn recency(&self) -> u8 {
        self.recency
    }

    pub fn frequency(&self) -> u8 {
        self.frequency
    }

    pub fn monetary(&self) -> u8 {
        self.monetary
    }
}

impl fmt::Display for RfmScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.recency, self.frequency, self.monetary)
    }
}

impl FromStr for RfmScore {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits: Vec<u8> = s
            .chars()
            .filter_map(|c| c.to_digit(10))
            .filter_map(|d| u8::try_from(d).ok())
            .collect();
        match digits.as_slice() {
            [r, f, m] if s.len() == 3 && [*r, *f, *m].iter().all(|d| (1..=5).contains(d)) => {
                Ok(Self {
                    recency: *r,
                    frequency: *f,
                    monetary: *m,
                })
            }
            _ => Err(Error::invalid_input(
                InputErrorCode::InvalidParameter,
                format!("invalid RFM score {s:?}"),
            )),
        }
    }
}

impl TryFrom<String> for RfmScore {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RfmScore> for String {
    fn from(value: RfmScore) -> Self {
        value.to_string()
    }
}

/// One derived record per customer, overwritten on every recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAnalyticsRecord {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub total_events: u64,
    pub total_revenue: f64,
    pub avg_event_value: f64,
    pub lifetime_value: f64,
    pub first_event_date: Option<NaiveDate>,
    pub last_event_date: Option<NaiveDate>,
    pub days_since_last_event: Option<i64>,
    /// Completed events per month.
    pub event_frequency: f64,
    /// Percentage of cancelled events, `0..=100`.
    pub cancellation_rate: f64,
    pub rfm_score: RfmScore,
    pub segment: Segment,
    /// Rule-based churn risk, `0..=100`.
    pub churn_risk_score: f64,
    pub favorite_categories: Vec<String>,
    pub favorite_providers: Vec<String>,
    pub calculated_at: DateTime<Utc>,
}

/// Aggregate row of the segment distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customer_count: u64,
    pub segment_revenue: f64,
    pub avg_ltv: f64,
    pub avg_churn_risk: f64,
}

/// Lifetime value summary for a single customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerLtv {
    pub customer_id: CustomerId,
    pub total_spent: f64,
    pub order_count: u64,
    pub avg_order_value: f64,
    pub lifespan_days: i64,
    pub estimated_ltv: f64,
}

/// Outcome of a tenant-wide recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeSummary {
    pub customers_updated: u64,
    pub records_skipped: u64,
}
