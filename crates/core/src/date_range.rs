//! Typed date ranges and the named range keywords used by reports,
//! widgets and KPIs.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, InputErrorCode, Result};

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::invalid_input(
                InputErrorCode::InvalidDateRange,
                format!("range start {start} is after end {end}"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Range covering the `days` days before `end`, plus `end` itself.
    pub fn trailing_days(end: NaiveDate, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    /// Everything up to and including `end`, starting at the Unix epoch.
    pub fn until(end: NaiveDate) -> Self {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
        Self {
            start: epoch.min(end),
            end,
        }
    }

    /// Whole calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        Self {
            start: first_of_month(date),
            end: last_of_month(date),
        }
    }

    /// Whole calendar quarter containing `date`.
    pub fn quarter_of(date: NaiveDate) -> Self {
        let first_month = (date.month0() / 3) * 3 + 1;
        let start = NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date);
        Self {
            start,
            end: last_of_month(add_months(start, 2)),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days between start and end (0 for a single day).
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Equally long window ending the day before this range starts.
    pub fn previous(&self) -> Self {
        let shift = Duration::days(self.span_days() + 1);
        Self {
            start: self.start - shift,
            end: self.end - shift,
        }
    }

    /// Shifts both ends by whole months, clamping to month ends.
    pub fn shift_months(&self, months: i32) -> Self {
        if self.start.day() == 1 && self.end == last_of_month(self.end) {
            // Calendar-aligned windows stay calendar-aligned.
            let start = add_months(self.start, months);
            let end = last_of_month(add_months(first_of_month(self.end), months));
            return Self { start, end };
        }
        Self {
            start: add_months(self.start, months),
            end: add_months(self.end, months),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Named date-range keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateRangeKeyword {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "yesterday")]
    Yesterday,
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "last_month")]
    LastMonth,
    #[serde(rename = "this_month")]
    ThisMonth,
    #[serde(rename = "last_quarter")]
    LastQuarter,
    #[serde(rename = "this_year")]
    ThisYear,
    #[serde(rename = "last_year")]
    LastYear,
}

impl DateRangeKeyword {
    pub const ALL: [DateRangeKeyword; 9] = [
        Self::Today,
        Self::Yesterday,
        Self::Last7Days,
        Self::Last30Days,
        Self::LastMonth,
        Self::ThisMonth,
        Self::LastQuarter,
        Self::ThisYear,
        Self::LastYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last7Days => "last_7_days",
            Self::Last30Days => "last_30_days",
            Self::LastMonth => "last_month",
            Self::ThisMonth => "this_month",
            Self::LastQuarter => "last_quarter",
            Self::ThisYear => "this_year",
            Self::LastYear => "last_year",
        }
    }

    /// Resolves the keyword against `today`.
    pub fn resolve(&self, today: NaiveDate) -> DateRange {
        match self {
            Self::Today => DateRange::day(today),
            Self::Yesterday => DateRange::day(today - Duration::days(1)),
            Self::Last7Days => DateRange::trailing_days(today, 7),
            Self::Last30Days => DateRange::trailing_days(today, 30),
            Self::LastMonth => DateRange::month_of(add_months(first_of_month(today), -1)),
            Self::ThisMonth => DateRange {
                start: first_of_month(today),
                end: today,
            },
            Self::LastQuarter => {
                let current = DateRange::quarter_of(today);
                DateRange::quarter_of(current.start - Duration::days(1))
            }
            Self::ThisYear => DateRange {
                start: first_of_year(today.year()),
                end: today,
            },
            Self::LastYear => DateRange {
                start: first_of_year(today.year() - 1),
                end: first_of_year(today.year()) - Duration::days(1),
            },
        }
    }
}

impl fmt::Display for DateRangeKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRangeKeyword {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| {
                Error::invalid_input(
                    InputErrorCode::InvalidDateRange,
                    format!("unknown date range {s:?}"),
                )
            })
    }
}

/// First day of the month containing `date`.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    add_months(first_of_month(date), 1) - Duration::days(1)
}

/// Adds (or subtracts) whole months, clamping the day to the month's end.
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

fn first_of_year(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default()
}

/// `YYYY-MM` label for the month containing `date`.
pub fn month_label(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}
