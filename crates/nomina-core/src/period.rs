//! # Pay Periods and Validity Windows
//!
//! Payroll runs on semi-monthly periods ("quincenas"): days 1 to 15 and
//! days 16 to the end of each month, numbered 1..=24 within a calendar year.
//! A period is identified by its number and any date that falls inside it.
//!
//! Adjustments carry a [`ValidityWindow`], a closed date range that may be
//! open-ended, and apply to every period they overlap.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of pay periods in a calendar year.
pub const PERIODS_PER_YEAR: u32 = 24;

/// Last day of the month containing `date`.
fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year().checked_add(1)?, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

/// A semi-monthly pay period.
///
/// Serializes as `{"number", "date", "start", "end"}`; deserialization reads
/// `number` and `date` and re-derives the bounds, rejecting mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PeriodRequest")]
pub struct PayPeriod {
    number: u32,
    date: NaiveDate,
    start: NaiveDate,
    end: NaiveDate,
}

/// Wire form accepted when deserializing a [`PayPeriod`].
#[derive(Deserialize)]
struct PeriodRequest {
    number: u32,
    date: NaiveDate,
}

impl TryFrom<PeriodRequest> for PayPeriod {
    type Error = ValidationError;

    fn try_from(value: PeriodRequest) -> Result<Self, Self::Error> {
        PayPeriod::new(value.number, value.date)
    }
}

impl PayPeriod {
    /// Quincena number of a date: `(month - 1) * 2 + 1` for days 1..=15,
    /// one more for days 16 onwards.
    pub fn quincena_of(date: NaiveDate) -> u32 {
        (date.month0() * 2) + 1 + u32::from(date.day() > 15)
    }

    /// Create a period, checking that `number` is the quincena of `date`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPeriod`] when `number` is outside
    /// 1..=24 or does not match the date.
    pub fn new(number: u32, date: NaiveDate) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidPeriod {
            number,
            date,
            reason,
        };
        if !(1..=PERIODS_PER_YEAR).contains(&number) {
            return Err(invalid(format!(
                "period number must be between 1 and {PERIODS_PER_YEAR}"
            )));
        }
        let expected = Self::quincena_of(date);
        if number != expected {
            return Err(invalid(format!("date falls in period {expected}")));
        }

        let (start, end) = if date.day() <= 15 {
            (date.with_day(1), date.with_day(15))
        } else {
            (date.with_day(16), month_end(date))
        };
        match (start, end) {
            (Some(start), Some(end)) => Ok(Self {
                number,
                date,
                start,
                end,
            }),
            _ => Err(invalid("period bounds out of range".to_string())),
        }
    }

    /// The period that contains `date`.
    pub fn containing(date: NaiveDate) -> Result<Self, ValidationError> {
        Self::new(Self::quincena_of(date), date)
    }

    /// Calendar year of the period.
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Period number within the year (1..=24).
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The reference date the period was created from.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// First day of the period.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the period (inclusive).
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `date` falls within the period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// `(year, number)`, unique per period.
    pub fn key(&self) -> (i32, u32) {
        (self.year(), self.number)
    }
}

impl std::fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{:02} ({} to {})", self.year(), self.number, self.start, self.end)
    }
}

/// An inclusive date range, open-ended when `end` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowRequest")]
pub struct ValidityWindow {
    start: NaiveDate,
    end: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct WindowRequest {
    start: NaiveDate,
    #[serde(default)]
    end: Option<NaiveDate>,
}

impl TryFrom<WindowRequest> for ValidityWindow {
    type Error = ValidationError;

    fn try_from(value: WindowRequest) -> Result<Self, Self::Error> {
        ValidityWindow::new(value.start, value.end)
    }
}

impl ValidityWindow {
    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidWindow`] when `end < start`.
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Result<Self, ValidationError> {
        match end {
            Some(end) if end < start => Err(ValidationError::InvalidWindow { start, end }),
            _ => Ok(Self { start, end }),
        }
    }

    /// First day of the window.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window, if bounded.
    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    /// Whether the window shares at least one day with `period`.
    pub fn overlaps(&self, period: &PayPeriod) -> bool {
        self.start <= period.end() && self.end.map_or(true, |e| e >= period.start())
    }

    /// Whether `date` falls within the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && self.end.map_or(true, |e| date <= e)
    }
}
