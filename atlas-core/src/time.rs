//! Calendar-aware time axes.
//!
//! Climate model output frequently uses calendars other than the proleptic Gregorian one
//! (`noleap`, `360_day`, `julian`, ...). Dates from those calendars are stored as
//! [`CfDatetime`] values, which are plain broken-down timestamps that may describe days
//! that do not exist in the standard calendar (e.g. 30 February). Converting them to
//! [`chrono::NaiveDateTime`] is a *coercion* that yields `None` for such days.
//!
//! Spacing between timestamps is always measured inside the axis' own [`Calendar`].

use crate::errors::{AtlasError, AtlasResult};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

const SECONDS_PER_DAY: i64 = 86_400;

/// CF calendars understood by the harmonisation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    /// Mixed Gregorian/Julian calendar of the CF conventions, treated as proleptic Gregorian
    #[default]
    Standard,
    ProlepticGregorian,
    /// 365 days every year
    NoLeap,
    /// 366 days every year
    AllLeap,
    /// Twelve months of 30 days
    #[serde(rename = "360_day")]
    Day360,
    Julian,
}

impl Calendar {
    /// Parse the value of a CF `calendar` attribute.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "standard" | "gregorian" => Some(Calendar::Standard),
            "proleptic_gregorian" => Some(Calendar::ProlepticGregorian),
            "noleap" | "365_day" => Some(Calendar::NoLeap),
            "all_leap" | "366_day" => Some(Calendar::AllLeap),
            "360_day" => Some(Calendar::Day360),
            "julian" => Some(Calendar::Julian),
            _ => None,
        }
    }

    /// CF name of the calendar
    pub fn name(&self) -> &'static str {
        match self {
            Calendar::Standard => "standard",
            Calendar::ProlepticGregorian => "proleptic_gregorian",
            Calendar::NoLeap => "noleap",
            Calendar::AllLeap => "all_leap",
            Calendar::Day360 => "360_day",
            Calendar::Julian => "julian",
        }
    }

    /// Whether dates in this calendar map one-to-one onto `chrono` dates.
    pub fn is_standard(&self) -> bool {
        matches!(self, Calendar::Standard | Calendar::ProlepticGregorian)
    }

    pub fn is_leap_year(&self, year: i32) -> bool {
        match self {
            Calendar::Standard | Calendar::ProlepticGregorian => {
                (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
            }
            Calendar::Julian => year.rem_euclid(4) == 0,
            Calendar::AllLeap => true,
            Calendar::NoLeap | Calendar::Day360 => false,
        }
    }

    pub fn days_in_month(&self, year: i32, month: u32) -> u32 {
        if let Calendar::Day360 = self {
            return 30;
        }
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            _ if self.is_leap_year(year) => 29,
            _ => 28,
        }
    }

    /// Number of leap years in `[0, year)`.
    fn leap_years_before(&self, year: i32) -> i64 {
        let y = year as i64;
        match self {
            Calendar::Standard | Calendar::ProlepticGregorian => {
                (y + 3).div_euclid(4) - (y + 99).div_euclid(100) + (y + 399).div_euclid(400)
            }
            Calendar::Julian => (y + 3).div_euclid(4),
            Calendar::AllLeap => y,
            Calendar::NoLeap | Calendar::Day360 => 0,
        }
    }

    /// Days elapsed since 0000-01-01 in this calendar.
    pub fn day_ordinal(&self, year: i32, month: u32, day: u32) -> i64 {
        let days_before_year = match self {
            Calendar::Day360 => 360 * year as i64,
            _ => 365 * year as i64 + self.leap_years_before(year),
        };
        let days_before_month: i64 = (1..month)
            .map(|m| self.days_in_month(year, m) as i64)
            .sum();
        days_before_year + days_before_month + day as i64 - 1
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A timestamp in an arbitrary CF calendar.
///
/// Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CfDatetime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CfDatetime {
    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Midnight of the given day
    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        Self::new(year, month, day, 0, 0, 0)
    }

    pub fn from_naive(value: NaiveDateTime) -> Self {
        Self::new(
            value.year(),
            value.month(),
            value.day(),
            value.hour(),
            value.minute(),
            value.second(),
        )
    }

    /// Coerce into a standard-calendar timestamp.
    ///
    /// Returns `None` for days that do not exist in the Gregorian calendar.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?.and_hms_opt(
            self.hour,
            self.minute,
            self.second,
        )
    }

    /// Drop the time of day.
    pub fn truncate_to_day(&self) -> Self {
        Self::ymd(self.year, self.month, self.day)
    }

    pub fn is_midnight(&self) -> bool {
        self.hour == 0 && self.minute == 0 && self.second == 0
    }

    /// Seconds elapsed since 0000-01-01 00:00:00 in `calendar`.
    pub fn seconds_in(&self, calendar: Calendar) -> i64 {
        calendar.day_ordinal(self.year, self.month, self.day) * SECONDS_PER_DAY
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64
    }

    /// Months elapsed since year 0, ignoring the day.
    pub fn month_index(&self) -> i64 {
        self.year as i64 * 12 + self.month as i64 - 1
    }
}

impl fmt::Display for CfDatetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl From<NaiveDateTime> for CfDatetime {
    fn from(value: NaiveDateTime) -> Self {
        Self::from_naive(value)
    }
}

/// An ordered sequence of timestamps in a single calendar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeAxis {
    values: Vec<CfDatetime>,
    calendar: Calendar,
}

impl TimeAxis {
    pub fn new(values: Vec<CfDatetime>, calendar: Calendar) -> Self {
        Self { values, calendar }
    }

    /// Build a standard-calendar axis.
    pub fn from_naive(values: impl IntoIterator<Item = NaiveDateTime>) -> Self {
        Self::new(
            values.into_iter().map(CfDatetime::from_naive).collect(),
            Calendar::Standard,
        )
    }

    /// Contiguous standard-calendar range `[start, end]` with a fixed step.
    pub fn range(start: NaiveDateTime, end: NaiveDateTime, step: Duration) -> AtlasResult<Self> {
        if step <= Duration::zero() {
            return Err(AtlasError::InvalidTime(format!(
                "range step must be positive, got {step}"
            )));
        }
        let mut values = Vec::new();
        let mut current = start;
        while current <= end {
            values.push(current);
            current += step;
        }
        Ok(Self::from_naive(values))
    }

    /// First-of-month midnights from the month of `start` to the month of `end`, inclusive.
    pub fn month_starts(start: CfDatetime, end: CfDatetime, step_months: i64) -> Self {
        let step = step_months.max(1);
        let values = (start.month_index()..=end.month_index())
            .step_by(step as usize)
            .map(|index| {
                CfDatetime::ymd(index.div_euclid(12) as i32, index.rem_euclid(12) as u32 + 1, 1)
            })
            .collect();
        Self::new(values, Calendar::Standard)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[CfDatetime] {
        &self.values
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn first(&self) -> Option<&CfDatetime> {
        self.values.first()
    }

    pub fn last(&self) -> Option<&CfDatetime> {
        self.values.last()
    }

    /// Seconds since the calendar epoch for every timestamp.
    pub fn seconds(&self) -> Vec<i64> {
        self.values
            .iter()
            .map(|v| v.seconds_in(self.calendar))
            .collect()
    }

    /// Coerce every timestamp into the standard calendar.
    pub fn to_naive(&self) -> Vec<Option<NaiveDateTime>> {
        self.values.iter().map(CfDatetime::to_naive).collect()
    }

    /// Move every timestamp by a whole number of hours.
    ///
    /// Only defined for standard calendars.
    pub fn shift_hours(&self, hours: i64) -> AtlasResult<Self> {
        if !self.calendar.is_standard() {
            return Err(AtlasError::InvalidTime(format!(
                "cannot shift timestamps of a {} calendar",
                self.calendar
            )));
        }
        let shifted = self
            .values
            .iter()
            .map(|v| {
                v.to_naive()
                    .map(|n| n + Duration::hours(hours))
                    .ok_or_else(|| AtlasError::InvalidTime(format!("invalid timestamp {v}")))
            })
            .collect::<AtlasResult<Vec<_>>>()?;
        Ok(Self::from_naive(shifted))
    }
}
