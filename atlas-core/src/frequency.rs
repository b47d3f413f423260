//! Time frequency inference.
//!
//! Inference happens in two steps. [`infer_raw_frequency`] produces a pandas-style
//! frequency code (`"D"`, `"6H"`, `"MS"`, ...) or `None` when no regular pattern exists.
//! [`Frequency::from_inferred`] then maps that code onto the closed set of cadences the
//! pipeline knows how to process, using an explicit lookup table.

use crate::errors::{AtlasError, AtlasResult};
use crate::time::TimeAxis;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling cadence of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Hourly,
    ThreeHourly,
    SixHourly,
    Daily,
    MonthStart,
    YearStart,
}

/// Raw inferred codes and the cadence each one stands for.
///
/// `30D` is what a monthly series in a 360-day calendar looks like.
const FREQUENCY_CODES: &[(&str, Frequency)] = &[
    ("h", Frequency::Hourly),
    ("H", Frequency::Hourly),
    ("1h", Frequency::Hourly),
    ("1H", Frequency::Hourly),
    ("3h", Frequency::ThreeHourly),
    ("3H", Frequency::ThreeHourly),
    ("6h", Frequency::SixHourly),
    ("6H", Frequency::SixHourly),
    ("D", Frequency::Daily),
    ("1D", Frequency::Daily),
    ("30D", Frequency::MonthStart),
    ("MS", Frequency::MonthStart),
    ("YS", Frequency::YearStart),
    ("YS-JAN", Frequency::YearStart),
    ("AS", Frequency::YearStart),
    ("AS-JAN", Frequency::YearStart),
];

impl Frequency {
    /// Canonical code of the cadence
    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Hourly => "h",
            Frequency::ThreeHourly => "3h",
            Frequency::SixHourly => "6h",
            Frequency::Daily => "D",
            Frequency::MonthStart => "MS",
            Frequency::YearStart => "YS",
        }
    }

    /// Map a raw inferred code onto a cadence.
    ///
    /// A missing code (irregular spacing) is treated as month-start, which is what
    /// irregular monthly means (mid-month timestamps, varying month lengths) look like.
    pub fn from_inferred(raw: Option<&str>) -> AtlasResult<Self> {
        let Some(code) = raw else {
            return Ok(Frequency::MonthStart);
        };
        FREQUENCY_CODES
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, frequency)| *frequency)
            .ok_or_else(|| {
                AtlasError::InferFrequency(format!("unsupported time frequency '{code}'"))
            })
    }

    pub fn is_sub_daily(&self) -> bool {
        matches!(
            self,
            Frequency::Hourly | Frequency::ThreeHourly | Frequency::SixHourly
        )
    }

    /// Spacing between consecutive steps, for cadences with a fixed width.
    pub fn fixed_step(&self) -> Option<Duration> {
        match self {
            Frequency::Hourly => Some(Duration::hours(1)),
            Frequency::ThreeHourly => Some(Duration::hours(3)),
            Frequency::SixHourly => Some(Duration::hours(6)),
            Frequency::Daily => Some(Duration::days(1)),
            Frequency::MonthStart | Frequency::YearStart => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

fn is_consecutive_by(month_indices: &[i64], step: i64) -> bool {
    month_indices.windows(2).all(|w| w[1] - w[0] == step)
}

/// Infer a pandas-style frequency code from the spacing of the axis.
///
/// Requires at least two timestamps. Returns `Ok(None)` when the timestamps are strictly
/// increasing but follow no regular pattern.
pub fn infer_raw_frequency(axis: &TimeAxis) -> AtlasResult<Option<String>> {
    if axis.len() < 2 {
        return Err(AtlasError::InferFrequency(format!(
            "need at least 2 timestamps, got {}",
            axis.len()
        )));
    }
    let seconds = axis.seconds();
    let deltas: Vec<i64> = seconds.windows(2).map(|w| w[1] - w[0]).collect();
    if let Some(position) = deltas.iter().position(|d| *d <= 0) {
        return Err(AtlasError::InferFrequency(format!(
            "time axis is not strictly increasing at {}",
            axis.values()[position + 1]
        )));
    }

    let values = axis.values();
    if values.iter().all(|v| v.day == 1 && v.is_midnight()) {
        let months: Vec<i64> = values.iter().map(|v| v.month_index()).collect();
        if values.iter().all(|v| v.month == 1) && is_consecutive_by(&months, 12) {
            return Ok(Some("YS".to_string()));
        }
        if is_consecutive_by(&months, 1) {
            return Ok(Some("MS".to_string()));
        }
    }

    let first = deltas[0];
    if deltas.iter().any(|d| *d != first) {
        return Ok(None);
    }
    let code = if first % 86_400 == 0 {
        match first / 86_400 {
            1 => "D".to_string(),
            n => format!("{n}D"),
        }
    } else if first % 3600 == 0 {
        match first / 3600 {
            1 => "h".to_string(),
            n => format!("{n}H"),
        }
    } else {
        format!("{first}S")
    };
    Ok(Some(code))
}

/// Infer the cadence of a time axis.
///
/// A single timestamp carries no spacing information and is reported as month-start.
pub fn infer_frequency(axis: &TimeAxis) -> AtlasResult<Frequency> {
    match axis.len() {
        0 => Err(AtlasError::InferFrequency(
            "time axis is empty".to_string(),
        )),
        1 => Ok(Frequency::MonthStart),
        _ => {
            let raw = infer_raw_frequency(axis)?;
            Frequency::from_inferred(raw.as_deref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Calendar, CfDatetime};

    fn daily(n: u32) -> TimeAxis {
        TimeAxis::new(
            (1..=n).map(|d| CfDatetime::ymd(2020, 1, d)).collect(),
            Calendar::Standard,
        )
    }

    #[test]
    fn test_single_sample_is_month_start() {
        assert_eq!(infer_frequency(&daily(1)).unwrap(), Frequency::MonthStart);
    }

    #[test]
    fn test_empty_axis_fails() {
        let err = infer_frequency(&TimeAxis::default()).unwrap_err();
        assert!(matches!(err, AtlasError::InferFrequency(_)));
    }

    #[test]
    fn test_daily_axes() {
        for n in 2..10 {
            assert_eq!(infer_frequency(&daily(n)).unwrap(), Frequency::Daily);
        }
    }

    #[test]
    fn test_hourly_variants() {
        for (step, expected) in [
            (1, Frequency::Hourly),
            (3, Frequency::ThreeHourly),
            (6, Frequency::SixHourly),
        ] {
            let values = (0..8)
                .map(|i| {
                    let hours = i * step;
                    CfDatetime::new(2020, 1, 1 + hours / 24, hours % 24, 0, 0)
                })
                .collect();
            let axis = TimeAxis::new(values, Calendar::Standard);
            assert_eq!(infer_frequency(&axis).unwrap(), expected);
        }
    }

    #[test]
    fn test_month_start_and_year_start() {
        let monthly = TimeAxis::month_starts(
            CfDatetime::ymd(2019, 10, 1),
            CfDatetime::ymd(2020, 3, 1),
            1,
        );
        assert_eq!(infer_raw_frequency(&monthly).unwrap().as_deref(), Some("MS"));

        let yearly = TimeAxis::new(
            (2000..2005).map(|y| CfDatetime::ymd(y, 1, 1)).collect(),
            Calendar::NoLeap,
        );
        assert_eq!(infer_frequency(&yearly).unwrap(), Frequency::YearStart);
    }

    #[test]
    fn test_mid_month_means_are_month_start() {
        let axis = TimeAxis::new(
            vec![
                CfDatetime::new(2000, 1, 16, 12, 0, 0),
                CfDatetime::ymd(2000, 2, 15),
                CfDatetime::new(2000, 3, 16, 12, 0, 0),
                CfDatetime::ymd(2000, 4, 16),
            ],
            Calendar::Standard,
        );
        assert_eq!(infer_raw_frequency(&axis).unwrap(), None);
        assert_eq!(infer_frequency(&axis).unwrap(), Frequency::MonthStart);
    }

    #[test]
    fn test_thirty_day_months() {
        let axis = TimeAxis::new(
            (1..=6).map(|m| CfDatetime::ymd(2000, m, 16)).collect(),
            Calendar::Day360,
        );
        assert_eq!(infer_raw_frequency(&axis).unwrap().as_deref(), Some("30D"));
        assert_eq!(infer_frequency(&axis).unwrap(), Frequency::MonthStart);
    }

    #[test]
    fn test_day360_daily_crosses_day_30() {
        let mut values: Vec<_> = (25..=30).map(|d| CfDatetime::ymd(2000, 2, d)).collect();
        values.push(CfDatetime::ymd(2000, 3, 1));
        let axis = TimeAxis::new(values, Calendar::Day360);
        assert_eq!(infer_frequency(&axis).unwrap(), Frequency::Daily);
    }

    #[test]
    fn test_unsupported_spacing_fails() {
        let axis = TimeAxis::new(
            (0..5).map(|i| CfDatetime::ymd(2020, 1, 1 + 2 * i)).collect(),
            Calendar::Standard,
        );
        assert_eq!(infer_raw_frequency(&axis).unwrap().as_deref(), Some("2D"));
        assert!(infer_frequency(&axis).is_err());
    }

    #[test]
    fn test_duplicates_fail() {
        let axis = TimeAxis::new(
            vec![
                CfDatetime::ymd(2020, 1, 1),
                CfDatetime::ymd(2020, 1, 1),
                CfDatetime::ymd(2020, 1, 2),
            ],
            Calendar::Standard,
        );
        assert!(matches!(
            infer_frequency(&axis),
            Err(AtlasError::InferFrequency(_))
        ));
    }

    #[test]
    fn test_code_table() {
        assert_eq!(Frequency::from_inferred(Some("6H")).unwrap(), Frequency::SixHourly);
        assert_eq!(
            Frequency::from_inferred(Some("AS-JAN")).unwrap(),
            Frequency::YearStart
        );
        assert_eq!(Frequency::from_inferred(None).unwrap(), Frequency::MonthStart);
        assert!(Frequency::from_inferred(Some("W-SUN")).is_err());
    }
}
