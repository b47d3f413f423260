//! Time axis repair.
//!
//! Model output comes in a variety of CF calendars. Everything leaving this module uses the
//! standard calendar:
//!
//! - monthly and yearly data are averaged into period-start bins, which have a
//!   standard-calendar representation in every calendar
//! - daily and sub-daily data in a non-standard calendar are reindexed onto the real
//!   date range. Days the source calendar has but the standard one lacks (30 February, 29
//!   February in non-leap years) are dropped. Days the standard calendar has but the
//!   source lacks (31st of the month in a 360-day calendar, 29 February for `noleap`) are
//!   **forward filled** from the previous valid step.
//!
//! Forward filling is an approximation: the filled days repeat the previous day's values
//! rather than interpolating between neighbours.

use atlas_core::aggregation::AggregationFunction;
use atlas_core::dataset::Dataset;
use atlas_core::errors::{AtlasError, AtlasResult};
use atlas_core::frequency::{infer_frequency, Frequency};
use atlas_core::time::{Calendar, CfDatetime, TimeAxis};
use chrono::{Datelike, Duration, NaiveDateTime};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Coerce every timestamp into the standard calendar.
///
/// Daily and coarser data are truncated to the day. Timestamps that do not exist in the
/// standard calendar become `None`.
pub fn coerce_time(axis: &TimeAxis, frequency: Frequency) -> Vec<Option<NaiveDateTime>> {
    axis.values()
        .iter()
        .map(|value| {
            if frequency.is_sub_daily() {
                value.to_naive()
            } else {
                value.truncate_to_day().to_naive()
            }
        })
        .collect()
}

/// Real dates at `frequency` covering `[start, end]`.
fn date_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
    frequency: Frequency,
) -> AtlasResult<TimeAxis> {
    match frequency.fixed_step() {
        Some(step) => TimeAxis::range(start, end, step),
        None => {
            let first = CfDatetime::from_naive(start);
            let last = CfDatetime::from_naive(end);
            // Period starts strictly before `start` are not part of the range
            let skip_first = !(first.day == 1 && first.is_midnight());
            let step_months = match frequency {
                Frequency::YearStart => 12,
                _ => 1,
            };
            let first_period = match frequency {
                Frequency::YearStart => {
                    let skip = skip_first || first.month != 1;
                    CfDatetime::ymd(first.year + i32::from(skip), 1, 1)
                }
                _ if skip_first => {
                    let next = first.month_index() + 1;
                    CfDatetime::ymd(next.div_euclid(12) as i32, next.rem_euclid(12) as u32 + 1, 1)
                }
                _ => first,
            };
            if first_period > last {
                return Ok(TimeAxis::new(vec![], Calendar::Standard));
            }
            Ok(TimeAxis::month_starts(first_period, last, step_months))
        }
    }
}

/// Reindex a dataset in a non-standard calendar onto the real standard-calendar dates.
///
/// `coerced` holds the standard-calendar equivalent of every time step (see
/// [`coerce_time`]). The target range runs from the first valid date, snapped to the
/// first day of its month, to the last valid date. When the last valid date is 30 December
/// (the end of a 360-day year) the range is extended by one day instead, so the year ends
/// on 31 December.
///
/// Target dates without a matching source step take the values of the last valid step
/// before them (forward fill, an approximation). Target dates before the first valid step
/// are NaN.
pub fn fix_non_standard_calendar(
    ds: &Dataset,
    coerced: &[Option<NaiveDateTime>],
    frequency: Frequency,
) -> AtlasResult<Dataset> {
    info!("Fixing the {} calendar", ds.time_axis()?.calendar());
    if coerced.len() != ds.time_axis()?.len() {
        return Err(AtlasError::Shape(format!(
            "{} coerced timestamps for a time axis of length {}",
            coerced.len(),
            ds.time_axis()?.len()
        )));
    }

    // Calendar artifacts (e.g. 29 and 30 February) are dropped
    let valid: Vec<(usize, NaiveDateTime)> = coerced
        .iter()
        .enumerate()
        .filter_map(|(index, value)| value.map(|v| (index, v)))
        .collect();
    let (Some((_, first)), Some((_, last))) = (valid.first(), valid.last()) else {
        return Err(AtlasError::InvalidTime(
            "no timestamp is a valid standard-calendar date".to_string(),
        ));
    };
    if valid.windows(2).any(|w| w[1].1 <= w[0].1) {
        return Err(AtlasError::InvalidTime(
            "coerced timestamps are not strictly increasing".to_string(),
        ));
    }
    debug!(
        "Dropped {} timestamps without a standard-calendar date",
        coerced.len() - valid.len()
    );

    let (start, end) = if last.month() == 12 && last.day() == 30 {
        (*first, *last + Duration::days(1))
    } else {
        let snapped = first.date().with_day(1).ok_or_else(|| {
            AtlasError::InvalidTime(format!("cannot snap {first} to the start of its month"))
        })?;
        (NaiveDateTime::new(snapped, first.time()), *last)
    };
    let target = date_range(start, end, frequency)?;

    // Forward fill: each target takes the last valid step at or before it
    let mut indices = Vec::with_capacity(target.len());
    let mut filled = 0;
    let mut cursor = 0;
    for value in target.values() {
        let target_time = value.to_naive().ok_or_else(|| {
            AtlasError::InvalidTime(format!("invalid target timestamp {value}"))
        })?;
        while cursor < valid.len() && valid[cursor].1 <= target_time {
            cursor += 1;
        }
        match cursor.checked_sub(1).map(|position| valid[position]) {
            Some((index, time)) => {
                if time != target_time {
                    filled += 1;
                }
                indices.push(Some(index));
            }
            None => indices.push(None),
        }
    }
    if filled > 0 {
        warn!("Forward filled {filled} time steps missing from the source calendar");
    }

    let mut fixed = ds.take_time(&indices, target)?;
    if let Some(time) = fixed.time_mut() {
        time.attrs
            .insert("calendar".to_string(), Calendar::Standard.name().into());
    }
    Ok(fixed)
}

/// Average monthly or yearly data into period-start bins on the standard calendar.
fn resample_to_period_start(ds: &Dataset, frequency: Frequency) -> AtlasResult<Dataset> {
    let axis = ds.time_axis()?;
    let period_of = |value: &CfDatetime| match frequency {
        Frequency::YearStart => value.year as i64,
        _ => value.month_index(),
    };
    let (Some(first), Some(last)) = (axis.first(), axis.last()) else {
        return Err(AtlasError::InvalidTime("time axis is empty".to_string()));
    };
    let (first_period, last_period) = (period_of(first), period_of(last));
    if last_period < first_period {
        return Err(AtlasError::InvalidTime(
            "time axis is not increasing".to_string(),
        ));
    }

    let mut members: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (index, value) in axis.values().iter().enumerate() {
        members.entry(period_of(value)).or_default().push(index);
    }
    let groups: Vec<Vec<usize>> = (first_period..=last_period)
        .map(|period| members.remove(&period).unwrap_or_default())
        .collect();
    let labels: Vec<CfDatetime> = (first_period..=last_period)
        .map(|period| match frequency {
            Frequency::YearStart => CfDatetime::ymd(period as i32, 1, 1),
            _ => CfDatetime::ymd(period.div_euclid(12) as i32, period.rem_euclid(12) as u32 + 1, 1),
        })
        .collect();

    let mean = AggregationFunction::Mean;
    let mut resampled = ds.reduce_time(
        &groups,
        TimeAxis::new(labels, Calendar::Standard),
        &|values: &[f64]| mean.apply(values),
    )?;
    if let Some(time) = resampled.time_mut() {
        time.attrs
            .insert("calendar".to_string(), Calendar::Standard.name().into());
    }
    Ok(resampled)
}

/// Standardise the time coordinate.
///
/// - `time_counter` is renamed to `time`
/// - monthly and yearly data are averaged into period-start bins
/// - daily and sub-daily data in a non-standard calendar go through
///   [`fix_non_standard_calendar`]
/// - standard-calendar daily and sub-daily data keep their values, with timestamps
///   truncated to the day for daily data
pub fn fix_time(ds: &Dataset) -> AtlasResult<Dataset> {
    let ds = if ds.has_dim("time_counter") || ds.has_coord("time_counter") {
        let mapping = BTreeMap::from([("time_counter".to_string(), "time".to_string())]);
        ds.rename(&mapping)?
    } else {
        ds.clone()
    };

    let axis = ds.time_axis()?;
    let frequency = infer_frequency(axis)?;
    info!("Inferred time frequency {frequency}");
    if matches!(frequency, Frequency::MonthStart | Frequency::YearStart) {
        return resample_to_period_start(&ds, frequency);
    }

    let coerced = coerce_time(axis, frequency);
    if !axis.calendar().is_standard() || coerced.iter().any(Option::is_none) {
        return fix_non_standard_calendar(&ds, &coerced, frequency);
    }

    let values = coerced.into_iter().flatten().map(CfDatetime::from_naive).collect();
    let mut fixed = ds.clone();
    if let Some(time) = fixed.time_mut() {
        time.axis = TimeAxis::new(values, axis.calendar());
    }
    Ok(fixed)
}
