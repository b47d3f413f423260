//! Sub-daily to daily resampling.

use atlas_core::aggregation::AggregationFunction;
use atlas_core::config::VariableMapping;
use atlas_core::dataset::Dataset;
use atlas_core::errors::{AtlasError, AtlasResult};
use atlas_core::frequency::{infer_frequency, infer_raw_frequency};
use atlas_core::time::TimeAxis;
use chrono::{Duration, NaiveDate, NaiveTime};
use log::info;

/// Group the time steps into calendar days and reduce each day with `function`.
///
/// The result covers every day from the first to the last time step, labelled at
/// midnight. Days without any time step are NaN. Only standard-calendar axes can be
/// grouped.
pub fn aggregate_in_time(ds: &Dataset, function: AggregationFunction) -> AtlasResult<Dataset> {
    let axis = ds.time_axis()?;
    let days = axis
        .values()
        .iter()
        .map(|value| {
            NaiveDate::from_ymd_opt(value.year, value.month, value.day).ok_or_else(|| {
                AtlasError::InvalidTime(format!("{value} is not a standard-calendar date"))
            })
        })
        .collect::<AtlasResult<Vec<_>>>()?;
    let (Some(first), Some(last)) = (days.iter().min(), days.iter().max()) else {
        return Err(AtlasError::InvalidTime("time axis is empty".to_string()));
    };

    let n_days = (*last - *first).num_days() as usize + 1;
    let mut groups = vec![Vec::new(); n_days];
    for (index, day) in days.iter().enumerate() {
        groups[(*day - *first).num_days() as usize].push(index);
    }
    let labels = TimeAxis::range(
        first.and_time(NaiveTime::MIN),
        last.and_time(NaiveTime::MIN),
        Duration::days(1),
    )?;
    ds.reduce_time(&groups, labels, &|values: &[f64]| function.apply(values))
}

/// Resample sub-daily data to daily values.
///
/// The reduction is looked up in the `aggregation` table for the first data variable.
/// Hourly precipitation timestamps mark the end of the accumulation window, so they are
/// moved back by one hour before grouping. Daily and monthly data are returned unchanged.
///
/// The result is checked with [`check_temporal_resolution`].
pub fn resampled_by_temporal_aggregation(
    ds: &Dataset,
    mapping: &VariableMapping,
) -> AtlasResult<Dataset> {
    let frequency = infer_frequency(ds.time_axis()?)?;
    let ds = if frequency.is_sub_daily() {
        info!("The dataset is in {frequency} resolution, resampling it to daily resolution");
        let var_name = ds
            .data_var_names()
            .first()
            .map(|name| name.to_string())
            .ok_or_else(|| AtlasError::MissingVariable("<any data variable>".to_string()))?;
        let function = mapping.aggregation_for(&var_name)?;

        let mut shifted = ds.clone();
        if var_name == "pr" {
            if let Some(time) = shifted.time_mut() {
                time.axis = time.axis.shift_hours(-1)?;
            }
        }
        let resampled = aggregate_in_time(&shifted, function)?;
        info!("Dataset resampled to daily resolution using the {function} of each day");
        resampled
    } else {
        info!("The dataset is in {frequency} resolution, no resampling needed");
        ds.clone()
    };
    check_temporal_resolution(&ds)?;
    Ok(ds)
}

/// Require a daily or month-start time axis.
///
/// A single time step carries no spacing and is accepted.
pub fn check_temporal_resolution(ds: &Dataset) -> AtlasResult<()> {
    let axis = ds.time_axis()?;
    if axis.len() < 2 {
        return Ok(());
    }
    match infer_raw_frequency(axis)?.as_deref() {
        Some("D") | Some("MS") => Ok(()),
        Some(other) => Err(AtlasError::TemporalResolution(other.to_string())),
        None => Err(AtlasError::TemporalResolution("None".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::dataset::{TimeCoordinate, Variable};
    use atlas_core::time::{Calendar, CfDatetime};
    use ndarray::Array2;
    use std::collections::BTreeMap;

    fn hourly(variable: &str, hours: u32, step: u32) -> Dataset {
        let values: Vec<CfDatetime> = (0..hours)
            .step_by(step as usize)
            .map(|h| CfDatetime::new(2020, 1, 1 + h / 24, h % 24, 0, 0))
            .collect();
        let n = values.len();
        let mut ds = Dataset::new();
        ds.set_time(TimeCoordinate::new(
            "time",
            TimeAxis::new(values, Calendar::Standard),
        ))
        .unwrap();
        let data = Array2::from_shape_fn((n, 1), |(t, _)| t as f64).into_dyn();
        ds.insert_data_var(variable, Variable::new(vec!["time", "lon"], data).unwrap())
            .unwrap();
        ds
    }

    fn mapping(variable: &str, function: AggregationFunction) -> VariableMapping {
        VariableMapping {
            aggregation: BTreeMap::from([(variable.to_string(), function)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_hourly_mean_to_daily() {
        let ds = hourly("tas", 48, 1);
        let daily =
            resampled_by_temporal_aggregation(&ds, &mapping("tas", AggregationFunction::Mean))
                .unwrap();
        let axis = daily.time_axis().unwrap();
        assert_eq!(axis.len(), 2);
        assert_eq!(axis.first(), Some(&CfDatetime::ymd(2020, 1, 1)));
        let tas = daily.data_var("tas").unwrap().data();
        assert_eq!(tas[[0, 0]], 11.5);
        assert_eq!(tas[[1, 0]], 35.5);
    }

    #[test]
    fn test_precipitation_is_shifted_back() {
        // 3-hourly accumulations stamped at the end of their window
        let ds = hourly("pr", 48, 3);
        let daily =
            resampled_by_temporal_aggregation(&ds, &mapping("pr", AggregationFunction::Sum))
                .unwrap();
        let axis = daily.time_axis().unwrap();
        // The first step moves into 31 December
        assert_eq!(axis.len(), 3);
        assert_eq!(axis.first(), Some(&CfDatetime::ymd(2019, 12, 31)));
        let pr = daily.data_var("pr").unwrap().data();
        assert_eq!(pr[[0, 0]], 0.0);
        assert_eq!(pr[[1, 0]], (1..=8).sum::<usize>() as f64);
        assert_eq!(pr[[2, 0]], (9..=15).sum::<usize>() as f64);
    }

    #[test]
    fn test_percentile_window() {
        let ds = hourly("tasmax", 24, 6);
        let daily = resampled_by_temporal_aggregation(
            &ds,
            &mapping("tasmax", AggregationFunction::Percentile95),
        )
        .unwrap();
        // numpy.quantile([0, 1, 2, 3], 0.95) == 2.85
        let value = daily.data_var("tasmax").unwrap().data()[[0, 0]];
        assert!((value - 2.85).abs() < 1e-12);
    }

    #[test]
    fn test_missing_aggregation() {
        let ds = hourly("tas", 24, 1);
        assert_eq!(
            resampled_by_temporal_aggregation(&ds, &VariableMapping::default()).unwrap_err(),
            AtlasError::UnknownAggregation("tas".to_string())
        );
    }

    #[test]
    fn test_daily_is_untouched() {
        let ds = hourly("tas", 24 * 5, 24);
        let out = resampled_by_temporal_aggregation(&ds, &VariableMapping::default()).unwrap();
        assert_eq!(out, ds);
    }

    #[test]
    fn test_resolution_check() {
        assert!(check_temporal_resolution(&hourly("tas", 3, 1)).is_err());
        assert!(check_temporal_resolution(&hourly("tas", 1, 1)).is_ok());
        let err = check_temporal_resolution(&hourly("tas", 48, 12)).unwrap_err();
        assert_eq!(err, AtlasError::TemporalResolution("12H".to_string()));
    }
}
