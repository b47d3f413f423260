//! Reductions applied when collapsing a window of samples into one value.

use crate::errors::{AtlasError, AtlasResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Temporal aggregation functions available in the configuration.
///
/// Missing values (NaN) are ignored; a window without any valid sample reduces to NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationFunction {
    #[serde(rename = "minimum")]
    Min,
    #[serde(rename = "maximum")]
    Max,
    #[serde(rename = "mean")]
    Mean,
    #[serde(rename = "sum")]
    Sum,
    #[serde(rename = "per99")]
    Percentile99,
    #[serde(rename = "per95")]
    Percentile95,
}

impl AggregationFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregationFunction::Min => "minimum",
            AggregationFunction::Max => "maximum",
            AggregationFunction::Mean => "mean",
            AggregationFunction::Sum => "sum",
            AggregationFunction::Percentile99 => "per99",
            AggregationFunction::Percentile95 => "per95",
        }
    }

    /// Reduce a window of samples.
    pub fn apply(&self, samples: &[f64]) -> f64 {
        let valid: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.is_empty() {
            return f64::NAN;
        }
        match self {
            AggregationFunction::Min => valid.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationFunction::Max => valid.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationFunction::Mean => valid.iter().sum::<f64>() / valid.len() as f64,
            AggregationFunction::Sum => valid.iter().sum(),
            AggregationFunction::Percentile99 => quantile(valid, 0.99),
            AggregationFunction::Percentile95 => quantile(valid, 0.95),
        }
    }
}

impl FromStr for AggregationFunction {
    type Err = AtlasError;

    fn from_str(s: &str) -> AtlasResult<Self> {
        match s {
            "minimum" => Ok(AggregationFunction::Min),
            "maximum" => Ok(AggregationFunction::Max),
            "mean" => Ok(AggregationFunction::Mean),
            "sum" => Ok(AggregationFunction::Sum),
            "per99" => Ok(AggregationFunction::Percentile99),
            "per95" => Ok(AggregationFunction::Percentile95),
            other => Err(AtlasError::Config(format!(
                "Aggregation function '{other}' not implemented. Use one of: \
                 'maximum', 'minimum', 'mean', 'sum', 'per99', 'per95'"
            ))),
        }
    }
}

impl fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Quantile with linear interpolation between the closest ranks.
///
/// `q` is clamped to `[0, 1]`; `values` must not contain NaN.
pub fn quantile(mut values: Vec<f64>, q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let position = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    values[lower] + (values[upper] - values[lower]) * fraction
}
