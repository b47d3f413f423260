//! Runtime configuration of the harmonisation pipeline.
//!
//! All sections are optional. Anything left out falls back to the built-in defaults, so a
//! configuration file only needs to name what it changes:
//!
//! ```rust
//! use atlas_core::aggregation::AggregationFunction;
//! use atlas_core::config::AtlasConfig;
//!
//! let config = AtlasConfig::from_toml_str(
//!     r#"
//!     [variables.aggregation]
//!     tas = "mean"
//!     pr = "sum"
//!
//!     [variables.dataset_variable]
//!     tas = "t2m"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.variables.aggregation_for("pr").unwrap(), AggregationFunction::Sum);
//! assert_eq!(config.variables.dataset_variable_for("tas"), Some("t2m"));
//! // Unit tables were not mentioned and keep their defaults
//! assert!(config.units.is_canonical("tas", "Celsius").unwrap());
//! ```

use crate::aggregation::AggregationFunction;
use crate::errors::{AtlasError, AtlasResult};
use crate::units::UnitTables;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-variable settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableMapping {
    /// Name the variable carries inside source files, when it differs from the target name
    pub dataset_variable: BTreeMap<String, String>,
    /// Reduction used when resampling sub-daily data to daily values
    pub aggregation: BTreeMap<String, AggregationFunction>,
}

impl VariableMapping {
    pub fn dataset_variable_for(&self, variable: &str) -> Option<&str> {
        self.dataset_variable.get(variable).map(String::as_str)
    }

    /// Aggregation configured for `variable`.
    pub fn aggregation_for(&self, variable: &str) -> AtlasResult<AggregationFunction> {
        self.aggregation
            .get(variable)
            .copied()
            .ok_or_else(|| AtlasError::UnknownAggregation(variable.to_string()))
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub units: UnitTables,
    pub variables: VariableMapping,
}

impl AtlasConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> AtlasResult<Self> {
        toml::from_str(contents).map_err(|err| AtlasError::Config(err.to_string()))
    }

    pub fn to_toml_string(&self) -> AtlasResult<String> {
        toml::to_string(self).map_err(|err| AtlasError::Config(err.to_string()))
    }
}
