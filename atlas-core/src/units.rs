//! Unit harmonisation for climate variables.
//!
//! Every configured variable has a set of canonical units (e.g. `tas` → `Celsius`).
//! Variables declared in any other unit are converted with a linear transform
//! `value * scale + offset` looked up by the declared unit string.
//!
//! Monthly accumulations need different factors for a few variables (radiation fluxes
//! stored as monthly-accumulated energy, ERA5 evaporation stored as negative metres), so a
//! second, frequency-specific table takes precedence for those.
//!
//! # Example
//!
//! ```rust
//! use atlas_core::units::UnitTables;
//!
//! let tables = UnitTables::default();
//! let conversion = tables.conversion_for("tas", "K", None, "CMIP6").unwrap();
//! assert_eq!(conversion.apply(300.0), 300.0 - 273.15);
//! assert_eq!(conversion.unit, "Celsius");
//! ```

use crate::dataset::Dataset;
use crate::errors::{AtlasError, AtlasResult};
use crate::frequency::{infer_frequency, Frequency};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A linear unit conversion and the label of the resulting unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub scale: f64,
    pub offset: f64,
    pub unit: String,
}

impl Conversion {
    pub fn new(scale: f64, offset: f64, unit: &str) -> Self {
        Self {
            scale,
            offset,
            unit: unit.to_string(),
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

/// Lookup tables driving unit harmonisation.
///
/// Tables are plain values: build them once (from [`Default`] or a configuration file) and
/// pass them to [`convert_units`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitTables {
    /// Acceptable canonical units per variable name
    pub canonical: BTreeMap<String, BTreeSet<String>>,
    /// Conversions keyed by declared unit
    pub conversions: BTreeMap<String, Conversion>,
    /// Conversions used instead of `conversions` for the monthly special cases
    pub monthly_conversions: BTreeMap<String, Conversion>,
    /// Variables that always use `monthly_conversions` at month-start frequency
    /// default: rlds, rsds
    pub monthly_variables: BTreeSet<String>,
    /// Variables that use `monthly_conversions` at month-start frequency for ERA5 projects
    /// default: evspsbl
    pub era5_monthly_variables: BTreeSet<String>,
}

fn set(units: &[&str]) -> BTreeSet<String> {
    units.iter().map(|u| u.to_string()).collect()
}

impl Default for UnitTables {
    fn default() -> Self {
        let canonical = [
            ("tas", &["Celsius"][..]),
            ("mx2t", &["Celsius"]),
            ("tasmax", &["Celsius"]),
            ("tasmin", &["Celsius"]),
            ("tasrange", &["Celsius"]),
            ("dwp", &["Celsius"]),
            ("src", &["mm"]),
            ("hurs", &["%"]),
            ("clt", &["%"]),
            ("evspsbl", &["mm"]),
            ("pr", &["mm"]),
            ("psl", &["Pa"]),
            ("ps", &["Pa"]),
            ("stl4", &["K"]),
            ("daily_fire_weather_index", &["1"]),
            ("fwi-daily-proj", &["1"]),
            ("fwi30", &["Day"]),
            ("fwi45", &["Day"]),
            ("fwi15", &["Day"]),
            ("bio01", &["Celsius"]),
            ("bio02", &["Celsius"]),
            ("bio03", &["1"]),
            ("bio04", &["Celsius"]),
            ("bio05", &["Celsius"]),
            ("bio06", &["Celsius"]),
            ("bio07", &["Celsius"]),
            ("bio08", &["Celsius"]),
            ("bio09", &["Celsius"]),
            ("bio10", &["Celsius"]),
            ("bio11", &["Celsius"]),
            ("bio12", &["mm"]),
            ("bio13", &["mm"]),
            ("bio14", &["mm"]),
            ("bio15", &["1"]),
            ("bio16", &["mm"]),
            ("bio17", &["mm"]),
            ("bio18", &["mm"]),
            ("bio19", &["mm"]),
            ("dsr", &["Numeric"]),
            ("fwi", &["1", "Numeric"]),
            ("fwi-jjas", &["1"]),
            ("prsn", &["mm"]),
            ("siconc", &["%"]),
            ("spv", &["kW/kW_installed"]),
            ("wof", &["kW/kW_installed"]),
            ("won", &["kW/kW_installed"]),
            ("ws100", &["m s-1"]),
            ("sfcwind", &["m s-1"]),
            ("uwind", &["m s**-1"]),
            ("vwind", &["m s**-1"]),
            ("mrsos", &["kg m-2"]),
            ("mrsos2", &["kg m-2"]),
            ("mrsos3", &["kg m-2"]),
            ("mrsos4", &["kg m-2"]),
            ("mrro", &["kg m-2"]),
            ("huss", &["1"]),
            ("sst", &["Celsius"]),
            ("rlds", &["W m-2"]),
            ("rsds", &["W m-2"]),
            ("mslp", &["Pa"]),
            ("z", &["m**2 s**-2"]),
            ("tci", &["1"]),
            ("hci", &["1"]),
            ("tci-fair", &["1"]),
            ("hci-fair", &["1"]),
            ("tci-good", &["1"]),
            ("hci-good", &["1"]),
            ("tci-unfav", &["1"]),
            ("hci-unfav", &["1"]),
        ]
        .into_iter()
        .map(|(name, units)| (name.to_string(), set(units)))
        .collect();

        let conversions = [
            ("Kelvin", Conversion::new(1.0, -273.15, "Celsius")),
            ("K", Conversion::new(1.0, -273.15, "Celsius")),
            (
                "Fahrenheit",
                Conversion::new(5.0 / 9.0, -32.0 * 5.0 / 9.0, "Celsius"),
            ),
            ("Celsius", Conversion::new(1.0, 0.0, "Celsius")),
            ("degC", Conversion::new(1.0, 0.0, "Celsius")),
            ("C", Conversion::new(1.0, 0.0, "Celsius")),
            ("m hour**-1", Conversion::new(1000.0 * 24.0, 0.0, "mm")),
            ("mm day**-1", Conversion::new(1.0, 0.0, "mm")),
            ("mm", Conversion::new(1.0, 0.0, "mm")),
            ("m", Conversion::new(1000.0, 0.0, "mm")),
            ("mm s**-1", Conversion::new(3600.0 * 24.0, 0.0, "mm")),
            ("m**3 m**-3", Conversion::new(100.0, 0.0, "kg m-2")),
            ("kg m**-2 day**-1", Conversion::new(1.0, 0.0, "mm")),
            ("kg m-2 s-1", Conversion::new(3600.0 * 24.0, 0.0, "mm")),
            ("kg m**-2", Conversion::new(1.0, 0.0, "mm")),
            ("kg m-2", Conversion::new(1.0, 0.0, "mm")),
            ("(0 - 1)", Conversion::new(100.0, 0.0, "%")),
            ("Fraction", Conversion::new(100.0, 0.0, "%")),
            ("m of water equivalent", Conversion::new(1000.0, 0.0, "mm")),
            ("m s**-1", Conversion::new(1.0, 0.0, "m s-1")),
            ("m s-1", Conversion::new(1.0, 0.0, "m s-1")),
            ("m/s", Conversion::new(1.0, 0.0, "m s-1")),
            ("km h**-1", Conversion::new(10.0 / 36.0, 0.0, "m s-1")),
            ("knots", Conversion::new(0.51, 0.0, "m s-1")),
            ("kts", Conversion::new(0.51, 0.0, "m s-1")),
            (
                "mph (nautical miles per hour)",
                Conversion::new(0.51, 0.0, "m s-1"),
            ),
            ("W/m2", Conversion::new(1.0, 0.0, "W m-2")),
            ("W m**-2", Conversion::new(1.0, 0.0, "W m-2")),
            ("J m**-2", Conversion::new(1.0 / 3600.0, 0.0, "W m-2")),
            ("hPa", Conversion::new(100.0, 0.0, "Pa")),
            ("%", Conversion::new(1.0, 0.0, "%")),
            ("dimensionless", Conversion::new(1.0, 0.0, "kW/kW_installed")),
        ]
        .into_iter()
        .map(|(unit, conversion)| (unit.to_string(), conversion))
        .collect();

        let monthly_conversions = [
            ("J m**-2", Conversion::new(1.0 / (3600.0 * 24.0), 0.0, "W m-2")),
            ("m", Conversion::new(-1000.0, 0.0, "mm")),
            ("m of water equivalent", Conversion::new(-1000.0, 0.0, "mm")),
        ]
        .into_iter()
        .map(|(unit, conversion)| (unit.to_string(), conversion))
        .collect();

        Self {
            canonical,
            conversions,
            monthly_conversions,
            monthly_variables: set(&["rlds", "rsds"]),
            era5_monthly_variables: set(&["evspsbl"]),
        }
    }
}

impl UnitTables {
    /// Canonical units of a variable.
    pub fn canonical_units(&self, variable: &str) -> AtlasResult<&BTreeSet<String>> {
        self.canonical
            .get(variable)
            .ok_or_else(|| AtlasError::UnknownVariable(variable.to_string()))
    }

    /// Whether `unit` is already canonical for `variable`.
    pub fn is_canonical(&self, variable: &str, unit: &str) -> AtlasResult<bool> {
        Ok(self.canonical_units(variable)?.contains(unit))
    }

    fn uses_monthly_table(&self, variable: &str, frequency: Option<Frequency>, project: &str) -> bool {
        frequency == Some(Frequency::MonthStart)
            && (self.monthly_variables.contains(variable)
                || (project.to_lowercase().contains("era5")
                    && self.era5_monthly_variables.contains(variable)))
    }

    /// Select the conversion for a declared unit.
    pub fn conversion_for(
        &self,
        variable: &str,
        unit: &str,
        frequency: Option<Frequency>,
        project: &str,
    ) -> AtlasResult<&Conversion> {
        let table = if self.uses_monthly_table(variable, frequency, project) {
            &self.monthly_conversions
        } else {
            &self.conversions
        };
        table.get(unit).ok_or_else(|| AtlasError::UnknownUnit {
            variable: variable.to_string(),
            unit: unit.to_string(),
        })
    }
}

/// Convert every data variable of the dataset into its canonical units.
///
/// Each variable must carry a `units` attribute and be present in the tables.
pub fn convert_units(ds: &Dataset, project: &str, tables: &UnitTables) -> AtlasResult<Dataset> {
    let mut out = ds.clone();
    let mut cached_frequency: Option<Option<Frequency>> = None;
    let names: Vec<String> = ds.data_var_names().iter().map(|n| n.to_string()).collect();
    for name in names {
        let Some(variable) = out.data_var_mut(&name) else {
            continue;
        };
        let unit = variable
            .attr_str("units")
            .ok_or_else(|| AtlasError::MissingUnits(name.clone()))?
            .to_string();
        if tables.is_canonical(&name, &unit)? {
            info!("The dataset {name} units are already in the correct magnitude");
            continue;
        }
        info!(
            "The dataset {name} units are not in the correct magnitude. \
             A conversion from {unit} to {:?} will be performed.",
            tables.canonical_units(&name)?
        );
        let frequency = match cached_frequency {
            Some(known) => known,
            None => {
                let inferred = match ds.time() {
                    Some(time) => Some(infer_frequency(&time.axis)?),
                    None => None,
                };
                cached_frequency = Some(inferred);
                inferred
            }
        };
        let conversion = tables.conversion_for(&name, &unit, frequency, project)?;
        variable.map_inplace(|v| conversion.apply(v));
        variable.set_attr("units", conversion.unit.as_str());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{TimeCoordinate, Variable};
    use crate::time::{Calendar, CfDatetime, TimeAxis};
    use approx::assert_relative_eq;
    use is_close::is_close;
    use ndarray::Array2;

    fn dataset(variable: &str, unit: &str, values: Vec<f64>, monthly: bool) -> Dataset {
        let n = values.len();
        let times = if monthly {
            (1..=n as u32).map(|m| CfDatetime::ymd(2000, m, 1)).collect()
        } else {
            (1..=n as u32).map(|d| CfDatetime::ymd(2000, 1, d)).collect()
        };
        let mut ds = Dataset::new();
        ds.set_time(TimeCoordinate::new(
            "time",
            TimeAxis::new(times, Calendar::Standard),
        ))
        .unwrap();
        let data = Array2::from_shape_vec((n, 1), values).unwrap().into_dyn();
        ds.insert_data_var(
            variable,
            Variable::new(vec!["time", "lon"], data)
                .unwrap()
                .with_attr("units", unit),
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_kelvin_to_celsius() {
        let ds = dataset("tas", "K", vec![300.0, 273.15], false);
        let out = convert_units(&ds, "CMIP6", &UnitTables::default()).unwrap();
        let tas = out.data_var("tas").unwrap();
        assert_relative_eq!(tas.data()[[0, 0]], 26.85, epsilon = 1e-9);
        assert_relative_eq!(tas.data()[[1, 0]], 0.0, epsilon = 1e-9);
        assert_eq!(tas.attr_str("units"), Some("Celsius"));
    }

    #[test]
    fn test_fahrenheit_to_celsius() {
        let ds = dataset("tasmin", "Fahrenheit", vec![212.0, 32.0], false);
        let out = convert_units(&ds, "CMIP6", &UnitTables::default()).unwrap();
        let tasmin = out.data_var("tasmin").unwrap().data();
        assert!(is_close!(tasmin[[0, 0]], 100.0));
        assert!(is_close!(tasmin[[1, 0]], 0.0, abs_tol = 1e-12));
    }

    #[test]
    fn test_canonical_units_are_untouched() {
        let ds = dataset("pr", "mm", vec![1.0, 2.0], false);
        let out = convert_units(&ds, "CMIP6", &UnitTables::default()).unwrap();
        assert_eq!(out, ds);

        let ds = dataset("fwi", "Numeric", vec![1.0], false);
        let out = convert_units(&ds, "CMIP6", &UnitTables::default()).unwrap();
        assert_eq!(out, ds);
    }

    #[test]
    fn test_monthly_radiation_uses_override() {
        let ds = dataset("rsds", "J m**-2", vec![86400.0, 172800.0], true);
        let out = convert_units(&ds, "ERA5", &UnitTables::default()).unwrap();
        let rsds = out.data_var("rsds").unwrap();
        assert_relative_eq!(rsds.data()[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(rsds.data()[[1, 0]], 2.0, epsilon = 1e-12);

        // Daily accumulations use the hourly factor of the general table
        let ds = dataset("rsds", "J m**-2", vec![3600.0, 7200.0], false);
        let out = convert_units(&ds, "ERA5", &UnitTables::default()).unwrap();
        assert_relative_eq!(
            out.data_var("rsds").unwrap().data()[[0, 0]],
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_era5_monthly_evaporation_flips_sign() {
        let tables = UnitTables::default();
        let ds = dataset("evspsbl", "m", vec![-0.001, -0.002], true);

        let era5 = convert_units(&ds, "era5-land", &tables).unwrap();
        assert_relative_eq!(
            era5.data_var("evspsbl").unwrap().data()[[0, 0]],
            1.0,
            epsilon = 1e-12
        );

        let cmip = convert_units(&ds, "CMIP6", &tables).unwrap();
        assert_relative_eq!(
            cmip.data_var("evspsbl").unwrap().data()[[0, 0]],
            -1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_unknown_variable_and_unit() {
        let tables = UnitTables::default();
        let ds = dataset("foo", "K", vec![1.0], false);
        assert_eq!(
            convert_units(&ds, "CMIP6", &tables).unwrap_err(),
            AtlasError::UnknownVariable("foo".to_string())
        );

        let ds = dataset("tas", "Rankine", vec![1.0], false);
        assert!(matches!(
            convert_units(&ds, "CMIP6", &tables),
            Err(AtlasError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn test_missing_units_attribute() {
        let mut ds = dataset("tas", "K", vec![1.0], false);
        ds.data_var_mut("tas").unwrap().attrs.clear();
        assert_eq!(
            convert_units(&ds, "CMIP6", &UnitTables::default()).unwrap_err(),
            AtlasError::MissingUnits("tas".to_string())
        );
    }

    /// Every declared unit that converts into a canonical unit of a variable lands on a
    /// canonical unit, after which converting again is a no-op.
    #[test]
    fn test_conversion_closure() {
        let tables = UnitTables::default();
        let mut checked = 0;
        for (variable, canonical) in &tables.canonical {
            let monthly = tables.monthly_variables.contains(variable)
                || tables.era5_monthly_variables.contains(variable);
            let cases = tables
                .conversions
                .iter()
                .map(|entry| (entry, false))
                .chain(
                    tables
                        .monthly_conversions
                        .iter()
                        .filter(|_| monthly)
                        .map(|entry| (entry, true)),
                );
            for ((unit, conversion), at_month_start) in cases {
                if !canonical.contains(&conversion.unit) {
                    continue;
                }
                let ds = dataset(variable, unit, vec![1.0, 2.0, 3.0], at_month_start);
                let once = convert_units(&ds, "ERA5", &tables).unwrap();
                let converted_unit = once.data_var(variable).unwrap().attr_str("units").unwrap();
                assert!(
                    tables.is_canonical(variable, converted_unit).unwrap(),
                    "{variable} in {unit} converted to {converted_unit}"
                );

                let twice = convert_units(&once, "ERA5", &tables).unwrap();
                assert_eq!(twice, once, "{variable} in {unit} converted twice");
                checked += 1;
            }
        }
        assert!(checked > tables.canonical.len());
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"monthly_variables": ["rsds"]}"#;
        let tables: UnitTables = serde_json::from_str(json).unwrap();
        assert!(!tables.monthly_variables.contains("rlds"));
        assert_eq!(tables.canonical_units("tas").unwrap(), &set(&["Celsius"]));
    }
}
