//! Re-wrapping of regridded fields as CF-compliant datasets.

use crate::regrid::grid::GridDescriptor;
use atlas_core::dataset::{Dataset, Variable};
use atlas_core::errors::{AtlasError, AtlasResult};
use ndarray::Array2;

/// Name of the scalar grid-mapping variable
pub const CRS_NAME: &str = "crs";

/// Variables copied unchanged from the source dataset when present.
const CARRIED_VARIABLES: [&str; 3] = ["plev", "ensemble", "height"];

/// WGS84 ellipsoid
const SEMI_MAJOR_AXIS: f64 = 6378137.0;
const INVERSE_FLATTENING: f64 = 298.257223563;

fn axis_coordinate(
    name: &str,
    values: Vec<f64>,
    units: &str,
    standard_name: &str,
    axis: &str,
) -> Variable {
    Variable::from_1d(name, values)
        .with_attr("units", units)
        .with_attr("standard_name", standard_name)
        .with_attr("long_name", standard_name)
        .with_attr("axis", axis)
        .with_attr("bounds", format!("{name}_bnds"))
}

fn bounds_variable(dim: &str, edges: &[f64]) -> AtlasResult<Variable> {
    let n = edges.len().saturating_sub(1);
    let data = Array2::from_shape_fn((n, 2), |(k, side)| edges[k + side]);
    Variable::new(vec![dim, "bnds"], data.into_dyn())
}

/// The scalar `crs` variable describing a plain latitude/longitude grid.
pub fn crs_variable() -> Variable {
    Variable::scalar(0.0)
        .with_attr("grid_mapping_name", "latitude_longitude")
        .with_attr("longitude_of_prime_meridian", 0.0)
        .with_attr("semi_major_axis", SEMI_MAJOR_AXIS)
        .with_attr("inverse_flattening", INVERSE_FLATTENING)
}

/// Build the output dataset of a regridding.
///
/// `regridded` holds the remapped values of `var_name` with its spatial dimensions already
/// named `lat` and `lon`. The result carries 1-D `lon`/`lat` coordinates with
/// `lon_bnds`/`lat_bnds`, a `crs` grid mapping, the source variable's attributes and
/// encoding, the time axis with `time_bnds`, any `plev`/`ensemble`/`height` variables and
/// the global attributes of `source`.
pub fn make_cf_compliant(
    source: &Dataset,
    destination: &GridDescriptor,
    var_name: &str,
    regridded: Variable,
) -> AtlasResult<Dataset> {
    let original = source
        .data_var(var_name)
        .ok_or_else(|| AtlasError::MissingVariable(var_name.to_string()))?;

    let lon_edges = destination.lon_b.row(0).to_vec();
    let lat_edges = destination.lat_b.column(0).to_vec();

    let mut out = Dataset::new();
    let mut lon = axis_coordinate("lon", destination.lon_1d(), "degrees_east", "longitude", "X");
    let mut lat = axis_coordinate("lat", destination.lat_1d(), "degrees_north", "latitude", "Y");
    if let Some(previous) = source.coord("lon") {
        lon.encoding = previous.encoding.clone();
    }
    if let Some(previous) = source.coord("lat") {
        lat.encoding = previous.encoding.clone();
    }
    out.insert_coord("lon", lon)?;
    out.insert_coord("lat", lat)?;
    out.insert_data_var("lon_bnds", bounds_variable("lon", &lon_edges)?)?;
    out.insert_data_var("lat_bnds", bounds_variable("lat", &lat_edges)?)?;
    out.insert_data_var(CRS_NAME, crs_variable())?;

    if let Some(time) = source.time() {
        out.set_time(time.clone())?;
    }
    if let Some(time_bnds) = source
        .data_var("time_bnds")
        .or_else(|| source.coord("time_bnds"))
    {
        out.insert_data_var("time_bnds", time_bnds.clone())?;
    }

    let mut variable = regridded;
    variable.attrs = original.attrs.clone();
    variable.set_attr("grid_mapping", CRS_NAME);
    variable.encoding = original.encoding.clone();
    out.insert_data_var(var_name, variable)?;

    for name in CARRIED_VARIABLES {
        if let Some(coord) = source.coord(name) {
            out.insert_coord(name, coord.clone())?;
        } else if let Some(data_var) = source.data_var(name) {
            out.insert_data_var(name, data_var.clone())?;
        }
    }

    out.attrs = source.attrs.clone();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::dataset::{AttrValue, Encoding, TimeCoordinate};
    use atlas_core::time::{Calendar, CfDatetime, TimeAxis};
    use ndarray::{ArrayD, IxDyn};

    fn source() -> Dataset {
        let mut ds = Dataset::new();
        let axis = TimeAxis::new(vec![CfDatetime::ymd(2000, 1, 1)], Calendar::Standard);
        ds.set_time(TimeCoordinate::new("time", axis)).unwrap();
        ds.insert_data_var(
            "time_bnds",
            Variable::new(vec!["time", "bnds"], ArrayD::zeros(IxDyn(&[1, 2]))).unwrap(),
        )
        .unwrap();
        ds.insert_coord("height", Variable::scalar(2.0)).unwrap();
        let mut tas = Variable::new(vec!["time", "lat", "lon"], ArrayD::zeros(IxDyn(&[1, 3, 3])))
            .unwrap()
            .with_attr("units", "Celsius");
        tas.encoding = Encoding {
            fill_value: Some(1e20),
            missing_value: None,
        };
        ds.insert_data_var("tas", tas).unwrap();
        ds.attrs.insert("project".to_string(), "CMIP6".into());
        ds
    }

    #[test]
    fn test_cf_layout() {
        let ds = source();
        let grid = GridDescriptor::global(60.0).unwrap();
        let regridded =
            Variable::new(vec!["time", "lat", "lon"], ArrayD::zeros(IxDyn(&[1, 3, 6]))).unwrap();
        let out = make_cf_compliant(&ds, &grid, "tas", regridded).unwrap();

        let lon = out.coord("lon").unwrap();
        assert_eq!(lon.values_1d().unwrap(), vec![-150.0, -90.0, -30.0, 30.0, 90.0, 150.0]);
        assert_eq!(lon.attr_str("axis"), Some("X"));
        assert_eq!(lon.attr_str("bounds"), Some("lon_bnds"));
        assert_eq!(out.coord("lat").unwrap().attr_str("units"), Some("degrees_north"));

        let lat_bnds = out.data_var("lat_bnds").unwrap();
        assert_eq!(lat_bnds.dims(), &["lat", "bnds"]);
        assert_eq!(lat_bnds.data()[[0, 0]], -90.0);
        assert_eq!(lat_bnds.data()[[2, 1]], 90.0);
        assert_eq!(out.data_var("lon_bnds").unwrap().data()[[5, 1]], 180.0);

        let crs = out.data_var("crs").unwrap();
        assert_eq!(crs.ndim(), 0);
        assert_eq!(
            crs.attrs.get("inverse_flattening"),
            Some(&AttrValue::Number(298.257223563))
        );

        let tas = out.data_var("tas").unwrap();
        assert_eq!(tas.attr_str("grid_mapping"), Some("crs"));
        assert_eq!(tas.attr_str("units"), Some("Celsius"));
        assert_eq!(tas.encoding.fill_value, Some(1e20));

        assert!(out.time().is_some());
        assert!(out.data_var("time_bnds").is_some());
        assert!(out.coord("height").is_some());
        assert_eq!(out.attrs.get("project").and_then(AttrValue::as_str), Some("CMIP6"));
    }

    #[test]
    fn test_missing_variable() {
        let grid = GridDescriptor::global(60.0).unwrap();
        let regridded = Variable::new(vec!["lat", "lon"], ArrayD::zeros(IxDyn(&[3, 6]))).unwrap();
        assert!(matches!(
            make_cf_compliant(&source(), &grid, "pr", regridded),
            Err(AtlasError::MissingVariable(_))
        ));
    }
}
