//! Variable selection and coordinate bookkeeping.

use atlas_core::config::VariableMapping;
use atlas_core::dataset::{Dataset, Variable};
use atlas_core::errors::AtlasResult;
use log::{debug, info};

/// Coordinates kept by [`rename_and_delete_variables`]
pub const MAIN_COORDS: [&str; 6] = ["time", "lon", "lat", "height", "x", "y"];

/// Height above the surface assigned to every harmonised variable
/// unit: m
pub const REFERENCE_HEIGHT: f64 = 2.0;

/// Select the primary variable and drop everything else.
///
/// The primary variable is `variable` if the dataset has it, otherwise the name given for
/// it in `dataset_variable`, otherwise `variable` again. It is renamed to `variable`. A
/// length-one `height` dimension is squeezed out and a scalar `height` coordinate set to
/// [`REFERENCE_HEIGHT`]. Other data variables and coordinates outside [`MAIN_COORDS`] are
/// removed.
pub fn rename_and_delete_variables(
    ds: &Dataset,
    variable: &str,
    mapping: &VariableMapping,
) -> AtlasResult<Dataset> {
    let var_name = if ds.data_var(variable).is_some() {
        variable
    } else {
        mapping.dataset_variable_for(variable).unwrap_or_else(|| {
            info!(
                "There is no variable to rename in the map variables configuration, \
                 assuming the dataset variable name"
            );
            variable
        })
    };

    let mut out = ds.clone();
    out.rename_data_var(var_name, variable)?;
    if out.has_dim("height") {
        out = out.squeeze("height")?;
    }
    out.insert_coord("height", Variable::scalar(REFERENCE_HEIGHT))?;

    let others: Vec<String> = out
        .data_var_names()
        .into_iter()
        .filter(|name| *name != variable)
        .map(str::to_string)
        .collect();
    for name in others {
        debug!("Dropping data variable {name}");
        out.remove_data_var(&name);
    }
    let extra: Vec<String> = out
        .coords()
        .map(|(name, _)| name.clone())
        .filter(|name| !MAIN_COORDS.contains(&name.as_str()))
        .collect();
    for name in extra {
        debug!("Dropping coordinate {name}");
        out.remove_coord(&name);
    }
    Ok(out)
}

/// Put curvilinear variables in `(time, y, x)` order.
pub fn reorder_dimensions(ds: &Dataset) -> AtlasResult<Dataset> {
    let mut out = ds.clone();
    let names: Vec<String> = ds
        .data_vars()
        .filter(|(_, variable)| {
            let mut dims: Vec<&str> = variable.dims().iter().map(String::as_str).collect();
            dims.sort_unstable();
            dims == ["time", "x", "y"]
        })
        .map(|(name, _)| name.clone())
        .collect();
    for name in names {
        out.transpose_data_var(&name, &["time", "y", "x"])?;
    }
    Ok(out)
}

/// Add integer index coordinates for `x`/`y` dimensions that have none.
pub fn adding_coords(ds: &Dataset) -> AtlasResult<Dataset> {
    let mut out = ds.clone();
    if ds.has_dim("x") && !ds.has_coord("x") {
        for dim in ["x", "y"] {
            if let Some(len) = ds.dim_len(dim) {
                if !ds.has_coord(dim) {
                    let index = (0..len).map(|i| i as f64).collect();
                    out.insert_coord(dim, Variable::from_1d(dim, index))?;
                }
            }
        }
    }
    Ok(out)
}

/// Attach CF `standard_name` attributes to the known coordinates.
pub fn standard_names(ds: &Dataset) -> Dataset {
    let mut out = ds.clone();
    for (lat, lon) in [("lat", "lon"), ("latitude", "longitude")] {
        if out.coord(lat).is_some() && out.coord(lon).is_some() {
            for (name, standard_name) in [(lat, "latitude"), (lon, "longitude")] {
                if let Some(coord) = out.coord_mut(name) {
                    coord.set_attr("standard_name", standard_name);
                }
            }
        }
    }
    if let Some(time) = out.time_mut() {
        if time.name == "time" {
            time.attrs
                .insert("standard_name".to_string(), "time".into());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::dataset::TimeCoordinate;
    use atlas_core::errors::AtlasError;
    use atlas_core::time::{Calendar, CfDatetime, TimeAxis};
    use ndarray::{Array3, Array4};
    use std::collections::BTreeMap;

    fn raw() -> Dataset {
        let mut ds = Dataset::new();
        let axis = TimeAxis::new(
            (1..=2).map(|d| CfDatetime::ymd(2000, 1, d)).collect(),
            Calendar::Standard,
        );
        ds.set_time(TimeCoordinate::new("time", axis)).unwrap();
        ds.insert_coord("lon", Variable::from_1d("lon", vec![0.0, 1.0, 2.0]))
            .unwrap();
        ds.insert_coord("lat", Variable::from_1d("lat", vec![0.0, 1.0]))
            .unwrap();
        ds.insert_coord("height", Variable::from_1d("height", vec![10.0]))
            .unwrap();
        ds.insert_coord("realization", Variable::scalar(1.0)).unwrap();
        let data = Array4::from_elem((2, 1, 2, 3), 280.0).into_dyn();
        ds.insert_data_var(
            "t2m",
            Variable::new(vec!["time", "height", "lat", "lon"], data)
                .unwrap()
                .with_attr("units", "K"),
        )
        .unwrap();
        ds.insert_data_var(
            "time_bnds",
            Variable::new(
                vec!["time", "bnds"],
                ndarray::Array2::zeros((2, 2)).into_dyn(),
            )
            .unwrap(),
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_select_through_mapping() {
        let mapping = VariableMapping {
            dataset_variable: BTreeMap::from([("tas".to_string(), "t2m".to_string())]),
            ..Default::default()
        };
        let ds = rename_and_delete_variables(&raw(), "tas", &mapping).unwrap();
        assert_eq!(ds.data_var_names(), vec!["tas"]);
        let tas = ds.data_var("tas").unwrap();
        assert_eq!(tas.dims(), &["time", "lat", "lon"]);
        assert_eq!(tas.attr_str("units"), Some("K"));
        assert_eq!(ds.coord_names(), vec!["height", "lat", "lon", "time"]);
        assert_eq!(ds.coord("height").unwrap().data().sum(), REFERENCE_HEIGHT);
    }

    #[test]
    fn test_missing_variable() {
        let err = rename_and_delete_variables(&raw(), "pr", &VariableMapping::default())
            .unwrap_err();
        assert_eq!(err, AtlasError::MissingVariable("pr".to_string()));
    }

    #[test]
    fn test_reorder_curvilinear() {
        let mut ds = Dataset::new();
        let data = Array3::from_shape_fn((2, 3, 4), |(t, x, y)| (t * 100 + x * 10 + y) as f64);
        ds.insert_data_var(
            "tas",
            Variable::new(vec!["time", "x", "y"], data.into_dyn()).unwrap(),
        )
        .unwrap();
        let reordered = reorder_dimensions(&ds).unwrap();
        let tas = reordered.data_var("tas").unwrap();
        assert_eq!(tas.dims(), &["time", "y", "x"]);
        assert_eq!(tas.data()[[1, 3, 2]], 123.0);

        // Already ordered variables are left alone
        assert_eq!(reorder_dimensions(&reordered).unwrap(), reordered);
    }

    #[test]
    fn test_index_coordinates() {
        let mut ds = Dataset::new();
        let data = Array3::<f64>::zeros((1, 2, 3)).into_dyn();
        ds.insert_data_var("tas", Variable::new(vec!["time", "y", "x"], data).unwrap())
            .unwrap();
        let ds = adding_coords(&ds).unwrap();
        assert_eq!(ds.coord("x").unwrap().values_1d().unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(ds.coord("y").unwrap().values_1d().unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_standard_names() {
        let ds = standard_names(&raw());
        assert_eq!(
            ds.coord("lat").unwrap().attr_str("standard_name"),
            Some("latitude")
        );
        assert_eq!(
            ds.coord("lon").unwrap().attr_str("standard_name"),
            Some("longitude")
        );
        assert_eq!(
            ds.time().unwrap().attrs["standard_name"].as_str(),
            Some("time")
        );
    }
}
