//! Conservative regridding onto regular latitude/longitude grids.
//!
//! A [`ConservativeRegridder`] takes a harmonised dataset, describes its grid (estimating
//! cell corners from the centres), builds overlap weights to the destination grid and
//! returns a CF-compliant dataset holding the remapped variable.
//!
//! ```rust
//! use atlas_components::regrid::InterpolationParameters;
//!
//! let parameters: InterpolationParameters = serde_json::from_str(
//!     r#"{"var_name": "tas", "interpolation_method": "conservative_normed", "resolution": 1.0}"#,
//! )
//! .unwrap();
//! assert_eq!(parameters.resolution, Some(1.0));
//! ```

pub mod boundaries;
pub mod cf;
pub mod grid;
pub mod weights;

use crate::regrid::cf::make_cf_compliant;
use crate::regrid::grid::GridDescriptor;
use crate::regrid::weights::RegridWeights;
use atlas_core::dataset::{Dataset, Variable};
use atlas_core::errors::{AtlasError, AtlasResult};
use log::{debug, info};
use ndarray::{Array2, Axis, Ix2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported remapping schemes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegridMethod {
    /// First-order conservative, normalised by the covered destination area
    #[default]
    ConservativeNormed,
}

impl FromStr for RegridMethod {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative_normed" => Ok(RegridMethod::ConservativeNormed),
            other => Err(AtlasError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for RegridMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegridMethod::ConservativeNormed => write!(f, "conservative_normed"),
        }
    }
}

/// Regridding request as it appears in configuration files.
///
/// Either `resolution` or both `lons` and `lats` must be given; explicit vectors win when
/// both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationParameters {
    pub var_name: String,
    pub interpolation_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lons: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lats: Option<Vec<f64>>,
}

/// Destination grid of a regridding.
#[derive(Debug, Clone, PartialEq)]
pub enum RegridTarget {
    /// Global regular grid with the given cell size in degrees
    Resolution(f64),
    /// Rectilinear grid with explicit centre vectors
    Vectors { lons: Vec<f64>, lats: Vec<f64> },
}

impl RegridTarget {
    pub fn grid(&self) -> AtlasResult<GridDescriptor> {
        match self {
            RegridTarget::Resolution(resolution) => GridDescriptor::global(*resolution),
            RegridTarget::Vectors { lons, lats } => GridDescriptor::from_vectors(lons, lats),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpatialAxis {
    X,
    Y,
}

fn spatial_axis(dim: &str) -> Option<SpatialAxis> {
    match dim.to_lowercase().as_str() {
        "lon" | "rlon" | "x" | "longitude" => Some(SpatialAxis::X),
        "lat" | "rlat" | "y" | "latitude" => Some(SpatialAxis::Y),
        _ => None,
    }
}

/// Find a coordinate by name, then by `standard_name`, then by `units`.
fn find_coordinate<'a>(
    ds: &'a Dataset,
    names: &[&str],
    standard_name: &str,
    units: &str,
) -> Option<&'a Variable> {
    names
        .iter()
        .find_map(|name| ds.coord(name))
        .or_else(|| {
            ds.coords()
                .map(|(_, coord)| coord)
                .find(|coord| coord.attr_str("standard_name") == Some(standard_name))
        })
        .or_else(|| {
            ds.coords()
                .map(|(_, coord)| coord)
                .find(|coord| coord.attr_str("units") == Some(units))
        })
}

/// Centres of a coordinate as a `(ny, nx)` array.
fn centres_2d(coord: &Variable, ny: usize, nx: usize) -> AtlasResult<Array2<f64>> {
    let axes: Vec<Option<SpatialAxis>> = coord.dims().iter().map(|d| spatial_axis(d)).collect();
    let data = coord.data();
    let array = match axes.as_slice() {
        [Some(SpatialAxis::Y), Some(SpatialAxis::X)] => data.clone(),
        [Some(SpatialAxis::X), Some(SpatialAxis::Y)] => data.t().to_owned(),
        _ => {
            return Err(AtlasError::GridNotRecognized(format!(
                "2-D coordinate with dimensions {:?}",
                coord.dims()
            )))
        }
    };
    array
        .into_dimensionality::<Ix2>()
        .ok()
        .filter(|a| a.dim() == (ny, nx))
        .ok_or_else(|| {
            AtlasError::Shape(format!(
                "coordinate of shape {:?} does not match the {ny}x{nx} grid",
                coord.shape()
            ))
        })
}

/// The grid of `var_name` in `ds` and the names of its `(y, x)` dimensions.
pub fn source_grid(ds: &Dataset, var_name: &str) -> AtlasResult<(GridDescriptor, String, String)> {
    let variable = ds
        .data_var(var_name)
        .ok_or_else(|| AtlasError::MissingVariable(var_name.to_string()))?;
    let lon = find_coordinate(ds, &["lon", "longitude", "nav_lon"], "longitude", "degrees_east")
        .ok_or_else(|| {
            AtlasError::GridNotRecognized(format!(
                "no longitude among coordinates {:?}",
                ds.coord_names()
            ))
        })?;
    let lat = find_coordinate(ds, &["lat", "latitude", "nav_lat"], "latitude", "degrees_north")
        .ok_or_else(|| {
            AtlasError::GridNotRecognized(format!(
                "no latitude among coordinates {:?}",
                ds.coord_names()
            ))
        })?;

    let find_dim = |axis: SpatialAxis| {
        variable
            .dims()
            .iter()
            .find(|d| spatial_axis(d) == Some(axis))
            .cloned()
            .ok_or_else(|| {
                AtlasError::GridNotRecognized(format!(
                    "variable '{var_name}' with dimensions {:?} has no horizontal axes",
                    variable.dims()
                ))
            })
    };
    let x_dim = find_dim(SpatialAxis::X)?;
    let y_dim = find_dim(SpatialAxis::Y)?;
    let nx = variable.len_of(&x_dim).unwrap_or(0);
    let ny = variable.len_of(&y_dim).unwrap_or(0);

    let (mut lon_2d, lat_2d) = match (lon.values_1d(), lat.values_1d()) {
        (Some(lons), Some(lats)) => {
            if lons.len() != nx || lats.len() != ny {
                return Err(AtlasError::Shape(format!(
                    "{} longitudes and {} latitudes for a {ny}x{nx} variable",
                    lons.len(),
                    lats.len()
                )));
            }
            boundaries::meshgrid(&lons, &lats)
        }
        _ => (centres_2d(lon, ny, nx)?, centres_2d(lat, ny, nx)?),
    };
    lon_2d.mapv_inplace(|v| if v > 180.0 { v - 360.0 } else { v });

    // Cells with at least one valid value over the non-spatial dimensions take part
    let spatial_last = spatial_last_order(variable, &y_dim, &x_dim);
    let data = variable.transpose(&spatial_last)?.into_data();
    let n_fields: usize = data.shape()[..data.ndim() - 2].iter().product();
    let fields = data
        .into_shape((n_fields, ny, nx))
        .map_err(|err| AtlasError::Shape(err.to_string()))?;
    let mask = fields.map_axis(Axis(0), |values| values.iter().any(|v| !v.is_nan()));
    debug!(
        "Source grid {ny}x{nx} with {} valid cells",
        mask.iter().filter(|valid| **valid).count()
    );

    let grid = GridDescriptor::from_centres(lon_2d, lat_2d)?.with_mask(mask)?;
    Ok((grid, y_dim, x_dim))
}

fn spatial_last_order<'a>(variable: &'a Variable, y_dim: &'a str, x_dim: &'a str) -> Vec<&'a str> {
    variable
        .dims()
        .iter()
        .map(String::as_str)
        .filter(|d| *d != y_dim && *d != x_dim)
        .chain([y_dim, x_dim])
        .collect()
}

/// Conservative remapping of one variable onto a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ConservativeRegridder {
    var_name: String,
    method: RegridMethod,
    target: RegridTarget,
}

impl ConservativeRegridder {
    pub fn new(var_name: &str, method: RegridMethod, target: RegridTarget) -> Self {
        Self {
            var_name: var_name.to_string(),
            method,
            target,
        }
    }

    pub fn from_parameters(parameters: &InterpolationParameters) -> AtlasResult<Self> {
        let method = parameters.interpolation_method.parse()?;
        let target = match (&parameters.lons, &parameters.lats, parameters.resolution) {
            (Some(lons), Some(lats), _) => RegridTarget::Vectors {
                lons: lons.clone(),
                lats: lats.clone(),
            },
            (_, _, Some(resolution)) => RegridTarget::Resolution(resolution),
            _ => {
                return Err(AtlasError::Config(
                    "either a resolution or both lons and lats are required".to_string(),
                ))
            }
        };
        Ok(Self::new(&parameters.var_name, method, target))
    }

    pub fn var_name(&self) -> &str {
        &self.var_name
    }

    pub fn method(&self) -> RegridMethod {
        self.method
    }

    pub fn target(&self) -> &RegridTarget {
        &self.target
    }

    /// Remap the variable of `ds` and wrap it in a CF-compliant dataset.
    ///
    /// The output variable keeps the dimension order of the input, with its horizontal
    /// dimensions renamed to `lat` and `lon`. Destination cells not covered by any valid
    /// source cell are NaN.
    pub fn regrid(&self, ds: &Dataset) -> AtlasResult<Dataset> {
        let (source, y_dim, x_dim) = source_grid(ds, &self.var_name)?;
        let destination = self.target.grid()?;
        info!(
            "Regridding {} from {:?} to {:?} cells with {}",
            self.var_name,
            source.shape(),
            destination.shape(),
            self.method
        );
        let weights = RegridWeights::build(&source, &destination)?;

        let variable = ds
            .data_var(&self.var_name)
            .ok_or_else(|| AtlasError::MissingVariable(self.var_name.clone()))?;
        let order = spatial_last_order(variable, &y_dim, &x_dim);
        let remapped = weights.apply_nd(variable.transpose(&order)?.data())?;

        let renamed: Vec<&str> = order
            .iter()
            .map(|d| match *d {
                d if d == y_dim => "lat",
                d if d == x_dim => "lon",
                d => d,
            })
            .collect();
        let original: Vec<&str> = variable
            .dims()
            .iter()
            .map(|d| match d.as_str() {
                d if d == y_dim => "lat",
                d if d == x_dim => "lon",
                d => d,
            })
            .collect();
        let regridded = Variable::new(renamed, remapped)?.transpose(&original)?;

        make_cf_compliant(ds, &destination, &self.var_name, regridded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn regional() -> Dataset {
        let mut ds = Dataset::new();
        let lons: Vec<f64> = (0..4).map(|i| 1.0 + 2.0 * i as f64).collect();
        let lats: Vec<f64> = (0..3).map(|j| 41.0 + 2.0 * j as f64).collect();
        ds.insert_coord("lon", Variable::from_1d("lon", lons)).unwrap();
        ds.insert_coord("lat", Variable::from_1d("lat", lats)).unwrap();
        let data = ArrayD::from_elem(IxDyn(&[3, 4]), 7.0);
        ds.insert_data_var("tas", Variable::new(vec!["lat", "lon"], data).unwrap())
            .unwrap();
        ds
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(
            "conservative_normed".parse::<RegridMethod>().unwrap(),
            RegridMethod::ConservativeNormed
        );
        assert!(matches!(
            "bilinear".parse::<RegridMethod>(),
            Err(AtlasError::UnsupportedMethod(m)) if m == "bilinear"
        ));
        assert_eq!(RegridMethod::ConservativeNormed.to_string(), "conservative_normed");
    }

    #[test]
    fn test_parameters_from_json() {
        let parameters: InterpolationParameters = serde_json::from_str(
            r#"{"var_name": "pr", "interpolation_method": "conservative_normed",
                "lons": [0.5, 1.5, 2.5], "lats": [10.5, 11.5, 12.5]}"#,
        )
        .unwrap();
        let regridder = ConservativeRegridder::from_parameters(&parameters).unwrap();
        assert_eq!(regridder.var_name(), "pr");
        assert!(matches!(regridder.target(), RegridTarget::Vectors { .. }));

        let serialised = serde_json::to_string(&parameters).unwrap();
        assert!(!serialised.contains("resolution"));
    }

    #[test]
    fn test_parameters_need_a_target() {
        let parameters = InterpolationParameters {
            var_name: "tas".to_string(),
            interpolation_method: "conservative_normed".to_string(),
            resolution: None,
            lons: Some(vec![0.0]),
            lats: None,
        };
        assert!(matches!(
            ConservativeRegridder::from_parameters(&parameters),
            Err(AtlasError::Config(_))
        ));
    }

    #[test]
    fn test_unsupported_method() {
        let parameters = InterpolationParameters {
            var_name: "tas".to_string(),
            interpolation_method: "patch".to_string(),
            resolution: Some(1.0),
            lons: None,
            lats: None,
        };
        assert!(matches!(
            ConservativeRegridder::from_parameters(&parameters),
            Err(AtlasError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_source_grid_lookup_by_standard_name() {
        let ds = regional();
        let mut renamed = Dataset::new();
        for (name, coord) in ds.coords() {
            let standard_name = if name == "lon" { "longitude" } else { "latitude" };
            renamed
                .insert_coord(
                    &format!("{name}_centre"),
                    coord.clone().with_attr("standard_name", standard_name),
                )
                .unwrap();
        }
        renamed
            .insert_data_var("tas", ds.data_var("tas").unwrap().clone())
            .unwrap();
        let (grid, y_dim, x_dim) = source_grid(&renamed, "tas").unwrap();
        assert_eq!(grid.shape(), (3, 4));
        assert_eq!((y_dim.as_str(), x_dim.as_str()), ("lat", "lon"));
    }

    #[test]
    fn test_missing_longitude() {
        let mut ds = regional();
        ds.remove_coord("lon");
        assert!(matches!(
            source_grid(&ds, "tas"),
            Err(AtlasError::GridNotRecognized(_))
        ));
    }

    #[test]
    fn test_mask_from_nan_cells() {
        let mut ds = regional();
        ds.data_var_mut("tas").unwrap().data_mut()[[0, 0]] = f64::NAN;
        let (grid, _, _) = source_grid(&ds, "tas").unwrap();
        assert!(!grid.mask[[0, 0]]);
        assert!(grid.mask[[2, 3]]);
    }

    #[test]
    fn test_regrid_onto_vectors() {
        let regridder = ConservativeRegridder::new(
            "tas",
            RegridMethod::ConservativeNormed,
            RegridTarget::Vectors {
                lons: vec![2.0, 4.0, 6.0],
                lats: vec![42.0, 43.0, 44.0],
            },
        );
        let out = regridder.regrid(&regional()).unwrap();
        let tas = out.data_var("tas").unwrap();
        assert_eq!(tas.dims(), &["lat", "lon"]);
        assert_eq!(tas.shape(), &[3, 3]);
        assert!(tas.data().iter().all(|v| (v - 7.0).abs() < 1e-9));
    }
}
