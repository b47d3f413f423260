//! Longitude and latitude conventions.

use atlas_core::dataset::Dataset;
use atlas_core::errors::{AtlasError, AtlasResult};
use log::info;

/// Whether a project uses rotated-pole (CORDEX) grids, whose axes must not be re-sorted.
pub fn is_cordex(project: &str) -> bool {
    project.to_lowercase().contains("cordex")
}

fn has_1d_latitude(ds: &Dataset) -> bool {
    ds.coord("lat").is_some_and(|lat| lat.ndim() == 1)
}

/// Move longitudes from `[0, 360]` to `[-180, 180]`.
///
/// Values above 180 are shifted by -360 when the longitudes are all non-negative and
/// some exceed 180. For regular grids outside CORDEX the dataset is then sorted by
/// ascending longitude.
pub fn fix_360_longitudes(ds: &Dataset, project: &str) -> AtlasResult<Dataset> {
    let mut out = ds.clone();
    let lon = out
        .coord_mut("lon")
        .ok_or_else(|| AtlasError::MissingVariable("lon".to_string()))?;
    if lon.max() > 180.0 && lon.min() >= 0.0 {
        info!("Converting longitudes from [0, 360] to [-180, 180]");
        lon.map_inplace(|v| if v > 180.0 { v - 360.0 } else { v });
    }
    let is_1d = lon.ndim() == 1;
    if !is_cordex(project) && has_1d_latitude(&out) && is_1d {
        out = out.sort_by_coord("lon")?;
    }
    Ok(out)
}

/// Sort regular grids by ascending latitude.
///
/// Curvilinear grids (2-D latitude) and CORDEX projects are left untouched.
pub fn fix_inverse_latitudes(ds: &Dataset, project: &str) -> AtlasResult<Dataset> {
    if is_cordex(project) || !has_1d_latitude(ds) {
        return Ok(ds.clone());
    }
    ds.sort_by_coord("lat")
}
