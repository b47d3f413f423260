//! Cell corner estimation from cell centres.
//!
//! Corners are the mean of the four surrounding centres. Longitudes are averaged on the
//! side of the antimeridian the cells sit on: when the plain mean strays more than
//! [`WRAP_THRESHOLD`] degrees from the cell centre the block straddles ±180, so negative
//! longitudes are moved up by 360 before averaging again. The outermost corners are
//! extrapolated linearly from the two nearest rows or columns.

use atlas_core::errors::{AtlasError, AtlasResult};
use ndarray::{s, Array2, ArrayView2};

/// Distance between a corner estimate and the adjacent centre that signals a wrap.
/// unit: degrees
pub const WRAP_THRESHOLD: f64 = 20.0;

/// 2-D coordinate arrays from 1-D vectors, with `x` varying along columns.
pub fn meshgrid(x: &[f64], y: &[f64]) -> (Array2<f64>, Array2<f64>) {
    let xx = Array2::from_shape_fn((y.len(), x.len()), |(_, i)| x[i]);
    let yy = Array2::from_shape_fn((y.len(), x.len()), |(j, _)| y[j]);
    (xx, yy)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Wrap a longitude difference into [-180, 180].
fn wrapped_step(step: f64) -> f64 {
    (step + 180.0).rem_euclid(360.0) - 180.0
}

/// Bring an extrapolated longitude back into [-180, 180].
fn wrapped_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Fill the outermost rows then the outermost columns by linear extrapolation.
///
/// With `periodic` set the values are longitudes: steps are taken the short way round
/// and the result stays in [-180, 180].
fn extrapolate_edges(corners: &mut Array2<f64>, periodic: bool) {
    let (rows, cols) = corners.dim();
    let extend = |inner: f64, next: f64| {
        if periodic {
            wrapped_longitude(inner + wrapped_step(inner - next))
        } else {
            2.0 * inner - next
        }
    };
    for i in 1..cols - 1 {
        corners[[0, i]] = extend(corners[[1, i]], corners[[2, i]]);
        corners[[rows - 1, i]] = extend(corners[[rows - 2, i]], corners[[rows - 3, i]]);
    }
    for j in 0..rows {
        corners[[j, 0]] = extend(corners[[j, 1]], corners[[j, 2]]);
        corners[[j, cols - 1]] = extend(corners[[j, cols - 2]], corners[[j, cols - 3]]);
    }
}

/// Estimate cell corners from `(ny, nx)` centre coordinates.
///
/// Returns `(lon_b, lat_b)` of shape `(ny + 1, nx + 1)`. Both dimensions need at least
/// three cells so the edges can be extrapolated from interior corners.
pub fn estimate_boundaries(
    lon: ArrayView2<f64>,
    lat: ArrayView2<f64>,
) -> AtlasResult<(Array2<f64>, Array2<f64>)> {
    if lon.dim() != lat.dim() {
        return Err(AtlasError::Shape(format!(
            "longitude {:?} and latitude {:?} centres differ in shape",
            lon.dim(),
            lat.dim()
        )));
    }
    let (ny, nx) = lon.dim();
    if ny < 3 || nx < 3 {
        return Err(AtlasError::Shape(format!(
            "at least 3x3 cells are needed to estimate boundaries, got {ny}x{nx}"
        )));
    }

    let mut lon_b = Array2::from_elem((ny + 1, nx + 1), f64::NAN);
    let mut lat_b = Array2::from_elem((ny + 1, nx + 1), f64::NAN);
    for j in 1..ny {
        for i in 1..nx {
            let block: Vec<f64> = lon.slice(s![j - 1..=j, i - 1..=i]).iter().copied().collect();
            let mut average = mean(&block);
            if (lon[[j, i]] - average).abs() > WRAP_THRESHOLD {
                let shifted: Vec<f64> = block
                    .iter()
                    .map(|v| if *v < 0.0 { v + 360.0 } else { *v })
                    .collect();
                average = mean(&shifted);
            }
            lon_b[[j, i]] = if average <= 180.0 {
                average
            } else {
                average - 360.0
            };

            let block: Vec<f64> = lat.slice(s![j - 1..=j, i - 1..=i]).iter().copied().collect();
            lat_b[[j, i]] = mean(&block);
        }
    }

    extrapolate_edges(&mut lon_b, true);
    extrapolate_edges(&mut lat_b, false);
    Ok((lon_b, lat_b))
}
