//! Grid descriptors used by the conservative regridder.

use crate::regrid::boundaries::{estimate_boundaries, meshgrid};
use atlas_core::errors::{AtlasError, AtlasResult};
use is_close::is_close;
use ndarray::Array2;

/// Cell centres, cell corners and a validity mask of a 2-D grid.
///
/// Centres have shape `(ny, nx)`, corners `(ny + 1, nx + 1)`. Cell `(j, i)` is the
/// quadrilateral spanned by corners `(j, i)`, `(j, i + 1)`, `(j + 1, i + 1)` and
/// `(j + 1, i)`. Masked-out cells (`false`) take no part in regridding.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDescriptor {
    pub lon: Array2<f64>,
    pub lat: Array2<f64>,
    pub lon_b: Array2<f64>,
    pub lat_b: Array2<f64>,
    pub mask: Array2<bool>,
}

impl GridDescriptor {
    /// Assemble a descriptor, checking that every array has a consistent shape.
    pub fn new(
        lon: Array2<f64>,
        lat: Array2<f64>,
        lon_b: Array2<f64>,
        lat_b: Array2<f64>,
        mask: Array2<bool>,
    ) -> AtlasResult<Self> {
        let (ny, nx) = lon.dim();
        if lat.dim() != (ny, nx) || mask.dim() != (ny, nx) {
            return Err(AtlasError::Shape(format!(
                "centres {:?}, {:?} and mask {:?} differ in shape",
                lon.dim(),
                lat.dim(),
                mask.dim()
            )));
        }
        if lon_b.dim() != (ny + 1, nx + 1) || lat_b.dim() != (ny + 1, nx + 1) {
            return Err(AtlasError::Shape(format!(
                "corners {:?}, {:?} do not match centres {:?}",
                lon_b.dim(),
                lat_b.dim(),
                (ny, nx)
            )));
        }
        Ok(Self {
            lon,
            lat,
            lon_b,
            lat_b,
            mask,
        })
    }

    /// Grid from 2-D centres, with estimated corners and every cell valid.
    pub fn from_centres(lon: Array2<f64>, lat: Array2<f64>) -> AtlasResult<Self> {
        let (lon_b, lat_b) = estimate_boundaries(lon.view(), lat.view())?;
        let mask = Array2::from_elem(lon.dim(), true);
        Self::new(lon, lat, lon_b, lat_b, mask)
    }

    /// Rectilinear grid from 1-D centre vectors, with estimated corners.
    pub fn from_vectors(lons: &[f64], lats: &[f64]) -> AtlasResult<Self> {
        let (lon, lat) = meshgrid(lons, lats);
        Self::from_centres(lon, lat)
    }

    /// Global regular grid with `resolution`-degree cells.
    ///
    /// Cell edges start at -180° longitude and -90° latitude and fall exactly on multiples
    /// of the resolution, which must divide 180.
    pub fn global(resolution: f64) -> AtlasResult<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(AtlasError::Config(format!(
                "grid resolution must be positive, got {resolution}"
            )));
        }
        let n_lat = (180.0 / resolution).round() as usize;
        if n_lat == 0 || !is_close!(n_lat as f64 * resolution, 180.0, abs_tol = 1e-9) {
            return Err(AtlasError::Config(format!(
                "grid resolution {resolution} does not divide 180 degrees; \
                 choose one that does or pass explicit lons and lats"
            )));
        }
        let n_lon = 2 * n_lat;

        let lon_edges: Vec<f64> = (0..=n_lon).map(|i| -180.0 + i as f64 * resolution).collect();
        let lat_edges: Vec<f64> = (0..=n_lat).map(|j| -90.0 + j as f64 * resolution).collect();
        let lon_centres: Vec<f64> = (0..n_lon)
            .map(|i| -180.0 + (i as f64 + 0.5) * resolution)
            .collect();
        let lat_centres: Vec<f64> = (0..n_lat)
            .map(|j| -90.0 + (j as f64 + 0.5) * resolution)
            .collect();

        let (lon, lat) = meshgrid(&lon_centres, &lat_centres);
        let (lon_b, lat_b) = meshgrid(&lon_edges, &lat_edges);
        let mask = Array2::from_elem(lon.dim(), true);
        Self::new(lon, lat, lon_b, lat_b, mask)
    }

    /// Replace the validity mask.
    pub fn with_mask(self, mask: Array2<bool>) -> AtlasResult<Self> {
        Self::new(self.lon, self.lat, self.lon_b, self.lat_b, mask)
    }

    /// `(ny, nx)`
    pub fn shape(&self) -> (usize, usize) {
        self.lon.dim()
    }

    pub fn n_cells(&self) -> usize {
        self.lon.len()
    }

    /// Corners of cell `(j, i)` in counter-clockwise index order.
    pub fn cell_corners(&self, j: usize, i: usize) -> [(f64, f64); 4] {
        [
            (self.lon_b[[j, i]], self.lat_b[[j, i]]),
            (self.lon_b[[j, i + 1]], self.lat_b[[j, i + 1]]),
            (self.lon_b[[j + 1, i + 1]], self.lat_b[[j + 1, i + 1]]),
            (self.lon_b[[j + 1, i]], self.lat_b[[j + 1, i]]),
        ]
    }

    /// Centre longitudes along the first row
    pub fn lon_1d(&self) -> Vec<f64> {
        self.lon.row(0).to_vec()
    }

    /// Centre latitudes along the first column
    pub fn lat_1d(&self) -> Vec<f64> {
        self.lat.column(0).to_vec()
    }
}
