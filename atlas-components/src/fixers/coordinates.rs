//! Spatial coordinate naming conventions.
//!
//! Source datasets name their horizontal axes in many different ways (`rlon`/`rlat` for
//! rotated-pole grids, `nav_lon`/`nav_lat` for NEMO output, `i`/`j` for ocean models,
//! ...). Downstream steps expect either `lon`/`lat` (regular grids) or `x`/`y` dimensions
//! with `lon`/`lat` coordinates (curvilinear grids).

use atlas_core::dataset::Dataset;
use atlas_core::errors::{AtlasError, AtlasResult};
use log::info;
use std::collections::BTreeMap;

/// Known conventions, tried in order. The first one whose names are all present wins.
const COORDINATE_CONVENTIONS: &[(&[&str], &[(&str, &str)])] = &[
    (
        &["rlon", "rlat", "longitude", "latitude"],
        &[
            ("rlon", "x"),
            ("rlat", "y"),
            ("longitude", "lon"),
            ("latitude", "lat"),
        ],
    ),
    (&["nav_lon", "nav_lat"], &[("nav_lon", "lon"), ("nav_lat", "lat")]),
    (
        &["i", "j", "longitude", "latitude"],
        &[("i", "x"), ("j", "y"), ("longitude", "lon"), ("latitude", "lat")],
    ),
    (&["rlon", "rlat"], &[("rlon", "x"), ("rlat", "y")]),
    (&["nj", "ni"], &[("ni", "x"), ("nj", "y")]),
    (&["lon", "lat"], &[]),
    (&["x", "y"], &[("x", "lon"), ("y", "lat")]),
    (&["longitude", "latitude"], &[("longitude", "lon"), ("latitude", "lat")]),
];

fn has_name(ds: &Dataset, name: &str) -> bool {
    ds.has_dim(name) || ds.has_coord(name)
}

/// Rename spatial dimensions and coordinates to the canonical scheme.
///
/// Datasets already using `lon`/`lat` are returned unchanged. Datasets matching none of
/// the known conventions are rejected with [`AtlasError::UnrecognizedConvention`].
pub fn fix_spatial_coord_names(ds: &Dataset) -> AtlasResult<Dataset> {
    for (names, renames) in COORDINATE_CONVENTIONS {
        if !names.iter().all(|name| has_name(ds, name)) {
            continue;
        }
        if renames.is_empty() {
            info!("Dataset has already the correct names for its coordinates");
            return Ok(ds.clone());
        }
        let mapping: BTreeMap<String, String> = renames
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        info!("Fixing coordinates names: {mapping:?}");
        return ds.rename(&mapping);
    }

    let mut names: Vec<String> = ds.dims().into_keys().collect();
    for name in ds.coord_names() {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Err(AtlasError::UnrecognizedConvention { names })
}
