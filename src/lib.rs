//! Harmonisation and conservative regridding of gridded climate model output.
//!
//! Raw model output (CMIP5/6, CORDEX, ERA5) arrives as an in-memory
//! [`atlas_core::dataset::Dataset`]. The [`atlas_components::fixers::FixerPipeline`] turns it
//! into a harmonised dataset with canonical names, units, calendar and daily or monthly
//! cadence. The [`atlas_components::regrid::ConservativeRegridder`] then maps it onto a common
//! regular grid.
//!
//! # Module Organisation
//!
//! - `atlas_core`: data model, errors, frequency inference, unit tables, configuration
//! - `atlas_components`: the fixers and the regridding subsystem

pub use atlas_components;
pub use atlas_core;
pub use ndarray;

pub use atlas_components::fixers::FixerPipeline;
pub use atlas_components::regrid::{ConservativeRegridder, InterpolationParameters};
pub use atlas_core::config::AtlasConfig;
pub use atlas_core::{AtlasError, AtlasResult};
