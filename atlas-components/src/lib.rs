//! Processing steps for harmonising and regridding climate datasets
//!
//! # Module Organisation
//!
//! - `fixers`: the harmonisation steps (coordinate names, calendars, variable selection,
//!   unit conversion, longitude/latitude conventions, temporal resampling) and the
//!   [`fixers::FixerPipeline`] that runs them in order
//! - `regrid`: conservative regridding onto regular longitude/latitude grids, including
//!   cell boundary estimation and CF-compliant re-wrapping of the result
//!
//! Every step takes a [`atlas_core::dataset::Dataset`] by reference and returns a new one.

pub mod fixers;
pub mod regrid;
