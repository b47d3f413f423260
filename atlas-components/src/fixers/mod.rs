//! Harmonisation of raw model output.
//!
//! Each fixer is a free function from a dataset to a new dataset. [`FixerPipeline`] runs
//! them in the order the harmonised output depends on.

pub mod calendar;
pub mod coordinates;
mod pipeline;
pub mod resample;
pub mod spatial;
pub mod variables;

pub use calendar::{coerce_time, fix_non_standard_calendar, fix_time};
pub use coordinates::fix_spatial_coord_names;
pub use pipeline::FixerPipeline;
pub use resample::{aggregate_in_time, check_temporal_resolution, resampled_by_temporal_aggregation};
pub use spatial::{fix_360_longitudes, fix_inverse_latitudes};
pub use variables::{adding_coords, rename_and_delete_variables, reorder_dimensions, standard_names};
