//! Core data model for harmonising gridded climate data.
//!
//! The crate provides the pieces every processing step shares:
//!
//! - [`dataset`]: named-dimension variables grouped into a [`dataset::Dataset`]
//! - [`time`]: CF calendars and calendar-aware time axes
//! - [`frequency`]: inference of the sampling cadence of a time axis
//! - [`units`]: canonical units and the conversions into them
//! - [`aggregation`]: reductions used for temporal resampling
//! - [`config`]: the serialisable pipeline configuration
//!
//! Processing steps built on these types live in the `atlas-components` crate.

pub mod aggregation;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod frequency;
pub mod time;
pub mod units;

pub use errors::{AtlasError, AtlasResult, ErrorKind};
