use crate::fixers::{
    adding_coords, fix_360_longitudes, fix_inverse_latitudes, fix_spatial_coord_names, fix_time,
    rename_and_delete_variables, reorder_dimensions, resampled_by_temporal_aggregation,
    standard_names,
};
use atlas_core::config::AtlasConfig;
use atlas_core::dataset::Dataset;
use atlas_core::errors::AtlasResult;
use atlas_core::units::convert_units;
use log::info;

/// Runs every fixer in order to turn a raw dataset into a harmonised one.
///
/// The pipeline only reads its configuration, so a single instance can process any number
/// of datasets, including from several threads.
///
/// ```rust
/// use atlas_components::fixers::FixerPipeline;
/// use atlas_core::config::AtlasConfig;
///
/// let pipeline = FixerPipeline::new(AtlasConfig::default());
/// assert!(pipeline.config().variables.aggregation.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FixerPipeline {
    config: AtlasConfig,
}

impl FixerPipeline {
    pub fn new(config: AtlasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Harmonise `ds` so that it holds `variable` only, in canonical units, names and
    /// calendar.
    ///
    /// The steps run in this order:
    /// 1. spatial coordinate names
    /// 2. time axis and calendar
    /// 3. primary variable selection
    /// 4. unit conversion
    /// 5. longitudes in `[-180, 180]`
    /// 6. ascending latitudes
    /// 7. sub-daily to daily resampling
    /// 8. `(time, y, x)` dimension order
    /// 9. index coordinates for `x`/`y`
    /// 10. CF standard names
    pub fn apply(&self, ds: &Dataset, variable: &str, project: &str) -> AtlasResult<Dataset> {
        info!("Applying fixers to {variable} from {project}");
        let ds = fix_spatial_coord_names(ds)?;
        let ds = fix_time(&ds)?;
        let ds = rename_and_delete_variables(&ds, variable, &self.config.variables)?;
        let ds = convert_units(&ds, project, &self.config.units)?;
        let ds = fix_360_longitudes(&ds, project)?;
        let ds = fix_inverse_latitudes(&ds, project)?;
        let ds = resampled_by_temporal_aggregation(&ds, &self.config.variables)?;
        let ds = reorder_dimensions(&ds)?;
        let ds = adding_coords(&ds)?;
        Ok(standard_names(&ds))
    }
}
