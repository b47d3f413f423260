use thiserror::Error;

/// Broad classes of failure, so callers can tell bad input data from bad configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The lookup tables or the requested operation do not fit the dataset.
    Configuration,
    /// The dataset itself cannot be processed (e.g. its time axis).
    DataQuality,
    /// Arrays or grids have unusable shapes.
    Geometry,
}

/// Error type for invalid operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AtlasError {
    #[error("Cannot infer the frequency of the dataset: {0}")]
    InferFrequency(String),
    #[error("Invalid time axis: {0}")]
    InvalidTime(String),
    #[error("The inferred temporal resolution ({0}) is not 'D' or 'MS'")]
    TemporalResolution(String),
    #[error("Variable '{0}' is not configured in the units table")]
    UnknownVariable(String),
    #[error("No conversion is defined from '{unit}' for variable '{variable}'")]
    UnknownUnit { variable: String, unit: String },
    #[error("Variable '{0}' has no 'units' attribute")]
    MissingUnits(String),
    #[error("Unrecognised coordinate convention. Dataset names: {names:?}")]
    UnrecognizedConvention { names: Vec<String> },
    #[error("No temporal aggregation configured for variable '{0}'")]
    UnknownAggregation(String),
    #[error("Unsupported interpolation method '{0}'. Only 'conservative_normed' is available")]
    UnsupportedMethod(String),
    #[error("Grid not recognised: {0}")]
    GridNotRecognized(String),
    #[error("Variable '{0}' not found in dataset")]
    MissingVariable(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Shape mismatch: {0}")]
    Shape(String),
}

impl AtlasError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AtlasError::InferFrequency(_)
            | AtlasError::InvalidTime(_)
            | AtlasError::TemporalResolution(_) => ErrorKind::DataQuality,
            AtlasError::Shape(_) => ErrorKind::Geometry,
            _ => ErrorKind::Configuration,
        }
    }
}

/// Convenience type for `Result<T, AtlasError>`.
pub type AtlasResult<T> = Result<T, AtlasError>;
