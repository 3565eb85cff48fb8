//! Error type for the detrital crate.
use std::path::PathBuf;

/// Custom error type for the detrital crate.
#[derive(Debug)]
pub enum DzError {
    /// Two distributions were compared or mixed over different axes.
    AxisMismatch(String),
    /// Mixing coefficients do not sum to one, or do not match the parent count.
    InvalidCoefficients(String),
    /// A sample or distribution for which the requested quantity is undefined.
    DegenerateSample(String),
    /// Unrecognized method name, missing field or out-of-range parameter.
    Configuration(String),
    /// A cancellation flag was raised while a run was in progress.
    Cancelled,
    /// Refused to overwrite an existing output file.
    FileExists(PathBuf),
    /// Error type from csv crate.
    Csv(csv::Error),
    /// Error type from std::io.
    Io(std::io::Error),
    /// Error type from rand and rand_distr while building a sampler.
    Sampling(String),
}

impl std::error::Error for DzError {}

impl std::fmt::Display for DzError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DzError::AxisMismatch(msg) => write!(
                f,
                "Distributions must be calculated over matching axes: {}.",
                msg
            ),
            DzError::InvalidCoefficients(msg) => write!(f, "Invalid mixing coefficients: {}.", msg),
            DzError::DegenerateSample(msg) => write!(f, "Degenerate sample: {}.", msg),
            DzError::Configuration(msg) => write!(f, "Invalid configuration: {}.", msg),
            DzError::Cancelled => write!(f, "Run cancelled before completion."),
            DzError::FileExists(path) => write!(
                f,
                "File {} already exists, please choose another.",
                path.display()
            ),
            DzError::Csv(e) => write!(f, "Could not serialize/deserialize csv file: {}", e),
            DzError::Io(e) => write!(f, "Could not access file at path provided: {}", e),
            DzError::Sampling(msg) => write!(f, "Could not build sampling distribution: {}.", msg),
        }
    }
}

impl From<csv::Error> for DzError {
    fn from(e: csv::Error) -> Self {
        DzError::Csv(e)
    }
}

impl From<std::io::Error> for DzError {
    fn from(e: std::io::Error) -> Self {
        DzError::Io(e)
    }
}

impl From<rand::distributions::WeightedError> for DzError {
    fn from(e: rand::distributions::WeightedError) -> Self {
        DzError::Sampling(e.to_string())
    }
}

impl From<rand_distr::NormalError> for DzError {
    fn from(e: rand_distr::NormalError) -> Self {
        DzError::Sampling(e.to_string())
    }
}
