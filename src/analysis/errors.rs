//! analysis::errors — configuration and per-site failures of a run.
//!
//! Purpose
//! -------
//! Collect the subtree errors (data, aggregation, correlation, regression)
//! behind one per-site error so the batch runner can record a failure for
//! one glacier and carry on with the next.
//!
//! Conventions
//! -----------
//! - [`ConfigError`] is raised before any data is touched; it aborts the run.
//! - [`AnalysisError`] wraps subtree errors with `#[from]` so the pipeline
//!   can use `?` throughout; its `Display` is what lands in the `status`
//!   column of `glacier_summary.csv`.
use crate::{
    data::errors::DataError, regression::errors::RegressionError,
    statistical_tests::errors::CorrelationError, temporal::errors::AggregationError,
};

pub type AnalysisResult<T> = Result<T, AnalysisError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

/// ConfigError — an analysis configuration that cannot be used.
///
/// Variants
/// --------
/// - `Read(detail)`
///   The configuration file could not be opened or read.
/// - `Parse(detail)`
///   The YAML does not match the configuration schema.
/// - `Invalid { field, reason }`
///   A value outside its allowed range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration: {0}")]
    Read(String),

    #[error("Cannot parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { field, reason: reason.into() }
    }
}

/// AnalysisError — why one glacier (or an output step) failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error(transparent)]
    Regression(#[from] RegressionError),

    #[error("No daily overlap between deposition and albedo for glacier '{site}'.")]
    NoOverlap { site: String },

    #[error("Output error: {0}")]
    Output(String),
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        AnalysisError::Output(err.to_string())
    }
}

impl From<csv::Error> for AnalysisError {
    fn from(err: csv::Error) -> Self {
        AnalysisError::Output(err.to_string())
    }
}
