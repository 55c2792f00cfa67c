//! statistical_tests::errors — error surface of the correlation engine.
//!
//! Purpose
//! -------
//! Provide the error enum and result alias for correlation sweeps and
//! autocorrelation diagnostics, together with a conversion layer to Python
//! exceptions for PyO3-based bindings.
//!
//! Key behaviors
//! -------------
//! - Define [`CorrelationResult`] and [`CorrelationError`] as the canonical
//!   result and error types for [`correlate`](super::correlation::correlate),
//!   [`compute_lag_analysis`](super::lag::compute_lag_analysis), and
//!   [`autocorrelation`](super::autocorrelation::autocorrelation).
//! - Implement `From<CorrelationError> for PyErr` (feature
//!   `python-bindings`) mapping every variant to `ValueError` with the Rust
//!   message preserved.
//!
//! Conventions
//! -----------
//! - Errors are reserved for malformed *calls* (unequal lengths, an
//!   impossible minimum overlap). Statistically undefined lags, whether
//!   from too little overlap or zero variance, are reported per lag as
//!   [`UndefinedReason`](super::correlation::UndefinedReason) markers and
//!   never abort a sweep.
//! - Messages are phrased as domain constraints ("min_overlap must be ≥ 3").
//!
//! Testing notes
//! -------------
//! - Unit tests verify payload embedding in `Display` and, with the
//!   `python-bindings` feature, the `PyValueError` mapping.

#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

pub type CorrelationResult<T> = Result<T, CorrelationError>;

/// Smallest overlap for which a correlation p-value is defined (`n − 2 ≥ 1`).
pub const MIN_OVERLAP_FLOOR: usize = 3;

/// CorrelationError — invalid calls into the correlation engine.
///
/// Variants
/// --------
/// - `LengthMismatch { x, y }`
///   Driver and response have different lengths.
/// - `InvalidMinOverlap(n)`
///   `min_overlap` below [`MIN_OVERLAP_FLOOR`].
/// - `InsufficientData { n, required }`
///   Too few finite samples for an autocorrelation diagnostic.
/// - `ZeroVariance`
///   A constant series passed to autocorrelation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CorrelationError {
    #[error("Driver and response must have equal length: x has {x}, y has {y}.")]
    LengthMismatch { x: usize, y: usize },

    #[error("min_overlap must be ≥ 3; got {0}.")]
    InvalidMinOverlap(usize),

    #[error("At least {required} finite observations are required; got {n}.")]
    InsufficientData { n: usize, required: usize },

    #[error("Series has zero variance; autocorrelation is undefined.")]
    ZeroVariance,
}

#[cfg(feature = "python-bindings")]
impl From<CorrelationError> for PyErr {
    fn from(err: CorrelationError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}
