//! regression::errors — error surface for multi-predictor and event analysis.
//!
//! Purpose
//! -------
//! Provide [`RegressionError`] and the [`RegressionResult`] alias for the
//! design-matrix builder, OLS fit, and extreme-event detection, with a
//! Python conversion when `python-bindings` is enabled.
//!
//! Conventions
//! -----------
//! - `InsufficientData` reports usable rows after NaN removal, not the raw
//!   series length.
//! - `Degenerate` covers zero-variance predictors and singular designs;
//!   the payload names the offending predictor or matrix.
//! - Covariance failures from `inference` are wrapped transparently.
use crate::inference::errors::InferenceError;

#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

pub type RegressionResult<T> = Result<T, RegressionError>;

/// RegressionError — invalid or unestimable regression problems.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegressionError {
    #[error("Series '{name}' has length {actual}; the response has length {expected}.")]
    LengthMismatch { name: String, expected: usize, actual: usize },

    #[error("At least {required} complete rows are required; got {rows}.")]
    InsufficientData { rows: usize, required: usize },

    #[error("Degenerate regression: {0}")]
    Degenerate(String),

    #[error("Percentile must lie in [0, 100]; got {0}.")]
    InvalidPercentile(f64),

    #[error("At least one predictor is required.")]
    NoPredictors,

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[cfg(feature = "python-bindings")]
impl From<RegressionError> for PyErr {
    fn from(err: RegressionError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // `Display` payloads and the transparent inference wrapper.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Messages embed counts and the offending percentile.
    //
    // Given
    // -----
    // - `InsufficientData { rows: 2, required: 4 }`, `InvalidPercentile(120.0)`.
    //
    // Expect
    // ------
    // - "got 2" and "120" in the messages.
    fn display_includes_payloads() {
        let a = RegressionError::InsufficientData { rows: 2, required: 4 }.to_string();
        let b = RegressionError::InvalidPercentile(120.0).to_string();

        assert!(a.contains("got 2"), "Got: {a}");
        assert!(b.contains("120"), "Got: {b}");
    }

    #[test]
    // Purpose
    // -------
    // Inference errors keep their own message when wrapped.
    //
    // Given
    // -----
    // - `InferenceError::Singular`.
    //
    // Expect
    // ------
    // - Identical `Display` output.
    fn inference_errors_are_transparent() {
        let inner = InferenceError::Singular { min_eigenvalue: 0.0 };

        let outer: RegressionError = inner.clone().into();

        assert_eq!(outer.to_string(), inner.to_string());
    }
}
