//! Error handling for long-run covariance estimation.
//!
//! `InferenceError` covers the ways a HAC plug-in bandwidth or score
//! covariance can fail: nonstationary AR(1) fits, vanishing denominators,
//! unsupported plug-in orders, singular cross-product matrices, and samples
//! too short to estimate anything.
//! Bandwidth failures are normally absorbed by the rule-of-thumb fallback;
//! only sample-size problems reach regression callers.

/// Error type for HAC bandwidth selection and score covariance.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceError {
    // ---- Bandwidth selection ----
    /// AR(1) coefficient at or beyond the stationarity margin.
    StationarityViolated { phi: f64 },

    /// Plug-in denominator numerically zero.
    DenominatorTooSmall { denominator: f64 },

    /// Plug-in order other than 1 or 2.
    OrderNotSupported { ord: usize },

    // ---- Linear algebra ----
    /// Matrix to invert has a (numerically) zero eigenvalue.
    Singular { min_eigenvalue: f64 },

    // ---- Sample size ----
    /// Too few rows for the requested estimate.
    InsufficientData { n: usize, required: usize },
}

pub type InferenceResult<T> = Result<T, InferenceError>;

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceError::StationarityViolated { phi } => {
                write!(f, "Inference Error: AR(1) fit is not stationary (phi = {phi})")
            }
            InferenceError::DenominatorTooSmall { denominator } => write!(
                f,
                "Inference Error: Denominator too small ({denominator}) in bandwidth calculation"
            ),
            InferenceError::OrderNotSupported { ord } => {
                write!(f, "Inference Error: Order {ord} not supported for bandwidth calculation")
            }
            InferenceError::Singular { min_eigenvalue } => write!(
                f,
                "Inference Error: matrix is singular (smallest eigenvalue {min_eigenvalue:e})"
            ),
            InferenceError::InsufficientData { n, required } => {
                write!(f, "Inference Error: at least {required} rows are required; got {n}")
            }
        }
    }
}

impl std::error::Error for InferenceError {}
