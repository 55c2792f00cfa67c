//! inference — robust covariance machinery for least-squares fits.
//!
//! Purpose
//! -------
//! Supply the pieces a regression needs to report standard errors that
//! remain valid when daily residuals are heteroskedastic and serially
//! correlated: kernel tapers with plug-in bandwidths, the long-run
//! covariance of scores, and the classical/sandwich parameter covariance.
//!
//! Key behaviors
//! -------------
//! - [`KernelType`] and [`KernelType::optimal_bandwidth`] (Andrews plug-in
//!   on per-column AR(1) fits with a `round(n^{1/4})` fallback).
//! - [`long_run_covariance`] configured by [`HACOptions`].
//! - [`invert_symmetric`], [`classical_covariance`],
//!   [`sandwich_covariance`], and [`standard_errors`].
//!
//! Conventions
//! -----------
//! - Matrices are `ndarray` arrays with rows indexing time; `nalgebra` is
//!   used internally for the eigendecomposition.
//! - Failures are [`InferenceError`] values behind [`InferenceResult`].

pub mod covariance;
pub mod errors;
pub mod hac;
pub mod kernel;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::covariance::{
    classical_covariance, invert_symmetric, sandwich_covariance, standard_errors,
};
pub use self::errors::{InferenceError, InferenceResult};
pub use self::hac::{HACOptions, long_run_covariance};
pub use self::kernel::KernelType;

// ---- Optional convenience prelude for downstream crates ------------------

pub mod prelude {
    pub use super::errors::{InferenceError, InferenceResult};
    pub use super::hac::{HACOptions, long_run_covariance};
    pub use super::kernel::KernelType;
}
