//! statistical_tests — correlation engine and serial-dependence diagnostics.
//!
//! Purpose
//! -------
//! Quantify the association between a deposition driver and an albedo
//! response: single-pair correlations, full lag sweeps, and ACF/PACF
//! diagnostics for the persistence that inflates lagged correlations.
//!
//! Key behaviors
//! -------------
//! - [`correlate`] estimates Pearson, Spearman, or Kendall tau-b with a
//!   two-sided p-value (and a Fisher-z interval for Pearson).
//! - [`compute_lag_analysis`] evaluates every lag of a forward or
//!   symmetric range in parallel and returns a [`LagAnalysis`] ordered by
//!   lag, with [`LagAnalysis::best_lag`] picking the strongest lag.
//! - [`autocorrelation`] reports ACF, PACF, and the white-noise band.
//! - Input guards live in [`validate_pair`]; errors are
//!   [`CorrelationError`] behind [`CorrelationResult`], convertible to
//!   Python `ValueError` when `python-bindings` is enabled.
//!
//! Invariants & assumptions
//! ------------------------
//! - Errors signal malformed calls only. A lag that cannot be estimated
//!   carries an [`UndefinedReason`] and the sweep continues.
//! - NaN marks a missing sample and is removed by pairwise deletion inside
//!   each lag, never by the caller.
//! - Every entry point is a pure function of its inputs.
//!
//! Conventions
//! -----------
//! - Positive lags mean the driver leads the response.
//! - Message text is phrased as domain constraints ("min_overlap must be
//!   ≥ 3").
//!
//! Downstream usage
//! ----------------
//! - Typical Rust code imports the main surface as:
//!
//!   ```rust,ignore
//!   use raqdps_albedo::statistical_tests::prelude::*;
//!
//!   let sweep = compute_lag_analysis(&bc, &albedo_change, 10,
//!       CorrelationMethod::Pearson, &LagOptions::default())?;
//!   let best = sweep.best_lag();
//!   ```
//!
//! Testing notes
//! -------------
//! - [`errors`] and [`validation`] test message payloads and guard
//!   branches; [`correlation`] checks hand-computed coefficients and
//!   p-values; [`lag`] covers ordering, idempotence, pairing direction and
//!   the tie rule; [`autocorrelation`] checks closed-form ACF values.

pub mod autocorrelation;
pub mod correlation;
pub mod errors;
pub mod lag;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::autocorrelation::{Autocorrelation, autocorrelation};
pub use self::correlation::{
    Correlation, CorrelationEstimate, CorrelationMethod, UndefinedReason, correlate,
};
pub use self::errors::{CorrelationError, CorrelationResult};
pub use self::lag::{LagAnalysis, LagDirection, LagOptions, LagResult, compute_lag_analysis};
pub use self::validation::validate_pair;

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::correlation::{CorrelationEstimate, CorrelationMethod, correlate};
    pub use super::errors::{CorrelationError, CorrelationResult};
    pub use super::lag::{LagAnalysis, LagDirection, LagOptions, compute_lag_analysis};
}
