//! regression — multi-species OLS and extreme-event impact analysis.
//!
//! Purpose
//! -------
//! Explain albedo change from several deposition species at once, each at
//! its own lag, and measure how albedo responds around extreme deposition
//! episodes.
//!
//! Key behaviors
//! -------------
//! - [`build_design`] aligns lagged predictors with the response and drops
//!   incomplete rows; [`standardize`] puts predictors on a common scale.
//! - [`fit_regression`] fits OLS on standardized predictors and reports
//!   raw and normalized coefficients, classical or HAC standard errors,
//!   VIFs, information criteria, Durbin–Watson, and an optional pairwise
//!   interaction model.
//! - [`detect_extreme_events`], [`extreme_statistics`] and
//!   [`impact_around`] summarize exceedances of a percentile threshold and
//!   the mean response before and after each one.
//!
//! Invariants & assumptions
//! ------------------------
//! - A fit needs at least `p + 2` complete rows.
//! - Percentiles use linear interpolation between order statistics.
//!
//! Testing notes
//! -------------
//! - [`ols`] recovers known coefficients from noiseless and noisy data;
//!   [`extreme`] checks thresholds, run lengths, and window means by hand.

pub mod design;
pub mod errors;
pub mod extreme;
pub mod ols;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::design::{Design, Predictor, build_design, standardize};
pub use self::errors::{RegressionError, RegressionResult};
pub use self::extreme::{
    EventImpact, EventWindows, ExceedanceLevel, ExtremeEvent, ExtremeEventReport,
    ExtremeStatistics, detect_extreme_events, extreme_statistics, impact_around, percentile,
};
pub use self::ols::{
    CovarianceKind, InteractionSummary, PredictorEstimate, RegressionFit, RegressionOptions,
    durbin_watson, fit_regression,
};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::design::Predictor;
    pub use super::errors::{RegressionError, RegressionResult};
    pub use super::extreme::{EventWindows, detect_extreme_events};
    pub use super::ols::{CovarianceKind, RegressionOptions, fit_regression};
}
