//! inference::hac — long-run covariance of regression scores.
//!
//! Purpose
//! -------
//! Build the HAC (Heteroskedasticity & Autocorrelation Consistent) "meat"
//! of an OLS sandwich from the per-observation scores `x_t e_t`:
//!
//! ```text
//! S  =  Γ₀  +  ∑_{k=1}^{L} w_k ( Γ_k + Γ_kᵀ ),
//! Γ₀ = (1/n) Uᵀ U,
//! Γ_k = c_k · U_{k:}ᵀ U_{:n−k},
//! ```
//!
//! with `U` the `n×p` score matrix, `w_k = kernel.weight(k/(L+1))`, and
//! `c_k = 1/(n−k)` (small-sample correction) or `1/n`.
//!
//! Key behaviors
//! -------------
//! - [`HACOptions`] selects kernel, bandwidth (fixed or plug-in),
//!   centering, and the small-sample policy; it deserializes from the
//!   `regression.covariance` block of the analysis configuration.
//! - [`long_run_covariance`] returns a symmetric `p×p` matrix on the
//!   average-score scale.
//!
//! Invariants & assumptions
//! ------------------------
//! - The effective bandwidth is truncated to `n − 1`.
//! - Centering, when enabled, is applied once and both the plug-in
//!   bandwidth and the aggregation see the centered scores.
//! - With `L = 0` the estimate is the White (IID outer-product) matrix.
//!
//! Testing notes
//! -------------
//! - Unit tests compare against a hand-rolled Bartlett/Newey–West sum,
//!   the `L = 0` outer product, and check symmetry and centering.
use crate::inference::{
    errors::{InferenceError, InferenceResult},
    kernel::KernelType,
};
use ndarray::{Array2, Axis, s};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// HACOptions — configuration for the long-run score covariance.
///
/// Fields
/// ------
/// - `kernel`: taper family for `w_k`.
/// - `bandwidth`: fixed `L` (truncated to `n − 1`) or `None` for the
///   Andrews plug-in.
/// - `center`: demean score columns first.
/// - `small_sample_correction`: `c_k = 1/(n−k)` instead of `1/n`.
///
/// Defaults: Bartlett, plug-in bandwidth, no centering, correction on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HACOptions {
    pub kernel: KernelType,
    pub bandwidth: Option<usize>,
    pub center: bool,
    pub small_sample_correction: bool,
}

impl HACOptions {
    pub fn new(
        bandwidth: Option<usize>, kernel: KernelType, center: bool, small_sample_correction: bool,
    ) -> HACOptions {
        HACOptions { bandwidth, kernel, center, small_sample_correction }
    }

    /// Bandwidth actually used for `n` observations of `scores`.
    pub fn effective_bandwidth(&self, scores: &Array2<f64>) -> usize {
        let n = scores.nrows();
        let wanted = self.bandwidth.unwrap_or_else(|| self.kernel.optimal_bandwidth(scores));
        wanted.min(n.saturating_sub(1))
    }
}

impl Default for HACOptions {
    fn default() -> Self {
        HACOptions {
            kernel: KernelType::Bartlett,
            bandwidth: None,
            center: false,
            small_sample_correction: true,
        }
    }
}

/// Long-run `p×p` covariance of the rows of `scores` (average-score scale).
///
/// Errors
/// ------
/// - `InsufficientData` when `scores` has no rows.
pub fn long_run_covariance(
    opts: &HACOptions, scores: &Array2<f64>,
) -> InferenceResult<Array2<f64>> {
    let n = scores.nrows();
    let scores: Cow<'_, Array2<f64>> = if opts.center {
        let means = scores
            .mean_axis(Axis(0))
            .ok_or(InferenceError::InsufficientData { n, required: 1 })?;
        Cow::Owned(scores - &means)
    } else if n == 0 {
        return Err(InferenceError::InsufficientData { n, required: 1 });
    } else {
        Cow::Borrowed(scores)
    };

    let bandwidth = opts.effective_bandwidth(&scores);
    let mut acc = Array2::<f64>::zeros((scores.ncols(), scores.ncols()));
    for lag in 0..=bandwidth {
        add_lag_term(&mut acc, &scores, lag, bandwidth, opts);
    }
    Ok(acc)
}

fn add_lag_term(
    acc: &mut Array2<f64>, scores: &Array2<f64>, lag: usize, bandwidth: usize, opts: &HACOptions,
) {
    let n = scores.nrows();
    if lag == 0 {
        acc.scaled_add(1.0 / n as f64, &scores.t().dot(scores));
        return;
    }
    let weight = opts.kernel.weight(lag as f64 / (bandwidth + 1) as f64);
    let scale = if opts.small_sample_correction { 1.0 / (n - lag) as f64 } else { 1.0 / n as f64 };
    let gamma = scores.slice(s![lag.., ..]).t().dot(&scores.slice(s![..n - lag, ..])) * scale;
    acc.scaled_add(weight, &gamma);
    acc.scaled_add(weight, &gamma.t());
}
