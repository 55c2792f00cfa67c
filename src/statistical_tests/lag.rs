//! statistical_tests::lag — lagged correlation sweep between two series.
//!
//! Purpose
//! -------
//! Find the time offset at which a deposition driver is most strongly
//! associated with an albedo response by correlating the two series at
//! every lag in a configured range.
//!
//! Key behaviors
//! -------------
//! - Lag `k ≥ 0` pairs `x[t]` with `y[t + k]` (the driver leads the
//!   response); `k < 0` pairs `x[t + |k|]` with `y[t]`.
//! - [`LagDirection::Forward`] evaluates `0..=max_lag`;
//!   [`LagDirection::Symmetric`] evaluates `-max_lag..=max_lag`.
//! - Each lag is estimated independently and in parallel (`rayon`); the
//!   collected results keep ascending lag order.
//! - [`LagAnalysis::best_lag`] picks the defined lag with the largest
//!   `|coefficient|`.
//!
//! Invariants & assumptions
//! ------------------------
//! - One result per lag, lags strictly ascending and distinct.
//! - Identical inputs always give identical outputs: no randomness, and the
//!   parallel map only changes scheduling, not arithmetic.
//! - Lags whose overlap exceeds the series length simply have zero pairs
//!   and are marked `InsufficientOverlap`.
//!
//! Conventions
//! -----------
//! - Ties in `|coefficient|` (within `1e-12`) resolve to the smaller
//!   `|lag|`, then to the non-negative lag.
//!
//! Testing notes
//! -------------
//! - Unit tests cover range/ordering, idempotence, pairing direction on a
//!   shifted signal, undefined markers, and the tie rule.
use crate::statistical_tests::{
    correlation::{CorrelationEstimate, CorrelationMethod, estimate_pairs},
    errors::{CorrelationResult, MIN_OVERLAP_FLOOR},
    validation::validate_pair,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const TIE_TOL: f64 = 1e-12;

/// Range of lags evaluated by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LagDirection {
    /// `0..=max_lag`: deposition precedes the albedo response.
    #[default]
    Forward,
    /// `-max_lag..=max_lag`.
    Symmetric,
}

impl LagDirection {
    pub fn lags(&self, max_lag: usize) -> Vec<i64> {
        let m = max_lag as i64;
        match self {
            LagDirection::Forward => (0..=m).collect(),
            LagDirection::Symmetric => (-m..=m).collect(),
        }
    }
}

impl FromStr for LagDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(LagDirection::Forward),
            "symmetric" | "both" => Ok(LagDirection::Symmetric),
            other => Err(format!("unknown lag direction '{other}'")),
        }
    }
}

/// LagOptions — sweep configuration besides the method and range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagOptions {
    pub direction: LagDirection,
    pub min_overlap: usize,
}

impl Default for LagOptions {
    fn default() -> Self {
        LagOptions { direction: LagDirection::Forward, min_overlap: MIN_OVERLAP_FLOOR }
    }
}

/// Correlation at one lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagResult {
    pub lag: i64,
    pub n_obs: usize,
    pub estimate: CorrelationEstimate,
}

impl LagResult {
    pub fn coefficient(&self) -> Option<f64> {
        self.estimate.coefficient()
    }

    pub fn p_value(&self) -> Option<f64> {
        self.estimate.p_value()
    }
}

/// LagAnalysis — full lag sweep, ordered by lag.
#[derive(Debug, Clone, PartialEq)]
pub struct LagAnalysis {
    method: CorrelationMethod,
    direction: LagDirection,
    results: Vec<LagResult>,
}

impl LagAnalysis {
    pub fn method(&self) -> CorrelationMethod {
        self.method
    }

    pub fn direction(&self) -> LagDirection {
        self.direction
    }

    pub fn results(&self) -> &[LagResult] {
        &self.results
    }

    pub fn get(&self, lag: i64) -> Option<&LagResult> {
        self.results.binary_search_by_key(&lag, |r| r.lag).ok().map(|i| &self.results[i])
    }

    /// Lag with the largest absolute defined coefficient.
    ///
    /// Returns `None` when no lag is defined.
    pub fn best_lag(&self) -> Option<&LagResult> {
        let mut best: Option<(&LagResult, f64)> = None;
        for r in &self.results {
            let Some(c) = r.coefficient() else { continue };
            let strength = c.abs();
            best = match best {
                None => Some((r, strength)),
                Some((cur, cur_strength)) => {
                    if strength > cur_strength + TIE_TOL
                        || ((strength - cur_strength).abs() <= TIE_TOL && preferred(r.lag, cur.lag))
                    {
                        Some((r, strength))
                    } else {
                        Some((cur, cur_strength))
                    }
                }
            };
        }
        best.map(|(r, _)| r)
    }
}

/// Whether `candidate` wins a tie against `current`.
fn preferred(candidate: i64, current: i64) -> bool {
    (candidate.unsigned_abs(), candidate < 0) < (current.unsigned_abs(), current < 0)
}

/// Overlapping slices of `x` and `y` at `lag`; empty when `|lag| ≥ n`.
pub fn lagged_pair<'a>(x: &'a [f64], y: &'a [f64], lag: i64) -> (&'a [f64], &'a [f64]) {
    let n = x.len().min(y.len());
    let k = lag.unsigned_abs() as usize;
    if k >= n {
        return (&[], &[]);
    }
    if lag >= 0 { (&x[..n - k], &y[k..n]) } else { (&x[k..n], &y[..n - k]) }
}

/// Correlate `x` with `y` across the lag range set by `options.direction`.
///
/// Parameters
/// ----------
/// - `x`: driver (e.g. daily BC deposition).
/// - `y`: response (e.g. daily albedo change), same length as `x`.
/// - `max_lag`: largest absolute lag, in samples.
/// - `method`: correlation estimator.
/// - `options`: direction and minimum overlap.
///
/// Errors
/// ------
/// - `LengthMismatch` when the series lengths differ.
/// - `InvalidMinOverlap` when `options.min_overlap < 3`.
pub fn compute_lag_analysis(
    x: &[f64], y: &[f64], max_lag: usize, method: CorrelationMethod, options: &LagOptions,
) -> CorrelationResult<LagAnalysis> {
    validate_pair(x, y, options.min_overlap)?;
    let results = options
        .direction
        .lags(max_lag)
        .into_par_iter()
        .map(|lag| {
            let (a, b) = lagged_pair(x, y, lag);
            let c = estimate_pairs(a, b, method, options.min_overlap);
            LagResult { lag, n_obs: c.n_obs, estimate: c.estimate }
        })
        .collect();
    Ok(LagAnalysis { method, direction: options.direction, results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistical_tests::correlation::{UndefinedReason, correlate};
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Lag range and ordering for both directions.
    // - Pairing direction: a response that trails the driver by k samples
    //   peaks at lag +k.
    // - Idempotence and agreement with `correlate` at lag 0.
    // - Undefined markers for lags that exhaust the overlap.
    // - The best-lag tie rule.
    // -------------------------------------------------------------------------

    fn driver() -> Vec<f64> {
        vec![0.1, 2.0, 0.3, 0.2, 3.5, 0.4, 0.1, 1.8, 0.2, 0.6, 2.9, 0.3, 0.1, 0.9, 0.2]
    }

    fn delayed(x: &[f64], k: usize) -> Vec<f64> {
        (0..x.len()).map(|t| if t >= k { -0.5 * x[t - k] } else { 0.0 }).collect()
    }

    #[test]
    // Purpose
    // -------
    // Forward and symmetric sweeps have the documented length and order.
    //
    // Given
    // -----
    // - 15 samples, max_lag = 4.
    //
    // Expect
    // ------
    // - Forward: lags 0..=4 (5 results). Symmetric: -4..=4 (9 results).
    fn sweep_length_and_order() {
        let x = driver();
        let y = delayed(&x, 2);

        let fwd =
            compute_lag_analysis(&x, &y, 4, CorrelationMethod::Pearson, &LagOptions::default())
                .unwrap();
        let sym = compute_lag_analysis(
            &x,
            &y,
            4,
            CorrelationMethod::Pearson,
            &LagOptions { direction: LagDirection::Symmetric, ..LagOptions::default() },
        )
        .unwrap();

        let fwd_lags: Vec<i64> = fwd.results().iter().map(|r| r.lag).collect();
        let sym_lags: Vec<i64> = sym.results().iter().map(|r| r.lag).collect();
        assert_eq!(fwd_lags, (0..=4).collect::<Vec<_>>());
        assert_eq!(sym_lags, (-4..=4).collect::<Vec<_>>());
    }

    #[test]
    // Purpose
    // -------
    // A response delayed by two samples is recovered at lag +2.
    //
    // Given
    // -----
    // - y[t] = −0.5 · x[t − 2].
    //
    // Expect
    // ------
    // - best_lag = 2 with coefficient −1 and n_obs = n − 2.
    fn delayed_response_peaks_at_its_lag() {
        let x = driver();
        let y = delayed(&x, 2);

        let analysis = compute_lag_analysis(
            &x,
            &y,
            5,
            CorrelationMethod::Pearson,
            &LagOptions { direction: LagDirection::Symmetric, ..LagOptions::default() },
        )
        .unwrap();
        let best = analysis.best_lag().unwrap();

        assert_eq!(best.lag, 2);
        assert_eq!(best.n_obs, x.len() - 2);
        assert_relative_eq!(best.coefficient().unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Repeated sweeps on the same input are identical.
    //
    // Given
    // -----
    // - The same driver/response and options twice, Kendall.
    //
    // Expect
    // ------
    // - Equal `LagAnalysis` values.
    fn sweep_is_idempotent() {
        let x = driver();
        let y = delayed(&x, 1);
        let opts = LagOptions { direction: LagDirection::Symmetric, ..LagOptions::default() };

        let a = compute_lag_analysis(&x, &y, 6, CorrelationMethod::Kendall, &opts).unwrap();
        let b = compute_lag_analysis(&x, &y, 6, CorrelationMethod::Kendall, &opts).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    // Purpose
    // -------
    // Lag 0 agrees exactly with the single-pair API.
    //
    // Given
    // -----
    // - Driver and a noisy response; Spearman.
    //
    // Expect
    // ------
    // - Same coefficient and p-value as `correlate`.
    fn lag_zero_matches_correlate() {
        let x = driver();
        let y: Vec<f64> = x.iter().enumerate().map(|(i, v)| v + (i % 3) as f64 * 0.4).collect();

        let sweep =
            compute_lag_analysis(&x, &y, 2, CorrelationMethod::Spearman, &LagOptions::default())
                .unwrap();
        let single = correlate(&x, &y, CorrelationMethod::Spearman, 3).unwrap();

        assert_eq!(sweep.get(0).unwrap().estimate, single.estimate);
    }

    #[test]
    // Purpose
    // -------
    // Lags leaving fewer than `min_overlap` pairs are undefined, not errors.
    //
    // Given
    // -----
    // - 5 samples, max_lag = 4, min_overlap = 3.
    //
    // Expect
    // ------
    // - Lags 0..=2 defined; lag 3 has 2 pairs and lag 4 has 1, both
    //   `InsufficientOverlap`.
    fn short_overlap_lags_are_undefined() {
        let x = [1.0, 3.0, 2.0, 5.0, 4.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0];

        let analysis =
            compute_lag_analysis(&x, &y, 4, CorrelationMethod::Pearson, &LagOptions::default())
                .unwrap();

        for lag in 0..=2 {
            assert!(analysis.get(lag).unwrap().estimate.is_defined(), "lag {lag}");
        }
        assert_eq!(
            analysis.get(3).unwrap().estimate,
            CorrelationEstimate::Undefined(UndefinedReason::InsufficientOverlap {
                n_obs: 2,
                required: 3
            })
        );
        assert_eq!(analysis.get(4).unwrap().n_obs, 1);
    }

    #[test]
    // Purpose
    // -------
    // Lags beyond the series length produce empty overlaps.
    //
    // Given
    // -----
    // - 3 samples, lag ±5.
    //
    // Expect
    // ------
    // - Both slices empty.
    fn lagged_pair_beyond_length_is_empty() {
        let x = [1.0, 2.0, 3.0];

        let (a, b) = lagged_pair(&x, &x, 5);
        let (c, d) = lagged_pair(&x, &x, -5);

        assert!(a.is_empty() && b.is_empty() && c.is_empty() && d.is_empty());
    }

    #[test]
    // Purpose
    // -------
    // Negative lags pair the later driver with the earlier response.
    //
    // Given
    // -----
    // - x = [1, 2, 3, 4], y = [10, 20, 30, 40], lag −1.
    //
    // Expect
    // ------
    // - ([2, 3, 4], [10, 20, 30]).
    fn negative_lag_pairs_driver_after_response() {
        let (a, b) = lagged_pair(&[1.0, 2.0, 3.0, 4.0], &[10.0, 20.0, 30.0, 40.0], -1);

        assert_eq!(a, &[2.0, 3.0, 4.0]);
        assert_eq!(b, &[10.0, 20.0, 30.0]);
    }

    #[test]
    // Purpose
    // -------
    // Equal strengths resolve to the smallest |lag|, then the positive lag.
    //
    // Given
    // -----
    // - Hand-built results with |r| = 0.8 at lags −1, 1 and 3.
    //
    // Expect
    // ------
    // - best_lag = +1.
    fn best_lag_breaks_ties_towards_small_nonnegative_lag() {
        let defined = |c: f64| CorrelationEstimate::Defined {
            coefficient: c,
            p_value: 0.01,
            confidence_interval: None,
        };
        let analysis = LagAnalysis {
            method: CorrelationMethod::Pearson,
            direction: LagDirection::Symmetric,
            results: vec![
                LagResult { lag: -1, n_obs: 10, estimate: defined(-0.8) },
                LagResult { lag: 0, n_obs: 10, estimate: defined(0.2) },
                LagResult { lag: 1, n_obs: 10, estimate: defined(0.8) },
                LagResult { lag: 3, n_obs: 10, estimate: defined(0.8) },
            ],
        };

        assert_eq!(analysis.best_lag().unwrap().lag, 1);
    }

    #[test]
    // Purpose
    // -------
    // A sweep with no defined lag has no best lag.
    //
    // Given
    // -----
    // - Constant driver.
    //
    // Expect
    // ------
    // - `best_lag()` is `None`.
    fn best_lag_none_when_all_undefined() {
        let analysis = compute_lag_analysis(
            &[2.0; 8],
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            2,
            CorrelationMethod::Pearson,
            &LagOptions::default(),
        )
        .unwrap();

        assert!(analysis.best_lag().is_none());
    }
}
