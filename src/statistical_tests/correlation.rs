//! statistical_tests::correlation — pairwise correlation with significance.
//!
//! Purpose
//! -------
//! Estimate the association between two equally indexed samples with a
//! two-sided p-value, as the building block of the lag sweep.
//!
//! Key behaviors
//! -------------
//! - Pearson: product-moment `r`, Student-t test with `n − 2` d.f., and a
//!   95 % Fisher-z confidence interval when `n > 3`.
//! - Spearman: Pearson on average ranks (ties share their mean rank),
//!   Student-t test with `n − 2` d.f.
//! - Kendall: tau-b with the tie-corrected normal approximation for the
//!   variance of `S = concordant − discordant`.
//! - Pairs with a NaN (or ±∞) on either side are dropped first; the number
//!   of surviving pairs is reported as `n_obs`.
//!
//! Invariants & assumptions
//! ------------------------
//! - A [`CorrelationEstimate::Defined`] always carries both a coefficient
//!   in `[-1, 1]` and a p-value in `[0, 1]`; a coefficient never exists
//!   without its p-value.
//! - `|r| = 1` gives `p = 0`.
//! - Fewer than `min_overlap` pairs → `Undefined(InsufficientOverlap)`;
//!   a constant side → `Undefined(ZeroVariance)`.
//!
//! Conventions
//! -----------
//! - Sums of squares are accumulated around the sample mean in one pass
//!   after the mean is known; the variance test is relative to the sum of
//!   squares so that nearly-constant floating-point inputs are also caught.
use crate::statistical_tests::{
    errors::CorrelationResult,
    validation::{complete_pairs, validate_pair},
};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use std::{fmt, str::FromStr};

/// Two-sided 97.5 % standard-normal quantile.
const Z_975: f64 = 1.959_963_984_540_054;

/// Sum of squared deviations below this fraction of the raw sum of squares
/// is treated as zero variance.
const RELATIVE_VARIANCE_FLOOR: f64 = 1e-26;

/// Correlation estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
    Kendall,
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
            CorrelationMethod::Kendall => "kendall",
        };
        f.write_str(name)
    }
}

impl FromStr for CorrelationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            "kendall" => Ok(CorrelationMethod::Kendall),
            other => Err(format!("unknown correlation method '{other}'")),
        }
    }
}

/// Why a correlation could not be estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndefinedReason {
    InsufficientOverlap { n_obs: usize, required: usize },
    ZeroVariance,
}

impl UndefinedReason {
    /// Stable snake-case tag for tabular output.
    pub fn tag(&self) -> &'static str {
        match self {
            UndefinedReason::InsufficientOverlap { .. } => "insufficient_overlap",
            UndefinedReason::ZeroVariance => "zero_variance",
        }
    }
}

/// Outcome of one correlation estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrelationEstimate {
    Defined { coefficient: f64, p_value: f64, confidence_interval: Option<(f64, f64)> },
    Undefined(UndefinedReason),
}

impl CorrelationEstimate {
    pub fn coefficient(&self) -> Option<f64> {
        match self {
            CorrelationEstimate::Defined { coefficient, .. } => Some(*coefficient),
            CorrelationEstimate::Undefined(_) => None,
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        match self {
            CorrelationEstimate::Defined { p_value, .. } => Some(*p_value),
            CorrelationEstimate::Undefined(_) => None,
        }
    }

    pub fn confidence_interval(&self) -> Option<(f64, f64)> {
        match self {
            CorrelationEstimate::Defined { confidence_interval, .. } => *confidence_interval,
            CorrelationEstimate::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, CorrelationEstimate::Defined { .. })
    }
}

/// Correlation — estimate plus the number of pairs it used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub n_obs: usize,
    pub estimate: CorrelationEstimate,
}

/// Correlate `x` with `y` after pairwise deletion of non-finite values.
///
/// Errors
/// ------
/// - `LengthMismatch` when the slices differ in length.
/// - `InvalidMinOverlap` when `min_overlap < 3`.
pub fn correlate(
    x: &[f64], y: &[f64], method: CorrelationMethod, min_overlap: usize,
) -> CorrelationResult<Correlation> {
    validate_pair(x, y, min_overlap)?;
    Ok(estimate_pairs(x, y, method, min_overlap))
}

/// Estimate on equal-length slices that may still contain NaN.
pub(crate) fn estimate_pairs(
    x: &[f64], y: &[f64], method: CorrelationMethod, min_overlap: usize,
) -> Correlation {
    let (a, b) = complete_pairs(x, y);
    let n_obs = a.len();
    if n_obs < min_overlap {
        return Correlation {
            n_obs,
            estimate: CorrelationEstimate::Undefined(UndefinedReason::InsufficientOverlap {
                n_obs,
                required: min_overlap,
            }),
        };
    }
    let estimate = match method {
        CorrelationMethod::Pearson => pearson(&a, &b, true),
        CorrelationMethod::Spearman => pearson(&average_ranks(&a), &average_ranks(&b), false),
        CorrelationMethod::Kendall => kendall_tau_b(&a, &b),
    };
    Correlation { n_obs, estimate }
}

fn pearson(x: &[f64], y: &[f64], with_interval: bool) -> CorrelationEstimate {
    let n = x.len();
    let nf = n as f64;
    let mx = x.iter().sum::<f64>() / nf;
    let my = y.iter().sum::<f64>() / nf;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let raw_xx: f64 = x.iter().map(|v| v * v).sum();
    let raw_yy: f64 = y.iter().map(|v| v * v).sum();
    if sxx <= RELATIVE_VARIANCE_FLOOR * raw_xx || syy <= RELATIVE_VARIANCE_FLOOR * raw_yy {
        return CorrelationEstimate::Undefined(UndefinedReason::ZeroVariance);
    }
    let r = sxy / (sxx * syy).sqrt();
    if !r.is_finite() {
        return CorrelationEstimate::Undefined(UndefinedReason::ZeroVariance);
    }
    let r = r.clamp(-1.0, 1.0);
    let confidence_interval = (with_interval && n > 3).then(|| fisher_interval(r, n));
    CorrelationEstimate::Defined {
        coefficient: r,
        p_value: t_test_p_value(r, n),
        confidence_interval,
    }
}

/// Two-sided p-value of `r` under H0: ρ = 0 with `n − 2` d.f.
fn t_test_p_value(r: f64, n: usize) -> f64 {
    let df = n as f64 - 2.0;
    let one_minus_r2 = 1.0 - r * r;
    if one_minus_r2 <= 0.0 {
        return 0.0;
    }
    let t = r * (df / one_minus_r2).sqrt();
    StudentsT::new(0.0, 1.0, df)
        .map_or(f64::NAN, |dist| (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}

/// 95 % interval from the Fisher transform `z = atanh(r)`, `se = 1/√(n−3)`.
fn fisher_interval(r: f64, n: usize) -> (f64, f64) {
    let z = r.atanh();
    let half = Z_975 / (n as f64 - 3.0).sqrt();
    ((z - half).tanh(), (z + half).tanh())
}

/// Ranks starting at 1; tied values receive the mean of their ranks.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Sizes of groups of equal values.
fn tie_groups(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut groups = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end] == sorted[start] {
            end += 1;
        }
        if end - start > 1 {
            groups.push((end - start) as f64);
        }
        start = end;
    }
    groups
}

fn kendall_tau_b(x: &[f64], y: &[f64]) -> CorrelationEstimate {
    let n = x.len();
    let mut s = 0i64;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = (x[i] - x[j]).signum() * ((x[i] != x[j]) as i32 as f64);
            let dy = (y[i] - y[j]).signum() * ((y[i] != y[j]) as i32 as f64);
            let prod = dx * dy;
            if prod > 0.0 {
                s += 1;
            } else if prod < 0.0 {
                s -= 1;
            }
        }
    }

    let nf = n as f64;
    let n0 = nf * (nf - 1.0) / 2.0;
    let tx = tie_groups(x);
    let ty = tie_groups(y);
    let n1: f64 = tx.iter().map(|t| t * (t - 1.0) / 2.0).sum();
    let n2: f64 = ty.iter().map(|u| u * (u - 1.0) / 2.0).sum();
    let denom = ((n0 - n1) * (n0 - n2)).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return CorrelationEstimate::Undefined(UndefinedReason::ZeroVariance);
    }
    let tau = (s as f64 / denom).clamp(-1.0, 1.0);

    let v0 = nf * (nf - 1.0) * (2.0 * nf + 5.0);
    let vt: f64 = tx.iter().map(|t| t * (t - 1.0) * (2.0 * t + 5.0)).sum();
    let vu: f64 = ty.iter().map(|u| u * (u - 1.0) * (2.0 * u + 5.0)).sum();
    let v1 = tx.iter().map(|t| t * (t - 1.0)).sum::<f64>()
        * ty.iter().map(|u| u * (u - 1.0)).sum::<f64>();
    let v2 = tx.iter().map(|t| t * (t - 1.0) * (t - 2.0)).sum::<f64>()
        * ty.iter().map(|u| u * (u - 1.0) * (u - 2.0)).sum::<f64>();
    let var_s = (v0 - vt - vu) / 18.0
        + v1 / (2.0 * nf * (nf - 1.0))
        + v2 / (9.0 * nf * (nf - 1.0) * (nf - 2.0));
    let p_value = if var_s > 0.0 {
        let z = s as f64 / var_s.sqrt();
        Normal::new(0.0, 1.0).map_or(f64::NAN, |dist| (2.0 * dist.sf(z.abs())).clamp(0.0, 1.0))
    } else {
        f64::NAN
    };
    CorrelationEstimate::Defined { coefficient: tau, p_value, confidence_interval: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistical_tests::errors::CorrelationError;
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Pearson against a hand-computed value, perfect anti-correlation,
    //   and the Fisher interval.
    // - Spearman/Kendall on monotone data with and without ties.
    // - Undefined markers for short overlap and zero variance.
    // - Average ranks with ties.
    // -------------------------------------------------------------------------

    const TOL: f64 = 1e-12;

    #[test]
    // Purpose
    // -------
    // Pearson r matches the textbook value.
    //
    // Given
    // -----
    // - x = [1, 2, 3, 4, 5], y = [2, 4, 5, 4, 5].
    //   Sxy = 6, Sxx = 10, Syy = 6 → r = 6/√60.
    //
    // Expect
    // ------
    // - r = 0.7745966692414834; p in (0, 1); CI contains r.
    fn pearson_matches_textbook_value() {
        let c = correlate(
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[2.0, 4.0, 5.0, 4.0, 5.0],
            CorrelationMethod::Pearson,
            3,
        )
        .unwrap();

        let r = c.estimate.coefficient().unwrap();
        assert_relative_eq!(r, 6.0 / 60f64.sqrt(), epsilon = TOL);
        let p = c.estimate.p_value().unwrap();
        assert!(p > 0.0 && p < 1.0);
        let (lo, hi) = c.estimate.confidence_interval().unwrap();
        assert!(lo < r && r < hi);
    }

    #[test]
    // Purpose
    // -------
    // The Student-t p-value matches a reference value.
    //
    // Given
    // -----
    // - Same data: r = 0.7746, n = 5, t = r √(3 / (1 − r²)) = 2.3238.
    //
    // Expect
    // ------
    // - Two-sided p ≈ 0.1240 (scipy.stats.pearsonr).
    fn pearson_p_value_matches_reference() {
        let c = correlate(
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[2.0, 4.0, 5.0, 4.0, 5.0],
            CorrelationMethod::Pearson,
            3,
        )
        .unwrap();

        assert_relative_eq!(c.estimate.p_value().unwrap(), 0.1240, epsilon = 5e-4);
    }

    #[test]
    // Purpose
    // -------
    // Perfectly reversed data give r = −1 and p = 0.
    //
    // Given
    // -----
    // - x = [1..5], y = [5..1].
    //
    // Expect
    // ------
    // - r = −1, p ≈ 0, degenerate CI at −1.
    fn reversed_sequence_is_perfectly_anticorrelated() {
        let c = correlate(
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[5.0, 4.0, 3.0, 2.0, 1.0],
            CorrelationMethod::Pearson,
            3,
        )
        .unwrap();

        assert_relative_eq!(c.estimate.coefficient().unwrap(), -1.0, epsilon = TOL);
        assert!(c.estimate.p_value().unwrap() < 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // A constant side is flagged as zero variance, not NaN.
    //
    // Given
    // -----
    // - x = [3, 3, 3, 3], y = [1, 2, 3, 4].
    //
    // Expect
    // ------
    // - `Undefined(ZeroVariance)` for all three methods.
    fn constant_input_is_zero_variance() {
        for method in
            [CorrelationMethod::Pearson, CorrelationMethod::Spearman, CorrelationMethod::Kendall]
        {
            let c = correlate(&[3.0; 4], &[1.0, 2.0, 3.0, 4.0], method, 3).unwrap();

            assert_eq!(
                c.estimate,
                CorrelationEstimate::Undefined(UndefinedReason::ZeroVariance),
                "method {method}"
            );
        }
    }

    #[test]
    // Purpose
    // -------
    // Fewer finite pairs than `min_overlap` is undefined, with the count.
    //
    // Given
    // -----
    // - 4 pairs, two holding NaN; min_overlap = 3.
    //
    // Expect
    // ------
    // - n_obs = 2 and `InsufficientOverlap { n_obs: 2, required: 3 }`.
    fn short_overlap_is_undefined() {
        let c = correlate(
            &[1.0, f64::NAN, 3.0, 4.0],
            &[1.0, 2.0, f64::NAN, 4.0],
            CorrelationMethod::Pearson,
            3,
        )
        .unwrap();

        assert_eq!(c.n_obs, 2);
        assert_eq!(
            c.estimate,
            CorrelationEstimate::Undefined(UndefinedReason::InsufficientOverlap {
                n_obs: 2,
                required: 3
            })
        );
    }

    #[test]
    // Purpose
    // -------
    // Rank methods see a monotone but non-linear relation as perfect.
    //
    // Given
    // -----
    // - x = [1..6], y = x³.
    //
    // Expect
    // ------
    // - Spearman ρ = 1, Kendall τ = 1.
    fn rank_methods_detect_monotone_relation() {
        let x: Vec<f64> = (1..=6).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| v.powi(3)).collect();

        let rho = correlate(&x, &y, CorrelationMethod::Spearman, 3).unwrap();
        let tau = correlate(&x, &y, CorrelationMethod::Kendall, 3).unwrap();

        assert_relative_eq!(rho.estimate.coefficient().unwrap(), 1.0, epsilon = TOL);
        assert_relative_eq!(tau.estimate.coefficient().unwrap(), 1.0, epsilon = TOL);
        assert!(tau.estimate.p_value().unwrap() < 0.05);
    }

    #[test]
    // Purpose
    // -------
    // Tau-b corrects for ties in one variable.
    //
    // Given
    // -----
    // - x = [1, 2, 2, 3], y = [1, 2, 3, 4].
    //   S = 5, n0 = 6, n1 = 1, n2 = 0 → τb = 5/√30.
    //
    // Expect
    // ------
    // - τb = 0.9128709291752769.
    fn kendall_tau_b_with_ties() {
        let c =
            correlate(&[1.0, 2.0, 2.0, 3.0], &[1.0, 2.0, 3.0, 4.0], CorrelationMethod::Kendall, 3)
                .unwrap();

        assert_relative_eq!(c.estimate.coefficient().unwrap(), 5.0 / 30f64.sqrt(), epsilon = TOL);
    }

    #[test]
    // Purpose
    // -------
    // Tied values share the mean of their ranks.
    //
    // Given
    // -----
    // - [10, 20, 20, 5].
    //
    // Expect
    // ------
    // - [2, 3.5, 3.5, 1].
    fn average_ranks_share_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    // Purpose
    // -------
    // Length mismatches are call errors.
    //
    // Given
    // -----
    // - x of length 3, y of length 4.
    //
    // Expect
    // ------
    // - `LengthMismatch`.
    fn correlate_rejects_length_mismatch() {
        let err = correlate(&[1.0; 3], &[1.0; 4], CorrelationMethod::Pearson, 3).unwrap_err();

        assert_eq!(err, CorrelationError::LengthMismatch { x: 3, y: 4 });
    }
}
