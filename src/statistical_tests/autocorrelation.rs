//! statistical_tests::autocorrelation — ACF/PACF diagnostics for one series.
//!
//! Persistence in the albedo or deposition series inflates lag
//! correlations; these diagnostics make it visible before results are
//! interpreted. Non-finite samples are dropped first, the sample
//! autocovariance uses the biased `1/n` normalization, and the partial
//! autocorrelations come from the Durbin–Levinson recursion.
use crate::statistical_tests::errors::{CorrelationError, CorrelationResult};

const MIN_SERIES_LEN: usize = 3;
const DENOM_EPS: f64 = 1e-12;

/// Autocorrelation — ACF, PACF and the white-noise band.
///
/// `acf[k]`/`pacf[k]` belong to `lags[k] = k`; index 0 is always 1. Entries
/// after a numerically singular Durbin–Levinson step are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Autocorrelation {
    pub lags: Vec<usize>,
    pub acf: Vec<f64>,
    pub pacf: Vec<f64>,
    /// Half-width `1.96/√n` of the approximate 95 % band under white noise.
    pub confidence_band: f64,
    pub n_obs: usize,
}

/// ACF and PACF of `series` up to `nlags`.
///
/// When `nlags ≥ n` the request is reduced to `max(n/4, 1)`.
///
/// Errors
/// ------
/// - `InsufficientData` for fewer than three finite samples.
/// - `ZeroVariance` for a constant series.
pub fn autocorrelation(series: &[f64], nlags: usize) -> CorrelationResult<Autocorrelation> {
    let x: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let n = x.len();
    if n < MIN_SERIES_LEN {
        return Err(CorrelationError::InsufficientData { n, required: MIN_SERIES_LEN });
    }
    let nlags = if nlags >= n { (n / 4).max(1) } else { nlags };

    let mean = x.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = x.iter().map(|v| v - mean).collect();
    let autocov = |k: usize| -> f64 {
        centered[..n - k].iter().zip(&centered[k..]).map(|(a, b)| a * b).sum::<f64>() / n as f64
    };
    let c0 = autocov(0);
    let mean_square = x.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if c0 <= DENOM_EPS * mean_square {
        return Err(CorrelationError::ZeroVariance);
    }
    let acf: Vec<f64> = (0..=nlags).map(|k| autocov(k) / c0).collect();

    Ok(Autocorrelation {
        lags: (0..=nlags).collect(),
        pacf: durbin_levinson(&acf),
        acf,
        confidence_band: 1.96 / (n as f64).sqrt(),
        n_obs: n,
    })
}

fn durbin_levinson(acf: &[f64]) -> Vec<f64> {
    let nlags = acf.len() - 1;
    let mut pacf = vec![f64::NAN; nlags + 1];
    pacf[0] = 1.0;
    if nlags == 0 {
        return pacf;
    }
    let mut phi = vec![acf[1]];
    pacf[1] = acf[1];
    for k in 2..=nlags {
        let num: f64 = acf[k] - (1..k).map(|j| phi[j - 1] * acf[k - j]).sum::<f64>();
        let den: f64 = 1.0 - (1..k).map(|j| phi[j - 1] * acf[j]).sum::<f64>();
        if den.abs() < DENOM_EPS {
            break;
        }
        let phi_kk = num / den;
        let mut next: Vec<f64> = (1..k).map(|j| phi[j - 1] - phi_kk * phi[k - j - 1]).collect();
        next.push(phi_kk);
        phi = next;
        pacf[k] = phi_kk;
    }
    pacf
}
