//! regression::ols — multi-predictor OLS of albedo on lagged deposition.
//!
//! Purpose
//! -------
//! Estimate how several deposition species, each at its own lag, jointly
//! explain an albedo response, and report the usual goodness-of-fit and
//! diagnostic statistics.
//!
//! Key behaviors
//! -------------
//! - Predictors are standardized (population s.d.) and an intercept is
//!   added; raw-unit slopes are recovered as `β_std / sd_j` with the
//!   intercept `ȳ − Σ β_raw,j · mean_j`.
//! - Standard errors are classical `σ² (XᵀX)⁻¹` or HAC sandwich
//!   (see [`crate::inference`]); t statistics use `n − k` d.f.
//! - Reported: R², adjusted R², overall F test, log-likelihood, AIC/BIC,
//!   Durbin–Watson, VIF per predictor.
//! - Optional pairwise interaction model (products of standardized
//!   predictors) with its R² and the interactions significant at 5 %.
//!
//! Invariants & assumptions
//! ------------------------
//! - At least `p + 2` complete rows; otherwise `InsufficientData`.
//! - A constant predictor, constant response or singular design is
//!   `Degenerate`; nothing is silently dropped.
//!
//! Conventions
//! -----------
//! - `k = p + 1` counts the intercept in AIC/BIC and the residual d.f.
//! - The interaction model is best-effort: if it has too few rows or is
//!   singular it is skipped and logged at `debug`.
use crate::{
    inference::{
        covariance::{classical_covariance, invert_symmetric, sandwich_covariance, standard_errors},
        hac::{HACOptions, long_run_covariance},
    },
    regression::{
        design::{Design, Predictor, build_design, standardize},
        errors::{RegressionError, RegressionResult},
    },
};
use ndarray::{Array1, Array2, Axis};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::f64::consts::PI;
use tracing::debug;

const SIGNIFICANCE: f64 = 0.05;

/// Covariance estimator for coefficient standard errors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CovarianceKind {
    #[default]
    Classical,
    Hac(HACOptions),
}

/// Options for [`fit_regression`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegressionOptions {
    pub covariance: CovarianceKind,
    pub include_interaction: bool,
}

/// Per-predictor output.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorEstimate {
    pub name: String,
    pub lag: usize,
    /// Slope in raw units of the predictor.
    pub coefficient: f64,
    /// Slope per standard deviation of the predictor.
    pub coefficient_normalized: f64,
    /// Standard error of `coefficient`.
    pub std_error: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub vif: f64,
}

/// Summary of the pairwise interaction model.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSummary {
    pub r_squared: f64,
    /// Interaction terms (`"a*b"`) with p < 0.05.
    pub significant: Vec<String>,
}

/// RegressionFit — full OLS result.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionFit {
    pub n_obs: usize,
    pub intercept: f64,
    pub intercept_std_error: f64,
    pub intercept_p_value: f64,
    pub predictors: Vec<PredictorEstimate>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub durbin_watson: f64,
    pub residuals: Vec<f64>,
    pub covariance: CovarianceKind,
    pub interaction: Option<InteractionSummary>,
}

impl RegressionFit {
    pub fn predictor(&self, name: &str) -> Option<&PredictorEstimate> {
        self.predictors.iter().find(|p| p.name == name)
    }
}

/// Fitted coefficients on an intercept-augmented matrix.
struct Core {
    beta: Array1<f64>,
    cov: Array2<f64>,
    std_errors: Array1<f64>,
    p_values: Array1<f64>,
    residuals: Array1<f64>,
    ssr: f64,
}

/// Fit `response` on lagged `predictors`.
///
/// Errors
/// ------
/// - `NoPredictors` / `LengthMismatch` from the design builder.
/// - `InsufficientData { rows, required: p + 2 }`.
/// - `Degenerate` for constant columns, a constant response or a singular
///   design.
pub fn fit_regression(
    predictors: &[Predictor], response: &[f64], options: &RegressionOptions,
) -> RegressionResult<RegressionFit> {
    let design = build_design(predictors, response)?;
    fit_design(&design, predictors, options)
}

fn fit_design(
    design: &Design, predictors: &[Predictor], options: &RegressionOptions,
) -> RegressionResult<RegressionFit> {
    let n = design.n_rows();
    let p = design.n_predictors();
    let required = p + 2;
    if n < required {
        return Err(RegressionError::InsufficientData { rows: n, required });
    }
    let (z, means, sds) = standardize(&design.x, &design.names)?;
    let y = &design.y;
    let y_mean = y.mean().unwrap_or(0.0);
    let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    if tss <= 0.0 {
        return Err(RegressionError::Degenerate("response is constant".into()));
    }

    let core = fit_core(&with_intercept(&z), y, &options.covariance)?;
    let k = p + 1;
    let nf = n as f64;
    let df_resid = (n - k) as f64;

    let r_squared = 1.0 - core.ssr / tss;
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (nf - 1.0) / df_resid;
    let (f_statistic, f_p_value) = f_test(tss, core.ssr, p, n - k);
    let log_likelihood = -0.5 * nf * ((2.0 * PI).ln() + (core.ssr / nf).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * k as f64;
    let bic = -2.0 * log_likelihood + nf.ln() * k as f64;
    let vifs = variance_inflation(&z, &design.names)?;

    let estimates = (0..p)
        .map(|j| {
            let b = core.beta[j + 1];
            let se = core.std_errors[j + 1];
            PredictorEstimate {
                name: design.names[j].clone(),
                lag: predictors[j].lag,
                coefficient: b / sds[j],
                coefficient_normalized: b,
                std_error: se / sds[j],
                t_stat: b / se,
                p_value: core.p_values[j + 1],
                vif: vifs[j],
            }
        })
        .collect::<Vec<_>>();
    let intercept = core.beta[0]
        - estimates.iter().zip(means.iter()).map(|(e, m)| e.coefficient * m).sum::<f64>();
    let intercept_std_error = intercept_standard_error(&core.cov, &means, &sds);

    let interaction = if options.include_interaction && p > 1 {
        interaction_model(&z, y, &design.names, tss, &options.covariance)
    } else {
        None
    };

    Ok(RegressionFit {
        n_obs: n,
        intercept,
        intercept_std_error,
        intercept_p_value: t_p_value(intercept / intercept_std_error, df_resid),
        predictors: estimates,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_p_value,
        log_likelihood,
        aic,
        bic,
        durbin_watson: durbin_watson(&core.residuals),
        residuals: core.residuals.to_vec(),
        covariance: options.covariance,
        interaction,
    })
}

fn with_intercept(z: &Array2<f64>) -> Array2<f64> {
    Array2::from_shape_fn(
        (z.nrows(), z.ncols() + 1),
        |(i, j)| if j == 0 { 1.0 } else { z[[i, j - 1]] },
    )
}

fn fit_core(x: &Array2<f64>, y: &Array1<f64>, kind: &CovarianceKind) -> RegressionResult<Core> {
    let (n, k) = x.dim();
    let xtx_inv = invert_symmetric(&x.t().dot(x))
        .map_err(|e| RegressionError::Degenerate(format!("singular design: {e}")))?;
    let beta = xtx_inv.dot(&x.t().dot(y));
    let residuals = y - &x.dot(&beta);
    let ssr = residuals.dot(&residuals);
    let df = (n - k) as f64;
    let cov = parameter_covariance(x, &xtx_inv, &residuals, ssr / df, kind)?;
    let std_errors = standard_errors(&cov);
    let p_values =
        beta.iter().zip(std_errors.iter()).map(|(b, se)| t_p_value(b / se, df)).collect();
    Ok(Core { beta, cov, std_errors, p_values, residuals, ssr })
}

fn parameter_covariance(
    x: &Array2<f64>, xtx_inv: &Array2<f64>, residuals: &Array1<f64>, sigma2: f64,
    kind: &CovarianceKind,
) -> RegressionResult<Array2<f64>> {
    match kind {
        CovarianceKind::Classical => Ok(classical_covariance(xtx_inv, sigma2)),
        CovarianceKind::Hac(opts) => {
            let scores = x * &residuals.view().insert_axis(Axis(1));
            let meat = long_run_covariance(opts, &scores)?;
            Ok(sandwich_covariance(xtx_inv, &meat, x.nrows()))
        }
    }
}

/// Standard error of the raw-unit intercept `β₀ − Σ (β_j/sd_j) mean_j`.
///
/// The raw intercept is `aᵀβ` with `a = (1, −mean_1/sd_1, …)`, so its
/// variance is `aᵀ V a`.
fn intercept_standard_error(cov: &Array2<f64>, means: &Array1<f64>, sds: &Array1<f64>) -> f64 {
    let mut a = Array1::<f64>::ones(cov.nrows());
    for j in 0..means.len() {
        a[j + 1] = -means[j] / sds[j];
    }
    a.dot(&cov.dot(&a)).max(0.0).sqrt()
}

fn t_p_value(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return if t.is_nan() { f64::NAN } else { 0.0 };
    }
    StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |d| (2.0 * d.sf(t.abs())).clamp(0.0, 1.0))
}

fn f_test(tss: f64, ssr: f64, p: usize, df_resid: usize) -> (f64, f64) {
    if ssr <= 0.0 {
        return (f64::INFINITY, 0.0);
    }
    let f = ((tss - ssr) / p as f64) / (ssr / df_resid as f64);
    let p_value =
        FisherSnedecor::new(p as f64, df_resid as f64).map_or(f64::NAN, |d| d.sf(f.max(0.0)));
    (f, p_value)
}

/// `Σ (e_t − e_{t−1})² / Σ e_t²`; NaN for a perfect fit.
pub fn durbin_watson(residuals: &Array1<f64>) -> f64 {
    let ssr = residuals.dot(residuals);
    if ssr <= 0.0 {
        return f64::NAN;
    }
    let num: f64 = residuals.windows(2).into_iter().map(|w| (w[1] - w[0]).powi(2)).sum();
    num / ssr
}

/// VIF_j = `[R⁻¹]_jj` with `R` the predictor correlation matrix.
fn variance_inflation(z: &Array2<f64>, names: &[String]) -> RegressionResult<Vec<f64>> {
    let corr = z.t().dot(z) / z.nrows() as f64;
    let inv = invert_symmetric(&corr).map_err(|_| {
        RegressionError::Degenerate(format!("collinear predictors: {}", names.join(", ")))
    })?;
    Ok(inv.diag().to_vec())
}

fn interaction_model(
    z: &Array2<f64>, y: &Array1<f64>, names: &[String], tss: f64, kind: &CovarianceKind,
) -> Option<InteractionSummary> {
    let p = z.ncols();
    let mut columns: Vec<Array1<f64>> = z.columns().into_iter().map(|c| c.to_owned()).collect();
    let mut labels = Vec::new();
    for i in 0..p {
        for j in (i + 1)..p {
            columns.push(&z.column(i) * &z.column(j));
            labels.push(format!("{}*{}", names[i], names[j]));
        }
    }
    let n = z.nrows();
    let width = columns.len();
    if n < width + 2 {
        debug!(rows = n, terms = width, "skipping interaction model: too few rows");
        return None;
    }
    let x = Array2::from_shape_fn(
        (n, width + 1),
        |(r, c)| if c == 0 { 1.0 } else { columns[c - 1][r] },
    );
    match fit_core(&x, y, kind) {
        Ok(core) => Some(InteractionSummary {
            r_squared: 1.0 - core.ssr / tss,
            significant: labels
                .into_iter()
                .enumerate()
                .filter(|(m, _)| core.p_values[p + 1 + m] < SIGNIFICANCE)
                .map(|(_, label)| label)
                .collect(),
        }),
        Err(err) => {
            debug!(%err, "skipping interaction model");
            None
        }
    }
}
