//! regression::design — lagged design matrices and standardization.
//!
//! Each predictor is a driver series shifted by its own lag: row `t` of the
//! design holds `x_j[t − lag_j]` for every predictor and is paired with the
//! response `y[t]`. Rows that would read before the start of a driver, or
//! that contain NaN anywhere, are dropped. Predictors are then
//! standardized with population moments so coefficients are comparable
//! across deposition species with very different magnitudes.
use crate::regression::errors::{RegressionError, RegressionResult};
use ndarray::{Array1, Array2, Axis};

/// Relative standard deviation below which a predictor is constant.
const SD_FLOOR: f64 = 1e-12;

/// A named driver series with the lag at which it predicts the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictor {
    pub name: String,
    pub values: Vec<f64>,
    pub lag: usize,
}

impl Predictor {
    pub fn new(name: impl Into<String>, values: Vec<f64>, lag: usize) -> Self {
        Predictor { name: name.into(), values, lag }
    }
}

/// Complete-case design matrix (without intercept column).
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    pub names: Vec<String>,
    /// `rows × p` predictor values in raw units.
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Response index of each retained row.
    pub rows: Vec<usize>,
}

impl Design {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_predictors(&self) -> usize {
        self.x.ncols()
    }
}

/// Build the lagged complete-case design for `response`.
///
/// Errors
/// ------
/// - `NoPredictors` for an empty predictor list.
/// - `LengthMismatch` when a predictor length differs from the response.
pub fn build_design(predictors: &[Predictor], response: &[f64]) -> RegressionResult<Design> {
    if predictors.is_empty() {
        return Err(RegressionError::NoPredictors);
    }
    let n = response.len();
    for p in predictors {
        if p.values.len() != n {
            return Err(RegressionError::LengthMismatch {
                name: p.name.clone(),
                expected: n,
                actual: p.values.len(),
            });
        }
    }
    let max_lag = predictors.iter().map(|p| p.lag).max().unwrap_or(0);

    let mut rows = Vec::new();
    let mut flat = Vec::new();
    let mut y = Vec::new();
    let mut buf = Vec::with_capacity(predictors.len());
    for t in max_lag..n {
        buf.clear();
        buf.extend(predictors.iter().map(|p| p.values[t - p.lag]));
        if response[t].is_finite() && buf.iter().all(|v| v.is_finite()) {
            rows.push(t);
            flat.extend_from_slice(&buf);
            y.push(response[t]);
        }
    }
    let x = Array2::from_shape_vec((rows.len(), predictors.len()), flat)
        .map_err(|e| RegressionError::Degenerate(e.to_string()))?;
    Ok(Design {
        names: predictors.iter().map(|p| p.name.clone()).collect(),
        x,
        y: Array1::from(y),
        rows,
    })
}

/// Column-standardized copy of `x` with the population means and s.d.s.
///
/// Errors
/// ------
/// - `InsufficientData` for an empty matrix.
/// - `Degenerate` naming the first constant column.
pub fn standardize(
    x: &Array2<f64>, names: &[String],
) -> RegressionResult<(Array2<f64>, Array1<f64>, Array1<f64>)> {
    let means = x
        .mean_axis(Axis(0))
        .ok_or(RegressionError::InsufficientData { rows: 0, required: 1 })?;
    let sds = x.std_axis(Axis(0), 0.0);
    for (j, (&sd, &m)) in sds.iter().zip(means.iter()).enumerate() {
        if sd.is_nan() || sd <= SD_FLOOR * m.abs().max(1.0) {
            let name = names.get(j).map_or("?", String::as_str);
            return Err(RegressionError::Degenerate(format!("predictor '{name}' is constant")));
        }
    }
    let z = (x - &means) / &sds;
    Ok((z, means, sds))
}
