//! raqdps_albedo — lagged deposition/albedo analysis for glaciers, with
//! optional Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and the `raqdps-albedo` binary,
//! and as the PyO3 bridge that exposes the correlation engine and the
//! regression to notebooks via the `_raqdps_albedo` extension module.
//!
//! Key behaviors
//! -------------
//! - Re-export the core modules, leaf first: [`data`] (loaders and typed
//!   inputs), [`spatial`] (grid sampling at glaciers), [`temporal`]
//!   (exposure windows and daily alignment), [`statistical_tests`] (lag
//!   correlation and ACF/PACF), [`inference`] (HAC covariance),
//!   [`regression`] (OLS and extreme events) and [`analysis`] (config,
//!   per-glacier pipeline, CSV export).
//! - Define `#[pyclass]` wrappers and the `#[pymodule]` initializer for the
//!   `_raqdps_albedo` extension when `python-bindings` is enabled.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs only
//!   FFI glue, argument conversion and error mapping.
//! - NaN in Python inputs marks a missing sample, exactly as in Rust.
//!
//! Conventions
//! -----------
//! - Python classes live under `_raqdps_albedo.<submodule>`; the submodules
//!   are registered in `sys.modules` so dot-notation imports work.
//! - Core errors convert to `ValueError` at the PyO3 boundary.
//!
//! Testing notes
//! -------------
//! - Numerical behavior is covered by unit tests in the inner modules and
//!   by the integration tests under `tests/`. The PyO3 layer holds no logic
//!   of its own beyond argument parsing.

pub mod analysis;
pub mod data;
pub mod inference;
pub mod regression;
pub mod spatial;
pub mod statistical_tests;
pub mod temporal;
pub mod utils;

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::{PyAny, PyDict}};

#[cfg(feature = "python-bindings")]
use std::collections::HashMap;

#[cfg(feature = "python-bindings")]
use crate::{
    regression::{
        design::Predictor,
        ols::{CovarianceKind, RegressionFit, RegressionOptions, fit_regression},
    },
    statistical_tests::{
        autocorrelation::autocorrelation,
        correlation::{CorrelationEstimate, correlate},
        lag::{LagAnalysis, LagOptions, compute_lag_analysis},
    },
    utils::{extract_direction, extract_f64_vec, extract_hac_options, extract_method},
};

/// LagCorrelation — Python-facing lag sweep between a driver and a response.
///
/// Constructed as `LagCorrelation(x, y, max_lag=10, method="pearson",
/// direction="forward", min_overlap=3)`. Undefined lags report NaN
/// coefficients and p-values and a non-`"ok"` status.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "raqdps_albedo.statistical_tests")]
pub struct LagCorrelation {
    inner: LagAnalysis,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl LagCorrelation {
    #[new]
    #[pyo3(signature = (x, y, max_lag = 10, method = None, direction = None, min_overlap = 3))]
    pub fn new<'py>(
        py: Python<'py>, x: &Bound<'py, PyAny>, y: &Bound<'py, PyAny>, max_lag: usize,
        method: Option<&str>, direction: Option<&str>, min_overlap: usize,
    ) -> PyResult<LagCorrelation> {
        let x = extract_f64_vec(py, x)?;
        let y = extract_f64_vec(py, y)?;
        let options = LagOptions { direction: extract_direction(direction)?, min_overlap };
        let inner = compute_lag_analysis(&x, &y, max_lag, extract_method(method)?, &options)?;
        Ok(LagCorrelation { inner })
    }

    #[getter]
    pub fn lags(&self) -> Vec<i64> {
        self.inner.results().iter().map(|r| r.lag).collect()
    }

    #[getter]
    pub fn coefficients(&self) -> Vec<f64> {
        self.inner.results().iter().map(|r| r.coefficient().unwrap_or(f64::NAN)).collect()
    }

    #[getter]
    pub fn p_values(&self) -> Vec<f64> {
        self.inner.results().iter().map(|r| r.p_value().unwrap_or(f64::NAN)).collect()
    }

    #[getter]
    pub fn n_obs(&self) -> Vec<usize> {
        self.inner.results().iter().map(|r| r.n_obs).collect()
    }

    /// `"ok"`, `"insufficient_overlap"` or `"zero_variance"` per lag.
    #[getter]
    pub fn status(&self) -> Vec<&'static str> {
        self.inner
            .results()
            .iter()
            .map(|r| match &r.estimate {
                CorrelationEstimate::Defined { .. } => "ok",
                CorrelationEstimate::Undefined(reason) => reason.tag(),
            })
            .collect()
    }

    #[getter]
    pub fn best_lag(&self) -> Option<i64> {
        self.inner.best_lag().map(|r| r.lag)
    }

    #[getter]
    pub fn method(&self) -> String {
        self.inner.method().to_string()
    }
}

/// `correlate(x, y, method="pearson", min_overlap=3) -> (r, p, n_obs)`;
/// `r` and `p` are `None` when undefined.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(name = "correlate", signature = (x, y, method = None, min_overlap = 3))]
fn py_correlate<'py>(
    py: Python<'py>, x: &Bound<'py, PyAny>, y: &Bound<'py, PyAny>, method: Option<&str>,
    min_overlap: usize,
) -> PyResult<(Option<f64>, Option<f64>, usize)> {
    let x = extract_f64_vec(py, x)?;
    let y = extract_f64_vec(py, y)?;
    let c = correlate(&x, &y, extract_method(method)?, min_overlap)?;
    Ok((c.estimate.coefficient(), c.estimate.p_value(), c.n_obs))
}

/// `autocorrelation(data, nlags=20) -> (lags, acf, pacf, band)`.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(name = "autocorrelation", signature = (data, nlags = 20))]
fn py_autocorrelation<'py>(
    py: Python<'py>, data: &Bound<'py, PyAny>, nlags: usize,
) -> PyResult<(Vec<usize>, Vec<f64>, Vec<f64>, f64)> {
    let data = extract_f64_vec(py, data)?;
    let a = autocorrelation(&data, nlags)?;
    Ok((a.lags, a.acf, a.pacf, a.confidence_band))
}

/// Regression — Python-facing multi-species OLS.
///
/// Constructed as `Regression(response, {"BC_dep": bc, ...}, lags=None,
/// kernel=None, bandwidth=None, center=None, small_sample_correction=None,
/// include_interaction=False)`. Predictor order follows the dict; passing a
/// `kernel` switches to HAC standard errors.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "raqdps_albedo.regression")]
pub struct Regression {
    inner: RegressionFit,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl Regression {
    #[new]
    #[pyo3(signature = (
        response, predictors, lags = None, kernel = None, bandwidth = None, center = None,
        small_sample_correction = None, include_interaction = false
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn new<'py>(
        py: Python<'py>, response: &Bound<'py, PyAny>, predictors: &Bound<'py, PyDict>,
        lags: Option<HashMap<String, usize>>, kernel: Option<&str>, bandwidth: Option<usize>,
        center: Option<bool>, small_sample_correction: Option<bool>, include_interaction: bool,
    ) -> PyResult<Regression> {
        let response = extract_f64_vec(py, response)?;
        let lags = lags.unwrap_or_default();
        let mut columns = Vec::with_capacity(predictors.len());
        for (key, value) in predictors.iter() {
            let name: String = key.extract()?;
            let lag = lags.get(&name).copied().unwrap_or(0);
            columns.push(Predictor::new(name, extract_f64_vec(py, &value)?, lag));
        }
        let covariance = extract_hac_options(kernel, bandwidth, center, small_sample_correction)?
            .map_or(CovarianceKind::Classical, CovarianceKind::Hac);
        let options = RegressionOptions { covariance, include_interaction };
        Ok(Regression { inner: fit_regression(&columns, &response, &options)? })
    }

    #[getter]
    pub fn names(&self) -> Vec<String> {
        self.inner.predictors.iter().map(|p| p.name.clone()).collect()
    }

    #[getter]
    pub fn coefficients(&self) -> Vec<f64> {
        self.inner.predictors.iter().map(|p| p.coefficient).collect()
    }

    #[getter]
    pub fn coefficients_normalized(&self) -> Vec<f64> {
        self.inner.predictors.iter().map(|p| p.coefficient_normalized).collect()
    }

    #[getter]
    pub fn std_errors(&self) -> Vec<f64> {
        self.inner.predictors.iter().map(|p| p.std_error).collect()
    }

    #[getter]
    pub fn p_values(&self) -> Vec<f64> {
        self.inner.predictors.iter().map(|p| p.p_value).collect()
    }

    #[getter]
    pub fn vifs(&self) -> Vec<f64> {
        self.inner.predictors.iter().map(|p| p.vif).collect()
    }

    #[getter]
    pub fn intercept(&self) -> f64 {
        self.inner.intercept
    }

    #[getter]
    pub fn r_squared(&self) -> f64 {
        self.inner.r_squared
    }

    #[getter]
    pub fn adj_r_squared(&self) -> f64 {
        self.inner.adj_r_squared
    }

    #[getter]
    pub fn f_p_value(&self) -> f64 {
        self.inner.f_p_value
    }

    #[getter]
    pub fn aic(&self) -> f64 {
        self.inner.aic
    }

    #[getter]
    pub fn bic(&self) -> f64 {
        self.inner.bic
    }

    #[getter]
    pub fn durbin_watson(&self) -> f64 {
        self.inner.durbin_watson
    }

    #[getter]
    pub fn n_obs(&self) -> usize {
        self.inner.n_obs
    }
}

/// Initializer of the `_raqdps_albedo` extension module.
///
/// Notes
/// -----
/// - Invoked by Python when importing the compiled extension.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _raqdps_albedo(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();

    let statistical_tests_mod = PyModule::new(py, "statistical_tests")?;
    statistical_tests_mod.add_class::<LagCorrelation>()?;
    statistical_tests_mod.add_function(wrap_pyfunction!(py_correlate, &statistical_tests_mod)?)?;
    statistical_tests_mod
        .add_function(wrap_pyfunction!(py_autocorrelation, &statistical_tests_mod)?)?;
    m.add_submodule(&statistical_tests_mod)?;

    let regression_mod = PyModule::new(py, "regression")?;
    regression_mod.add_class::<Regression>()?;
    m.add_submodule(&regression_mod)?;

    // Manually add submodules into sys.modules to allow for dot notation.
    let modules = py.import("sys")?.getattr("modules")?;
    modules.set_item("raqdps_albedo.statistical_tests", statistical_tests_mod)?;
    modules.set_item("raqdps_albedo.regression", regression_mod)?;
    Ok(())
}
