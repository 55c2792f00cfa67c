//! utils — argument conversion for the Python bindings.
//!
//! Python callers pass numpy arrays, pandas Series or plain sequences, and
//! option names as strings. These helpers turn them into the Rust types of
//! the core modules and map failures to `TypeError` / `ValueError`.
//! NaN is accepted everywhere: it marks a missing sample, as in the Rust API.
#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::PyAny,
};

#[cfg(feature = "python-bindings")]
use crate::{
    inference::{hac::HACOptions, kernel::KernelType},
    statistical_tests::{correlation::CorrelationMethod, lag::LagDirection},
};

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArrayMethods, PyReadonlyArray1};

#[cfg(feature = "python-bindings")]
const ARRAY_HINT: &str = "expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64";

#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| PyTypeError::new_err(ARRAY_HINT))?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Owned copy of a Python 1-D float sequence.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_vec<'py>(py: Python<'py>, raw_data: &Bound<'py, PyAny>) -> PyResult<Vec<f64>> {
    let arr = extract_f64_array(py, raw_data)?;
    let slice = arr.as_slice().map_err(|_| PyValueError::new_err(ARRAY_HINT))?;
    Ok(slice.to_vec())
}

#[cfg(feature = "python-bindings")]
pub fn extract_method(method: Option<&str>) -> PyResult<CorrelationMethod> {
    method.map_or(Ok(CorrelationMethod::Pearson), |m| m.parse().map_err(PyValueError::new_err))
}

#[cfg(feature = "python-bindings")]
pub fn extract_direction(direction: Option<&str>) -> PyResult<LagDirection> {
    direction.map_or(Ok(LagDirection::Forward), |d| d.parse().map_err(PyValueError::new_err))
}

/// HAC options from keyword arguments; `None` kernel means classical errors.
#[cfg(feature = "python-bindings")]
pub fn extract_hac_options(
    kernel: Option<&str>, bandwidth: Option<usize>, center: Option<bool>,
    small_sample_correction: Option<bool>,
) -> PyResult<Option<HACOptions>> {
    let Some(name) = kernel else {
        return Ok(None);
    };
    let kernel_type: KernelType = name.parse().map_err(PyValueError::new_err)?;
    let center_val = center.unwrap_or(false);
    let ssc_val = small_sample_correction.unwrap_or(true);

    Ok(Some(HACOptions::new(bandwidth, kernel_type, center_val, ssc_val)))
}
