//! inference::covariance — parameter covariance for least-squares fits.
//!
//! Purpose
//! -------
//! Turn the cross-product matrix `H = XᵀX / n` and, for robust inference,
//! the long-run score covariance `S` into a parameter covariance matrix:
//!
//! ```text
//! classical:  Var(β̂) = σ² (XᵀX)⁻¹
//! sandwich :  Var(β̂) = (1/n) H⁻¹ S H⁻¹
//! ```
//!
//! Key behaviors
//! -------------
//! - Inversion goes through a symmetric eigendecomposition in `nalgebra`;
//!   a relative eigenvalue below [`EIGEN_EPS`] is reported as
//!   `InferenceError::Singular` so callers can flag a degenerate design
//!   instead of producing huge standard errors.
//! - [`standard_errors`] takes square roots of the diagonal, mapping
//!   negative round-off to zero.
use crate::inference::errors::{InferenceError, InferenceResult};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

/// Eigenvalues below `EIGEN_EPS · λ_max` are treated as zero.
pub const EIGEN_EPS: f64 = 1e-10;

/// Copy an `ndarray` matrix into a column-major `DMatrix`.
fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Inverse of a symmetric positive-definite matrix.
///
/// Errors
/// ------
/// - `Singular` when the smallest eigenvalue is not positive relative to
///   the largest.
pub fn invert_symmetric(a: &Array2<f64>) -> InferenceResult<Array2<f64>> {
    let p = a.nrows();
    if p == 0 {
        return Err(InferenceError::Singular { min_eigenvalue: 0.0 });
    }
    let eigen = to_dmatrix(a).symmetric_eigen();
    let max = eigen.eigenvalues.iter().copied().fold(0.0_f64, f64::max);
    let min = eigen.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    if min.is_nan() || min <= EIGEN_EPS * max {
        return Err(InferenceError::Singular { min_eigenvalue: min });
    }
    let q = &eigen.eigenvectors;
    Ok(Array2::from_shape_fn((p, p), |(i, j)| {
        eigen.eigenvalues.iter().enumerate().map(|(k, &l)| q[(i, k)] * q[(j, k)] / l).sum()
    }))
}

/// `σ² (XᵀX)⁻¹` from the inverse cross-product.
pub fn classical_covariance(xtx_inv: &Array2<f64>, sigma2: f64) -> Array2<f64> {
    xtx_inv * sigma2
}

/// `(1/n) H⁻¹ S H⁻¹` with `H⁻¹ = n (XᵀX)⁻¹`.
///
/// `xtx_inv` is `(XᵀX)⁻¹`; `meat` is the long-run covariance of the
/// scores `x_t e_t` on the average-score scale.
pub fn sandwich_covariance(xtx_inv: &Array2<f64>, meat: &Array2<f64>, n: usize) -> Array2<f64> {
    let bread = xtx_inv * n as f64;
    bread.dot(meat).dot(&bread) / n as f64
}

/// Square roots of the diagonal; negative round-off maps to 0.
pub fn standard_errors(cov: &Array2<f64>) -> Array1<f64> {
    cov.diag().mapv(|v| v.max(0.0).sqrt())
}
