//! statistical_tests::validation — shared input guards for the lag engine.
//!
//! Checks are cheap and run once per call, before any lag is evaluated.
//! NaN values are *not* rejected here: NaN marks a missing sample and is
//! handled by pairwise deletion inside each lag.
use crate::statistical_tests::errors::{CorrelationError, CorrelationResult, MIN_OVERLAP_FLOOR};

/// Validate a driver/response pair and the minimum overlap.
///
/// Errors
/// ------
/// - `CorrelationError::LengthMismatch` when `x.len() != y.len()`.
/// - `CorrelationError::InvalidMinOverlap` when `min_overlap < 3`.
pub fn validate_pair(x: &[f64], y: &[f64], min_overlap: usize) -> CorrelationResult<()> {
    if x.len() != y.len() {
        return Err(CorrelationError::LengthMismatch { x: x.len(), y: y.len() });
    }
    if min_overlap < MIN_OVERLAP_FLOOR {
        return Err(CorrelationError::InvalidMinOverlap(min_overlap));
    }
    Ok(())
}

/// Pairs where both sides are finite, as two parallel vectors.
pub fn complete_pairs(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    x.iter().zip(y).filter(|(a, b)| a.is_finite() && b.is_finite()).map(|(a, b)| (*a, *b)).unzip()
}
