//! temporal::errors — failures of window aggregation and resampling.
//!
//! Aggregation routines reject empty inputs and malformed windows up front;
//! NaN samples are not errors and propagate through sums and means.

pub type AggregationResult<T> = Result<T, AggregationError>;

/// AggregationError — invalid inputs to temporal aggregation.
///
/// Variants
/// --------
/// - `EmptyInput`
///   The series has no samples.
/// - `InvalidWindow(detail)`
///   A window of zero length, a negative duration, or an unparseable
///   window string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("Aggregation requires at least one sample; the input series is empty.")]
    EmptyInput,

    #[error("Invalid window: {0}")]
    InvalidWindow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // `InvalidWindow` echoes the offending text.
    //
    // Given
    // -----
    // - detail = "'7w' has unknown unit".
    //
    // Expect
    // ------
    // - The message contains "7w".
    fn invalid_window_display_contains_detail() {
        let err = AggregationError::InvalidWindow("'7w' has unknown unit".into());

        assert!(err.to_string().contains("7w"));
    }
}
