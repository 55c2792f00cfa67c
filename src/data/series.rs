//! data::series — named, strictly time-ordered scalar series.
//!
//! Purpose
//! -------
//! Hold one observed or derived quantity (site deposition flux, albedo,
//! albedo change) as parallel `timestamps` / `values` vectors. Every
//! temporal and statistical routine in the crate consumes this type.
//!
//! Invariants
//! ----------
//! - `timestamps.len() == values.len()`.
//! - Timestamps are strictly increasing (no duplicates), checked once at
//!   construction by [`TimeSeries::new`].
//! - Values may be NaN; NaN means "missing sample" and is never dropped
//!   implicitly by this type.
use crate::data::errors::{DataError, DataResult};
use chrono::{NaiveDateTime, TimeDelta};

/// TimeSeries — named sequence of `(timestamp, value)` observations.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    name: String,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Construct a validated series.
    ///
    /// Errors
    /// ------
    /// - `DataError::LengthMismatch` when the two vectors differ in length.
    /// - `DataError::NonIncreasingTime { index }` at the first timestamp that
    ///   does not strictly exceed its predecessor.
    pub fn new(
        name: impl Into<String>, timestamps: Vec<NaiveDateTime>, values: Vec<f64>,
    ) -> DataResult<Self> {
        if timestamps.len() != values.len() {
            return Err(DataError::LengthMismatch {
                expected: timestamps.len(),
                actual: values.len(),
            });
        }
        if let Some(index) = first_non_increasing(&timestamps) {
            return Err(DataError::NonIncreasingTime { index });
        }
        Ok(Self { name: name.into(), timestamps, values })
    }

    /// Regularly spaced series starting at `start` with spacing `step`.
    ///
    /// Errors
    /// ------
    /// - `DataError::NonIncreasingTime { index: 1 }` if `step` is not
    ///   positive and more than one value is supplied.
    pub fn regular(
        name: impl Into<String>, start: NaiveDateTime, step: TimeDelta, values: Vec<f64>,
    ) -> DataResult<Self> {
        if step <= TimeDelta::zero() && values.len() > 1 {
            return Err(DataError::NonIncreasingTime { index: 1 });
        }
        let timestamps = (0..values.len()).map(|i| start + step * i as i32).collect();
        Ok(Self { name: name.into(), timestamps, values })
    }

    /// Build from parts already known to satisfy the ordering invariant.
    ///
    /// Used by transforms that derive new series from validated inputs
    /// (rolling windows keep timestamps, resampling emits sorted days).
    pub(crate) fn from_sorted_parts(
        name: impl Into<String>, timestamps: Vec<NaiveDateTime>, values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        debug_assert!(first_non_increasing(&timestamps).is_none());
        Self { name: name.into(), timestamps, values }
    }

    /// Same timestamps, new values and name.
    pub(crate) fn with_values(&self, name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::from_sorted_parts(name, self.timestamps.clone(), values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of non-NaN samples.
    pub fn finite_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter().copied())
    }

    /// Rename without touching the data.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sub-series with `start <= t <= end`.
    pub fn slice_time(&self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let lo = self.timestamps.partition_point(|t| *t < start);
        let hi = self.timestamps.partition_point(|t| *t <= end);
        let hi = hi.max(lo);
        Self::from_sorted_parts(
            self.name.clone(),
            self.timestamps[lo..hi].to_vec(),
            self.values[lo..hi].to_vec(),
        )
    }

    /// Index of `at` if it is one of the series timestamps.
    pub fn position(&self, at: NaiveDateTime) -> Option<usize> {
        self.timestamps.binary_search(&at).ok()
    }

    /// Smallest positive spacing between consecutive timestamps.
    pub fn min_spacing(&self) -> Option<TimeDelta> {
        self.timestamps.windows(2).map(|w| w[1] - w[0]).min()
    }
}

fn first_non_increasing(timestamps: &[NaiveDateTime]) -> Option<usize> {
    timestamps.windows(2).position(|w| w[1] <= w[0]).map(|i| i + 1)
}
