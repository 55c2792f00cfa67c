//! temporal::window — cumulative and trailing-window aggregation.
//!
//! Purpose
//! -------
//! Turn an hourly deposition series into the exposure measures used by the
//! correlation engine: the running total from the series start and trailing
//! window sums or means (24 h, 7 d, 30 d).
//!
//! Key behaviors
//! -------------
//! - [`Window::Samples`] covers the last `n` samples `x[i−n+1 ..= i]`.
//! - [`Window::Duration`] covers the half-open interval `(t − Δ, t]`, so an
//!   irregular series is windowed by wall-clock time rather than by count.
//! - Windows at the start of a series are partial and use whatever samples
//!   exist; each output point records its sample count and a `complete`
//!   flag so callers can discard warm-up values.
//! - Sums are evaluated left to right over the window slice, which makes
//!   them bit-identical to `x[lo..=i].iter().sum()`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Output series share the input timestamps exactly.
//! - NaN inside a window makes that window's sum or mean NaN.
//! - A duration window is `complete` when the first timestamp is no later
//!   than `t − Δ + step`, with `step` the smallest spacing in the series.
use crate::{
    data::series::TimeSeries,
    temporal::errors::{AggregationError, AggregationResult},
};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Trailing aggregation window.
///
/// Parses from `"<n>h"`, `"<n>d"`, or a bare sample count `"<n>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Window {
    Samples(usize),
    Duration(TimeDelta),
}

impl Window {
    /// `n` hours, saturating at [`TimeDelta::MAX`].
    pub fn hours(n: i64) -> Self {
        Window::Duration(TimeDelta::try_hours(n).unwrap_or(TimeDelta::MAX))
    }

    /// `n` days, saturating at [`TimeDelta::MAX`].
    pub fn days(n: i64) -> Self {
        Window::Duration(TimeDelta::try_days(n).unwrap_or(TimeDelta::MAX))
    }

    /// Reject empty windows.
    pub fn validate(&self) -> AggregationResult<()> {
        match self {
            Window::Samples(0) => {
                Err(AggregationError::InvalidWindow("sample window must be >= 1".into()))
            }
            Window::Duration(d) if *d <= TimeDelta::zero() => {
                Err(AggregationError::InvalidWindow(format!("duration {d} must be positive")))
            }
            _ => Ok(()),
        }
    }

    /// Short label for column names: `24h`, `7d`, `12`.
    pub fn label(&self) -> String {
        match self {
            Window::Samples(n) => n.to_string(),
            Window::Duration(d) if *d == TimeDelta::hours(d.num_hours()) => {
                let hours = d.num_hours();
                if hours > 24 && hours % 24 == 0 {
                    format!("{}d", hours / 24)
                } else {
                    format!("{hours}h")
                }
            }
            Window::Duration(d) => format!("{}m", d.num_minutes()),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Window {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        let invalid = || AggregationError::InvalidWindow(format!("cannot parse window '{s}'"));
        let (digits, unit) = match text.find(|c: char| !c.is_ascii_digit()) {
            Some(pos) => text.split_at(pos),
            None => (text.as_str(), ""),
        };
        let n: i64 = digits.parse().map_err(|_| invalid())?;
        let duration = |delta: Option<TimeDelta>| delta.map(Window::Duration).ok_or_else(invalid);
        let window = match unit {
            "" => Window::Samples(usize::try_from(n).map_err(|_| invalid())?),
            "m" | "min" => duration(TimeDelta::try_minutes(n))?,
            "h" => duration(TimeDelta::try_hours(n))?,
            "d" => duration(TimeDelta::try_days(n))?,
            _ => return Err(invalid()),
        };
        window.validate()?;
        Ok(window)
    }
}

impl TryFrom<String> for Window {
    type Error = AggregationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Window> for String {
    fn from(w: Window) -> Self {
        w.label()
    }
}

/// Reduction applied inside each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Sum,
    Mean,
}

/// WindowedSeries — rolling output with per-point window diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedSeries {
    pub window: Window,
    pub reduction: Reduction,
    series: TimeSeries,
    counts: Vec<usize>,
    complete: Vec<bool>,
}

impl WindowedSeries {
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn into_series(self) -> TimeSeries {
        self.series
    }

    /// Samples that entered each window.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn complete(&self) -> &[bool] {
        &self.complete
    }

    /// Same values with partial windows replaced by NaN.
    pub fn complete_only(&self) -> TimeSeries {
        let values = self
            .series
            .values()
            .iter()
            .zip(&self.complete)
            .map(|(&v, &ok)| if ok { v } else { f64::NAN })
            .collect();
        self.series.with_values(self.series.name(), values)
    }
}

/// Trailing-window sum or mean of `series`.
///
/// Errors
/// ------
/// - `EmptyInput` for an empty series.
/// - `InvalidWindow` for zero-length windows.
pub fn rolling(
    series: &TimeSeries, window: Window, reduction: Reduction,
) -> AggregationResult<WindowedSeries> {
    if series.is_empty() {
        return Err(AggregationError::EmptyInput);
    }
    window.validate()?;
    let values = series.values();
    let times = series.timestamps();
    let n = values.len();

    let mut out = Vec::with_capacity(n);
    let mut counts = Vec::with_capacity(n);
    let mut complete = Vec::with_capacity(n);
    let step = series.min_spacing();
    let mut lo = 0usize;

    for i in 0..n {
        let (start, full) = match window {
            Window::Samples(w) => ((i + 1).saturating_sub(w), i + 1 >= w),
            // A window reaching past the calendar covers the whole prefix.
            Window::Duration(delta) => match times[i].checked_sub_signed(delta) {
                Some(edge) => {
                    while times[lo] <= edge {
                        lo += 1;
                    }
                    let full = step
                        .and_then(|step| edge.checked_add_signed(step))
                        .is_some_and(|reach| times[0] <= reach);
                    (lo, full)
                }
                None => (0, false),
            },
        };
        let slice = &values[start..=i];
        let sum: f64 = slice.iter().sum();
        out.push(match reduction {
            Reduction::Sum => sum,
            Reduction::Mean => sum / slice.len() as f64,
        });
        counts.push(slice.len());
        complete.push(full);
    }

    let name = format!("{}_{}_{}", series.name(), window.label(), reduction_label(reduction));
    Ok(WindowedSeries {
        window,
        reduction,
        series: series.with_values(name, out),
        counts,
        complete,
    })
}

fn reduction_label(reduction: Reduction) -> &'static str {
    match reduction {
        Reduction::Sum => "sum",
        Reduction::Mean => "mean",
    }
}

/// Running total from the first sample.
///
/// Errors
/// ------
/// - `EmptyInput` for an empty series.
pub fn cumulative(series: &TimeSeries) -> AggregationResult<TimeSeries> {
    if series.is_empty() {
        return Err(AggregationError::EmptyInput);
    }
    let mut acc = 0.0;
    let values = series
        .values()
        .iter()
        .map(|v| {
            acc += v;
            acc
        })
        .collect();
    Ok(series.with_values(format!("{}_cumulative", series.name()), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Window parsing and validation, including durations beyond the
    //   calendar range.
    // - Exact equality of rolling sums with direct slice sums.
    // - Duration windows on irregular timestamps and completeness flags.
    // - Exact cumulative sums and NaN propagation.
    // -------------------------------------------------------------------------

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn hourly(values: Vec<f64>) -> TimeSeries {
        TimeSeries::regular("BC_dep", t0(), TimeDelta::hours(1), values).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Window strings map to the expected variants; junk is rejected.
    //
    // Given
    // -----
    // - "24h", "7d", "12", "0", "7w".
    //
    // Expect
    // ------
    // - Duration(24h), Duration(7d), Samples(12); "0" and "7w" invalid.
    fn window_parses_units() {
        assert_eq!("24h".parse::<Window>().unwrap(), Window::hours(24));
        assert_eq!("7d".parse::<Window>().unwrap(), Window::days(7));
        assert_eq!("12".parse::<Window>().unwrap(), Window::Samples(12));
        assert!(matches!("0".parse::<Window>(), Err(AggregationError::InvalidWindow(_))));
        assert!(matches!("7w".parse::<Window>(), Err(AggregationError::InvalidWindow(_))));
        assert_eq!(Window::days(7).label(), "7d");
        assert_eq!(Window::hours(24).label(), "24h");
        assert_eq!(Window::hours(36).label(), "36h");
    }

    #[test]
    // Purpose
    // -------
    // Oversized durations either fail to parse or roll over the whole prefix.
    //
    // Given
    // -----
    // - "100000000d", which fits a `TimeDelta` but not the calendar.
    // - "10000000000000d", which overflows `TimeDelta`.
    //
    // Expect
    // ------
    // - The first rolls an hourly [1, 2, 3] to [1, 3, 6], all incomplete.
    // - The second is `InvalidWindow`.
    fn oversized_duration_window_does_not_panic() {
        let window: Window = "100000000d".parse().unwrap();

        let r = rolling(&hourly(vec![1.0, 2.0, 3.0]), window, Reduction::Sum).unwrap();

        assert_eq!(r.series().values(), &[1.0, 3.0, 6.0]);
        assert_eq!(r.complete(), &[false, false, false]);
        assert!(matches!(
            "10000000000000d".parse::<Window>(),
            Err(AggregationError::InvalidWindow(_))
        ));
        assert_eq!(Window::days(i64::MAX), Window::Duration(TimeDelta::MAX));
    }

    #[test]
    // Purpose
    // -------
    // Sample-window sums equal `sum(x[max(0, i−W+1) ..= i])` exactly.
    //
    // Given
    // -----
    // - x = [0.1, 0.2, ..., 1.0], W = 3.
    //
    // Expect
    // ------
    // - Bit-identical values; counts [1, 2, 3, 3, ...]; first two incomplete.
    fn rolling_sum_matches_slice_sums() {
        let x: Vec<f64> = (1..=10).map(|i| i as f64 * 0.1).collect();
        let s = hourly(x.clone());

        let r = rolling(&s, Window::Samples(3), Reduction::Sum).unwrap();

        for i in 0..x.len() {
            let lo = (i + 1).saturating_sub(3);
            let expected: f64 = x[lo..=i].iter().sum();
            assert_eq!(r.series().values()[i], expected, "index {i}");
        }
        assert_eq!(&r.counts()[..4], &[1, 2, 3, 3]);
        assert_eq!(&r.complete()[..3], &[false, false, true]);
    }

    #[test]
    // Purpose
    // -------
    // A 3 h duration window on an hourly series matches a 3-sample window.
    //
    // Given
    // -----
    // - Hourly x = [1, 2, 3, 4, 5].
    //
    // Expect
    // ------
    // - Sums [1, 3, 6, 9, 12]; complete from index 2.
    fn duration_window_on_regular_series() {
        let s = hourly(vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        let r = rolling(&s, Window::hours(3), Reduction::Sum).unwrap();

        assert_eq!(r.series().values(), &[1.0, 3.0, 6.0, 9.0, 12.0]);
        assert_eq!(r.complete(), &[false, false, true, true, true]);
    }

    #[test]
    // Purpose
    // -------
    // Duration windows follow wall-clock time on irregular series.
    //
    // Given
    // -----
    // - Samples at 0h, 1h, 5h, 6h with values 1, 2, 3, 4; window 2h mean.
    //
    // Expect
    // ------
    // - Means [1, 1.5, 3, 3.5]; counts [1, 2, 1, 2].
    fn duration_window_on_irregular_series() {
        let times = [0, 1, 5, 6].iter().map(|h| t0() + TimeDelta::hours(*h)).collect();
        let s = TimeSeries::new("x", times, vec![1.0, 2.0, 3.0, 4.0]).unwrap();

        let r = rolling(&s, Window::hours(2), Reduction::Mean).unwrap();

        assert_eq!(r.series().values(), &[1.0, 1.5, 3.0, 3.5]);
        assert_eq!(r.counts(), &[1, 2, 1, 2]);
    }

    #[test]
    // Purpose
    // -------
    // NaN inside a window propagates; windows past it recover.
    //
    // Given
    // -----
    // - x = [1, NaN, 1, 1, 1], W = 2.
    //
    // Expect
    // ------
    // - [1, NaN, NaN, 2, 2].
    fn rolling_propagates_nan() {
        let s = hourly(vec![1.0, f64::NAN, 1.0, 1.0, 1.0]);

        let r = rolling(&s, Window::Samples(2), Reduction::Sum).unwrap();
        let v = r.series().values();

        assert_eq!(v[0], 1.0);
        assert!(v[1].is_nan() && v[2].is_nan());
        assert_eq!(&v[3..], &[2.0, 2.0]);
        assert!(r.complete_only().values()[0].is_nan());
    }

    #[test]
    // Purpose
    // -------
    // Cumulative values equal prefix sums exactly.
    //
    // Given
    // -----
    // - x = [0.3, 0.1, 0.7, 0.2].
    //
    // Expect
    // ------
    // - c[i] == x[..=i].iter().sum() for all i.
    fn cumulative_is_exact_prefix_sum() {
        let x = vec![0.3, 0.1, 0.7, 0.2];
        let c = cumulative(&hourly(x.clone())).unwrap();

        for i in 0..x.len() {
            assert_eq!(c.values()[i], x[..=i].iter().sum::<f64>());
        }
        assert_relative_eq!(c.values()[3], 1.3, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Empty input is an error rather than an empty output.
    //
    // Given
    // -----
    // - An empty series.
    //
    // Expect
    // ------
    // - `EmptyInput` from both `rolling` and `cumulative`.
    fn empty_input_is_rejected() {
        let s = hourly(vec![]);

        assert_eq!(
            rolling(&s, Window::hours(24), Reduction::Sum).unwrap_err(),
            AggregationError::EmptyInput
        );
        assert_eq!(cumulative(&s).unwrap_err(), AggregationError::EmptyInput);
    }
}
