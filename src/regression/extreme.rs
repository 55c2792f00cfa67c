//! regression::extreme — extreme deposition events and their albedo impact.
//!
//! Purpose
//! -------
//! Identify days whose deposition exceeds a high percentile and compare the
//! albedo response just before and just after each of them; summarize the
//! tail of a series (threshold exceedances and run lengths); and measure
//! the response around an arbitrary dated event such as a nearby fire.
//!
//! Key behaviors
//! -------------
//! - [`percentile`] interpolates linearly between order statistics of the
//!   finite values (`rank = p/100 · (n − 1)`).
//! - [`detect_extreme_events`] flags indices strictly above the threshold;
//!   the impact of event `i` is `mean(y(i, i+post]) − mean(y[i−pre, i))`
//!   over finite responses, undefined when either window is empty.
//! - [`extreme_statistics`] reports moments plus, for each percentile, the
//!   exceedance count, frequency and mean/max run length.
//! - [`impact_around`] applies the same pre/post comparison to a
//!   timestamp on a dated series, with windows given as durations.
//!
//! Conventions
//! -----------
//! - NaN is "missing": ignored for thresholds and window means, never an
//!   exceedance.
use crate::{
    data::series::TimeSeries,
    regression::errors::{RegressionError, RegressionResult},
};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Linear-interpolated percentile of the finite values.
///
/// Errors
/// ------
/// - `InvalidPercentile` for `p ∉ [0, 100]` (or NaN).
/// - `InsufficientData` when no value is finite.
pub fn percentile(values: &[f64], p: f64) -> RegressionResult<f64> {
    if !(0.0..=100.0).contains(&p) {
        return Err(RegressionError::InvalidPercentile(p));
    }
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(RegressionError::InsufficientData { rows: 0, required: 1 });
    }
    finite.sort_by(f64::total_cmp);
    let rank = p / 100.0 * (finite.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Ok(finite[lo] + (rank - lo as f64) * (finite[hi] - finite[lo]))
}

/// Pre/post window lengths in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventWindows {
    pub pre: usize,
    pub post: usize,
}

impl Default for EventWindows {
    fn default() -> Self {
        EventWindows { pre: 3, post: 10 }
    }
}

/// One driver exceedance and the response around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremeEvent {
    pub index: usize,
    pub value: f64,
    pub pre_mean: Option<f64>,
    pub post_mean: Option<f64>,
    pub impact: Option<f64>,
}

/// All events above one threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeEventReport {
    pub percentile: f64,
    pub threshold: f64,
    pub events: Vec<ExtremeEvent>,
}

impl ExtremeEventReport {
    /// Mean of the defined impacts; `None` when no event has one.
    pub fn mean_impact(&self) -> Option<f64> {
        let impacts: Vec<f64> = self.events.iter().filter_map(|e| e.impact).collect();
        (!impacts.is_empty()).then(|| impacts.iter().sum::<f64>() / impacts.len() as f64)
    }
}

fn finite_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) =
        values.filter(|v| v.is_finite()).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Flag driver values above the `pct` percentile and measure the response.
///
/// Errors
/// ------
/// - `LengthMismatch` when `response` and `driver` differ in length.
/// - `InvalidPercentile` / `InsufficientData` from [`percentile`].
pub fn detect_extreme_events(
    driver: &[f64], response: &[f64], pct: f64, windows: EventWindows,
) -> RegressionResult<ExtremeEventReport> {
    if driver.len() != response.len() {
        return Err(RegressionError::LengthMismatch {
            name: "response".into(),
            expected: driver.len(),
            actual: response.len(),
        });
    }
    let threshold = percentile(driver, pct)?;
    let n = response.len();
    let events = driver
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > threshold)
        .map(|(i, &value)| {
            let pre_mean =
                finite_mean(response[i.saturating_sub(windows.pre)..i].iter().copied());
            let post_end = (i + windows.post + 1).min(n);
            let post_mean = finite_mean(response[(i + 1).min(n)..post_end].iter().copied());
            let impact = pre_mean.zip(post_mean).map(|(a, b)| b - a);
            ExtremeEvent { index: i, value, pre_mean, post_mean, impact }
        })
        .collect();
    Ok(ExtremeEventReport { percentile: pct, threshold, events })
}

/// Exceedance summary for one percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExceedanceLevel {
    pub percentile: f64,
    pub threshold: f64,
    pub count: usize,
    /// `count / len`, counting missing samples in the denominator.
    pub frequency: f64,
    pub mean_run_length: f64,
    pub max_run_length: usize,
}

/// Tail statistics of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremeStatistics {
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub levels: Vec<ExceedanceLevel>,
}

/// Moments and per-percentile exceedance runs of `values`.
///
/// Errors
/// ------
/// - `InsufficientData` when no value is finite.
/// - `InvalidPercentile` for any percentile outside `[0, 100]`.
pub fn extreme_statistics(
    values: &[f64], percentiles: &[f64],
) -> RegressionResult<ExtremeStatistics> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(RegressionError::InsufficientData { rows: 0, required: 1 });
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let std_dev = (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let levels = percentiles
        .iter()
        .map(|&p| {
            let threshold = percentile(values, p)?;
            let runs = exceedance_runs(values, threshold);
            let count: usize = runs.iter().sum();
            Ok(ExceedanceLevel {
                percentile: p,
                threshold,
                count,
                frequency: count as f64 / values.len() as f64,
                mean_run_length: if runs.is_empty() {
                    0.0
                } else {
                    count as f64 / runs.len() as f64
                },
                max_run_length: runs.iter().copied().max().unwrap_or(0),
            })
        })
        .collect::<RegressionResult<Vec<_>>>()?;
    Ok(ExtremeStatistics { mean, std_dev, min, max, levels })
}

/// Lengths of consecutive runs strictly above `threshold`.
fn exceedance_runs(values: &[f64], threshold: f64) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut current = 0;
    for v in values {
        if *v > threshold {
            current += 1;
        } else if current > 0 {
            runs.push(current);
            current = 0;
        }
    }
    if current > 0 {
        runs.push(current);
    }
    runs
}

/// Response before and after a dated event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventImpact {
    pub at: NaiveDateTime,
    pub pre_mean: Option<f64>,
    pub post_mean: Option<f64>,
    pub impact: Option<f64>,
}

/// Mean of `series` in `[at − pre, at)` and `(at, at + post]`.
pub fn impact_around(
    series: &TimeSeries, at: NaiveDateTime, pre: TimeDelta, post: TimeDelta,
) -> EventImpact {
    let pre_start = at.checked_sub_signed(pre).unwrap_or(NaiveDateTime::MIN);
    let post_end = at.checked_add_signed(post).unwrap_or(NaiveDateTime::MAX);
    let pre_mean =
        finite_mean(series.iter().filter(|(t, _)| *t >= pre_start && *t < at).map(|(_, v)| v));
    let post_mean =
        finite_mean(series.iter().filter(|(t, _)| *t > at && *t <= post_end).map(|(_, v)| v));
    EventImpact { at, pre_mean, post_mean, impact: pre_mean.zip(post_mean).map(|(a, b)| b - a) }
}
