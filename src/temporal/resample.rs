//! temporal::resample — calendar resampling, differencing and alignment.
//!
//! Hourly deposition and daily albedo live on different clocks. These
//! helpers bring them onto a shared daily axis: daily means, first
//! differences for albedo change, and inner joins on identical timestamps.
use crate::{
    data::series::TimeSeries,
    temporal::errors::{AggregationError, AggregationResult},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Mean of the finite samples of each calendar day, stamped at midnight.
///
/// Days without any sample are omitted; days whose samples are all NaN
/// yield NaN.
///
/// Errors
/// ------
/// - `EmptyInput` for an empty series.
pub fn resample_daily_mean(series: &TimeSeries) -> AggregationResult<TimeSeries> {
    if series.is_empty() {
        return Err(AggregationError::EmptyInput);
    }
    let mut days: Vec<NaiveDateTime> = Vec::new();
    let mut means: Vec<f64> = Vec::new();
    let mut current: Option<NaiveDate> = None;
    let (mut sum, mut count) = (0.0, 0usize);

    let mut flush = |day: NaiveDate, sum: f64, count: usize| {
        days.push(day.and_time(NaiveTime::MIN));
        means.push(if count > 0 { sum / count as f64 } else { f64::NAN });
    };
    for (t, v) in series.iter() {
        let day = t.date();
        if let Some(open) = current {
            if open != day {
                flush(open, sum, count);
                sum = 0.0;
                count = 0;
            }
        }
        current = Some(day);
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if let Some(open) = current {
        flush(open, sum, count);
    }
    Ok(TimeSeries::from_sorted_parts(format!("{}_daily", series.name()), days, means))
}

/// First difference `x[i] − x[i−1]`; the first point is NaN.
pub fn difference(series: &TimeSeries) -> TimeSeries {
    let v = series.values();
    let values = (0..v.len()).map(|i| if i == 0 { f64::NAN } else { v[i] - v[i - 1] }).collect();
    series.with_values(format!("{}_change", series.name()), values)
}

/// Restrict every series to the timestamps present in all of them.
///
/// Output order matches input order; an empty input slice gives an empty
/// vector.
pub fn align(series: &[&TimeSeries]) -> Vec<TimeSeries> {
    let Some((first, rest)) = series.split_first() else {
        return Vec::new();
    };
    let common: Vec<NaiveDateTime> = first
        .timestamps()
        .iter()
        .copied()
        .filter(|t| rest.iter().all(|s| s.position(*t).is_some()))
        .collect();
    series
        .iter()
        .map(|s| {
            let values =
                common.iter().filter_map(|t| s.position(*t)).map(|i| s.values()[i]).collect();
            TimeSeries::from_sorted_parts(s.name(), common.clone(), values)
        })
        .collect()
}

/// Inner join of two series on identical timestamps.
pub fn inner_join(a: &TimeSeries, b: &TimeSeries) -> (TimeSeries, TimeSeries) {
    let (ta, tb) = (a.timestamps(), b.timestamps());
    let (mut times, mut va, mut vb) = (Vec::new(), Vec::new(), Vec::new());
    let (mut i, mut j) = (0, 0);
    while i < ta.len() && j < tb.len() {
        match ta[i].cmp(&tb[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                times.push(ta[i]);
                va.push(a.values()[i]);
                vb.push(b.values()[j]);
                i += 1;
                j += 1;
            }
        }
    }
    (
        TimeSeries::from_sorted_parts(a.name(), times.clone(), va),
        TimeSeries::from_sorted_parts(b.name(), times, vb),
    )
}

/// Least-squares slope inside each trailing window `(t − Δ, t]`.
///
/// The slope is per sample index within the window, matching a regression
/// of the values on `0, 1, …, m−1`. Windows with fewer than two finite
/// points give NaN.
///
/// Errors
/// ------
/// - `EmptyInput` for an empty series.
/// - `InvalidWindow` for a non-positive `window`.
pub fn rolling_trend(series: &TimeSeries, window: TimeDelta) -> AggregationResult<TimeSeries> {
    if series.is_empty() {
        return Err(AggregationError::EmptyInput);
    }
    if window <= TimeDelta::zero() {
        return Err(AggregationError::InvalidWindow(format!(
            "trend window {window} must be positive"
        )));
    }
    let times = series.timestamps();
    let values = series.values();
    let mut lo = 0usize;
    let slopes = (0..values.len())
        .map(|i| {
            if let Some(edge) = times[i].checked_sub_signed(window) {
                while times[lo] <= edge {
                    lo += 1;
                }
            }
            index_slope(&values[lo..=i])
        })
        .collect();
    Ok(series.with_values(format!("{}_trend", series.name()), slopes))
}

fn index_slope(window: &[f64]) -> f64 {
    let points: Vec<(f64, f64)> = window
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(k, v)| (k as f64, *v))
        .collect();
    if points.len() < 2 {
        return f64::NAN;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let my = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxy: f64 = points.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
    let sxx: f64 = points.iter().map(|(x, _)| (x - mx).powi(2)).sum();
    sxy / sxx
}
