//! temporal — exposure aggregation on the time axis.
//!
//! Purpose
//! -------
//! Convert raw deposition flux into exposure measures (cumulative totals,
//! trailing 24 h / 7 d / 30 d sums or means) and put deposition and albedo
//! on a common daily clock before correlation.
//!
//! Key behaviors
//! -------------
//! - [`rolling`] and [`cumulative`] preserve input timestamps; partial
//!   windows are flagged rather than dropped.
//! - [`resample_daily_mean`], [`difference`], [`inner_join`], and [`align`]
//!   build the aligned daily driver/response pairs.
//! - [`rolling_trend`] gives the local least-squares slope of a series.
//!
//! Conventions
//! -----------
//! - NaN means "missing sample" and propagates through window sums; daily
//!   resampling averages only the finite samples of a day.
//! - Empty inputs fail with [`AggregationError::EmptyInput`].

pub mod errors;
pub mod resample;
pub mod window;

pub use self::errors::{AggregationError, AggregationResult};
pub use self::resample::{align, difference, inner_join, resample_daily_mean, rolling_trend};
pub use self::window::{Reduction, Window, WindowedSeries, cumulative, rolling};
