//! analysis::config — YAML configuration of an analysis run.
//!
//! Purpose
//! -------
//! Gather every tunable of the per-glacier pipeline in one serde struct
//! that loads from YAML, fills unspecified keys with defaults, and is
//! checked once by [`AnalysisConfig::validate`] before any data is read.
//!
//! Key behaviors
//! -------------
//! - Every section is `#[serde(default)]`, so an empty file is a valid
//!   configuration.
//! - Windows are written as strings (`"24h"`, `"7d"`, `"12"`) and parsed
//!   by [`Window`]'s `FromStr`.
//! - CLI flags override file values in the binary, after loading and
//!   before validation.
//!
//! Example
//! -------
//! ```yaml
//! deposition_variables: [BC_dep, PM2.5_dep]
//! windows: [24h, 7d, 30d]
//! correlation_window: 7d
//! lag: { max_lag: 14, method: spearman, direction: symmetric }
//! regression:
//!   lags: { BC_dep: 3 }
//!   hac: true
//!   covariance: { kernel: bartlett, bandwidth: 4 }
//! ```
use crate::{
    analysis::errors::{ConfigError, ConfigResult},
    data::{glacier::InventoryFilter, grid::BoundingBox},
    inference::hac::HACOptions,
    regression::{
        extreme::EventWindows,
        ols::{CovarianceKind, RegressionOptions},
    },
    spatial::extraction::{Aggregation, ExtractionMode, FootprintOptions},
    statistical_tests::{
        correlation::CorrelationMethod, errors::MIN_OVERLAP_FLOOR, lag::LagOptions,
    },
    temporal::window::Window,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf};

/// Deposition species analysed when the configuration names none.
pub const DEFAULT_VARIABLES: [&str; 3] = ["BC_dep", "PM2.5_dep", "PM10_dep"];

/// Lag sweep settings. Lags count days on the daily analysis axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagSettings {
    pub max_lag: usize,
    pub method: CorrelationMethod,
    #[serde(flatten)]
    pub options: LagOptions,
}

impl Default for LagSettings {
    fn default() -> Self {
        LagSettings {
            max_lag: 10,
            method: CorrelationMethod::Pearson,
            options: LagOptions::default(),
        }
    }
}

/// How each glacier's deposition series is sampled from the grid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub mode: ExtractionMode,
    /// Margin around glacier outlines, in degrees.
    pub buffer_deg: f64,
    pub aggregation: Aggregation,
}

impl ExtractionSettings {
    pub fn footprint(&self) -> FootprintOptions {
        FootprintOptions {
            buffer_deg: self.buffer_deg,
            aggregation: self.aggregation,
            weights: None,
        }
    }
}

/// Multi-species regression settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionSettings {
    /// Fixed lag (days) per species; species not listed use their best
    /// non-negative lag from the sweep.
    pub lags: BTreeMap<String, usize>,
    pub include_interaction: bool,
    /// Use HAC standard errors configured by `covariance`.
    pub hac: bool,
    pub covariance: HACOptions,
}

impl RegressionSettings {
    pub fn options(&self) -> RegressionOptions {
        let covariance =
            if self.hac { CovarianceKind::Hac(self.covariance) } else { CovarianceKind::Classical };
        RegressionOptions { covariance, include_interaction: self.include_interaction }
    }
}

/// Extreme-deposition event settings; windows in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtremeSettings {
    pub percentile: f64,
    pub pre: usize,
    pub post: usize,
    /// Percentiles summarised in `<site>_events.csv`.
    pub summary_percentiles: Vec<f64>,
}

impl Default for ExtremeSettings {
    fn default() -> Self {
        let windows = EventWindows::default();
        ExtremeSettings {
            percentile: 90.0,
            pre: windows.pre,
            post: windows.post,
            summary_percentiles: vec![90.0, 95.0, 99.0],
        }
    }
}

impl ExtremeSettings {
    pub fn windows(&self) -> EventWindows {
        EventWindows { pre: self.pre, post: self.post }
    }
}

/// Fire proximity settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireSettings {
    pub buffer_km: f64,
}

impl Default for FireSettings {
    fn default() -> Self {
        FireSettings { buffer_km: 50.0 }
    }
}

/// AnalysisConfig — everything a run needs besides the input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub deposition_variables: Vec<String>,
    /// Exposure windows written to `<site>_deposition.csv`.
    pub windows: Vec<Window>,
    /// Trailing sum used as the lag-sweep driver.
    pub correlation_window: Window,
    pub lag: LagSettings,
    pub extraction: ExtractionSettings,
    pub inventory: InventoryFilter,
    pub regression: RegressionSettings,
    pub extremes: ExtremeSettings,
    pub fire: FireSettings,
    pub output_dir: PathBuf,
    pub bbox: Option<BoundingBox>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            deposition_variables: DEFAULT_VARIABLES.iter().map(|s| s.to_string()).collect(),
            windows: vec![Window::hours(24), Window::days(7), Window::days(30)],
            correlation_window: Window::days(7),
            lag: LagSettings::default(),
            extraction: ExtractionSettings::default(),
            inventory: InventoryFilter::default(),
            regression: RegressionSettings::default(),
            extremes: ExtremeSettings::default(),
            fire: FireSettings::default(),
            output_dir: PathBuf::from("results"),
            bbox: None,
            start: None,
            end: None,
        }
    }
}

impl AnalysisConfig {
    /// Parse YAML text; missing keys take their defaults.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check value ranges and cross-field consistency.
    ///
    /// Errors
    /// ------
    /// - `Invalid { field, .. }` naming the first offending key.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.deposition_variables.is_empty() {
            return Err(ConfigError::invalid("deposition_variables", "at least one is required"));
        }
        if self.deposition_variables.iter().any(|v| v.trim().is_empty()) {
            return Err(ConfigError::invalid("deposition_variables", "names must be non-empty"));
        }
        for window in self.windows.iter().chain(std::iter::once(&self.correlation_window)) {
            window.validate().map_err(|e| ConfigError::invalid("windows", e.to_string()))?;
        }
        if self.lag.options.min_overlap < MIN_OVERLAP_FLOOR {
            return Err(ConfigError::invalid(
                "lag.min_overlap",
                format!("must be >= {MIN_OVERLAP_FLOOR}; got {}", self.lag.options.min_overlap),
            ));
        }
        if !(self.extraction.buffer_deg.is_finite() && self.extraction.buffer_deg >= 0.0) {
            return Err(ConfigError::invalid("extraction.buffer_deg", "must be finite and >= 0"));
        }
        let pct_ok = |p: f64| (0.0..=100.0).contains(&p);
        if !pct_ok(self.extremes.percentile) {
            return Err(ConfigError::invalid(
                "extremes.percentile",
                format!("must lie in [0, 100]; got {}", self.extremes.percentile),
            ));
        }
        if let Some(p) = self.extremes.summary_percentiles.iter().find(|p| !pct_ok(**p)) {
            return Err(ConfigError::invalid(
                "extremes.summary_percentiles",
                format!("must lie in [0, 100]; got {p}"),
            ));
        }
        if !(self.fire.buffer_km.is_finite() && self.fire.buffer_km > 0.0) {
            return Err(ConfigError::invalid("fire.buffer_km", "must be positive"));
        }
        if let Some(unknown) =
            self.regression.lags.keys().find(|k| !self.deposition_variables.contains(k))
        {
            return Err(ConfigError::invalid(
                "regression.lags",
                format!("'{unknown}' is not a configured deposition variable"),
            ));
        }
        if let Some(bbox) = &self.bbox {
            bbox.validate().map_err(|e| ConfigError::invalid("bbox", e.to_string()))?;
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(ConfigError::invalid("start", format!("{start} is not before {end}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::kernel::KernelType;
    use crate::statistical_tests::lag::LagDirection;
    use std::io::Write;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Defaults and empty-file handling.
    // - Partial YAML overrides including window strings and nested options.
    // - Each validation branch reachable from user input.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // The default configuration is valid and uses the documented values.
    //
    // Given
    // -----
    // - `AnalysisConfig::default()`.
    //
    // Expect
    // ------
    // - Three species, windows 24h/7d/30d, max_lag 10, 90th percentile.
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();

        config.validate().unwrap();
        assert_eq!(config.deposition_variables.len(), 3);
        let labels: Vec<String> = config.windows.iter().map(Window::label).collect();
        assert_eq!(labels, vec!["24h", "7d", "30d"]);
        assert_eq!(config.lag.max_lag, 10);
        assert_eq!(config.extremes.percentile, 90.0);
    }

    #[test]
    // Purpose
    // -------
    // An empty document yields the defaults.
    //
    // Given
    // -----
    // - "" and "   \n".
    //
    // Expect
    // ------
    // - Both equal `AnalysisConfig::default()`.
    fn empty_yaml_is_default() {
        assert_eq!(AnalysisConfig::from_yaml_str("").unwrap(), AnalysisConfig::default());
        assert_eq!(AnalysisConfig::from_yaml_str("   \n").unwrap(), AnalysisConfig::default());
    }

    #[test]
    // Purpose
    // -------
    // Partial YAML overrides only the keys it names.
    //
    // Given
    // -----
    // - Method, direction, window strings, a regression lag and HAC block.
    //
    // Expect
    // ------
    // - Overridden values parsed; untouched keys keep defaults.
    fn partial_yaml_overrides_defaults() {
        let yaml = "
deposition_variables: [BC_dep, PM2.5_dep]
windows: [24h, 12]
correlation_window: 30d
lag:
  max_lag: 14
  method: spearman
  direction: symmetric
regression:
  lags: { BC_dep: 3 }
  hac: true
  covariance: { kernel: parzen, bandwidth: 4 }
";
        let config = AnalysisConfig::from_yaml_str(yaml).unwrap();

        config.validate().unwrap();
        assert_eq!(config.windows, vec![Window::hours(24), Window::Samples(12)]);
        assert_eq!(config.correlation_window, Window::days(30));
        assert_eq!(config.lag.max_lag, 14);
        assert_eq!(config.lag.method, CorrelationMethod::Spearman);
        assert_eq!(config.lag.options.direction, LagDirection::Symmetric);
        assert_eq!(config.lag.options.min_overlap, MIN_OVERLAP_FLOOR);
        assert_eq!(config.regression.lags.get("BC_dep"), Some(&3));
        match config.regression.options().covariance {
            CovarianceKind::Hac(opts) => {
                assert_eq!(opts.kernel, KernelType::Parzen);
                assert_eq!(opts.bandwidth, Some(4));
            }
            other => panic!("expected HAC, got {other:?}"),
        }
        assert_eq!(config.extremes, ExtremeSettings::default());
    }

    #[test]
    // Purpose
    // -------
    // Malformed YAML and unparseable windows are parse errors.
    //
    // Given
    // -----
    // - A window "7w" and a non-mapping document.
    //
    // Expect
    // ------
    // - `ConfigError::Parse` in both cases.
    fn malformed_yaml_is_parse_error() {
        let bad_window = AnalysisConfig::from_yaml_str("windows: [7w]").unwrap_err();
        let bad_doc = AnalysisConfig::from_yaml_str("- just\n- a list").unwrap_err();

        assert!(matches!(bad_window, ConfigError::Parse(_)));
        assert!(matches!(bad_doc, ConfigError::Parse(_)));
    }

    #[test]
    // Purpose
    // -------
    // Validation names the offending field.
    //
    // Given
    // -----
    // - One invalid value per case.
    //
    // Expect
    // ------
    // - `Invalid` with the matching `field`.
    fn validation_reports_field() {
        let field_of = |config: AnalysisConfig| match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected Invalid, got {other:?}"),
        };
        let base = AnalysisConfig::default;

        assert_eq!(
            field_of(AnalysisConfig { deposition_variables: vec![], ..base() }),
            "deposition_variables"
        );

        let mut c = base();
        c.lag.options.min_overlap = 2;
        assert_eq!(field_of(c), "lag.min_overlap");

        let mut c = base();
        c.extremes.percentile = 101.0;
        assert_eq!(field_of(c), "extremes.percentile");

        let mut c = base();
        c.regression.lags.insert("SO4_dep".into(), 2);
        assert_eq!(field_of(c), "regression.lags");

        let mut c = base();
        c.fire.buffer_km = 0.0;
        assert_eq!(field_of(c), "fire.buffer_km");

        let mut c = base();
        c.bbox =
            Some(BoundingBox { lon_min: -115.0, lat_min: 50.0, lon_max: -120.0, lat_max: 55.0 });
        assert_eq!(field_of(c), "bbox");

        let mut c = base();
        c.start = crate::data::loader::parse_timestamp("2023-08-01").ok();
        c.end = crate::data::loader::parse_timestamp("2023-07-01").ok();
        assert_eq!(field_of(c), "start");
    }

    #[test]
    // Purpose
    // -------
    // `max_lag: 0` is a valid same-day-only sweep.
    //
    // Given
    // -----
    // - Defaults with `lag.max_lag` set to 0 in YAML.
    //
    // Expect
    // ------
    // - Validation passes and the configured sweep covers lag 0 alone.
    fn zero_max_lag_is_valid() {
        let config = AnalysisConfig::from_yaml_str("lag: { max_lag: 0 }").unwrap();

        config.validate().unwrap();
        assert_eq!(config.lag.options.direction.lags(config.lag.max_lag), vec![0]);
    }

    #[test]
    // Purpose
    // -------
    // A configuration survives a YAML file round trip.
    //
    // Given
    // -----
    // - A non-default config written to a temporary file.
    //
    // Expect
    // ------
    // - `from_file` returns an equal value.
    fn file_round_trip() {
        let mut config = AnalysisConfig::default();
        config.lag.max_lag = 5;
        config.extraction.mode = ExtractionMode::Footprint;
        config.output_dir = PathBuf::from("out/athabasca");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_yaml().unwrap().as_bytes()).unwrap();

        assert_eq!(AnalysisConfig::from_file(file.path()).unwrap(), config);
    }

    #[test]
    // Purpose
    // -------
    // A missing file is a read error.
    //
    // Given
    // -----
    // - A path that does not exist.
    //
    // Expect
    // ------
    // - `ConfigError::Read`.
    fn missing_file_is_read_error() {
        let err = AnalysisConfig::from_file(Path::new("/nonexistent/raqdps.yaml")).unwrap_err();

        assert!(matches!(err, ConfigError::Read(_)));
    }
}
