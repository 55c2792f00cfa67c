//! analysis::pipeline — per-glacier analysis and the fault-isolated batch.
//!
//! Purpose
//! -------
//! Chain the building blocks for one glacier: grid extraction, exposure
//! windows, daily alignment with albedo change, the lag sweep, extreme
//! events, the multi-species regression and fire proximity. The batch
//! runner applies this to every glacier of an inventory in parallel.
//!
//! Key behaviors
//! -------------
//! - The lag-sweep driver of each species is the trailing
//!   `correlation_window` sum of its hourly flux (warm-up windows masked),
//!   averaged per calendar day. The response is the first difference of
//!   the daily albedo. Both are inner-joined on their daily timestamps, so
//!   lags count joined observations (days on a gap-free record).
//! - Regression lags come from `regression.lags` when set, else from the
//!   best non-negative lag of the sweep. A failed regression is logged and
//!   reported as absent; it does not fail the glacier.
//! - [`run_batch`] never aborts: each glacier's error is kept in its
//!   [`SiteOutcome`] and the remaining glaciers still run.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are read-only; glaciers share nothing mutable, so the batch is
//!   a plain `par_iter` over sites.
//! - Outcome order matches inventory order regardless of scheduling.
use crate::{
    analysis::{
        config::AnalysisConfig,
        errors::{AnalysisError, AnalysisResult},
    },
    data::{
        albedo::albedo_for_site,
        fire::{FireDetection, FireProximity, filter_by_date, fire_days_near, fire_proximity},
        glacier::{GlacierInventory, GlacierSite},
        grid::DepositionField,
        series::TimeSeries,
        synthetic::SyntheticDataset,
    },
    regression::{
        design::Predictor,
        extreme::{
            EventImpact, ExtremeEventReport, ExtremeStatistics, detect_extreme_events,
            extreme_statistics, impact_around,
        },
        ols::{RegressionFit, fit_regression},
    },
    spatial::extraction::site_series,
    statistical_tests::lag::{LagAnalysis, compute_lag_analysis},
    temporal::{
        resample::{align, difference, inner_join, resample_daily_mean},
        window::{Reduction, Window, cumulative, rolling},
    },
};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, warn};

/// AnalysisInputs — everything loaded for one run.
#[derive(Debug, Clone)]
pub struct AnalysisInputs {
    pub field: DepositionField,
    pub inventory: GlacierInventory,
    /// Albedo series keyed by glacier id (or the `"*"` fallback).
    pub albedo: BTreeMap<String, TimeSeries>,
    pub fires: Vec<FireDetection>,
}

impl From<SyntheticDataset> for AnalysisInputs {
    fn from(data: SyntheticDataset) -> Self {
        AnalysisInputs {
            field: data.field,
            inventory: data.inventory,
            albedo: data.albedo,
            fires: data.fires,
        }
    }
}

impl AnalysisInputs {
    /// Restrict the inputs to the configured species, period, region and
    /// inventory filter.
    ///
    /// Errors
    /// ------
    /// - `MissingVariable` for a configured species absent from the field.
    /// - `OutsideTimeRange` / `OutOfBounds` when the period or bounding box
    ///   leaves no grid data.
    pub fn prepare(self, config: &AnalysisConfig) -> AnalysisResult<Self> {
        let mut field = self.field.select_variables(&config.deposition_variables)?;
        let mut fires = self.fires;
        if config.start.is_some() || config.end.is_some() {
            let start = config.start.or_else(|| field.times().first().copied());
            let end = config.end.or_else(|| field.times().last().copied());
            if let (Some(start), Some(end)) = (start, end) {
                field = field.subset_time(start, end)?;
                fires = filter_by_date(&fires, start, end);
            }
        }
        let mut inventory = self.inventory.filter(&config.inventory);
        if let Some(bbox) = &config.bbox {
            field = field.subset_bbox(bbox)?;
            let inside = inventory
                .sites()
                .iter()
                .filter(|s| bbox.contains(s.centroid_lat, s.centroid_lon))
                .cloned()
                .collect();
            inventory = GlacierInventory::new(inside)?;
        }
        info!(
            hours = field.times().len(),
            glaciers = inventory.len(),
            fires = fires.len(),
            "prepared analysis inputs"
        );
        Ok(AnalysisInputs { field, inventory, albedo: self.albedo, fires })
    }
}

/// Hourly deposition and its exposure measures for one glacier.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositionTable {
    pub times: Vec<NaiveDateTime>,
    /// `(column name, values)`; every column has `times.len()` values.
    pub columns: Vec<(String, Vec<f64>)>,
}

/// Results for one deposition species at one glacier.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableAnalysis {
    pub variable: String,
    /// Sum of finite hourly values.
    pub total: f64,
    /// Largest trailing-window sum per exposure window label.
    pub window_max: Vec<(String, f64)>,
    /// Daily driver before joining with albedo.
    pub driver: TimeSeries,
    /// Daily axis shared by the sweep and the event detection.
    pub dates: Vec<NaiveDateTime>,
    pub lags: LagAnalysis,
    pub events: ExtremeEventReport,
    /// Exceedance summary of the hourly flux.
    pub statistics: ExtremeStatistics,
}

/// SiteAnalysis — complete output for one glacier.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteAnalysis {
    pub site_id: String,
    pub label: String,
    pub n_hours: usize,
    pub deposition: DepositionTable,
    pub variables: Vec<VariableAnalysis>,
    pub regression: Option<RegressionFit>,
    pub fire: FireProximity,
    /// Albedo before and after each day with a nearby fire.
    pub fire_impacts: Vec<EventImpact>,
}

impl SiteAnalysis {
    pub fn variable(&self, name: &str) -> Option<&VariableAnalysis> {
        self.variables.iter().find(|v| v.variable == name)
    }
}

fn finite_max(values: &[f64]) -> f64 {
    values.iter().copied().filter(|v| v.is_finite()).fold(f64::NAN, f64::max)
}

/// Daily mean of the complete trailing-window sums of `hourly`.
fn daily_driver(hourly: &TimeSeries, window: Window) -> AnalysisResult<TimeSeries> {
    let windowed = rolling(hourly, window, Reduction::Sum)?;
    Ok(resample_daily_mean(&windowed.complete_only())?)
}

fn analyze_variable(
    site: &GlacierSite, hourly: &TimeSeries, response: &TimeSeries, config: &AnalysisConfig,
    columns: &mut Vec<(String, Vec<f64>)>,
) -> AnalysisResult<VariableAnalysis> {
    let variable = hourly.name().to_string();
    let total = hourly.values().iter().filter(|v| v.is_finite()).sum();

    columns.push((variable.clone(), hourly.values().to_vec()));
    let mut window_max = Vec::with_capacity(config.windows.len());
    for window in &config.windows {
        let sums = rolling(hourly, *window, Reduction::Sum)?;
        window_max.push((window.label(), finite_max(sums.series().values())));
        columns.push((sums.series().name().to_string(), sums.series().values().to_vec()));
    }
    let running = cumulative(hourly)?;
    columns.push((running.name().to_string(), running.values().to_vec()));

    let driver = daily_driver(hourly, config.correlation_window)?;
    let (x, y) = inner_join(&driver, response);
    if x.is_empty() {
        return Err(AnalysisError::NoOverlap { site: site.id.clone() });
    }
    let lags = compute_lag_analysis(
        x.values(),
        y.values(),
        config.lag.max_lag,
        config.lag.method,
        &config.lag.options,
    )?;
    if let Some(best) = lags.best_lag() {
        debug!(%variable, lag = best.lag, r = ?best.coefficient(), "best lag");
    }
    let events = detect_extreme_events(
        x.values(),
        y.values(),
        config.extremes.percentile,
        config.extremes.windows(),
    )?;
    let statistics = extreme_statistics(hourly.values(), &config.extremes.summary_percentiles)?;

    Ok(VariableAnalysis {
        variable,
        total,
        window_max,
        driver,
        dates: x.timestamps().to_vec(),
        lags,
        events,
        statistics,
    })
}

fn regression_lag(analysis: &VariableAnalysis, config: &AnalysisConfig) -> usize {
    config.regression.lags.get(&analysis.variable).copied().unwrap_or_else(|| {
        analysis.lags.best_lag().and_then(|r| usize::try_from(r.lag).ok()).unwrap_or(0)
    })
}

fn regress(
    variables: &[VariableAnalysis], response: &TimeSeries, config: &AnalysisConfig,
) -> Option<RegressionFit> {
    let mut series: Vec<&TimeSeries> = vec![response];
    series.extend(variables.iter().map(|v| &v.driver));
    let aligned = align(&series);
    let (y, drivers) = aligned.split_first()?;
    let predictors: Vec<Predictor> = variables
        .iter()
        .zip(drivers)
        .map(|(v, d)| Predictor::new(&v.variable, d.values().to_vec(), regression_lag(v, config)))
        .collect();
    match fit_regression(&predictors, y.values(), &config.regression.options()) {
        Ok(fit) => {
            debug!(n_obs = fit.n_obs, r_squared = fit.r_squared, "regression fitted");
            Some(fit)
        }
        Err(e) => {
            warn!(error = %e, "regression skipped");
            None
        }
    }
}

/// Run the full analysis for one glacier.
///
/// Errors
/// ------
/// - `MissingData` when no albedo series matches the glacier.
/// - `OutOfBounds` when the glacier lies outside the grid.
/// - `NoOverlap` when deposition and albedo share no day.
/// - Aggregation, correlation or event-detection failures for a species.
pub fn analyze_site(
    inputs: &AnalysisInputs, site: &GlacierSite, config: &AnalysisConfig,
) -> AnalysisResult<SiteAnalysis> {
    let _site = info_span!("site", id = %site.id).entered();
    let albedo = resample_daily_mean(albedo_for_site(&inputs.albedo, &site.id)?)?;
    let response = difference(&albedo);
    let footprint = config.extraction.footprint();

    let mut columns = Vec::new();
    let mut variables = Vec::with_capacity(config.deposition_variables.len());
    for name in &config.deposition_variables {
        let hourly = site_series(&inputs.field, name, site, config.extraction.mode, &footprint)?;
        variables.push(analyze_variable(site, &hourly, &response, config, &mut columns)?);
    }
    let regression = regress(&variables, &response, config);

    let fire = fire_proximity(site, &inputs.fires, config.fire.buffer_km);
    let days =
        |n: usize| i64::try_from(n).ok().and_then(TimeDelta::try_days).unwrap_or(TimeDelta::MAX);
    let (pre, post) = (days(config.extremes.pre), days(config.extremes.post));
    let fire_impacts = fire_days_near(site, &inputs.fires, config.fire.buffer_km)
        .into_iter()
        .map(|day| impact_around(&albedo, day.and_time(NaiveTime::MIN), pre, post))
        .collect();

    let times = inputs.field.times().to_vec();
    info!(species = variables.len(), days = albedo.len(), "glacier analysed");
    Ok(SiteAnalysis {
        site_id: site.id.clone(),
        label: site.label().to_string(),
        n_hours: times.len(),
        deposition: DepositionTable { times, columns },
        variables,
        regression,
        fire,
        fire_impacts,
    })
}

/// Outcome of one glacier in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteOutcome {
    pub site_id: String,
    pub label: String,
    pub result: AnalysisResult<SiteAnalysis>,
}

impl SiteOutcome {
    /// `"ok"` or `"failed: <reason>"`, as written to the summary table.
    pub fn status(&self) -> String {
        match &self.result {
            Ok(_) => "ok".to_string(),
            Err(e) => format!("failed: {e}"),
        }
    }
}

/// BatchReport — per-glacier outcomes in inventory order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SiteOutcome>,
}

impl BatchReport {
    pub fn analyses(&self) -> impl Iterator<Item = &SiteAnalysis> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn n_succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.outcomes.len() - self.n_succeeded()
    }
}

/// Analyse every glacier of `inputs.inventory` in parallel.
pub fn run_batch(inputs: &AnalysisInputs, config: &AnalysisConfig) -> BatchReport {
    let _batch = info_span!("batch", glaciers = inputs.inventory.len()).entered();
    let outcomes: Vec<SiteOutcome> = inputs
        .inventory
        .sites()
        .par_iter()
        .map(|site| {
            let result = analyze_site(inputs, site, config);
            if let Err(e) = &result {
                warn!(site = %site.id, error = %e, "glacier analysis failed");
            }
            SiteOutcome { site_id: site.id.clone(), label: site.label().to_string(), result }
        })
        .collect();
    let report = BatchReport { outcomes };
    info!(succeeded = report.n_succeeded(), failed = report.n_failed(), "batch finished");
    report
}
