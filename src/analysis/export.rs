//! analysis::export — CSV tables of a finished run.
//!
//! Every glacier that succeeded gets its own files in the output
//! directory; the run as a whole gets `glacier_summary.csv` (one row per
//! glacier, failures included) and `fire_proximity.csv`.
//!
//! | file                           | one row per                        |
//! |--------------------------------|------------------------------------|
//! | `<id>_lags.csv`                | species × lag                      |
//! | `<id>_regression.csv`          | predictor, plus the intercept      |
//! | `<id>_regression_model.csv`    | model statistic                    |
//! | `<id>_events.csv`              | deposition exceedance or fire day  |
//! | `<id>_extremes.csv`            | species × summary percentile       |
//! | `<id>_deposition.csv`          | hour                               |
//!
//! Missing values (undefined correlations, NaN samples) are written as
//! empty cells.
use crate::analysis::{
    config::AnalysisConfig,
    errors::AnalysisResult,
    pipeline::{BatchReport, SiteAnalysis},
};
use crate::regression::ols::{CovarianceKind, RegressionFit};
use crate::statistical_tests::{correlation::CorrelationEstimate, lag::LagAnalysis};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File-name-safe form of a glacier id.
pub fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

/// Timestamp text used in the deposition table.
pub fn format_time(t: NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn cell(value: f64) -> String {
    if value.is_finite() { value.to_string() } else { String::new() }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[derive(Debug, Serialize)]
struct LagRow<'a> {
    variable: &'a str,
    lag: i64,
    correlation: Option<f64>,
    p_value: Option<f64>,
    n_obs: usize,
    ci_lower: Option<f64>,
    ci_upper: Option<f64>,
    status: &'static str,
}

fn lag_rows<'a>(variable: &'a str, analysis: &LagAnalysis) -> Vec<LagRow<'a>> {
    analysis
        .results()
        .iter()
        .map(|r| {
            let ci = r.estimate.confidence_interval();
            LagRow {
                variable,
                lag: r.lag,
                correlation: r.estimate.coefficient(),
                p_value: r.estimate.p_value(),
                n_obs: r.n_obs,
                ci_lower: ci.map(|c| c.0),
                ci_upper: ci.map(|c| c.1),
                status: match &r.estimate {
                    CorrelationEstimate::Defined { .. } => "ok",
                    CorrelationEstimate::Undefined(reason) => reason.tag(),
                },
            }
        })
        .collect()
}

pub fn write_lags_csv(path: &Path, site: &SiteAnalysis) -> AnalysisResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for v in &site.variables {
        for row in lag_rows(&v.variable, &v.lags) {
            writer.serialize(row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct RegressionRow<'a> {
    variable: &'a str,
    lag: Option<usize>,
    coefficient: f64,
    coefficient_normalized: Option<f64>,
    std_error: f64,
    t_stat: f64,
    p_value: f64,
    vif: Option<f64>,
}

pub fn write_regression_csv(path: &Path, fit: &RegressionFit) -> AnalysisResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.serialize(RegressionRow {
        variable: "intercept",
        lag: None,
        coefficient: fit.intercept,
        coefficient_normalized: None,
        std_error: fit.intercept_std_error,
        t_stat: fit.intercept / fit.intercept_std_error,
        p_value: fit.intercept_p_value,
        vif: None,
    })?;
    for p in &fit.predictors {
        writer.serialize(RegressionRow {
            variable: &p.name,
            lag: Some(p.lag),
            coefficient: p.coefficient,
            coefficient_normalized: Some(p.coefficient_normalized),
            std_error: p.std_error,
            t_stat: p.t_stat,
            p_value: p.p_value,
            vif: finite(p.vif),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_regression_model_csv(path: &Path, fit: &RegressionFit) -> AnalysisResult<()> {
    let covariance = match fit.covariance {
        CovarianceKind::Classical => "classical".to_string(),
        CovarianceKind::Hac(opts) => format!("hac:{}", opts.kernel.name()),
    };
    let mut rows: Vec<(&str, String)> = vec![
        ("n_obs", fit.n_obs.to_string()),
        ("r_squared", cell(fit.r_squared)),
        ("adj_r_squared", cell(fit.adj_r_squared)),
        ("f_statistic", cell(fit.f_statistic)),
        ("f_p_value", cell(fit.f_p_value)),
        ("log_likelihood", cell(fit.log_likelihood)),
        ("aic", cell(fit.aic)),
        ("bic", cell(fit.bic)),
        ("durbin_watson", cell(fit.durbin_watson)),
        ("covariance", covariance),
    ];
    if let Some(inter) = &fit.interaction {
        rows.push(("interaction_r_squared", cell(inter.r_squared)));
        rows.push(("significant_interactions", inter.significant.join(";")));
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["statistic", "value"])?;
    for (name, value) in rows {
        writer.write_record([name, value.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct EventRow<'a> {
    kind: &'static str,
    variable: &'a str,
    date: String,
    value: Option<f64>,
    pre_mean: Option<f64>,
    post_mean: Option<f64>,
    impact: Option<f64>,
}

pub fn write_events_csv(path: &Path, site: &SiteAnalysis) -> AnalysisResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for v in &site.variables {
        for e in &v.events.events {
            let date = v.dates.get(e.index).map(|d| d.format(DATE_FORMAT).to_string());
            writer.serialize(EventRow {
                kind: "deposition",
                variable: &v.variable,
                date: date.unwrap_or_default(),
                value: Some(e.value),
                pre_mean: e.pre_mean,
                post_mean: e.post_mean,
                impact: e.impact,
            })?;
        }
    }
    for f in &site.fire_impacts {
        writer.serialize(EventRow {
            kind: "fire",
            variable: "albedo",
            date: f.at.format(DATE_FORMAT).to_string(),
            value: None,
            pre_mean: f.pre_mean,
            post_mean: f.post_mean,
            impact: f.impact,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ExtremeRow<'a> {
    variable: &'a str,
    percentile: f64,
    threshold: f64,
    count: usize,
    frequency: f64,
    mean_run_length: f64,
    max_run_length: usize,
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
}

pub fn write_extremes_csv(path: &Path, site: &SiteAnalysis) -> AnalysisResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for v in &site.variables {
        let s = &v.statistics;
        for level in &s.levels {
            writer.serialize(ExtremeRow {
                variable: &v.variable,
                percentile: level.percentile,
                threshold: level.threshold,
                count: level.count,
                frequency: level.frequency,
                mean_run_length: level.mean_run_length,
                max_run_length: level.max_run_length,
                mean: s.mean,
                std_dev: s.std_dev,
                min: s.min,
                max: s.max,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_deposition_csv(path: &Path, site: &SiteAnalysis) -> AnalysisResult<()> {
    let table = &site.deposition;
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["time".to_string()];
    header.extend(table.columns.iter().map(|(name, _)| name.clone()));
    writer.write_record(&header)?;
    let mut record = Vec::with_capacity(header.len());
    for (i, t) in table.times.iter().enumerate() {
        record.clear();
        record.push(format_time(*t));
        record.extend(
            table.columns.iter().map(|(_, v)| v.get(i).copied().map_or_else(String::new, cell)),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every per-glacier table of `site` into `dir`.
pub fn write_site_outputs(dir: &Path, site: &SiteAnalysis) -> AnalysisResult<Vec<PathBuf>> {
    let stem = file_stem(&site.site_id);
    let path = |suffix: &str| dir.join(format!("{stem}_{suffix}.csv"));
    let mut written = Vec::new();

    let lags = path("lags");
    write_lags_csv(&lags, site)?;
    written.push(lags);
    if let Some(fit) = &site.regression {
        let coefficients = path("regression");
        write_regression_csv(&coefficients, fit)?;
        written.push(coefficients);
        let model = path("regression_model");
        write_regression_model_csv(&model, fit)?;
        written.push(model);
    }
    let events = path("events");
    write_events_csv(&events, site)?;
    written.push(events);
    let extremes = path("extremes");
    write_extremes_csv(&extremes, site)?;
    written.push(extremes);
    let deposition = path("deposition");
    write_deposition_csv(&deposition, site)?;
    written.push(deposition);
    Ok(written)
}

fn summary_header(config: &AnalysisConfig) -> Vec<String> {
    let mut header: Vec<String> =
        ["RGIId", "name", "status", "n_hours"].iter().map(|s| s.to_string()).collect();
    for var in &config.deposition_variables {
        header.push(format!("{var}_total"));
        header.extend(config.windows.iter().map(|w| format!("{var}_max_{}", w.label())));
        header.push(format!("{var}_best_lag"));
        header.push(format!("{var}_best_r"));
        header.push(format!("{var}_best_p"));
    }
    header.push("regression_r2".into());
    header.push("n_fires".into());
    header
}

fn summary_record(site: &SiteAnalysis, config: &AnalysisConfig) -> Vec<String> {
    let mut row = Vec::new();
    for var in &config.deposition_variables {
        let Some(v) = site.variable(var) else {
            row.extend(std::iter::repeat(String::new()).take(4 + config.windows.len()));
            continue;
        };
        row.push(cell(v.total));
        for w in &config.windows {
            let label = w.label();
            let max = v.window_max.iter().find(|(l, _)| *l == label).map_or(f64::NAN, |m| m.1);
            row.push(cell(max));
        }
        match v.lags.best_lag() {
            Some(best) => {
                row.push(best.lag.to_string());
                row.push(best.coefficient().map_or_else(String::new, cell));
                row.push(best.p_value().map_or_else(String::new, cell));
            }
            None => row.extend(std::iter::repeat(String::new()).take(3)),
        }
    }
    row.push(site.regression.as_ref().map_or_else(String::new, |f| cell(f.r_squared)));
    row.push(site.fire.n_fires.to_string());
    row
}

/// `glacier_summary.csv`: one row per glacier with its status.
pub fn write_summary_csv(
    path: &Path, report: &BatchReport, config: &AnalysisConfig,
) -> AnalysisResult<()> {
    let header = summary_header(config);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;
    for outcome in &report.outcomes {
        let mut record = vec![outcome.site_id.clone(), outcome.label.clone(), outcome.status()];
        match &outcome.result {
            Ok(site) => {
                record.push(site.n_hours.to_string());
                record.extend(summary_record(site, config));
            }
            Err(_) => record.resize(header.len(), String::new()),
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_fire_proximity_csv(path: &Path, report: &BatchReport) -> AnalysisResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for site in report.analyses() {
        writer.serialize(&site.fire)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write all tables of a batch into `dir`, creating it if needed.
///
/// Errors
/// ------
/// - `Output` for any file-system or CSV failure.
pub fn write_batch_outputs(
    dir: &Path, report: &BatchReport, config: &AnalysisConfig,
) -> AnalysisResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for site in report.analyses() {
        written.extend(write_site_outputs(dir, site)?);
    }
    let summary = dir.join("glacier_summary.csv");
    write_summary_csv(&summary, report, config)?;
    written.push(summary);
    let fires = dir.join("fire_proximity.csv");
    write_fire_proximity_csv(&fires, report)?;
    written.push(fires);
    info!(dir = %dir.display(), files = written.len(), "results written");
    Ok(written)
}
