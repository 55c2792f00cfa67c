//! Integration tests for the per-glacier deposition/albedo pipeline.
//!
//! Purpose
//! -------
//! - Validate the end-to-end path from inputs on disk, through the loaders,
//!   the batch runner and the CSV writers, to the results directory.
//! - Check that a CSV round trip of the inputs leaves every lag
//!   correlation unchanged relative to the in-memory run.
//!
//! Coverage
//! --------
//! - `data::loader`, `data::albedo`: deposition long tables, glacier
//!   inventories and albedo tables written with `csv` and read back,
//!   including MODIS-encoded albedo and the input availability check.
//! - `analysis::pipeline`: `AnalysisInputs::prepare` and `run_batch` over
//!   every synthetic glacier, including per-glacier failure isolation.
//! - `analysis::export`: file set and headers of the results directory.
//!
//! Exclusions
//! ----------
//! - Numerical properties of the correlation engine, the window sums and
//!   the regression; those are covered by unit tests.
//! - NetCDF inputs and the Python bindings.
use approx::assert_relative_eq;
use raqdps_albedo::{
    analysis::{AnalysisConfig, AnalysisInputs, BatchReport, run_batch, write_batch_outputs},
    data::{
        albedo::{AlbedoEncoding, load_albedo_csv, load_albedo_csv_as},
        glacier::{GlacierInventory, GlacierSite},
        grid::DepositionField,
        errors::DataError,
        loader::{check_availability, load_deposition_csv, load_glacier_csv},
        series::TimeSeries,
        synthetic::SyntheticScenario,
    },
};
use std::{collections::BTreeMap, path::Path};

const ATHABASCA: &str = "RGI60-02.11738";

/// Purpose
/// -------
/// Generate the seeded synthetic dataset with a shorter period so the CSV
/// round trip stays small.
///
/// Invariants
/// ----------
/// - Glacier outlines are dropped: the glacier CSV written below has no
///   `polygon` column, and both runs must see identical sites.
/// - Fires are dropped for the same reason.
fn synthetic_inputs() -> AnalysisInputs {
    let scenario = SyntheticScenario { days: 40, ..SyntheticScenario::default() };
    let mut inputs: AnalysisInputs =
        scenario.generate().expect("synthetic generation should succeed").into();
    let sites: Vec<GlacierSite> = inputs
        .inventory
        .sites()
        .iter()
        .cloned()
        .map(|site| GlacierSite { outline: None, ..site })
        .collect();
    inputs.inventory = GlacierInventory::new(sites).expect("ids are unique");
    inputs.fires.clear();
    inputs
}

fn write_deposition(path: &Path, field: &DepositionField) {
    let names: Vec<String> = field.variable_names().map(String::from).collect();
    let mut writer = csv::Writer::from_path(path).unwrap();
    let mut header = vec!["time".to_string(), "lat".to_string(), "lon".to_string()];
    header.extend(names.iter().cloned());
    writer.write_record(&header).unwrap();
    for (t, time) in field.times().iter().enumerate() {
        for (i, lat) in field.lats().iter().enumerate() {
            for (j, lon) in field.lons().iter().enumerate() {
                let mut record = vec![
                    time.format("%Y-%m-%d %H:%M:%S").to_string(),
                    lat.to_string(),
                    lon.to_string(),
                ];
                for name in &names {
                    let value = field.variable(name).unwrap()[[t, i, j]];
                    record.push(if value.is_finite() { value.to_string() } else { String::new() });
                }
                writer.write_record(&record).unwrap();
            }
        }
    }
    writer.flush().unwrap();
}

fn write_glaciers(path: &Path, inventory: &GlacierInventory) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(["RGIId", "Name", "CenLat", "CenLon", "Area", "Zmed"]).unwrap();
    for site in inventory.sites() {
        writer
            .write_record([
                site.id.clone(),
                site.name.clone().unwrap_or_default(),
                site.centroid_lat.to_string(),
                site.centroid_lon.to_string(),
                site.area_km2.to_string(),
                site.median_elevation_m.map(|z| z.to_string()).unwrap_or_default(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
}

fn write_albedo(path: &Path, albedo: &BTreeMap<String, TimeSeries>) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(["date", "albedo", "RGIId"]).unwrap();
    for (id, series) in albedo {
        for (t, value) in series.iter() {
            let cell = if value.is_finite() { value.to_string() } else { String::new() };
            let date = t.format("%Y-%m-%d %H:%M:%S").to_string();
            writer.write_record([date, cell, id.clone()]).unwrap();
        }
    }
    writer.flush().unwrap();
}

fn read_table(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}

fn run(inputs: AnalysisInputs, config: &AnalysisConfig) -> BatchReport {
    let inputs = inputs.prepare(config).expect("prepare should succeed on synthetic inputs");
    run_batch(&inputs, config)
}

#[test]
// Purpose
// -------
// A default-config batch over the synthetic glaciers writes every table.
//
// Given
// -----
// - Three synthetic glaciers with albedo, default configuration.
//
// Expect
// ------
// - All glaciers succeed and each gets lags/events/extremes/deposition
//   files.
// - `glacier_summary.csv` has one row per glacier with status "ok".
// - The Athabasca lag table holds 11 forward lags per default species.
fn synthetic_batch_writes_results_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalysisConfig::default();
    let report = run(synthetic_inputs(), &config);
    assert_eq!(report.n_succeeded(), 3);
    assert_eq!(report.n_failed(), 0);

    let written = write_batch_outputs(dir.path(), &report, &config).unwrap();
    assert!(written.iter().all(|p| p.exists()));
    for id in [ATHABASCA, "SYN-0002", "SYN-0003"] {
        for suffix in ["lags", "events", "extremes", "deposition"] {
            let path = dir.path().join(format!("{id}_{suffix}.csv"));
            assert!(path.exists(), "missing {}", path.display());
        }
    }

    let (header, rows) = read_table(&dir.path().join("glacier_summary.csv"));
    assert_eq!(&header[..3], ["RGIId", "name", "status"]);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r[2] == "ok"));
    assert_eq!(rows[0][1], "Athabasca");

    let (header, rows) = read_table(&dir.path().join(format!("{ATHABASCA}_lags.csv")));
    assert_eq!(
        &header[..7],
        ["variable", "lag", "correlation", "p_value", "n_obs", "ci_lower", "ci_upper"]
    );
    assert_eq!(rows.len(), 11 * config.deposition_variables.len());
    assert!(dir.path().join("fire_proximity.csv").exists());
}

#[test]
// Purpose
// -------
// Reading the inputs back from CSV must not change any lag correlation.
//
// Given
// -----
// - The synthetic field, inventory and albedo written as long tables,
//   then loaded with the CSV loaders.
//
// Expect
// ------
// - Same glaciers and ordering in both batch reports.
// - Per-variable totals and every lag coefficient agree to 1e-10, and
//   undefined lags stay undefined.
fn csv_round_trip_reproduces_in_memory_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalysisConfig::default();
    let inputs = synthetic_inputs();

    let (dep, gla, alb) =
        (dir.path().join("dep.csv"), dir.path().join("rgi.csv"), dir.path().join("albedo.csv"));
    write_deposition(&dep, &inputs.field);
    write_glaciers(&gla, &inputs.inventory);
    write_albedo(&alb, &inputs.albedo);

    let loaded = AnalysisInputs {
        field: load_deposition_csv(&dep, &config.deposition_variables).unwrap(),
        inventory: load_glacier_csv(&gla).unwrap(),
        albedo: load_albedo_csv(&alb).unwrap(),
        fires: Vec::new(),
    };
    let from_disk = run(loaded, &config);
    let in_memory = run(inputs, &config);

    let ids = |r: &BatchReport| r.outcomes.iter().map(|o| o.site_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&from_disk), ids(&in_memory));

    for (a, b) in from_disk.analyses().zip(in_memory.analyses()) {
        assert_eq!(a.n_hours, b.n_hours);
        for (va, vb) in a.variables.iter().zip(&b.variables) {
            assert_eq!(va.variable, vb.variable);
            assert_relative_eq!(va.total, vb.total, max_relative = 1e-10);
            for (ra, rb) in va.lags.results().iter().zip(vb.lags.results()) {
                assert_eq!(ra.lag, rb.lag);
                assert_eq!(ra.n_obs, rb.n_obs);
                match (ra.coefficient(), rb.coefficient()) {
                    (Some(x), Some(y)) => assert_relative_eq!(x, y, epsilon = 1e-10),
                    (x, y) => assert_eq!(x, y),
                }
            }
        }
    }
}

#[test]
// Purpose
// -------
// A glacier without albedo fails alone; the rest of the batch is written.
//
// Given
// -----
// - Synthetic inputs with the SYN-0003 albedo series removed.
//
// Expect
// ------
// - Two successes, one failure, summary status "failed: ..." for SYN-0003
//   and no per-glacier tables for it.
fn missing_albedo_is_isolated_to_one_glacier() {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalysisConfig::default();
    let mut inputs = synthetic_inputs();
    inputs.albedo.remove("SYN-0003");

    let report = run(inputs, &config);
    assert_eq!(report.n_succeeded(), 2);
    assert_eq!(report.n_failed(), 1);

    write_batch_outputs(dir.path(), &report, &config).unwrap();
    assert!(!dir.path().join("SYN-0003_lags.csv").exists());
    let (_, rows) = read_table(&dir.path().join("glacier_summary.csv"));
    let failed = rows.iter().find(|r| r[0] == "SYN-0003").unwrap();
    assert!(failed[2].starts_with("failed"));
}

#[test]
// Purpose
// -------
// A MODIS-encoded albedo table feeds the batch like a broadband one, once
// every input path is confirmed to exist.
//
// Given
// -----
// - The synthetic inputs on disk, albedo written as raw MODIS integers
//   (value × 1000, fill 32767 for gaps), plus one absent fire file.
//
// Expect
// ------
// - The availability check names only the absent file.
// - Decoded albedo is within half a MODIS step of the original.
// - All three glaciers succeed.
fn modis_encoded_albedo_runs_after_availability_check() {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalysisConfig::default();
    let inputs = synthetic_inputs();
    let (dep, gla, alb) =
        (dir.path().join("dep.csv"), dir.path().join("rgi.csv"), dir.path().join("modis.csv"));
    write_deposition(&dep, &inputs.field);
    write_glaciers(&gla, &inputs.inventory);
    let mut writer = csv::Writer::from_path(&alb).unwrap();
    writer.write_record(["date", "albedo", "RGIId"]).unwrap();
    for (id, series) in &inputs.albedo {
        for (t, value) in series.iter() {
            let raw = if value.is_finite() { (value * 1000.0).round() as i32 } else { 32767 };
            let date = t.format("%Y-%m-%d %H:%M:%S").to_string();
            writer.write_record([date, raw.to_string(), id.clone()]).unwrap();
        }
    }
    writer.flush().unwrap();

    let absent = dir.path().join("fires.csv");
    let paths = [dep.clone(), gla.clone(), alb.clone(), absent.clone()];
    let err = check_availability(&paths).unwrap_err();
    assert_eq!(err, DataError::MissingData(absent.display().to_string()));
    check_availability(&paths[..3]).unwrap();

    let albedo = load_albedo_csv_as(&alb, AlbedoEncoding::Modis).unwrap();
    for (id, series) in &inputs.albedo {
        for (a, b) in albedo[id].values().iter().zip(series.values()) {
            match (a.is_finite(), b.is_finite()) {
                (true, true) => assert!((a - b).abs() <= 5e-4 + 1e-12, "{id}: {a} vs {b}"),
                (x, y) => assert_eq!(x, y),
            }
        }
    }
    let loaded = AnalysisInputs {
        field: load_deposition_csv(&dep, &config.deposition_variables).unwrap(),
        inventory: load_glacier_csv(&gla).unwrap(),
        albedo,
        fires: Vec::new(),
    };
    assert_eq!(run(loaded, &config).n_succeeded(), 3);
}
