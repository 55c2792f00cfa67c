//! data::loader — file readers for deposition grids and glacier inventories.
//!
//! Purpose
//! -------
//! Turn the collaborators' file formats into the typed containers of the
//! `data` module, failing fast with [`DataError`] when inputs are absent or
//! malformed.
//!
//! Key behaviors
//! -------------
//! - Deposition long tables (`time,lat,lon,<species>...`) are pivoted into a
//!   rectilinear [`DepositionField`]; absent cells become NaN.
//! - Hourly model directories (`YYYYMMDDHH_000.<ext>`) are walked hour by
//!   hour through a [`SliceReader`]; missing hours are skipped and logged.
//! - Glacier inventories (`RGIId,Name,CenLat,CenLon,Area,Zmed[,polygon]`)
//!   are read into a [`GlacierInventory`].
//! - [`check_availability`] reports every missing input path at once so the
//!   caller can decide between aborting and an explicit synthetic mode.
//!
//! Conventions
//! -----------
//! - Coordinate column aliases: `time|timestamp|datetime|date`,
//!   `lat|latitude`, `lon|longitude`.
//! - Timestamps accept ISO-8601 with `T` or space separators, with or
//!   without seconds, plain dates (midnight), and compact `YYYYMMDDHH`.
use crate::{
    data::{
        errors::{DataError, DataResult},
        glacier::{GlacierInventory, GlacierSite},
        grid::{DepositionField, GridSlice},
    },
    spatial::geometry::Polygon,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use ndarray::{Array3, Axis};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

const TIME_COLUMNS: [&str; 4] = ["time", "timestamp", "datetime", "date"];
const LAT_COLUMNS: [&str; 2] = ["lat", "latitude"];
const LON_COLUMNS: [&str; 2] = ["lon", "longitude"];

/// Parse a timestamp in any of the accepted layouts.
pub fn parse_timestamp(text: &str) -> DataResult<NaiveDateTime> {
    let text = text.trim();
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, layout) {
            return Ok(t);
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(day.and_time(NaiveTime::MIN));
    }
    if text.len() == 10 && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(t) = NaiveDateTime::parse_from_str(&format!("{text}0000"), "%Y%m%d%H%M%S") {
            return Ok(t);
        }
    }
    Err(DataError::Parse(format!("unrecognised timestamp '{text}'")))
}

// ---- Deposition tables ----

struct PointRow {
    time: NaiveDateTime,
    lat: f64,
    lon: f64,
    values: Vec<f64>,
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
}

fn parse_cell(field: &str, column: &str, line: usize) -> DataResult<f64> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    field
        .parse::<f64>()
        .map_err(|e| DataError::Parse(format!("line {line}, column '{column}': {e}")))
}

/// Read point rows; `fixed_time` replaces the time column for slice files.
fn read_point_rows(
    path: &Path, variables: &[String], fixed_time: Option<NaiveDateTime>,
) -> DataResult<(Vec<String>, Vec<PointRow>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let time_col = match fixed_time {
        Some(_) => None,
        None => Some(find_column(&headers, &TIME_COLUMNS).ok_or_else(|| {
            DataError::Parse(format!("{}: no time column", path.display()))
        })?),
    };
    let lat_col = find_column(&headers, &LAT_COLUMNS)
        .ok_or_else(|| DataError::Parse(format!("{}: no latitude column", path.display())))?;
    let lon_col = find_column(&headers, &LON_COLUMNS)
        .ok_or_else(|| DataError::Parse(format!("{}: no longitude column", path.display())))?;

    let names: Vec<String> = if variables.is_empty() {
        headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != time_col && *i != lat_col && *i != lon_col)
            .map(|(_, h)| h.trim().to_string())
            .collect()
    } else {
        variables.to_vec()
    };
    let var_cols = names
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.trim() == name.as_str())
                .ok_or_else(|| DataError::MissingVariable { variable: name.clone() })
        })
        .collect::<DataResult<Vec<usize>>>()?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let field = |col: usize| record.get(col).unwrap_or_default();
        let time = match fixed_time {
            Some(t) => t,
            None => parse_timestamp(time_col.map(|c| field(c)).unwrap_or_default())?,
        };
        let lat = parse_cell(field(lat_col), "lat", line)?;
        let lon = parse_cell(field(lon_col), "lon", line)?;
        let values = names
            .iter()
            .zip(&var_cols)
            .map(|(name, &col)| parse_cell(field(col), name, line))
            .collect::<DataResult<Vec<f64>>>()?;
        rows.push(PointRow { time, lat, lon, values });
    }
    Ok((names, rows))
}

fn sorted_axis(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut axis: Vec<f64> = values.collect();
    axis.sort_by(f64::total_cmp);
    axis.dedup();
    axis
}

fn axis_position(axis: &[f64], value: f64) -> usize {
    // Every value was inserted into the axis, so the search always hits.
    axis.binary_search_by(|x| x.total_cmp(&value)).unwrap_or_else(|i| i)
}

fn grid_from_points(names: Vec<String>, rows: Vec<PointRow>) -> DataResult<DepositionField> {
    if rows.is_empty() {
        return Err(DataError::MissingData("deposition table has no rows".into()));
    }
    if let Some(bad) = rows.iter().find(|r| !r.lat.is_finite() || !r.lon.is_finite()) {
        return Err(DataError::Parse(format!("non-finite coordinate at {}", bad.time)));
    }
    let mut times: Vec<NaiveDateTime> = rows.iter().map(|r| r.time).collect();
    times.sort_unstable();
    times.dedup();
    let lats = sorted_axis(rows.iter().map(|r| r.lat));
    let lons = sorted_axis(rows.iter().map(|r| r.lon));

    let shape = (times.len(), lats.len(), lons.len());
    let mut arrays: Vec<Array3<f64>> =
        names.iter().map(|_| Array3::from_elem(shape, f64::NAN)).collect();
    let mut seen = Array3::from_elem(shape, false);

    for row in rows {
        let t = times.partition_point(|x| *x < row.time);
        let i = axis_position(&lats, row.lat);
        let j = axis_position(&lons, row.lon);
        if seen[[t, i, j]] {
            return Err(DataError::DuplicateRecord(format!(
                "cell (time = {}, lat = {}, lon = {}) appears twice",
                row.time, row.lat, row.lon
            )));
        }
        seen[[t, i, j]] = true;
        for (array, value) in arrays.iter_mut().zip(row.values) {
            array[[t, i, j]] = value;
        }
    }

    let variables: BTreeMap<String, Array3<f64>> = names.into_iter().zip(arrays).collect();
    DepositionField::new(times, lats, lons, variables)
}

/// Read a long-format deposition table.
///
/// Parameters
/// ----------
/// - `variables`: species columns to keep; empty keeps every column that
///   is not a coordinate.
///
/// Errors
/// ------
/// - `MissingData` if the file does not exist or has no rows.
/// - `MissingVariable` if a requested species column is absent.
/// - `DuplicateRecord` when a `(time, lat, lon)` cell repeats.
pub fn load_deposition_csv(path: &Path, variables: &[String]) -> DataResult<DepositionField> {
    if !path.exists() {
        return Err(DataError::MissingData(format!("deposition file {}", path.display())));
    }
    let (names, rows) = read_point_rows(path, variables, None)?;
    let field = grid_from_points(names, rows)?;
    info!(
        path = %path.display(),
        times = field.times().len(),
        lats = field.lats().len(),
        lons = field.lons().len(),
        "loaded deposition table"
    );
    Ok(field)
}

// ---- Hourly model directories ----

/// SliceReader — reads one hourly model file into a [`GridSlice`].
///
/// Implementations decide the on-disk format; the directory walk only
/// needs the file extension to build `YYYYMMDDHH_000.<ext>` names.
pub trait SliceReader: Sync {
    fn extension(&self) -> &str;

    fn read_slice(
        &self, path: &Path, time: NaiveDateTime, variables: &[String],
    ) -> DataResult<GridSlice>;
}

/// Hourly slices stored as `lat,lon,<species>...` CSV files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSliceReader;

impl SliceReader for CsvSliceReader {
    fn extension(&self) -> &str {
        "csv"
    }

    fn read_slice(
        &self, path: &Path, time: NaiveDateTime, variables: &[String],
    ) -> DataResult<GridSlice> {
        let (names, rows) = read_point_rows(path, variables, Some(time))?;
        let field = grid_from_points(names, rows)?;
        let variables = field
            .variable_names()
            .map(|name| {
                let layer = field.variable(name)?.index_axis(Axis(0), 0).to_owned();
                Ok((name.to_string(), layer))
            })
            .collect::<DataResult<BTreeMap<_, _>>>()?;
        Ok(GridSlice { time, lats: field.lats().to_vec(), lons: field.lons().to_vec(), variables })
    }
}

/// File name of the model output valid at `time`.
pub fn hourly_file_name(time: NaiveDateTime, extension: &str) -> String {
    format!("{}_000.{}", time.format("%Y%m%d%H"), extension)
}

/// Walk `dir` hour by hour over `[start, end]` and stack the slices found.
///
/// Errors
/// ------
/// - `MissingData` when the directory is absent or no hourly file exists in
///   the range.
/// - Any error raised by `reader` for a file that exists.
pub fn load_hourly_directory(
    dir: &Path, start: NaiveDateTime, end: NaiveDateTime, variables: &[String],
    reader: &dyn SliceReader,
) -> DataResult<DepositionField> {
    if !dir.is_dir() {
        return Err(DataError::MissingData(format!("deposition directory {}", dir.display())));
    }
    let mut slices = Vec::new();
    let mut missing = 0usize;
    let mut t = start;
    while t <= end {
        let path = dir.join(hourly_file_name(t, reader.extension()));
        if path.exists() {
            debug!(path = %path.display(), "reading hourly slice");
            slices.push(reader.read_slice(&path, t, variables)?);
        } else {
            missing += 1;
        }
        t += TimeDelta::hours(1);
    }
    if slices.is_empty() {
        return Err(DataError::MissingData(format!(
            "no hourly files in {} between {start} and {end}",
            dir.display()
        )));
    }
    if missing > 0 {
        warn!(missing, found = slices.len(), "hourly files missing; hours skipped");
    }
    let field = DepositionField::from_slices(slices)?;
    info!(dir = %dir.display(), hours = field.times().len(), "loaded hourly deposition");
    Ok(field)
}

// ---- Glacier inventories ----

#[derive(Debug, Deserialize)]
struct GlacierRecord {
    #[serde(rename = "RGIId")]
    id: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "CenLat")]
    lat: f64,
    #[serde(rename = "CenLon")]
    lon: f64,
    #[serde(rename = "Area")]
    area: f64,
    #[serde(rename = "Zmed", default)]
    zmed: Option<f64>,
    #[serde(default)]
    polygon: Option<String>,
}

/// Read an RGI-style glacier table.
///
/// Errors
/// ------
/// - `MissingData` when the file does not exist.
/// - `InvalidGeometry` / `Parse` for a malformed `polygon` cell.
/// - `DuplicateRecord` when an id repeats.
pub fn load_glacier_csv(path: &Path) -> DataResult<GlacierInventory> {
    if !path.exists() {
        return Err(DataError::MissingData(format!("glacier inventory {}", path.display())));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut sites = Vec::new();
    for record in reader.deserialize::<GlacierRecord>() {
        let r = record?;
        let outline = match r.polygon.as_deref().map(str::trim) {
            Some(wkt) if !wkt.is_empty() => Some(Polygon::from_wkt(wkt)?),
            _ => None,
        };
        sites.push(GlacierSite {
            id: r.id,
            name: r.name.filter(|n| !n.trim().is_empty()),
            centroid_lat: r.lat,
            centroid_lon: r.lon,
            outline,
            area_km2: r.area,
            median_elevation_m: r.zmed,
        });
    }
    let inventory = GlacierInventory::new(sites)?;
    info!(path = %path.display(), glaciers = inventory.len(), "loaded glacier inventory");
    Ok(inventory)
}

// ---- Availability ----

/// Fail with one `MissingData` naming every path that does not exist.
pub fn check_availability(paths: &[PathBuf]) -> DataResult<()> {
    let missing: Vec<String> =
        paths.iter().filter(|p| !p.exists()).map(|p| p.display().to_string()).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::MissingData(missing.join(", ")))
    }
}
