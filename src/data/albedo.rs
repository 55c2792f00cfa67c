//! data::albedo — satellite albedo decoding and albedo series tables.
//!
//! Purpose
//! -------
//! Convert raw satellite products to broadband albedo and read per-glacier
//! albedo time series from CSV.
//!
//! Key behaviors
//! -------------
//! - MODIS snow albedo: the fill value `32767` becomes NaN; other values
//!   are scaled by `0.001`.
//! - Sentinel-2 narrow-to-broadband conversion (Liang 2001) from surface
//!   reflectance in bands B02, B03, B04, B08, B11 with offset `-0.0018`,
//!   clipped to `[0, 1]`.
//! - Albedo CSV tables (`date,albedo[,RGIId]`) are grouped per glacier.
//!   Rows without an id are stored under [`ANY_SITE`] and used for any
//!   glacier lacking its own series.
//! - [`AlbedoEncoding`] selects how a row becomes albedo: a broadband
//!   value as is, a raw MODIS integer in the `albedo` column, or Sentinel-2
//!   reflectance in `B02,B03,B04,B08,B11` columns.
use crate::data::{
    errors::{DataError, DataResult},
    loader::parse_timestamp,
    series::TimeSeries,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, str::FromStr};
use tracing::info;

/// MODIS snow-albedo fill value.
pub const MODIS_FILL_VALUE: i32 = 32767;
/// MODIS snow-albedo scale factor.
pub const MODIS_SCALE_FACTOR: f64 = 0.001;

/// Key for albedo rows that carry no glacier id.
pub const ANY_SITE: &str = "*";

/// Decode one MODIS snow-albedo integer.
pub fn decode_modis_albedo(raw: i32) -> f64 {
    if raw == MODIS_FILL_VALUE {
        f64::NAN
    } else {
        raw as f64 * MODIS_SCALE_FACTOR
    }
}

/// Sentinel-2 surface reflectance bands used for broadband albedo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentinel2Reflectance {
    pub b02: f64,
    pub b03: f64,
    pub b04: f64,
    pub b08: f64,
    pub b11: f64,
}

impl Sentinel2Reflectance {
    /// Liang (2001) broadband albedo, clipped to `[0, 1]`. NaN bands give NaN.
    pub fn broadband_albedo(&self) -> f64 {
        let albedo = 0.356 * self.b02 + 0.130 * self.b03 + 0.373 * self.b04 + 0.085 * self.b08
            + 0.072 * self.b11
            - 0.0018;
        if albedo.is_nan() {
            albedo
        } else {
            albedo.clamp(0.0, 1.0)
        }
    }
}

/// How the value columns of an albedo table are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbedoEncoding {
    /// `albedo` holds broadband albedo in `[0, 1]`.
    #[default]
    Broadband,
    /// `albedo` holds raw MODIS snow-albedo integers.
    Modis,
    /// `B02,B03,B04,B08,B11` hold Sentinel-2 surface reflectance.
    Sentinel2,
}

impl FromStr for AlbedoEncoding {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadband" => Ok(AlbedoEncoding::Broadband),
            "modis" => Ok(AlbedoEncoding::Modis),
            "sentinel2" | "s2" => Ok(AlbedoEncoding::Sentinel2),
            other => Err(DataError::UnsupportedSource(other.to_string())),
        }
    }
}

const SENTINEL2_BANDS: [&str; 5] = ["B02", "B03", "B04", "B08", "B11"];

#[derive(Debug, Deserialize)]
struct AlbedoRecord {
    date: String,
    #[serde(default)]
    albedo: Option<f64>,
    #[serde(rename = "RGIId", default)]
    rgi_id: Option<String>,
    #[serde(rename = "B02", default)]
    b02: Option<f64>,
    #[serde(rename = "B03", default)]
    b03: Option<f64>,
    #[serde(rename = "B04", default)]
    b04: Option<f64>,
    #[serde(rename = "B08", default)]
    b08: Option<f64>,
    #[serde(rename = "B11", default)]
    b11: Option<f64>,
}

impl AlbedoRecord {
    fn decode(&self, encoding: AlbedoEncoding) -> DataResult<f64> {
        let band = |v: Option<f64>| v.unwrap_or(f64::NAN);
        match encoding {
            AlbedoEncoding::Broadband => Ok(band(self.albedo)),
            AlbedoEncoding::Modis => match self.albedo {
                None => Ok(f64::NAN),
                Some(raw) if raw.fract() == 0.0 && raw.abs() <= i32::MAX as f64 => {
                    Ok(decode_modis_albedo(raw as i32))
                }
                Some(raw) => Err(DataError::Parse(format!(
                    "MODIS albedo on {} must be an integer, got {raw}",
                    self.date
                ))),
            },
            AlbedoEncoding::Sentinel2 => Ok(Sentinel2Reflectance {
                b02: band(self.b02),
                b03: band(self.b03),
                b04: band(self.b04),
                b08: band(self.b08),
                b11: band(self.b11),
            }
            .broadband_albedo()),
        }
    }
}

/// Read a broadband albedo table into one series per glacier id.
///
/// Equivalent to [`load_albedo_csv_as`] with [`AlbedoEncoding::Broadband`].
pub fn load_albedo_csv(path: &Path) -> DataResult<BTreeMap<String, TimeSeries>> {
    load_albedo_csv_as(path, AlbedoEncoding::Broadband)
}

/// Read an albedo table into one series per glacier id, decoding each row
/// with `encoding`.
///
/// Rows may be unsorted; empty value cells become NaN.
///
/// Errors
/// ------
/// - `MissingData` when the file does not exist or holds no rows.
/// - `MissingVariable` when a Sentinel-2 table lacks a band column.
/// - `DuplicateRecord` when a glacier has two rows for the same date.
/// - `Parse` / `Csv` for malformed rows, including non-integer MODIS values.
pub fn load_albedo_csv_as(
    path: &Path, encoding: AlbedoEncoding,
) -> DataResult<BTreeMap<String, TimeSeries>> {
    if !path.exists() {
        return Err(DataError::MissingData(format!("albedo file {}", path.display())));
    }
    let mut reader = csv::Reader::from_path(path)?;
    if encoding == AlbedoEncoding::Sentinel2 {
        let headers = reader.headers()?;
        if let Some(band) = SENTINEL2_BANDS.iter().find(|b| !headers.iter().any(|h| h == **b)) {
            return Err(DataError::MissingVariable { variable: band.to_string() });
        }
    }
    let mut grouped: BTreeMap<String, Vec<(chrono::NaiveDateTime, f64)>> = BTreeMap::new();
    for record in reader.deserialize::<AlbedoRecord>() {
        let record = record?;
        let time = parse_timestamp(&record.date)?;
        let value = record.decode(encoding)?;
        let key = record.rgi_id.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| ANY_SITE.into());
        grouped.entry(key).or_default().push((time, value));
    }
    if grouped.is_empty() {
        return Err(DataError::MissingData(format!("no albedo rows in {}", path.display())));
    }

    let mut out = BTreeMap::new();
    for (id, mut rows) in grouped {
        rows.sort_by_key(|(t, _)| *t);
        if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(DataError::DuplicateRecord(format!("albedo for '{id}' at {}", w[0].0)));
        }
        let (times, values): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        out.insert(id.clone(), TimeSeries::new("albedo", times, values)?);
    }
    info!(path = %path.display(), sites = out.len(), "loaded albedo series");
    Ok(out)
}

/// Albedo series for `site_id`, falling back to the [`ANY_SITE`] series.
pub fn albedo_for_site<'a>(
    table: &'a BTreeMap<String, TimeSeries>, site_id: &str,
) -> DataResult<&'a TimeSeries> {
    table
        .get(site_id)
        .or_else(|| table.get(ANY_SITE))
        .ok_or_else(|| DataError::MissingData(format!("albedo series for glacier '{site_id}'")))
}
