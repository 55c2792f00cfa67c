//! data::fire — active-fire detections and glacier proximity summaries.
//!
//! Purpose
//! -------
//! Read satellite active-fire records (MODIS and VIIRS CSV exports), filter
//! them by date, and summarise the fires around each glacier within a
//! great-circle buffer.
//!
//! Conventions
//! -----------
//! - `acq_time` is an `HHMM` integer in UTC; values shorter than four digits
//!   are zero-padded (`5` → `00:05`).
//! - MODIS exports carry `brightness`; VIIRS exports carry `bright_ti4`.
//! - CWFIS hotspot exports are recognised but not read.
use crate::{
    data::{
        errors::{DataError, DataResult},
        glacier::{GlacierInventory, GlacierSite},
    },
    spatial::geometry::haversine_km,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr};
use tracing::{debug, info};

/// Fire-detection product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FireSource {
    Modis,
    Viirs,
    Cwfis,
}

impl FromStr for FireSource {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modis" => Ok(FireSource::Modis),
            "viirs" => Ok(FireSource::Viirs),
            "cwfis" => Ok(FireSource::Cwfis),
            other => Err(DataError::UnsupportedSource(other.to_string())),
        }
    }
}

/// FireDetection — one active-fire pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct FireDetection {
    pub time: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub brightness: f64,
    pub scan: f64,
    pub track: f64,
    pub frp: f64,
    pub confidence: String,
}

#[derive(Debug, Deserialize)]
struct FireRecord {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    brightness: Option<f64>,
    #[serde(default)]
    bright_ti4: Option<f64>,
    #[serde(default)]
    scan: Option<f64>,
    #[serde(default)]
    track: Option<f64>,
    acq_date: String,
    acq_time: String,
    #[serde(default)]
    frp: Option<f64>,
    #[serde(default)]
    confidence: Option<String>,
}

impl FireRecord {
    fn into_detection(self, source: FireSource, line: usize) -> DataResult<FireDetection> {
        let time = parse_acquisition(&self.acq_date, &self.acq_time)
            .map_err(|msg| DataError::Parse(format!("fire record {line}: {msg}")))?;
        let brightness = match source {
            FireSource::Viirs => self.bright_ti4.or(self.brightness),
            _ => self.brightness.or(self.bright_ti4),
        };
        Ok(FireDetection {
            time,
            lat: self.latitude,
            lon: self.longitude,
            brightness: brightness.unwrap_or(f64::NAN),
            scan: self.scan.unwrap_or(f64::NAN),
            track: self.track.unwrap_or(f64::NAN),
            frp: self.frp.unwrap_or(f64::NAN),
            confidence: self.confidence.unwrap_or_default(),
        })
    }
}

fn parse_acquisition(date: &str, time: &str) -> Result<NaiveDateTime, String> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| format!("acq_date '{date}': {e}"))?;
    let hhmm: u32 = time.trim().parse().map_err(|e| format!("acq_time '{time}': {e}"))?;
    let clock = NaiveTime::from_hms_opt(hhmm / 100, hhmm % 100, 0)
        .ok_or_else(|| format!("acq_time '{time}' is not a valid HHMM"))?;
    Ok(day.and_time(clock))
}

/// Read a MODIS or VIIRS active-fire CSV.
///
/// Errors
/// ------
/// - `UnsupportedSource` for `FireSource::Cwfis`.
/// - `MissingData` when the file does not exist.
/// - `Csv` / `Parse` for malformed rows.
pub fn load_fire_csv(path: &Path, source: FireSource) -> DataResult<Vec<FireDetection>> {
    if source == FireSource::Cwfis {
        return Err(DataError::UnsupportedSource("cwfis".into()));
    }
    if !path.exists() {
        return Err(DataError::MissingData(format!("fire file {}", path.display())));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut fires = Vec::new();
    for (line, record) in reader.deserialize::<FireRecord>().enumerate() {
        fires.push(record?.into_detection(source, line + 2)?);
    }
    fires.sort_by_key(|f| f.time);
    info!(path = %path.display(), count = fires.len(), "loaded fire detections");
    Ok(fires)
}

/// Detections with `start <= time <= end`.
pub fn filter_by_date(
    fires: &[FireDetection], start: NaiveDateTime, end: NaiveDateTime,
) -> Vec<FireDetection> {
    fires.iter().filter(|f| f.time >= start && f.time <= end).cloned().collect()
}

/// FireProximity — fires near one glacier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FireProximity {
    pub site_id: String,
    pub n_fires: usize,
    pub min_distance_km: Option<f64>,
    pub mean_distance_km: Option<f64>,
    pub total_frp: f64,
}

/// Summarise detections within `buffer_km` of the site centroid.
pub fn fire_proximity(
    site: &GlacierSite, fires: &[FireDetection], buffer_km: f64,
) -> FireProximity {
    let distances: Vec<(f64, f64)> = fires
        .iter()
        .map(|f| (haversine_km(site.centroid_lat, site.centroid_lon, f.lat, f.lon), f.frp))
        .filter(|(d, _)| *d <= buffer_km)
        .collect();
    let n_fires = distances.len();
    let min_distance_km = distances.iter().map(|(d, _)| *d).reduce(f64::min);
    let mean_distance_km =
        (n_fires > 0).then(|| distances.iter().map(|(d, _)| d).sum::<f64>() / n_fires as f64);
    let total_frp = distances.iter().map(|(_, frp)| frp).filter(|v| v.is_finite()).sum();
    debug!(site = %site.id, n_fires, buffer_km, "fire proximity");
    FireProximity {
        site_id: site.id.clone(),
        n_fires,
        min_distance_km,
        mean_distance_km,
        total_frp,
    }
}

/// Proximity summary for every site in the inventory.
pub fn inventory_fire_proximity(
    inventory: &GlacierInventory, fires: &[FireDetection], buffer_km: f64,
) -> Vec<FireProximity> {
    inventory.sites().iter().map(|s| fire_proximity(s, fires, buffer_km)).collect()
}

/// Distinct calendar days with at least one detection within `buffer_km`.
pub fn fire_days_near(
    site: &GlacierSite, fires: &[FireDetection], buffer_km: f64,
) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = fires
        .iter()
        .filter(|f| haversine_km(site.centroid_lat, site.centroid_lon, f.lat, f.lon) <= buffer_km)
        .map(|f| f.time.date())
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}
