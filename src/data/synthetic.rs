//! data::synthetic — seeded synthetic inputs for explicit test mode.
//!
//! Purpose
//! -------
//! Produce a small, self-consistent set of inputs (hourly deposition grid,
//! glacier inventory, daily albedo, fire detections) whose albedo responds
//! to deposition with a known delay. Used by `--synthetic` runs and by
//! integration tests; never substituted silently for missing real data.
//!
//! Model
//! -----
//! - Background hourly flux is log-normal per cell; smoke episodes multiply
//!   it by a plume factor that decays with distance from a source west of
//!   the grid.
//! - Daily albedo change at each site is
//!   `-sensitivity * D[d - lag_days] + recovery * (0.80 - α) + ε`, where `D`
//!   is the site's daily mean flux normalised by its long-run mean.
//! - All draws come from one `ChaCha8Rng` seeded by [`SyntheticScenario::seed`],
//!   so identical scenarios give identical datasets.
use crate::{
    data::{
        errors::{DataError, DataResult},
        fire::FireDetection,
        glacier::{GlacierInventory, GlacierSite},
        grid::DepositionField,
        series::TimeSeries,
    },
    spatial::geometry::Polygon,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use ndarray::Array3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal, Normal};
use std::collections::BTreeMap;
use tracing::warn;

/// Species written by the generator, in RAQDPS naming.
pub const SYNTHETIC_SPECIES: [&str; 3] = ["BC_dep", "PM2.5_dep", "PM10_dep"];

const PLUME_SOURCE: (f64, f64) = (52.0, -119.5);

/// SyntheticScenario — knobs of the synthetic generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScenario {
    pub seed: u64,
    pub start: NaiveDateTime,
    pub days: usize,
    /// Delay, in days, between deposition and the albedo response.
    pub lag_days: usize,
    pub sensitivity: f64,
    pub noise_sd: f64,
}

impl Default for SyntheticScenario {
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2023, 7, 1)
            .map(|d| d.and_time(NaiveTime::MIN))
            .unwrap_or_default();
        Self { seed: 42, start, days: 60, lag_days: 3, sensitivity: 0.01, noise_sd: 0.002 }
    }
}

/// SyntheticDataset — generated inputs for one analysis run.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub field: DepositionField,
    pub inventory: GlacierInventory,
    pub albedo: BTreeMap<String, TimeSeries>,
    pub fires: Vec<FireDetection>,
}

fn distribution_error(e: impl std::fmt::Display) -> DataError {
    DataError::Parse(format!("synthetic distribution: {e}"))
}

fn synthetic_sites() -> DataResult<Vec<GlacierSite>> {
    Ok(vec![
        GlacierSite {
            id: "RGI60-02.11738".into(),
            name: Some("Athabasca".into()),
            centroid_lat: 52.185,
            centroid_lon: -117.252,
            outline: Some(Polygon::square(52.185, -117.252, 0.15)?),
            area_km2: 6.0,
            median_elevation_m: Some(2700.0),
        },
        GlacierSite {
            id: "SYN-0002".into(),
            name: None,
            centroid_lat: 51.75,
            centroid_lon: -117.75,
            outline: None,
            area_km2: 3.2,
            median_elevation_m: Some(2600.0),
        },
        GlacierSite {
            id: "SYN-0003".into(),
            name: None,
            centroid_lat: 52.75,
            centroid_lon: -116.5,
            outline: None,
            area_km2: 2.1,
            median_elevation_m: Some(2550.0),
        },
    ])
}

impl SyntheticScenario {
    /// Generate the dataset.
    ///
    /// Errors
    /// ------
    /// - `EmptySeries` when `days == 0`.
    /// - `Parse` if a distribution parameter is invalid (negative noise).
    pub fn generate(&self) -> DataResult<SyntheticDataset> {
        if self.days == 0 {
            return Err(DataError::EmptySeries);
        }
        warn!(seed = self.seed, days = self.days, "generating SYNTHETIC inputs (test mode)");
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let lats: Vec<f64> = (0..7).map(|i| 51.5 + 0.25 * i as f64).collect();
        let lons: Vec<f64> = (0..11).map(|j| -118.5 + 0.25 * j as f64).collect();
        let hours = self.days * 24;
        let times: Vec<NaiveDateTime> =
            (0..hours).map(|h| self.start + TimeDelta::hours(h as i64)).collect();

        // Smoke episodes: (first day, length in days, amplitude).
        let n_episodes = (self.days / 12).max(1);
        let episodes: Vec<(usize, usize, f64)> = (0..n_episodes)
            .map(|_| {
                (rng.gen_range(0..self.days), rng.gen_range(2..=4), rng.gen_range(5.0..15.0))
            })
            .collect();

        let background = LogNormal::new((0.02f64).ln(), 0.4).map_err(distribution_error)?;
        let ratio_noise = LogNormal::new(0.0, 0.1).map_err(distribution_error)?;
        let shape = (hours, lats.len(), lons.len());
        let mut bc = Array3::<f64>::zeros(shape);
        let mut pm25 = Array3::<f64>::zeros(shape);
        let mut pm10 = Array3::<f64>::zeros(shape);
        for t in 0..hours {
            let day = t / 24;
            let plume: f64 = episodes
                .iter()
                .filter(|(first, len, _)| day >= *first && day < first + len)
                .map(|(_, _, amp)| *amp)
                .sum();
            for (i, lat) in lats.iter().enumerate() {
                for (j, lon) in lons.iter().enumerate() {
                    let dist =
                        ((lat - PLUME_SOURCE.0).powi(2) + (lon - PLUME_SOURCE.1).powi(2)).sqrt();
                    let factor = 1.0 + plume * (-dist / 2.0).exp();
                    let flux = background.sample(&mut rng) * factor;
                    bc[[t, i, j]] = flux;
                    pm25[[t, i, j]] = flux * 8.0 * ratio_noise.sample(&mut rng);
                    pm10[[t, i, j]] = pm25[[t, i, j]] * 1.6 * ratio_noise.sample(&mut rng);
                }
            }
        }

        let mut variables = BTreeMap::new();
        variables.insert(SYNTHETIC_SPECIES[0].to_string(), bc);
        variables.insert(SYNTHETIC_SPECIES[1].to_string(), pm25);
        variables.insert(SYNTHETIC_SPECIES[2].to_string(), pm10);
        let field = DepositionField::new(times, lats, lons, variables)?;

        let sites = synthetic_sites()?;
        let noise = Normal::new(0.0, self.noise_sd).map_err(distribution_error)?;
        let mut albedo = BTreeMap::new();
        for site in &sites {
            let daily = self.site_daily_flux(&field, site)?;
            let mean = daily.iter().sum::<f64>() / daily.len() as f64;
            let mut level = 0.80;
            let mut values = Vec::with_capacity(self.days);
            for d in 0..self.days {
                let forcing =
                    if d >= self.lag_days { daily[d - self.lag_days] / mean } else { 1.0 };
                let change =
                    -self.sensitivity * forcing + 0.2 * (0.80 - level) + noise.sample(&mut rng);
                level = (level + change).clamp(0.05, 0.95);
                values.push(level);
            }
            let series = TimeSeries::regular("albedo", self.start, TimeDelta::days(1), values)?;
            albedo.insert(site.id.clone(), series);
        }

        let mut fires = Vec::new();
        for (first, len, amp) in &episodes {
            for d in *first..(*first + *len).min(self.days) {
                for _ in 0..3 {
                    fires.push(FireDetection {
                        time: self.start + TimeDelta::days(d as i64) + TimeDelta::hours(21),
                        lat: PLUME_SOURCE.0 + rng.gen_range(-0.3..0.3),
                        lon: PLUME_SOURCE.1 + rng.gen_range(-0.3..0.3),
                        brightness: rng.gen_range(310.0..360.0),
                        scan: 1.0,
                        track: 1.0,
                        frp: amp * rng.gen_range(2.0..6.0),
                        confidence: "nominal".into(),
                    });
                }
            }
        }
        fires.sort_by_key(|f| f.time);

        Ok(SyntheticDataset { field, inventory: GlacierInventory::new(sites)?, albedo, fires })
    }

    /// Daily mean black-carbon flux at the site's nearest cell.
    fn site_daily_flux(&self, field: &DepositionField, site: &GlacierSite) -> DataResult<Vec<f64>> {
        let nearest = |axis: &[f64], v: f64| {
            (0..axis.len())
                .min_by(|&a, &b| (axis[a] - v).abs().total_cmp(&(axis[b] - v).abs()))
                .unwrap_or(0)
        };
        let i = nearest(field.lats(), site.centroid_lat);
        let j = nearest(field.lons(), site.centroid_lon);
        let bc = field.variable(SYNTHETIC_SPECIES[0])?;
        Ok((0..self.days)
            .map(|d| (0..24).map(|h| bc[[d * 24 + h, i, j]]).sum::<f64>() / 24.0)
            .collect())
    }
}
