//! data::glacier — glacier sites and inventory filtering.
//!
//! A [`GlacierSite`] is immutable once loaded. [`GlacierInventory`] owns the
//! loaded sites and applies the RGI-style attribute filters used to select
//! study glaciers (area, median elevation, longitude cut-off).
use crate::{
    data::errors::{DataError, DataResult},
    spatial::geometry::Polygon,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// GlacierSite — one glacier with its location and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct GlacierSite {
    pub id: String,
    pub name: Option<String>,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    pub outline: Option<Polygon>,
    pub area_km2: f64,
    pub median_elevation_m: Option<f64>,
}

impl GlacierSite {
    /// Label used in file names and logs: the name when present, else the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or(&self.id)
    }
}

/// InventoryFilter — attribute thresholds applied to a loaded inventory.
///
/// Defaults keep glaciers of at least 1 km² west of 115° W with no
/// elevation ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryFilter {
    pub min_area_km2: f64,
    pub max_median_elevation_m: Option<f64>,
    /// Keep sites with `centroid_lon < max_longitude`.
    pub max_longitude: Option<f64>,
}

impl Default for InventoryFilter {
    fn default() -> Self {
        Self { min_area_km2: 1.0, max_median_elevation_m: None, max_longitude: Some(-115.0) }
    }
}

impl InventoryFilter {
    pub fn accepts(&self, site: &GlacierSite) -> bool {
        if site.area_km2 < self.min_area_km2 {
            return false;
        }
        if let (Some(ceiling), Some(zmed)) = (self.max_median_elevation_m, site.median_elevation_m)
        {
            if zmed > ceiling {
                return false;
            }
        }
        match self.max_longitude {
            Some(cut) => site.centroid_lon < cut,
            None => true,
        }
    }
}

/// Which glaciers a run should analyse.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GlacierSelection {
    #[default]
    All,
    Ids(Vec<String>),
}

impl GlacierSelection {
    /// `"all"` (any case) selects everything; otherwise a comma-separated id list.
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("all") {
            return GlacierSelection::All;
        }
        GlacierSelection::Ids(
            text.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
        )
    }
}

/// GlacierInventory — owned collection of glacier sites.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlacierInventory {
    sites: Vec<GlacierSite>,
}

impl GlacierInventory {
    /// Errors
    /// ------
    /// - `DuplicateRecord` when two sites share an id.
    pub fn new(sites: Vec<GlacierSite>) -> DataResult<Self> {
        let mut ids: Vec<&str> = sites.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(DataError::DuplicateRecord(format!("glacier id '{}' appears twice", w[0])));
        }
        Ok(Self { sites })
    }

    pub fn sites(&self) -> &[GlacierSite] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, id: &str) -> DataResult<&GlacierSite> {
        self.sites
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| DataError::UnknownGlacier { id: id.to_string() })
    }

    /// Sites passing `filter`.
    pub fn filter(&self, filter: &InventoryFilter) -> GlacierInventory {
        let sites: Vec<GlacierSite> =
            self.sites.iter().filter(|s| filter.accepts(s)).cloned().collect();
        info!(before = self.sites.len(), after = sites.len(), "filtered glacier inventory");
        GlacierInventory { sites }
    }

    /// Sites named by `selection`, in selection order.
    ///
    /// Errors
    /// ------
    /// - `UnknownGlacier` for the first id not in the inventory.
    pub fn select(&self, selection: &GlacierSelection) -> DataResult<GlacierInventory> {
        match selection {
            GlacierSelection::All => Ok(self.clone()),
            GlacierSelection::Ids(ids) => {
                let sites = ids.iter().map(|id| self.get(id).cloned()).collect::<DataResult<_>>()?;
                Ok(GlacierInventory { sites })
            }
        }
    }
}
