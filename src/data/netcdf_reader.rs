//! NetCDF hourly slices (enabled with the `netcdf` feature).
//!
//! Each hourly RAQDPS file holds 1-D `lat`/`lon` (or `latitude`/`longitude`)
//! axes and species variables shaped `(lat, lon)` or `(1, lat, lon)`.
//! Axes stored in decreasing order are flipped so the resulting slice obeys
//! the strictly-increasing axis invariant.
use crate::data::{
    errors::{DataError, DataResult},
    grid::GridSlice,
    loader::SliceReader,
};
use chrono::NaiveDateTime;
use ndarray::Array2;
use std::{collections::BTreeMap, path::Path};

const LAT_NAMES: [&str; 2] = ["lat", "latitude"];
const LON_NAMES: [&str; 2] = ["lon", "longitude"];

/// Reads `YYYYMMDDHH_000.nc` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfSliceReader;

fn nc_error(path: &Path, e: impl std::fmt::Display) -> DataError {
    DataError::Io(format!("{}: {e}", path.display()))
}

fn read_axis(file: &netcdf::File, names: &[&str], path: &Path) -> DataResult<Vec<f64>> {
    let var = names
        .iter()
        .find_map(|n| file.variable(n))
        .ok_or_else(|| {
            DataError::MissingData(format!("{}: no {} axis", path.display(), names[0]))
        })?;
    var.get_values::<f64, _>(..).map_err(|e| nc_error(path, e))
}

impl SliceReader for NetcdfSliceReader {
    fn extension(&self) -> &str {
        "nc"
    }

    fn read_slice(
        &self, path: &Path, time: NaiveDateTime, variables: &[String],
    ) -> DataResult<GridSlice> {
        let file = netcdf::open(path).map_err(|e| nc_error(path, e))?;
        let mut lats = read_axis(&file, &LAT_NAMES, path)?;
        let mut lons = read_axis(&file, &LON_NAMES, path)?;
        let flip_lat = lats.len() > 1 && lats[0] > lats[lats.len() - 1];
        let flip_lon = lons.len() > 1 && lons[0] > lons[lons.len() - 1];
        if flip_lat {
            lats.reverse();
        }
        if flip_lon {
            lons.reverse();
        }
        let (nlat, nlon) = (lats.len(), lons.len());

        let mut layers = BTreeMap::new();
        for name in variables {
            let var = file
                .variable(name)
                .ok_or_else(|| DataError::MissingVariable { variable: name.clone() })?;
            let values = var.get_values::<f64, _>(..).map_err(|e| nc_error(path, e))?;
            if values.len() < nlat * nlon || values.len() % (nlat * nlon) != 0 {
                return Err(DataError::ShapeMismatch {
                    variable: name.clone(),
                    expected: [1, nlat, nlon],
                    actual: vec![values.len()],
                });
            }
            let mut layer = Array2::from_shape_fn((nlat, nlon), |(i, j)| {
                let src_i = if flip_lat { nlat - 1 - i } else { i };
                let src_j = if flip_lon { nlon - 1 - j } else { j };
                values[src_i * nlon + src_j]
            });
            layer.mapv_inplace(|v| if v.is_finite() && v.abs() < 1e30 { v } else { f64::NAN });
            layers.insert(name.clone(), layer);
        }
        Ok(GridSlice { time, lats, lons, variables: layers })
    }
}
