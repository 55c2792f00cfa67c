//! spatial::extraction — sampling deposition grids at glacier locations.
//!
//! Purpose
//! -------
//! Reduce a `(time, lat, lon)` deposition field to one time series per
//! glacier, either from the nearest grid cell or from every cell whose
//! centre falls inside the glacier outline (optionally buffered).
//!
//! Key behaviors
//! -------------
//! - Nearest-cell lookup minimises planar distance in `(lon, lat)`. On a
//!   rectilinear grid this is the nearest latitude row and nearest
//!   longitude column, chosen independently; ties go to the lower index.
//! - Targets beyond half a grid spacing from the outermost cell centres
//!   are out of extent and fail with [`DataError::OutOfBounds`].
//! - Polygon footprints aggregate the finite cell values at each time step
//!   with [`Aggregation`]; `Mean` honours an optional `(lat, lon)` weight
//!   grid (area or elevation weights). A footprint without any interior
//!   cell centre falls back to the cell nearest the polygon centroid and
//!   logs the fallback.
//!
//! Conventions
//! -----------
//! - NaN cells inside a footprint are skipped at that time step; a step
//!   with no finite cell yields NaN.
//! - Weights that are non-finite or `<= 0` exclude their cell from the
//!   weighted mean. `Sum`, `Max`, and `Min` ignore weights.
use crate::{
    data::{
        errors::{DataError, DataResult},
        glacier::GlacierSite,
        grid::DepositionField,
        series::TimeSeries,
    },
    spatial::geometry::Polygon,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reduction applied across the cells of a footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
    Max,
    Min,
}

/// FootprintOptions — how polygon footprints are built and reduced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FootprintOptions {
    /// Margin around the outline, in degrees.
    pub buffer_deg: f64,
    pub aggregation: Aggregation,
    /// Optional `(lat, lon)` weights for `Aggregation::Mean`.
    pub weights: Option<Array2<f64>>,
}

/// How a glacier's series is taken from the grid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Nearest cell to the centroid.
    #[default]
    Point,
    /// Cells inside the outline; sites without an outline use the nearest cell.
    Footprint,
}

fn nearest_index(axis: &[f64], value: f64) -> usize {
    let upper = axis.partition_point(|a| *a < value);
    if upper == 0 {
        return 0;
    }
    if upper == axis.len() {
        return axis.len() - 1;
    }
    if (value - axis[upper - 1]) <= (axis[upper] - value) {
        upper - 1
    } else {
        upper
    }
}

/// `(lat_index, lon_index)` of the cell nearest to `(lat, lon)`.
///
/// Errors
/// ------
/// - `OutOfBounds` when the point lies outside [`DepositionField::extent`].
pub fn nearest_cell(field: &DepositionField, lat: f64, lon: f64) -> DataResult<(usize, usize)> {
    if !field.extent().contains(lat, lon) {
        return Err(DataError::OutOfBounds { lat, lon });
    }
    Ok((nearest_index(field.lats(), lat), nearest_index(field.lons(), lon)))
}

/// Value of `variable` at time step `time_index` in the cell nearest to `(lat, lon)`.
///
/// Errors
/// ------
/// - `MissingVariable`, `OutOfBounds`, or `LengthMismatch` when
///   `time_index` is past the time axis.
pub fn nearest_value(
    field: &DepositionField, variable: &str, time_index: usize, lat: f64, lon: f64,
) -> DataResult<f64> {
    let data = field.variable(variable)?;
    if time_index >= field.times().len() {
        return Err(DataError::LengthMismatch {
            expected: field.times().len(),
            actual: time_index + 1,
        });
    }
    let (i, j) = nearest_cell(field, lat, lon)?;
    Ok(data[[time_index, i, j]])
}

/// Full time series of `variable` in the cell nearest to `(lat, lon)`.
pub fn point_series(
    field: &DepositionField, variable: &str, lat: f64, lon: f64,
) -> DataResult<TimeSeries> {
    let data = field.variable(variable)?;
    let (i, j) = nearest_cell(field, lat, lon)?;
    let values = (0..field.times().len()).map(|t| data[[t, i, j]]).collect();
    Ok(TimeSeries::from_sorted_parts(variable, field.times().to_vec(), values))
}

/// Cells of the footprint of `polygon` buffered by `buffer_deg`.
///
/// Errors
/// ------
/// - `OutOfBounds` when the buffered polygon does not intersect the grid
///   extent, or when the centroid fallback lies outside it.
pub fn footprint_cells(
    field: &DepositionField, polygon: &Polygon, buffer_deg: f64,
) -> DataResult<Vec<(usize, usize)>> {
    let buffered = polygon.bounds().buffered(buffer_deg.max(0.0));
    let (c_lon, c_lat) = polygon.centroid();
    if !buffered.intersects(&field.extent()) {
        return Err(DataError::OutOfBounds { lat: c_lat, lon: c_lon });
    }
    let mut cells = Vec::new();
    for (i, &lat) in field.lats().iter().enumerate() {
        if lat < buffered.lat_min || lat > buffered.lat_max {
            continue;
        }
        for (j, &lon) in field.lons().iter().enumerate() {
            if lon < buffered.lon_min || lon > buffered.lon_max {
                continue;
            }
            if polygon.contains_buffered(lon, lat, buffer_deg) {
                cells.push((i, j));
            }
        }
    }
    if cells.is_empty() {
        debug!(lat = c_lat, lon = c_lon, "no cell centre inside footprint; using nearest cell");
        cells.push(nearest_cell(field, c_lat, c_lon)?);
    }
    Ok(cells)
}

fn reduce(values: &[(f64, f64)], aggregation: Aggregation) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    match aggregation {
        Aggregation::Mean => {
            let (num, den) =
                values.iter().fold((0.0, 0.0), |(n, d), &(v, w)| (n + w * v, d + w));
            if den > 0.0 {
                num / den
            } else {
                f64::NAN
            }
        }
        Aggregation::Sum => values.iter().map(|(v, _)| v).sum(),
        Aggregation::Max => values.iter().map(|(v, _)| *v).fold(f64::NEG_INFINITY, f64::max),
        Aggregation::Min => values.iter().map(|(v, _)| *v).fold(f64::INFINITY, f64::min),
    }
}

/// Series of `variable` aggregated over the footprint of `polygon`.
///
/// Errors
/// ------
/// - `MissingVariable`, `OutOfBounds` (see [`footprint_cells`]).
/// - `ShapeMismatch` when a weight grid does not match `(lat, lon)`.
pub fn polygon_series(
    field: &DepositionField, variable: &str, polygon: &Polygon, options: &FootprintOptions,
) -> DataResult<TimeSeries> {
    let data = field.variable(variable)?;
    let (nlat, nlon) = (field.lats().len(), field.lons().len());
    if let Some(w) = &options.weights {
        if w.shape() != [nlat, nlon] {
            return Err(DataError::ShapeMismatch {
                variable: format!("{variable} weights"),
                expected: [field.times().len(), nlat, nlon],
                actual: w.shape().to_vec(),
            });
        }
    }
    let cells = footprint_cells(field, polygon, options.buffer_deg)?;
    let cell_weight = |i: usize, j: usize| match &options.weights {
        Some(w) if w[[i, j]].is_finite() && w[[i, j]] > 0.0 => Some(w[[i, j]]),
        Some(_) => None,
        None => Some(1.0),
    };

    let mut buffer = Vec::with_capacity(cells.len());
    let values = (0..field.times().len())
        .map(|t| {
            buffer.clear();
            for &(i, j) in &cells {
                let v = data[[t, i, j]];
                if !v.is_finite() {
                    continue;
                }
                let w = match options.aggregation {
                    Aggregation::Mean => match cell_weight(i, j) {
                        Some(w) => w,
                        None => continue,
                    },
                    _ => 1.0,
                };
                buffer.push((v, w));
            }
            reduce(&buffer, options.aggregation)
        })
        .collect();
    Ok(TimeSeries::from_sorted_parts(variable, field.times().to_vec(), values))
}

/// Series of `variable` for `site` under `mode`.
pub fn site_series(
    field: &DepositionField, variable: &str, site: &GlacierSite, mode: ExtractionMode,
    options: &FootprintOptions,
) -> DataResult<TimeSeries> {
    match (mode, &site.outline) {
        (ExtractionMode::Footprint, Some(outline)) => {
            polygon_series(field, variable, outline, options)
        }
        _ => point_series(field, variable, site.centroid_lat, site.centroid_lon),
    }
}
