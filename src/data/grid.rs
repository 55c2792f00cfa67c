//! data::grid — rectilinear deposition fields.
//!
//! Purpose
//! -------
//! Store gridded model output as one `(time, lat, lon)` array per chemical
//! species together with its coordinate axes, and provide time/space
//! subsetting used by the loaders before extraction.
//!
//! Invariants
//! ----------
//! - `times`, `lats`, `lons` are strictly increasing.
//! - Every variable array has shape `(times.len(), lats.len(), lons.len())`.
//! - Missing cells are NaN.
use crate::data::errors::{DataError, DataResult};
use chrono::NaiveDateTime;
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// BoundingBox — geographic rectangle `(lon_min, lat_min, lon_max, lat_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    /// Validated constructor; `min < max` on both axes.
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> DataResult<Self> {
        let bbox = Self { lon_min, lat_min, lon_max, lat_max };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> DataResult<()> {
        let ordered = self.lon_min < self.lon_max && self.lat_min < self.lat_max;
        if !ordered {
            return Err(DataError::InvalidBoundingBox {
                lon_min: self.lon_min,
                lat_min: self.lat_min,
                lon_max: self.lon_max,
                lat_max: self.lat_max,
            });
        }
        Ok(())
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }

    /// Grow every edge by `margin` degrees.
    pub fn buffered(&self, margin: f64) -> Self {
        Self {
            lon_min: self.lon_min - margin,
            lat_min: self.lat_min - margin,
            lon_max: self.lon_max + margin,
            lat_max: self.lat_max + margin,
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.lon_min <= other.lon_max
            && other.lon_min <= self.lon_max
            && self.lat_min <= other.lat_max
            && other.lat_min <= self.lat_max
    }
}

/// GridSlice — one time step of a deposition field, as read from an
/// hourly model file.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSlice {
    pub time: NaiveDateTime,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    /// `(lat, lon)` arrays keyed by species name.
    pub variables: BTreeMap<String, Array2<f64>>,
}

/// DepositionField — gridded deposition flux for one or more species.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositionField {
    times: Vec<NaiveDateTime>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    variables: BTreeMap<String, Array3<f64>>,
    /// Mean `(lat, lon)` cell spacing, inherited by spatial subsets.
    spacing: (f64, f64),
}

impl DepositionField {
    /// Construct and validate a field.
    ///
    /// Errors
    /// ------
    /// - `NonIncreasingTime` / `NonIncreasingAxis` for unordered axes.
    /// - `ShapeMismatch` when a variable does not match the axes.
    /// - `MissingData` when no variable is supplied.
    pub fn new(
        times: Vec<NaiveDateTime>, lats: Vec<f64>, lons: Vec<f64>,
        variables: BTreeMap<String, Array3<f64>>,
    ) -> DataResult<Self> {
        if let Some(index) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(DataError::NonIncreasingTime { index: index + 1 });
        }
        if !strictly_increasing(&lats) {
            return Err(DataError::NonIncreasingAxis { axis: "lat" });
        }
        if !strictly_increasing(&lons) {
            return Err(DataError::NonIncreasingAxis { axis: "lon" });
        }
        if variables.is_empty() {
            return Err(DataError::MissingData("deposition field has no variables".into()));
        }
        let expected = [times.len(), lats.len(), lons.len()];
        for (name, array) in &variables {
            if array.shape() != expected {
                return Err(DataError::ShapeMismatch {
                    variable: name.clone(),
                    expected,
                    actual: array.shape().to_vec(),
                });
            }
        }
        let spacing = (mean_spacing(&lats), mean_spacing(&lons));
        Ok(Self { times, lats, lons, variables, spacing })
    }

    /// Stack hourly slices along the time axis.
    ///
    /// Slices are sorted by time; every slice must share the coordinate
    /// axes and variable set of the first one.
    ///
    /// Errors
    /// ------
    /// - `MissingData` when `slices` is empty.
    /// - `DuplicateRecord` when two slices carry the same time.
    /// - `ShapeMismatch` when axes or variable shapes differ between slices.
    /// - `MissingVariable` when a later slice lacks a variable of the first.
    pub fn from_slices(mut slices: Vec<GridSlice>) -> DataResult<Self> {
        slices.sort_by_key(|s| s.time);
        let first = slices
            .first()
            .ok_or_else(|| DataError::MissingData("no grid slices to stack".into()))?;
        if let Some(w) = slices.windows(2).find(|w| w[0].time == w[1].time) {
            return Err(DataError::DuplicateRecord(format!("two grid slices at {}", w[0].time)));
        }

        let (nlat, nlon) = (first.lats.len(), first.lons.len());
        let nt = slices.len();
        let lats = first.lats.clone();
        let lons = first.lons.clone();
        let mut variables: BTreeMap<String, Array3<f64>> = first
            .variables
            .keys()
            .map(|name| (name.clone(), Array3::from_elem((nt, nlat, nlon), f64::NAN)))
            .collect();

        for (t, slice) in slices.iter().enumerate() {
            if slice.lats != lats || slice.lons != lons {
                return Err(DataError::ShapeMismatch {
                    variable: format!("grid axes at {}", slice.time),
                    expected: [nt, nlat, nlon],
                    actual: vec![nt, slice.lats.len(), slice.lons.len()],
                });
            }
            for (name, stacked) in variables.iter_mut() {
                let layer = slice
                    .variables
                    .get(name)
                    .ok_or_else(|| DataError::MissingVariable { variable: name.clone() })?;
                if layer.shape() != [nlat, nlon] {
                    return Err(DataError::ShapeMismatch {
                        variable: name.clone(),
                        expected: [nt, nlat, nlon],
                        actual: vec![nt, layer.nrows(), layer.ncols()],
                    });
                }
                stacked.index_axis_mut(Axis(0), t).assign(layer);
            }
        }

        let times = slices.iter().map(|s| s.time).collect();
        Self::new(times, lats, lons, variables)
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// The `(time, lat, lon)` array for `name`.
    pub fn variable(&self, name: &str) -> DataResult<&Array3<f64>> {
        self.variables
            .get(name)
            .ok_or_else(|| DataError::MissingVariable { variable: name.to_string() })
    }

    /// Mean `(lat, lon)` cell spacing in degrees.
    ///
    /// A one-cell axis reports the spacing of the grid it was cut from,
    /// or 0 when it was loaded that way.
    pub fn spacing(&self) -> (f64, f64) {
        self.spacing
    }

    /// Geographic extent of the cell centres padded by half a grid spacing.
    pub fn extent(&self) -> BoundingBox {
        let (lat_min, lat_max) = padded_range(&self.lats, self.spacing.0);
        let (lon_min, lon_max) = padded_range(&self.lons, self.spacing.1);
        BoundingBox { lon_min, lat_min, lon_max, lat_max }
    }

    /// Restrict to the named variables.
    ///
    /// Errors
    /// ------
    /// - `MissingVariable` for the first requested name not present.
    pub fn select_variables<S: AsRef<str>>(&self, names: &[S]) -> DataResult<Self> {
        let mut variables = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            variables.insert(name.to_string(), self.variable(name)?.clone());
        }
        let field = Self::new(self.times.clone(), self.lats.clone(), self.lons.clone(), variables)?;
        Ok(Self { spacing: self.spacing, ..field })
    }

    /// Restrict the time axis to `start <= t <= end`.
    ///
    /// Errors
    /// ------
    /// - `OutsideTimeRange` when no time step falls inside the range.
    pub fn subset_time(&self, start: NaiveDateTime, end: NaiveDateTime) -> DataResult<Self> {
        let lo = self.times.partition_point(|t| *t < start);
        let hi = self.times.partition_point(|t| *t <= end);
        if hi <= lo {
            return Err(DataError::OutsideTimeRange { start, end });
        }
        let variables = self
            .variables
            .iter()
            .map(|(name, a)| (name.clone(), a.slice(ndarray::s![lo..hi, .., ..]).to_owned()))
            .collect();
        Ok(Self {
            times: self.times[lo..hi].to_vec(),
            lats: self.lats.clone(),
            lons: self.lons.clone(),
            variables,
            spacing: self.spacing,
        })
    }

    /// Keep the cells whose centres fall inside `bbox`.
    ///
    /// Errors
    /// ------
    /// - `OutOfBounds` (reported at the box centre) when no cell centre is
    ///   inside the box.
    pub fn subset_bbox(&self, bbox: &BoundingBox) -> DataResult<Self> {
        let lat_idx: Vec<usize> = (0..self.lats.len())
            .filter(|&i| self.lats[i] >= bbox.lat_min && self.lats[i] <= bbox.lat_max)
            .collect();
        let lon_idx: Vec<usize> = (0..self.lons.len())
            .filter(|&j| self.lons[j] >= bbox.lon_min && self.lons[j] <= bbox.lon_max)
            .collect();
        if lat_idx.is_empty() || lon_idx.is_empty() {
            return Err(DataError::OutOfBounds {
                lat: 0.5 * (bbox.lat_min + bbox.lat_max),
                lon: 0.5 * (bbox.lon_min + bbox.lon_max),
            });
        }
        let variables = self
            .variables
            .iter()
            .map(|(name, a)| {
                let sub = a.select(Axis(1), &lat_idx).select(Axis(2), &lon_idx);
                (name.clone(), sub)
            })
            .collect();
        Ok(Self {
            times: self.times.clone(),
            lats: lat_idx.iter().map(|&i| self.lats[i]).collect(),
            lons: lon_idx.iter().map(|&j| self.lons[j]).collect(),
            variables,
            spacing: self.spacing,
        })
    }
}

fn strictly_increasing(axis: &[f64]) -> bool {
    axis.iter().all(|v| v.is_finite()) && axis.windows(2).all(|w| w[1] > w[0])
}

fn mean_spacing(axis: &[f64]) -> f64 {
    match axis {
        [first, .., last] => (last - first) / (axis.len() - 1) as f64,
        _ => 0.0,
    }
}

fn padded_range(axis: &[f64], spacing: f64) -> (f64, f64) {
    match axis.len() {
        0 => (f64::NAN, f64::NAN),
        1 => (axis[0] - 0.5 * spacing, axis[0] + 0.5 * spacing),
        n => {
            let lower = axis[0] - 0.5 * (axis[1] - axis[0]);
            let upper = axis[n - 1] + 0.5 * (axis[n - 1] - axis[n - 2]);
            (lower, upper)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::Array2;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Axis/shape validation in `DepositionField::new`.
    // - Stacking hourly slices and rejecting duplicated hours.
    // - Extent padding and bounding-box / time subsetting.
    // -------------------------------------------------------------------------

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 8, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn field(nt: usize) -> DepositionField {
        let lats = vec![50.0, 51.0, 52.0];
        let lons = vec![-120.0, -119.0];
        let times = (0..nt as u32).map(hour).collect();
        let data = Array3::from_shape_fn((nt, 3, 2), |(t, i, j)| (t * 100 + i * 10 + j) as f64);
        let mut vars = BTreeMap::new();
        vars.insert("BC_dep".to_string(), data);
        DepositionField::new(times, lats, lons, vars).unwrap()
    }

    fn slice(h: u32, value: f64) -> GridSlice {
        let mut variables = BTreeMap::new();
        variables.insert("BC_dep".to_string(), Array2::from_elem((2, 2), value));
        GridSlice { time: hour(h), lats: vec![50.0, 51.0], lons: vec![-120.0, -119.0], variables }
    }

    #[test]
    // Purpose
    // -------
    // A variable whose shape disagrees with the axes is rejected.
    //
    // Given
    // -----
    // - Axes (2, 3, 2) but a (2, 2, 2) array.
    //
    // Expect
    // ------
    // - `ShapeMismatch` naming the variable.
    fn new_rejects_shape_mismatch() {
        let mut vars = BTreeMap::new();
        vars.insert("BC_dep".to_string(), Array3::zeros((2, 2, 2)));

        let err = DepositionField::new(
            vec![hour(0), hour(1)],
            vec![50.0, 51.0, 52.0],
            vec![-120.0, -119.0],
            vars,
        )
        .unwrap_err();

        assert!(
            matches!(err, DataError::ShapeMismatch { ref variable, .. } if variable == "BC_dep")
        );
    }

    #[test]
    // Purpose
    // -------
    // Slices arrive in arbitrary order and are stacked chronologically.
    //
    // Given
    // -----
    // - Slices for hours 2, 0, 1 holding values 2, 0, 1.
    //
    // Expect
    // ------
    // - times = [0h, 1h, 2h]; cell (t, 0, 0) equals t.
    fn from_slices_sorts_by_time() {
        let f = DepositionField::from_slices(vec![slice(2, 2.0), slice(0, 0.0), slice(1, 1.0)])
            .unwrap();

        assert_eq!(f.times(), &[hour(0), hour(1), hour(2)]);
        let bc = f.variable("BC_dep").unwrap();
        for t in 0..3 {
            assert_eq!(bc[[t, 0, 0]], t as f64);
        }
    }

    #[test]
    // Purpose
    // -------
    // Two slices for the same hour violate the no-duplicate time invariant.
    //
    // Given
    // -----
    // - Two slices at hour 3.
    //
    // Expect
    // ------
    // - `DuplicateRecord`.
    fn from_slices_rejects_duplicate_hour() {
        let err = DepositionField::from_slices(vec![slice(3, 1.0), slice(3, 2.0)]).unwrap_err();

        assert!(matches!(err, DataError::DuplicateRecord(_)));
    }

    #[test]
    // Purpose
    // -------
    // The extent extends half a spacing beyond the outermost centres.
    //
    // Given
    // -----
    // - lats [50, 51, 52], lons [-120, -119].
    //
    // Expect
    // ------
    // - lat in [49.5, 52.5], lon in [-120.5, -118.5].
    fn extent_pads_by_half_spacing() {
        let e = field(1).extent();

        assert_eq!((e.lat_min, e.lat_max), (49.5, 52.5));
        assert_eq!((e.lon_min, e.lon_max), (-120.5, -118.5));
    }

    #[test]
    // Purpose
    // -------
    // Bounding-box subsetting keeps only interior centres and their data.
    //
    // Given
    // -----
    // - Box lat [50.5, 52.0], lon [-119.5, -118.0].
    //
    // Expect
    // ------
    // - lats [51, 52], lons [-119]; value at (1, 0, 0) is the original (1, 1, 1).
    fn subset_bbox_keeps_interior_cells() {
        let f = field(2);
        let bbox = BoundingBox::new(-119.5, 50.5, -118.0, 52.0).unwrap();

        let sub = f.subset_bbox(&bbox).unwrap();

        assert_eq!(sub.lats(), &[51.0, 52.0]);
        assert_eq!(sub.lons(), &[-119.0]);
        assert_eq!(sub.variable("BC_dep").unwrap()[[1, 0, 0]], 111.0);
    }

    #[test]
    // Purpose
    // -------
    // A one-cell subset keeps the parent spacing so its extent is a full cell.
    //
    // Given
    // -----
    // - The 1 degree grid cut down to the (51, -119) centre.
    //
    // Expect
    // ------
    // - Spacing (1, 1); extent lat [50.5, 51.5], lon [-119.5, -118.5].
    fn one_cell_subset_keeps_parent_extent() {
        let bbox = BoundingBox::new(-119.4, 50.6, -118.6, 51.4).unwrap();

        let sub = field(2).subset_bbox(&bbox).unwrap();
        let e = sub.select_variables(&["BC_dep".to_string()]).unwrap().extent();

        assert_eq!(sub.spacing(), (1.0, 1.0));
        assert_eq!((e.lat_min, e.lat_max), (50.5, 51.5));
        assert_eq!((e.lon_min, e.lon_max), (-119.5, -118.5));
    }

    #[test]
    // Purpose
    // -------
    // A time range that misses the axis entirely is a coverage error.
    //
    // Given
    // -----
    // - Field covering hours 0..3, request hours 10..12.
    //
    // Expect
    // ------
    // - `OutsideTimeRange`.
    fn subset_time_outside_axis_fails() {
        let err = field(3).subset_time(hour(10), hour(12)).unwrap_err();

        assert!(matches!(err, DataError::OutsideTimeRange { .. }));
    }

    #[test]
    // Purpose
    // -------
    // Inverted bounding boxes are rejected.
    //
    // Given
    // -----
    // - lon_min > lon_max.
    //
    // Expect
    // ------
    // - `InvalidBoundingBox`.
    fn bbox_new_rejects_inverted_box() {
        let err = BoundingBox::new(-110.0, 50.0, -120.0, 55.0).unwrap_err();

        assert!(matches!(err, DataError::InvalidBoundingBox { .. }));
    }
}
