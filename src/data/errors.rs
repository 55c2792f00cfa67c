//! data::errors — error surface for loaders and in-memory data containers.
//!
//! Purpose
//! -------
//! Provide the error enum and result alias shared by every routine that
//! reads, validates, or subsets deposition grids, glacier inventories,
//! albedo series, and fire detections.
//!
//! Key behaviors
//! -------------
//! - Define [`DataResult`] and [`DataError`] as the canonical result and
//!   error types for the `data` and `spatial` subtrees.
//! - Keep payloads small (names, indices, coordinates, rendered messages)
//!   so the enum stays `Clone + PartialEq` and can be stored in per-site
//!   batch outcomes.
//!
//! Conventions
//! -----------
//! - Missing inputs (`MissingData`, `MissingVariable`) are propagated to the
//!   caller and never retried; retrying cannot produce absent files.
//! - Coverage failures (`OutOfBounds`, `OutsideTimeRange`) abort the current
//!   site only; batch runners record them and continue with sibling sites.
//! - I/O and CSV failures are rendered to strings at the boundary so the
//!   enum does not carry non-`Clone` sources.
//!
//! Testing notes
//! -------------
//! - Unit tests check that `Display` messages embed their payloads.
use chrono::NaiveDateTime;

pub type DataResult<T> = Result<T, DataError>;

/// DataError — failures while loading or validating input data.
///
/// Variants
/// --------
/// - `MissingData(what)`
///   A requested file, directory, or record set does not exist.
/// - `MissingVariable { variable }`
///   A deposition species is absent from the dataset.
/// - `UnknownGlacier { id }`
///   No glacier with this identifier exists in the inventory.
/// - `OutOfBounds { lat, lon }`
///   A coordinate lies entirely outside the grid extent.
/// - `OutsideTimeRange { start, end }`
///   A requested date range does not overlap the dataset time axis.
/// - `EmptySeries`
///   A container that must hold at least one observation is empty.
/// - `LengthMismatch { expected, actual }`
///   Paired arrays have different lengths.
/// - `NonIncreasingTime { index }`
///   Timestamps are not strictly increasing at `index`.
/// - `NonIncreasingAxis { axis }`
///   A latitude/longitude axis is not strictly increasing.
/// - `ShapeMismatch { variable, expected, actual }`
///   A gridded variable does not match the (time, lat, lon) axes.
/// - `DuplicateRecord(detail)`
///   Two rows address the same timestamp / grid cell.
/// - `InvalidGeometry(detail)`
///   A polygon outline cannot be parsed or has fewer than three vertices.
/// - `InvalidBoundingBox { .. }`
///   A bounding box with `min >= max` on either axis.
/// - `Parse(detail)`
///   A field could not be parsed (timestamps, numbers, WKT).
/// - `UnsupportedSource(source)`
///   A fire-detection source without a reader.
/// - `Io(detail)` / `Csv(detail)`
///   Rendered I/O and CSV failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    // ---- Availability ----
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Variable '{variable}' is not present in the deposition dataset.")]
    MissingVariable { variable: String },

    #[error("Glacier '{id}' is not present in the inventory.")]
    UnknownGlacier { id: String },

    // ---- Coverage ----
    #[error("Coordinate (lat = {lat}, lon = {lon}) lies outside the grid extent.")]
    OutOfBounds { lat: f64, lon: f64 },

    #[error("Requested range {start} .. {end} does not overlap the dataset time axis.")]
    OutsideTimeRange { start: NaiveDateTime, end: NaiveDateTime },

    // ---- Shape / ordering ----
    #[error("Input series is empty.")]
    EmptySeries,

    #[error("Length mismatch: expected {expected} values, got {actual}.")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Timestamps must be strictly increasing; violated at index {index}.")]
    NonIncreasingTime { index: usize },

    #[error("Coordinate axis '{axis}' must be strictly increasing.")]
    NonIncreasingAxis { axis: &'static str },

    #[error("Variable '{variable}' has shape {actual:?}; expected {expected:?} (time, lat, lon).")]
    ShapeMismatch { variable: String, expected: [usize; 3], actual: Vec<usize> },

    #[error("Duplicate record: {0}")]
    DuplicateRecord(String),

    // ---- Parsing ----
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error(
        "Invalid bounding box: lon [{lon_min}, {lon_max}], lat [{lat_min}, {lat_max}]; min must be < max."
    )]
    InvalidBoundingBox { lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported data source: {0}")]
    UnsupportedSource(String),

    // ---- Rendered backend failures ----
    #[error("I/O error: {0}")]
    Io(String),

    #[error("CSV error: {0}")]
    Csv(String),
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::Csv(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Payload embedding in `Display` messages for the coverage and
    //   ordering variants.
    // - Conversion of `std::io::Error` into the rendered `Io` variant.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // `OutOfBounds` must name the offending coordinate so batch logs can
    // point at the misplaced glacier.
    //
    // Given
    // -----
    // - lat = 52.185, lon = -117.252.
    //
    // Expect
    // ------
    // - The message contains both numbers.
    fn out_of_bounds_includes_coordinate_in_display() {
        let err = DataError::OutOfBounds { lat: 52.185, lon: -117.252 };

        let msg = err.to_string();

        assert!(msg.contains("52.185") && msg.contains("-117.252"), "Got: {msg}");
    }

    #[test]
    // Purpose
    // -------
    // `MissingVariable` must echo the species name.
    //
    // Given
    // -----
    // - variable = "PM2.5_dep".
    //
    // Expect
    // ------
    // - The message contains "PM2.5_dep".
    fn missing_variable_includes_name_in_display() {
        let err = DataError::MissingVariable { variable: "PM2.5_dep".into() };

        assert!(err.to_string().contains("PM2.5_dep"));
    }

    #[test]
    // Purpose
    // -------
    // I/O errors are rendered into the `Io` variant, keeping `DataError`
    // cloneable.
    //
    // Given
    // -----
    // - A `NotFound` I/O error.
    //
    // Expect
    // ------
    // - `DataError::Io(_)` whose message is non-empty.
    fn io_error_converts_to_rendered_variant() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");

        let err: DataError = io.into();

        match err {
            DataError::Io(msg) => assert!(msg.contains("no such file")),
            other => panic!("expected DataError::Io, got {other:?}"),
        }
    }
}
