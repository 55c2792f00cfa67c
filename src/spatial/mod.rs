//! spatial — glacier geometry and grid sampling.
//!
//! Purpose
//! -------
//! Bridge gridded deposition fields and glacier locations: parse and query
//! glacier outlines ([`geometry`]) and reduce a grid to per-glacier time
//! series by nearest-cell or footprint extraction ([`extraction`]).
//!
//! Conventions
//! -----------
//! - Coordinates are geographic degrees; polygons store `(lon, lat)` pairs
//!   while function arguments take `lat` before `lon`.
//! - Failures use the `data` error surface ([`crate::data::DataError`]);
//!   an out-of-extent glacier is a per-site failure, not a crash.

pub mod extraction;
pub mod geometry;

pub use self::extraction::{
    Aggregation, ExtractionMode, FootprintOptions, nearest_cell, nearest_value, point_series,
    polygon_series, site_series,
};
pub use self::geometry::{Polygon, haversine_km};
