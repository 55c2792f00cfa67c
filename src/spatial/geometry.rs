//! spatial::geometry — glacier outlines and distance helpers.
//!
//! Polygons are single outer rings in (lon, lat) degrees backed by
//! `geo::Polygon`. Containment and centroids come from `geo` on the plane;
//! buffering uses planar degrees, while fire proximity uses great-circle
//! kilometres.
use crate::data::{
    errors::{DataError, DataResult},
    grid::BoundingBox,
};
use geo::{BoundingRect, Centroid, Closest, ClosestPoint, Contains, LineString, Point};

/// Mean Earth radius used by [`haversine_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Polygon — closed ring of `(lon, lat)` vertices.
///
/// The closing vertex is optional on input; `geo` closes the ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    inner: geo::Polygon<f64>,
}

impl Polygon {
    /// Build from `(lon, lat)` vertices.
    ///
    /// Errors
    /// ------
    /// - `InvalidGeometry` with fewer than three distinct vertices or a
    ///   non-finite coordinate.
    pub fn new(mut ring: Vec<(f64, f64)>) -> DataResult<Self> {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(DataError::InvalidGeometry("non-finite vertex".into()));
        }
        if ring.len() < 3 {
            return Err(DataError::InvalidGeometry(format!(
                "polygon needs at least 3 vertices, got {}",
                ring.len()
            )));
        }
        Ok(Self { inner: geo::Polygon::new(LineString::from(ring), vec![]) })
    }

    /// Parse `POLYGON((lon lat, lon lat, ...))`. Inner rings are ignored.
    pub fn from_wkt(text: &str) -> DataResult<Self> {
        let trimmed = text.trim();
        let body = trimmed
            .strip_prefix("POLYGON")
            .or_else(|| trimmed.strip_prefix("polygon"))
            .map(str::trim)
            .and_then(|b| b.strip_prefix("(("))
            .ok_or_else(|| DataError::InvalidGeometry(format!("not a WKT polygon: '{text}'")))?;
        let outer = body.split(')').next().unwrap_or_default();

        let mut ring = Vec::new();
        for pair in outer.split(',') {
            let mut parts = pair.split_whitespace();
            let (Some(lon), Some(lat)) = (parts.next(), parts.next()) else {
                return Err(DataError::InvalidGeometry(format!("bad vertex '{}'", pair.trim())));
            };
            let lon = lon.parse::<f64>().map_err(|e| DataError::Parse(e.to_string()))?;
            let lat = lat.parse::<f64>().map_err(|e| DataError::Parse(e.to_string()))?;
            ring.push((lon, lat));
        }
        Self::new(ring)
    }

    /// Axis-aligned square of half-width `half` degrees around a centre.
    pub fn square(lat: f64, lon: f64, half: f64) -> DataResult<Self> {
        Self::new(vec![
            (lon - half, lat - half),
            (lon + half, lat - half),
            (lon + half, lat + half),
            (lon - half, lat + half),
        ])
    }

    /// Distinct ring vertices, without the closing one.
    pub fn vertices(&self) -> Vec<(f64, f64)> {
        let coords = &self.inner.exterior().0;
        coords[..coords.len().saturating_sub(1)].iter().map(|c| (c.x, c.y)).collect()
    }

    pub fn bounds(&self) -> BoundingBox {
        match self.inner.bounding_rect() {
            Some(rect) => BoundingBox {
                lon_min: rect.min().x,
                lat_min: rect.min().y,
                lon_max: rect.max().x,
                lat_max: rect.max().y,
            },
            None => BoundingBox {
                lon_min: f64::NAN,
                lat_min: f64::NAN,
                lon_max: f64::NAN,
                lat_max: f64::NAN,
            },
        }
    }

    /// Strict interior test for the point `(lon, lat)`.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.inner.contains(&Point::new(lon, lat))
    }

    /// Planar distance in degrees from `(lon, lat)` to the ring boundary.
    pub fn distance_to_boundary(&self, lon: f64, lat: f64) -> f64 {
        let p = Point::new(lon, lat);
        match self.inner.exterior().closest_point(&p) {
            Closest::Intersection(_) => 0.0,
            Closest::SinglePoint(q) => (q.x() - lon).hypot(q.y() - lat),
            Closest::Indeterminate => f64::INFINITY,
        }
    }

    /// Inside, or within `buffer` degrees of the boundary.
    pub fn contains_buffered(&self, lon: f64, lat: f64, buffer: f64) -> bool {
        self.contains(lon, lat) || (buffer > 0.0 && self.distance_to_boundary(lon, lat) <= buffer)
    }

    /// Area-weighted centroid `(lon, lat)`.
    pub fn centroid(&self) -> (f64, f64) {
        match self.inner.centroid() {
            Some(c) => (c.x(), c.y()),
            None => {
                let v = self.vertices();
                let n = v.len().max(1) as f64;
                (v.iter().map(|p| p.0).sum::<f64>() / n, v.iter().map(|p| p.1).sum::<f64>() / n)
            }
        }
    }
}

/// Great-circle distance in kilometres between two (lat, lon) points.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - WKT parsing with and without the closing vertex.
    // - Containment, buffered containment and centroid of simple rings,
    //   including a concave ring and points on the boundary.
    // - Great-circle distance against a known value.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // WKT rings drop the repeated closing vertex.
    //
    // Given
    // -----
    // - A closed unit square in WKT.
    //
    // Expect
    // ------
    // - Four stored vertices.
    fn from_wkt_parses_closed_ring() {
        let poly = Polygon::from_wkt("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();

        assert_eq!(poly.vertices().len(), 4);
    }

    #[test]
    // Purpose
    // -------
    // Malformed WKT surfaces as `InvalidGeometry`.
    //
    // Given
    // -----
    // - "LINESTRING(0 0, 1 1)".
    //
    // Expect
    // ------
    // - `InvalidGeometry`.
    fn from_wkt_rejects_non_polygon() {
        let err = Polygon::from_wkt("LINESTRING(0 0, 1 1)").unwrap_err();

        assert!(matches!(err, DataError::InvalidGeometry(_)));
    }

    #[test]
    // Purpose
    // -------
    // Ray casting separates interior from exterior, and the buffer admits
    // points just outside the edge.
    //
    // Given
    // -----
    // - Unit square; points (0.5, 0.5), (1.05, 0.5), (2, 2).
    //
    // Expect
    // ------
    // - Interior point inside; (1.05, 0.5) only with buffer 0.1; (2, 2) never.
    fn contains_and_buffer_behave_on_unit_square() {
        let poly = Polygon::square(0.5, 0.5, 0.5).unwrap();

        assert!(poly.contains(0.5, 0.5));
        assert!(!poly.contains(1.05, 0.5));
        assert!(poly.contains_buffered(1.05, 0.5, 0.1));
        assert!(!poly.contains_buffered(2.0, 2.0, 0.1));
    }

    #[test]
    // Purpose
    // -------
    // The centroid of a rectangle is its centre.
    //
    // Given
    // -----
    // - Rectangle lon [-118, -116], lat [52, 53].
    //
    // Expect
    // ------
    // - (-117, 52.5).
    fn centroid_of_rectangle_is_centre() {
        let poly =
            Polygon::new(vec![(-118.0, 52.0), (-116.0, 52.0), (-116.0, 53.0), (-118.0, 53.0)])
                .unwrap();

        let (lon, lat) = poly.centroid();

        assert_relative_eq!(lon, -117.0, epsilon = 1e-12);
        assert_relative_eq!(lat, 52.5, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // A concave ring excludes its notch, and boundary points are only
    // admitted through the buffer.
    //
    // Given
    // -----
    // - L-shaped ring over [0, 2] x [0, 2] without the upper-right unit
    //   square; points (0.5, 1.5), (1.5, 1.8), (2.0, 0.5).
    //
    // Expect
    // ------
    // - (0.5, 1.5) inside, (1.5, 1.8) outside at 0.5 from the boundary.
    // - (2.0, 0.5) lies on the edge: not strictly inside, distance 0,
    //   admitted with any positive buffer.
    // - Bounds [0, 2] x [0, 2]; centroid (5/6, 5/6).
    fn concave_ring_and_boundary_points() {
        let poly = Polygon::new(vec![
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ])
        .unwrap();

        assert!(poly.contains(0.5, 1.5));
        assert!(!poly.contains(1.5, 1.8));
        assert_relative_eq!(poly.distance_to_boundary(1.5, 1.8), 0.5, epsilon = 1e-12);
        assert!(!poly.contains(2.0, 0.5));
        assert_relative_eq!(poly.distance_to_boundary(2.0, 0.5), 0.0, epsilon = 1e-12);
        assert!(poly.contains_buffered(2.0, 0.5, 1e-9));
        assert_eq!(poly.vertices().len(), 6);

        let bounds = poly.bounds();
        assert_eq!((bounds.lon_min, bounds.lat_min), (0.0, 0.0));
        assert_eq!((bounds.lon_max, bounds.lat_max), (2.0, 2.0));
        let (cx, cy) = poly.centroid();
        assert_relative_eq!(cx, 5.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(cy, 5.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // One degree of latitude is about 111.19 km on the mean sphere.
    //
    // Given
    // -----
    // - (52, -117) to (53, -117).
    //
    // Expect
    // ------
    // - 111.19 km within 0.01 km.
    fn haversine_one_degree_latitude() {
        let d = haversine_km(52.0, -117.0, 53.0, -117.0);

        assert_relative_eq!(d, 111.19, epsilon = 0.01);
    }
}
