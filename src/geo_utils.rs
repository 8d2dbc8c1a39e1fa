//! # Geographic Utilities
//!
//! Core geographic computation utilities for live course tracking.
//!
//! Every function here is infallible and safe to call from a per-fix tracking
//! loop: invalid coordinates produce `0.0` rather than a panic or `NaN`. Use
//! [`checked_distance`] when the caller needs to know that an input was bad.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] / [`distance`] | Great-circle distance between two points |
//! | [`bearing`] | Initial great-circle bearing, degrees in `[0, 360)` |
//! | [`to_local_meters`] / [`from_local_meters`] | Planar meter frame around a reference point |
//! | [`signed_angle_delta`] | Shortest signed difference between two bearings |
//! | [`polyline_length`] | Total length of a polyline in meters |
//! | [`compute_bounds`] / [`compute_center`] | Viewport helpers for the course polyline |
//! | [`destination`] | Point reached from an origin along a bearing |
//!
//! ## Example
//!
//! ```rust
//! use course_tracker::{Coordinate, geo_utils};
//!
//! let start = Coordinate::new(37.0000, 127.0000);
//! let end = Coordinate::new(37.0010, 127.0000);
//!
//! let meters = geo_utils::haversine_distance(&start, &end);
//! assert!((meters - 111.2).abs() < 1.0);
//!
//! let heading = geo_utils::bearing(&start, &end);
//! assert!(heading < 0.001 || heading > 359.999); // due north
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a spherical Earth, which is accurate
//! to well under a meter at running-course scale. The local planar frame uses a
//! fixed 111,320 m per degree scaled by `cos(reference latitude)` for longitude;
//! it is only meant for short segments around the reference point.

use geo::{Bearing, Destination, Distance, Haversine, Point};
use log::warn;

use crate::{Bounds, Coordinate, TrackerError};

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

// =============================================================================
// Distance and Bearing
// =============================================================================

#[inline]
fn to_point(c: &Coordinate) -> Point<f64> {
    Point::new(c.lng, c.lat)
}

/// Great-circle distance between two coordinates in meters.
///
/// Identical points return exactly `0.0`. Invalid coordinates also return
/// `0.0` (logged at `warn`), since this runs inside the live tracking loop.
///
/// ```rust
/// use course_tracker::{Coordinate, geo_utils};
///
/// let p = Coordinate::new(37.5665, 126.9780);
/// assert_eq!(geo_utils::haversine_distance(&p, &p), 0.0);
/// ```
#[inline]
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    if !a.is_valid() || !b.is_valid() {
        warn!("haversine_distance: invalid coordinate {:?} -> {:?}", a, b);
        return 0.0;
    }
    if a.lat == b.lat && a.lng == b.lng {
        return 0.0;
    }
    let d = Haversine::distance(to_point(a), to_point(b));
    if d.is_finite() {
        d
    } else {
        0.0
    }
}

/// Distance between two points in meters; the course-level name for
/// [`haversine_distance`].
#[inline]
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_distance(a, b)
}

/// Like [`haversine_distance`], but reports invalid input instead of
/// collapsing it to zero.
pub fn checked_distance(a: &Coordinate, b: &Coordinate) -> Result<f64, TrackerError> {
    for c in [a, b] {
        if !c.is_valid() {
            return Err(TrackerError::InvalidCoordinate { lat: c.lat, lng: c.lng });
        }
    }
    Ok(haversine_distance(a, b))
}

/// Initial great-circle bearing from `from` toward `to`, in degrees `[0, 360)`
/// with 0 = north and 90 = east.
///
/// `bearing(a, a)` is `0.0` by convention. Invalid input also yields `0.0`.
pub fn bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    if !from.is_valid() || !to.is_valid() {
        warn!("bearing: invalid coordinate {:?} -> {:?}", from, to);
        return 0.0;
    }
    if from.lat == to.lat && from.lng == to.lng {
        return 0.0;
    }
    let b = Haversine::bearing(to_point(from), to_point(to));
    if b.is_finite() {
        normalize_bearing(b)
    } else {
        0.0
    }
}

/// Point reached by travelling `meters` from `origin` along `bearing_deg`.
pub fn destination(origin: &Coordinate, bearing_deg: f64, meters: f64) -> Coordinate {
    let p = Haversine::destination(to_point(origin), bearing_deg, meters);
    Coordinate::new(p.y(), p.x())
}

// =============================================================================
// Angles
// =============================================================================

/// Wrap any angle in degrees into `[0, 360)`.
#[inline]
pub fn normalize_bearing(deg: f64) -> f64 {
    let n = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if n >= 360.0 {
        0.0
    } else {
        n
    }
}

/// Shortest signed rotation from bearing `from` to bearing `to`, in
/// `(-180, 180]`. Positive means clockwise (a right turn).
#[inline]
pub fn signed_angle_delta(from: f64, to: f64) -> f64 {
    let mut d = (to - from).rem_euclid(360.0);
    if d > 180.0 {
        d -= 360.0;
    }
    d
}

// =============================================================================
// Local Planar Frame
// =============================================================================

/// Project `point` into a planar meter frame whose origin is `reference`.
///
/// Returns `(x, y)` with `x` east and `y` north. Longitude is scaled by the
/// cosine of the reference latitude only, so all points of one segment share
/// the same scale.
#[inline]
pub fn to_local_meters(reference: &Coordinate, point: &Coordinate) -> (f64, f64) {
    let cos_lat = reference.lat.to_radians().cos();
    let x = (point.lng - reference.lng) * METERS_PER_DEGREE * cos_lat;
    let y = (point.lat - reference.lat) * METERS_PER_DEGREE;
    (x, y)
}

/// Inverse of [`to_local_meters`].
///
/// Near the poles, where the longitude scale collapses, the reference
/// longitude is kept.
#[inline]
pub fn from_local_meters(reference: &Coordinate, x: f64, y: f64) -> Coordinate {
    let cos_lat = reference.lat.to_radians().cos();
    let lat = reference.lat + y / METERS_PER_DEGREE;
    let lng = if cos_lat.abs() > 1e-10 {
        reference.lng + x / (METERS_PER_DEGREE * cos_lat)
    } else {
        reference.lng
    };
    Coordinate::new(lat, lng)
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Uses the longitude scale, which is the larger of the two, so a square
/// search area built from the result always covers the requested radius.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let meters_per_degree = METERS_PER_DEGREE * latitude.to_radians().cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Polylines
// =============================================================================

/// Total length of a polyline in meters. Fewer than two points gives `0.0`.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Bounding box of a set of coordinates, used to fit the map viewport to a
/// course. Returns `None` for empty input.
pub fn compute_bounds(points: &[Coordinate]) -> Option<Bounds> {
    if points.is_empty() {
        return None;
    }

    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.lat);
        max_lat = max_lat.max(p.lat);
        min_lng = min_lng.min(p.lng);
        max_lng = max_lng.max(p.lng);
    }

    Some(Bounds { min_lat, max_lat, min_lng, max_lng })
}

/// Arithmetic centroid of a set of coordinates. Returns `(0, 0)` for empty
/// input.
///
/// Fine for a single running course; not meaningful across the antimeridian.
pub fn compute_center(points: &[Coordinate]) -> Coordinate {
    if points.is_empty() {
        return Coordinate::new(0.0, 0.0);
    }

    let n = points.len() as f64;
    let sum_lat: f64 = points.iter().map(|p| p.lat).sum();
    let sum_lng: f64 = points.iter().map(|p| p.lng).sum();

    Coordinate::new(sum_lat / n, sum_lng / n)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = Coordinate::new(37.5665, 126.9780);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_symmetric() {
        let a = Coordinate::new(37.5665, 126.9780);
        let b = Coordinate::new(37.5700, 126.9820);
        assert!(approx_eq(haversine_distance(&a, &b), haversine_distance(&b, &a), 1e-9));
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // 0.001 degrees of latitude is about 111 m
        let a = Coordinate::new(37.0000, 127.0000);
        let b = Coordinate::new(37.0010, 127.0000);
        assert!(approx_eq(haversine_distance(&a, &b), 111.2, 0.5));
    }

    #[test]
    fn test_haversine_distance_invalid_is_zero() {
        let a = Coordinate::new(f64::NAN, 127.0);
        let b = Coordinate::new(37.0, 127.0);
        assert_eq!(haversine_distance(&a, &b), 0.0);
        assert!(checked_distance(&a, &b).is_err());
        assert!(checked_distance(&b, &Coordinate::new(37.0, 200.0)).is_err());
    }

    #[test]
    fn test_bearing_conventions() {
        let a = Coordinate::new(0.0, 10.0);
        assert_eq!(bearing(&a, &a), 0.0);

        let east = Coordinate::new(0.0, 10.001);
        assert!(approx_eq(bearing(&a, &east), 90.0, 0.01));

        let west = Coordinate::new(0.0, 9.999);
        assert!(approx_eq(bearing(&a, &west), 270.0, 0.01));

        let south = Coordinate::new(-0.001, 10.0);
        assert!(approx_eq(bearing(&a, &south), 180.0, 0.01));
    }

    #[test]
    fn test_signed_angle_delta() {
        assert!(approx_eq(signed_angle_delta(350.0, 10.0), 20.0, 1e-9));
        assert!(approx_eq(signed_angle_delta(10.0, 350.0), -20.0, 1e-9));
        assert!(approx_eq(signed_angle_delta(0.0, 180.0), 180.0, 1e-9));
        assert!(approx_eq(signed_angle_delta(90.0, 0.0), -90.0, 1e-9));
    }

    #[test]
    fn test_normalize_bearing() {
        assert_eq!(normalize_bearing(360.0), 0.0);
        assert!(approx_eq(normalize_bearing(-90.0), 270.0, 1e-9));
        assert!(approx_eq(normalize_bearing(725.0), 5.0, 1e-9));
    }

    #[test]
    fn test_local_meters_round_trip() {
        let origin = Coordinate::new(37.0, 127.0);
        let p = Coordinate::new(37.0004, 127.0007);
        let (x, y) = to_local_meters(&origin, &p);
        let back = from_local_meters(&origin, x, y);
        assert!(approx_eq(back.lat, p.lat, 1e-9));
        assert!(approx_eq(back.lng, p.lng, 1e-9));
        // The planar frame agrees with haversine at this scale
        let planar = (x * x + y * y).sqrt();
        assert!(approx_eq(planar, haversine_distance(&origin, &p), 0.5));
    }

    #[test]
    fn test_destination_matches_distance() {
        let origin = Coordinate::new(37.0, 127.0);
        let p = destination(&origin, 90.0, 40.0);
        assert!(approx_eq(haversine_distance(&origin, &p), 40.0, 0.01));
        assert!(approx_eq(bearing(&origin, &p), 90.0, 0.01));
    }

    #[test]
    fn test_polyline_length() {
        let empty: Vec<Coordinate> = vec![];
        assert_eq!(polyline_length(&empty), 0.0);
        let single = vec![Coordinate::new(37.0, 127.0)];
        assert_eq!(polyline_length(&single), 0.0);

        let line = vec![
            Coordinate::new(37.0000, 127.0),
            Coordinate::new(37.0010, 127.0),
            Coordinate::new(37.0020, 127.0),
        ];
        assert!(approx_eq(polyline_length(&line), 222.4, 1.0));
    }

    #[test]
    fn test_compute_bounds_and_center() {
        assert!(compute_bounds(&[]).is_none());

        let pts = vec![
            Coordinate::new(37.50, 126.90),
            Coordinate::new(37.52, 126.94),
        ];
        let b = compute_bounds(&pts).unwrap();
        assert_eq!(b.min_lat, 37.50);
        assert_eq!(b.max_lng, 126.94);

        let c = compute_center(&pts);
        assert!(approx_eq(c.lat, 37.51, 1e-9));
        assert!(approx_eq(c.lng, 126.92, 1e-9));
    }

    #[test]
    fn test_meters_to_degrees() {
        let deg = meters_to_degrees(111_320.0, 0.0);
        assert!(approx_eq(deg, 1.0, 0.01));
        assert!(meters_to_degrees(111_320.0, 45.0) > 1.0);
    }
}
