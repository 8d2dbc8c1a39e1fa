//! Segment projection: closest point on one course segment to a live fix.
//!
//! The projection scalar is computed in a local planar meter frame anchored at
//! the segment start, where a dot product is cheap and well conditioned. The
//! clamped point is then mapped back to latitude/longitude and the reported
//! distance is the haversine distance to it, so longitude-scaling error in the
//! planar frame does not leak into the off-route decision.

use log::warn;

use crate::geo_utils::{self, haversine_distance};
use crate::Coordinate;

/// Segments shorter than this (meters) are treated as a single point.
const DEGENERATE_SEGMENT_M: f64 = 1e-6;

/// Result of projecting a point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Closest point on the segment
    pub projected_point: Coordinate,
    /// Haversine distance from the query point to `projected_point` (meters).
    /// `f64::INFINITY` when the input was invalid.
    pub distance_to_segment: f64,
    /// Position of `projected_point` along the segment, clamped to `[0, 1]`
    pub t: f64,
    /// Haversine length of the segment (meters)
    pub segment_length: f64,
}

impl Projection {
    fn sentinel(seg_start: &Coordinate) -> Self {
        Self {
            projected_point: *seg_start,
            distance_to_segment: f64::INFINITY,
            t: 0.0,
            segment_length: 0.0,
        }
    }

    fn at_start(seg_start: &Coordinate, point: &Coordinate, segment_length: f64) -> Self {
        Self {
            projected_point: *seg_start,
            distance_to_segment: haversine_distance(point, seg_start),
            t: 0.0,
            segment_length,
        }
    }

    /// Whether this projection came from valid input.
    pub fn is_valid(&self) -> bool {
        self.distance_to_segment.is_finite()
    }
}

/// Project `point` onto the segment `seg_start -> seg_end`.
///
/// `t` is clamped, so a point before the start maps to `t == 0` and a point
/// past the end maps to `t == 1`; the result is the closest point on the
/// segment, never on its infinite extension.
///
/// ```
/// use course_tracker::{project, Coordinate};
///
/// let a = Coordinate::new(37.0000, 127.0);
/// let b = Coordinate::new(37.0010, 127.0);
///
/// let mid = project(&a, &b, &Coordinate::new(37.0005, 127.0));
/// assert!((mid.t - 0.5).abs() < 0.01);
/// assert!(mid.distance_to_segment < 1.0);
///
/// let before = project(&a, &b, &Coordinate::new(36.9990, 127.0));
/// assert_eq!(before.t, 0.0);
/// ```
pub fn project(seg_start: &Coordinate, seg_end: &Coordinate, point: &Coordinate) -> Projection {
    if !seg_start.is_valid() || !seg_end.is_valid() || !point.is_valid() {
        warn!(
            "project: invalid input start={:?} end={:?} point={:?}",
            seg_start, seg_end, point
        );
        return Projection::sentinel(seg_start);
    }

    let segment_length = haversine_distance(seg_start, seg_end);
    if segment_length < DEGENERATE_SEGMENT_M {
        return Projection::at_start(seg_start, point, 0.0);
    }

    let (ex, ey) = geo_utils::to_local_meters(seg_start, seg_end);
    let (px, py) = geo_utils::to_local_meters(seg_start, point);

    let len_sq = ex * ex + ey * ey;
    let t = if len_sq > 1e-10 {
        ((px * ex + py * ey) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let projected_point = geo_utils::from_local_meters(seg_start, t * ex, t * ey);
    if !projected_point.is_valid() {
        warn!("project: back-projected point {:?} is invalid", projected_point);
        return Projection::at_start(seg_start, point, segment_length);
    }

    let distance = haversine_distance(point, &projected_point);

    Projection {
        projected_point,
        distance_to_segment: if distance.is_finite() { distance } else { f64::INFINITY },
        t,
        segment_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::destination;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn north_segment() -> (Coordinate, Coordinate) {
        (Coordinate::new(37.0000, 127.0000), Coordinate::new(37.0010, 127.0000))
    }

    #[test]
    fn test_point_on_segment() {
        let (a, b) = north_segment();
        let p = project(&a, &b, &Coordinate::new(37.00025, 127.0));
        assert!(approx_eq(p.t, 0.25, 0.001));
        assert!(p.distance_to_segment < 0.5);
        assert!(approx_eq(p.segment_length, 111.2, 0.5));
    }

    #[test]
    fn test_perpendicular_offset() {
        let (a, b) = north_segment();
        let mid = Coordinate::new(37.0005, 127.0);
        for d in [5.0, 20.0, 40.0] {
            let east = destination(&mid, 90.0, d);
            let p = project(&a, &b, &east);
            assert!(approx_eq(p.distance_to_segment, d, 0.5), "d={} got {}", d, p.distance_to_segment);
            assert!(approx_eq(p.t, 0.5, 0.01));
        }
    }

    #[test]
    fn test_clamped_before_start_and_past_end() {
        let (a, b) = north_segment();
        let before = project(&a, &b, &Coordinate::new(36.9995, 127.0));
        assert_eq!(before.t, 0.0);
        assert_eq!(before.projected_point, a);
        assert!(approx_eq(before.distance_to_segment, 55.6, 0.5));

        let after = project(&a, &b, &Coordinate::new(37.0020, 127.0));
        assert_eq!(after.t, 1.0);
        assert!(approx_eq(after.distance_to_segment, 111.2, 0.5));
    }

    #[test]
    fn test_degenerate_segment() {
        let a = Coordinate::new(37.0, 127.0);
        let p = Coordinate::new(37.0005, 127.0);
        let proj = project(&a, &a, &p);
        assert_eq!(proj.t, 0.0);
        assert_eq!(proj.segment_length, 0.0);
        assert!(approx_eq(proj.distance_to_segment, 55.6, 0.5));
    }

    #[test]
    fn test_invalid_input_is_sentinel() {
        let (a, b) = north_segment();
        let proj = project(&a, &b, &Coordinate::new(f64::NAN, 127.0));
        assert!(!proj.is_valid());
        assert_eq!(proj.distance_to_segment, f64::INFINITY);
        assert_eq!(proj.t, 0.0);
    }

    #[test]
    fn test_diagonal_segment() {
        // Segment heading north-east; a point on its midpoint projects to ~0.5
        let a = Coordinate::new(37.0, 127.0);
        let b = destination(&a, 45.0, 200.0);
        let mid = destination(&a, 45.0, 100.0);
        let p = project(&a, &b, &mid);
        assert!(approx_eq(p.t, 0.5, 0.01));
        assert!(p.distance_to_segment < 1.0);
    }
}
