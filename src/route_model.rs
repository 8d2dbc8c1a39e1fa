//! Precomputed, immutable course model.
//!
//! A [`RouteModel`] is built once per course load. It owns the ordered course
//! points and the per-segment and cumulative distances that every progress
//! query needs, so a live fix never has to re-measure the course.

use geo::{algorithm::simplify::SimplifyIdx, Coord, LineString};
use log::{debug, info};

use crate::error::{Result, TrackerError};
use crate::geo_utils::{self, haversine_distance};
use crate::progress::NavigationProgress;
use crate::{Bounds, Coordinate, RoutePoint};

/// Immutable summary of a course's geometry.
///
/// Invariants, established by [`RouteModel::build`]:
/// - at least two points
/// - `cumulative_distances().len() == points().len()`
/// - `cumulative_distances()[0] == 0.0`
/// - `total_distance() == *cumulative_distances().last()` and is finite and > 0
#[derive(Debug, Clone, PartialEq)]
pub struct RouteModel {
    points: Vec<RoutePoint>,
    segment_distances: Vec<f64>,
    cumulative_distances: Vec<f64>,
    total_distance: f64,
    bounds: Bounds,
}

/// A course polyline split at the runner's matched position, for drawing the
/// passed and upcoming parts in different styles.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteSplit {
    /// Course start up to and including the matched point
    pub passed: Vec<Coordinate>,
    /// Matched point through the course end
    pub upcoming: Vec<Coordinate>,
}

impl RouteModel {
    /// Build a model from ordered course points.
    ///
    /// Fails with [`TrackerError::InvalidRoute`] when fewer than two points are
    /// given, when any point is not a valid coordinate, or when the course has
    /// zero or non-finite length.
    ///
    /// ```
    /// use course_tracker::{RouteModel, RoutePoint};
    ///
    /// assert!(RouteModel::build(&[]).is_err());
    /// assert!(RouteModel::build(&[RoutePoint::new(37.0, 127.0)]).is_err());
    ///
    /// let model = RouteModel::build(&[
    ///     RoutePoint::new(37.0000, 127.0),
    ///     RoutePoint::new(37.0010, 127.0),
    /// ]).unwrap();
    /// assert!((model.total_distance() - 111.2).abs() < 0.5);
    /// ```
    pub fn build(points: &[RoutePoint]) -> Result<Self> {
        if points.len() < 2 {
            return Err(TrackerError::invalid_route(format!(
                "need at least 2 points, got {}",
                points.len()
            )));
        }

        if let Some((i, p)) = points.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(TrackerError::invalid_route(format!(
                "point {} has invalid coordinate ({}, {})",
                i, p.lat, p.lng
            )));
        }

        let mut segment_distances = Vec::with_capacity(points.len() - 1);
        let mut cumulative_distances = Vec::with_capacity(points.len());
        cumulative_distances.push(0.0);

        let mut running = 0.0;
        for w in points.windows(2) {
            let d = haversine_distance(&w[0].coord(), &w[1].coord());
            segment_distances.push(d);
            running += d;
            cumulative_distances.push(running);
        }

        if !(running.is_finite() && running > 0.0) {
            return Err(TrackerError::invalid_route(format!(
                "course length must be positive and finite, got {}",
                running
            )));
        }

        let coords: Vec<Coordinate> = points.iter().map(RoutePoint::coord).collect();
        let bounds = geo_utils::compute_bounds(&coords)
            .ok_or_else(|| TrackerError::invalid_route("course has no points"))?;

        debug!(
            "Built route model: {} points, {:.1}m",
            points.len(),
            running
        );

        Ok(Self {
            points: points.to_vec(),
            segment_distances,
            cumulative_distances,
            total_distance: running,
            bounds,
        })
    }

    /// Build from bare `(lat, lng)` pairs.
    pub fn from_coords(coords: &[(f64, f64)]) -> Result<Self> {
        let points: Vec<RoutePoint> = coords
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| RoutePoint::with_order(lat, lng, i as u32))
            .collect();
        Self::build(&points)
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    /// Length of segment `i` (from `points[i]` to `points[i + 1]`).
    pub fn segment_distances(&self) -> &[f64] {
        &self.segment_distances
    }

    /// Distance along the course from the first point to `points[i]`.
    pub fn cumulative_distances(&self) -> &[f64] {
        &self.cumulative_distances
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Number of segments, always `points().len() - 1`.
    pub fn segment_count(&self) -> usize {
        self.segment_distances.len()
    }

    /// Endpoints of segment `i`, or `None` if out of range.
    pub fn segment(&self, i: usize) -> Option<(&RoutePoint, &RoutePoint)> {
        Some((self.points.get(i)?, self.points.get(i + 1)?))
    }

    /// Initial bearing of segment `i` in degrees.
    pub fn segment_bearing(&self, i: usize) -> Option<f64> {
        self.segment(i)
            .map(|(a, b)| geo_utils::bearing(&a.coord(), &b.coord()))
    }

    /// Bounding box of the course.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Center of the course bounding box, for the initial map viewport.
    pub fn center(&self) -> Coordinate {
        self.bounds.center()
    }

    /// Course coordinates without order/elevation metadata.
    pub fn coords(&self) -> Vec<Coordinate> {
        self.points.iter().map(RoutePoint::coord).collect()
    }

    /// Interpolated point at `distance` meters along the course.
    ///
    /// The distance is clamped to `[0, total_distance]`.
    pub fn point_at_distance(&self, distance: f64) -> Coordinate {
        let d = if distance.is_finite() {
            distance.clamp(0.0, self.total_distance)
        } else {
            0.0
        };

        // First vertex strictly beyond d, minus one, is the segment containing d
        let idx = self
            .cumulative_distances
            .partition_point(|&c| c <= d)
            .saturating_sub(1)
            .min(self.segment_count() - 1);

        let seg_len = self.segment_distances[idx];
        let start = self.points[idx].coord();
        let end = self.points[idx + 1].coord();
        if seg_len <= 0.0 {
            return start;
        }

        let t = ((d - self.cumulative_distances[idx]) / seg_len).clamp(0.0, 1.0);
        let (ex, ey) = geo_utils::to_local_meters(&start, &end);
        geo_utils::from_local_meters(&start, ex * t, ey * t)
    }

    /// Split the course at the matched position of `progress`.
    ///
    /// A sentinel progress (invalid fix) splits at the course start.
    pub fn split_at(&self, progress: &NavigationProgress) -> RouteSplit {
        let coords = self.coords();
        if !progress.distance_to_segment.is_finite() {
            return RouteSplit { passed: vec![coords[0]], upcoming: coords };
        }

        let i = (progress.segment_index as usize).min(self.segment_count() - 1);
        let matched = progress.projected_point;

        let mut passed: Vec<Coordinate> = coords[..=i].to_vec();
        passed.push(matched);

        let mut upcoming = Vec::with_capacity(coords.len() - i);
        upcoming.push(matched);
        upcoming.extend_from_slice(&coords[i + 1..]);

        RouteSplit { passed, upcoming }
    }
}

/// Thin out a densely recorded course before building a model.
///
/// Applies Douglas-Peucker with `tolerance_deg` (in degrees, ~0.00005 is
/// about 5 m) and then uniform sampling down to `max_points`. The first and
/// last points are always kept and order/elevation metadata is preserved.
pub fn simplify_points(points: &[RoutePoint], tolerance_deg: f64, max_points: usize) -> Vec<RoutePoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord { x: p.lng, y: p.lat })
        .collect::<Vec<_>>()
        .into();

    let kept: Vec<usize> = line.simplify_idx(&tolerance_deg);
    let mut simplified: Vec<RoutePoint> = kept.iter().map(|&i| points[i]).collect();

    let max_points = max_points.max(2);
    if simplified.len() > max_points {
        let step = (simplified.len() - 1) as f64 / (max_points - 1) as f64;
        let last = simplified[simplified.len() - 1];
        let mut sampled: Vec<RoutePoint> = (0..max_points - 1)
            .map(|i| simplified[(i as f64 * step) as usize])
            .collect();
        sampled.push(last);
        simplified = sampled;
    }

    info!(
        "Simplified course: {} -> {} points",
        points.len(),
        simplified.len()
    );
    simplified
}
