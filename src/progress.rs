//! # Progress Calculation
//!
//! Map-matches a live fix onto the course and derives how far the runner has
//! come, how far is left, and whether they are off the course.
//!
//! ## Algorithm
//! 1. Project the fix onto every segment of the [`RouteModel`]
//! 2. Keep the segment with the smallest `distance_to_segment`; ties go to the
//!    lowest index. [`progress_from`] instead resolves ties toward the
//!    previous match, which keeps a returning runner on the return leg
//! 3. `cumulative_dist = cumulative[i] + t * segment[i]`, clamped to the course
//! 4. Ratio, remaining distance and ETA follow from the cumulative distance
//!
//! The full scan is O(N) per fix, fine at 1-5 Hz for courses of a few thousand
//! points. [`progress_in_window`] and [`SegmentIndex`] cut the per-fix cost for
//! longer courses.
//!
//! Nothing here fails: an invalid fix produces the sentinel progress
//! (`distance_to_segment = inf`, `is_off_route = true`, `progress_ratio = 0`).

use std::ops::Range;

use log::{debug, warn};
use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::meters_to_degrees;
use crate::off_route::is_off_route;
use crate::projection::{project, Projection};
use crate::route_model::RouteModel;
use crate::{Coordinate, PositionSample, RoutePoint, TrackerConfig};

/// Where the runner is on the course for one fix.
///
/// Recomputed on every fix and never stored by the engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct NavigationProgress {
    /// Fraction of the course completed, in `[0, 1]`
    pub progress_ratio: f64,
    /// Distance along the course to the matched point (meters)
    pub cumulative_dist: f64,
    /// Distance from the fix to the matched point (meters)
    pub distance_to_segment: f64,
    /// Index of the matched segment, in `[0, points - 2]`
    pub segment_index: u32,
    /// Whether `distance_to_segment` exceeds the off-route threshold
    pub is_off_route: bool,
    /// Total course length (meters)
    pub total_distance: f64,
    /// `total_distance - cumulative_dist` (meters)
    pub remaining_distance: f64,
    /// End point of the matched segment
    pub next_waypoint: Option<RoutePoint>,
    /// Seconds to finish at the supplied speed
    pub estimated_time_to_finish: Option<f64>,
    /// Matched point on the course, for snapping the runner marker
    pub projected_point: Coordinate,
}

impl NavigationProgress {
    /// Result used when the fix cannot be matched.
    pub fn sentinel(model: &RouteModel) -> Self {
        Self {
            progress_ratio: 0.0,
            cumulative_dist: 0.0,
            distance_to_segment: f64::INFINITY,
            segment_index: 0,
            is_off_route: true,
            total_distance: model.total_distance(),
            remaining_distance: model.total_distance(),
            next_waypoint: None,
            estimated_time_to_finish: None,
            projected_point: model.points()[0].coord(),
        }
    }

    /// Whether this progress came from a successfully matched fix.
    pub fn is_matched(&self) -> bool {
        self.distance_to_segment.is_finite()
    }

    /// Progress as a percentage, for display.
    pub fn percent(&self) -> f64 {
        self.progress_ratio * 100.0
    }

    /// Copy of this progress moved to `cumulative_dist` along the course,
    /// keeping the match distance and off-route flag.
    pub(crate) fn with_cumulative(&self, model: &RouteModel, cumulative_dist: f64) -> Self {
        let total = model.total_distance();
        let cumulative_dist = cumulative_dist.clamp(0.0, total);
        let remaining = total - cumulative_dist;
        let idx = model
            .cumulative_distances()
            .partition_point(|&c| c <= cumulative_dist)
            .saturating_sub(1)
            .min(model.segment_count() - 1);

        let eta = match (self.estimated_time_to_finish, self.remaining_distance) {
            (Some(t), r) if r > 0.0 => Some(t * remaining / r),
            (Some(_), _) => Some(0.0),
            (None, _) => None,
        };

        Self {
            progress_ratio: cumulative_dist / total,
            cumulative_dist,
            segment_index: idx as u32,
            remaining_distance: remaining,
            next_waypoint: model.points().get(idx + 1).copied(),
            estimated_time_to_finish: eta,
            projected_point: model.point_at_distance(cumulative_dist),
            ..self.clone()
        }
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Distances closer than this (meters) count as a tie. Overlapping legs are
/// projected in different local frames and rarely agree to the last bit.
const TIE_EPSILON_M: f64 = 1e-6;

/// Best projection over `segments`.
///
/// Without `resume_from` ties go to the lowest index. With it, ties go to the
/// candidate that continues from that distance along the course: the nearest
/// one at or ahead of it, else the nearest one behind. `segments` must be
/// ascending.
fn best_match(
    model: &RouteModel,
    position: &Coordinate,
    segments: impl Iterator<Item = usize>,
    resume_from: Option<f64>,
) -> Option<(usize, Projection)> {
    let points = model.points();
    let mut best: Option<(usize, Projection)> = None;

    for i in segments {
        let proj = project(&points[i].coord(), &points[i + 1].coord(), position);
        if !proj.is_valid() {
            continue;
        }
        let better = match &best {
            None => true,
            Some((bi, bp)) => {
                let (d, bd) = (proj.distance_to_segment, bp.distance_to_segment);
                if d < bd - TIE_EPSILON_M {
                    true
                } else if d > bd + TIE_EPSILON_M {
                    false
                } else {
                    resume_from.is_some_and(|prev| {
                        continuity_rank(cumulative_at(model, i, &proj), prev)
                            < continuity_rank(cumulative_at(model, *bi, bp), prev)
                    })
                }
            }
        };
        if better {
            best = Some((i, proj));
        }
    }

    best
}

/// Orders tied candidates: anything at or ahead of `prev` before anything
/// behind it, then by gap.
fn continuity_rank(cumulative: f64, prev: f64) -> (bool, f64) {
    if cumulative >= prev - TIE_EPSILON_M {
        (false, cumulative - prev)
    } else {
        (true, prev - cumulative)
    }
}

fn cumulative_at(model: &RouteModel, segment_index: usize, proj: &Projection) -> f64 {
    (model.cumulative_distances()[segment_index]
        + proj.t * model.segment_distances()[segment_index])
        .clamp(0.0, model.total_distance())
}

fn build_progress(
    model: &RouteModel,
    segment_index: usize,
    proj: &Projection,
    off_route_threshold_m: f64,
    speed_mps: Option<f64>,
) -> NavigationProgress {
    let total = model.total_distance();
    let cumulative = cumulative_at(model, segment_index, proj);
    let remaining = total - cumulative;
    let progress_ratio = if total > 0.0 { (cumulative / total).clamp(0.0, 1.0) } else { 0.0 };

    let estimated_time_to_finish = speed_mps
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(|s| remaining / s);

    NavigationProgress {
        progress_ratio,
        cumulative_dist: cumulative,
        distance_to_segment: proj.distance_to_segment,
        segment_index: segment_index as u32,
        is_off_route: is_off_route(proj.distance_to_segment, off_route_threshold_m),
        total_distance: total,
        remaining_distance: remaining,
        next_waypoint: model.points().get(segment_index + 1).copied(),
        estimated_time_to_finish,
        projected_point: proj.projected_point,
    }
}

/// Match `position` onto the whole course.
///
/// `speed_mps`, when positive and finite, is used for
/// `estimated_time_to_finish`.
///
/// # Example
///
/// ```rust
/// use course_tracker::{progress, Coordinate, RouteModel};
///
/// let model = RouteModel::from_coords(&[(37.0000, 127.0), (37.0010, 127.0)]).unwrap();
/// let p = progress(&model, &Coordinate::new(37.0005, 127.0), 30.0, Some(2.5));
///
/// assert!((p.cumulative_dist - 55.6).abs() < 1.0);
/// assert!(p.distance_to_segment < 1.0);
/// assert!((p.estimated_time_to_finish.unwrap() - p.remaining_distance / 2.5).abs() < 1e-9);
/// ```
pub fn progress(
    model: &RouteModel,
    position: &Coordinate,
    off_route_threshold_m: f64,
    speed_mps: Option<f64>,
) -> NavigationProgress {
    if !position.is_valid() {
        warn!("progress: ignoring invalid position {:?}", position);
        return NavigationProgress::sentinel(model);
    }
    full_scan(model, position, off_route_threshold_m, None, speed_mps)
}

fn full_scan(
    model: &RouteModel,
    position: &Coordinate,
    off_route_threshold_m: f64,
    resume_from: Option<f64>,
    speed_mps: Option<f64>,
) -> NavigationProgress {
    match best_match(model, position, 0..model.segment_count(), resume_from) {
        Some((i, proj)) => {
            let result = build_progress(model, i, &proj, off_route_threshold_m, speed_mps);
            debug!(
                "progress: seg={} ratio={:.3} cum={:.1}m off={:.1}m off_route={}",
                result.segment_index,
                result.progress_ratio,
                result.cumulative_dist,
                result.distance_to_segment,
                result.is_off_route
            );
            result
        }
        None => {
            warn!("progress: no segment could be projected for {:?}", position);
            NavigationProgress::sentinel(model)
        }
    }
}

/// [`progress`] with the threshold taken from `config`.
pub fn progress_with_config(
    model: &RouteModel,
    position: &Coordinate,
    config: &TrackerConfig,
    speed_mps: Option<f64>,
) -> NavigationProgress {
    progress(model, position, config.off_route_threshold_m, speed_mps)
}

/// Match `position` onto the whole course, continuing from `previous`.
///
/// Same minimum as [`progress`], but equally close segments are resolved in
/// favor of the one that carries on from `previous.cumulative_dist`. On an
/// out-and-back course the return leg overlaps the outbound leg exactly, and
/// this keeps a returning runner on the return leg. An unmatched `previous`
/// behaves like [`progress_with_config`].
pub fn progress_from(
    model: &RouteModel,
    position: &Coordinate,
    config: &TrackerConfig,
    previous: &NavigationProgress,
    speed_mps: Option<f64>,
) -> NavigationProgress {
    if !position.is_valid() {
        warn!("progress_from: ignoring invalid position {:?}", position);
        return NavigationProgress::sentinel(model);
    }
    let resume_from = previous.is_matched().then_some(previous.cumulative_dist);
    full_scan(model, position, config.off_route_threshold_m, resume_from, speed_mps)
}

fn window_range(hint: usize, window: usize, segment_count: usize) -> Range<usize> {
    let hint = hint.min(segment_count - 1);
    let start = hint.saturating_sub(window);
    let end = (hint + window + 1).min(segment_count);
    start..end
}

/// Match `position` only against segments within `window` of the segment
/// `previous` was matched on.
///
/// Ties are resolved as in [`progress_from`]. Falls back to that full scan
/// when nothing in the window is within the off-route threshold, so a runner
/// who cuts across a loop is still found. On a self-intersecting course this
/// keeps the match on the lap the runner is actually on.
pub fn progress_in_window(
    model: &RouteModel,
    position: &Coordinate,
    config: &TrackerConfig,
    previous: &NavigationProgress,
    window: usize,
    speed_mps: Option<f64>,
) -> NavigationProgress {
    if !position.is_valid() {
        warn!("progress_in_window: ignoring invalid position {:?}", position);
        return NavigationProgress::sentinel(model);
    }

    let hint = previous.segment_index as usize;
    let resume_from = previous.is_matched().then_some(previous.cumulative_dist);
    let range = window_range(hint, window, model.segment_count());
    if let Some((i, proj)) = best_match(model, position, range, resume_from) {
        if !is_off_route(proj.distance_to_segment, config.off_route_threshold_m) {
            return build_progress(model, i, &proj, config.off_route_threshold_m, speed_mps);
        }
    }

    debug!("progress_in_window: no on-route match near segment {}, full scan", hint);
    full_scan(model, position, config.off_route_threshold_m, resume_from, speed_mps)
}

// =============================================================================
// R-tree Segment Index
// =============================================================================

/// A course segment's bounding box for R-tree queries
#[derive(Debug, Clone)]
struct IndexedSegment {
    idx: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// Query radii tried before giving up and scanning the whole course (meters).
const SEARCH_RADII_M: [f64; 4] = [50.0, 200.0, 800.0, 3200.0];

/// Margin on the meters-to-degrees conversion so the search box always covers
/// the radius.
const SEARCH_MARGIN: f64 = 1.1;

/// R-tree over a course's segments.
///
/// Answers exactly the same query as [`progress`] (same minimum, same
/// tie-break) while only projecting onto segments near the fix. Build once
/// per course next to the [`RouteModel`].
pub struct SegmentIndex {
    tree: RTree<IndexedSegment>,
}

impl SegmentIndex {
    pub fn new(model: &RouteModel) -> Self {
        let segments: Vec<IndexedSegment> = (0..model.segment_count())
            .filter_map(|i| {
                let (a, b) = model.segment(i)?;
                Some(IndexedSegment {
                    idx: i,
                    min: [a.lng.min(b.lng), a.lat.min(b.lat)],
                    max: [a.lng.max(b.lng), a.lat.max(b.lat)],
                })
            })
            .collect();
        Self { tree: RTree::bulk_load(segments) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Indexed equivalent of [`progress`]. `model` must be the model this
    /// index was built from.
    pub fn progress(
        &self,
        model: &RouteModel,
        position: &Coordinate,
        off_route_threshold_m: f64,
        speed_mps: Option<f64>,
    ) -> NavigationProgress {
        if !position.is_valid() {
            warn!("SegmentIndex::progress: ignoring invalid position {:?}", position);
            return NavigationProgress::sentinel(model);
        }

        for radius in SEARCH_RADII_M {
            let deg = meters_to_degrees(radius * SEARCH_MARGIN, position.lat);
            let search_bounds = AABB::from_corners(
                [position.lng - deg, position.lat - deg],
                [position.lng + deg, position.lat + deg],
            );

            let mut candidates: Vec<usize> = self
                .tree
                .locate_in_envelope_intersecting(&search_bounds)
                .map(|s| s.idx)
                .collect();
            if candidates.is_empty() {
                continue;
            }
            candidates.sort_unstable();

            // Every segment closer than `radius` intersects the box, so a best
            // match inside the radius is also the global best.
            if let Some((i, proj)) = best_match(model, position, candidates.into_iter(), None) {
                if proj.distance_to_segment <= radius {
                    return build_progress(model, i, &proj, off_route_threshold_m, speed_mps);
                }
            }
        }

        progress(model, position, off_route_threshold_m, speed_mps)
    }
}

// =============================================================================
// Batch Replay
// =============================================================================

/// Recompute progress for every sample of a recorded run, for post-run
/// verification. Platform speed, when present, drives the ETA.
pub fn replay_track(
    model: &RouteModel,
    samples: &[PositionSample],
    config: &TrackerConfig,
) -> Vec<NavigationProgress> {
    samples
        .iter()
        .map(|s| progress_with_config(model, &s.coord(), config, s.reported_speed()))
        .collect()
}

/// Parallel [`replay_track`]. Output order matches `samples`.
#[cfg(feature = "parallel")]
pub fn replay_track_parallel(
    model: &RouteModel,
    samples: &[PositionSample],
    config: &TrackerConfig,
) -> Vec<NavigationProgress> {
    use rayon::prelude::*;

    samples
        .par_iter()
        .map(|s| progress_with_config(model, &s.coord(), config, s.reported_speed()))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
