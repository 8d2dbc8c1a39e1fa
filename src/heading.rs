//! Heading and speed estimation from recent fixes.
//!
//! GPS bearings between consecutive fixes are noisy, and meaningless when the
//! runner is standing still. The smoothed heading therefore averages only pairs
//! that moved faster than a minimum speed, and averages them as unit vectors so
//! that 359° and 1° average to 0° rather than 180°.
//!
//! All state lives in caller-owned values ([`PositionHistory`],
//! [`HeadingEstimator`], [`CompassFilter`]); the free functions are pure.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::geo_utils::{self, haversine_distance, normalize_bearing, signed_angle_delta};
use crate::{PositionSample, TrackerConfig};

/// Resultant vector lengths below this are treated as "no consensus".
const MIN_RESULTANT: f64 = 1e-9;

/// Direction and speed derived from the position history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct HeadingState {
    /// Bearing of the latest moving pair of fixes, `[0, 360)`
    pub current_bearing: f64,
    /// Vector-averaged bearing over the smoothing window, `[0, 360)`
    pub smooth_bearing: f64,
    /// Speed between the latest two fixes (m/s)
    pub speed_mps: f64,
}

// =============================================================================
// Pure Functions
// =============================================================================

/// Bearing from one fix to the next, in degrees `[0, 360)`.
#[inline]
pub fn bearing_between(prev: &PositionSample, curr: &PositionSample) -> f64 {
    geo_utils::bearing(&prev.coord(), &curr.coord())
}

/// Seconds from `prev_ms` to `curr_ms`, `0.0` when the difference does not
/// fit in an `i64`.
pub(crate) fn interval_secs(prev_ms: i64, curr_ms: i64) -> f64 {
    curr_ms.checked_sub(prev_ms).map_or(0.0, |ms| ms as f64 / 1000.0)
}

/// Ground speed between two fixes in m/s.
///
/// Returns `0.0` when time does not advance between the fixes.
pub fn speed_between(prev: &PositionSample, curr: &PositionSample) -> f64 {
    let dt = interval_secs(prev.timestamp, curr.timestamp);
    if dt <= 0.0 {
        return 0.0;
    }
    haversine_distance(&prev.coord(), &curr.coord()) / dt
}

/// Mean speed over the last `window` pairs of `samples` (total distance over
/// total time), `0.0` if no time elapsed.
pub fn average_speed(samples: &[PositionSample], window: usize) -> f64 {
    let start = samples.len().saturating_sub(window + 1);
    let mut distance = 0.0;
    let mut seconds = 0.0;
    for w in samples[start..].windows(2) {
        let dt = interval_secs(w[0].timestamp, w[1].timestamp);
        if dt > 0.0 {
            distance += haversine_distance(&w[0].coord(), &w[1].coord());
            seconds += dt;
        }
    }
    if seconds > 0.0 {
        distance / seconds
    } else {
        0.0
    }
}

/// Smoothed heading over the last `window` consecutive pairs of `samples`.
///
/// Only pairs moving faster than `min_speed_mps` contribute. When none do, or
/// their bearings cancel out, `previous` is returned unchanged.
///
/// ```
/// use course_tracker::{smooth_bearing, PositionSample};
///
/// // Walking due east at ~2.2 m/s
/// let walk: Vec<PositionSample> = (0..5)
///     .map(|i| PositionSample::new(0.0, 127.0 + i as f64 * 0.00002, i * 1000))
///     .collect();
/// let heading = smooth_bearing(&walk, 3, 0.5, 0.0);
/// assert!((heading - 90.0).abs() < 0.1);
///
/// // Standing still keeps the previous heading
/// let still = vec![walk[0], PositionSample { timestamp: 1000, ..walk[0] }];
/// assert_eq!(smooth_bearing(&still, 3, 0.5, 42.0), 42.0);
/// ```
pub fn smooth_bearing(
    samples: &[PositionSample],
    window: usize,
    min_speed_mps: f64,
    previous: f64,
) -> f64 {
    if samples.len() < 2 || window == 0 {
        return previous;
    }

    let start = samples.len().saturating_sub(window + 1);
    let mut sum_sin = 0.0;
    let mut sum_cos = 0.0;
    let mut count = 0usize;

    for w in samples[start..].windows(2) {
        if speed_between(&w[0], &w[1]) <= min_speed_mps {
            continue;
        }
        let theta = bearing_between(&w[0], &w[1]).to_radians();
        sum_sin += theta.sin();
        sum_cos += theta.cos();
        count += 1;
    }

    if count == 0 {
        return previous;
    }

    let mean_sin = sum_sin / count as f64;
    let mean_cos = sum_cos / count as f64;
    if mean_sin.hypot(mean_cos) < MIN_RESULTANT {
        return previous;
    }

    normalize_bearing(mean_sin.atan2(mean_cos).to_degrees())
}

// =============================================================================
// Position Ring Buffer
// =============================================================================

/// Fixed-capacity FIFO of recent fixes, owned by the tracking session.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    samples: VecDeque<PositionSample>,
    capacity: usize,
}

impl PositionHistory {
    /// Create an empty history. Capacity is at least 2.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append a fix, evicting the oldest when full.
    pub fn push(&mut self, sample: PositionSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&PositionSample> {
        self.samples.back()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest-first view of the buffered fixes.
    pub fn as_slice(&mut self) -> &[PositionSample] {
        self.samples.make_contiguous()
    }
}

// =============================================================================
// Heading Estimator
// =============================================================================

/// Per-session heading state.
///
/// Keeps the last smoothed bearing so a stationary runner keeps pointing the
/// way they were going.
#[derive(Debug, Clone)]
pub struct HeadingEstimator {
    window: usize,
    min_speed_mps: f64,
    state: HeadingState,
}

impl HeadingEstimator {
    pub fn new(window: usize, min_speed_mps: f64) -> Self {
        Self { window: window.max(1), min_speed_mps, state: HeadingState::default() }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.bearing_window as usize, config.min_speed_for_bearing)
    }

    /// Recompute the heading from the history, oldest first.
    pub fn update(&mut self, samples: &[PositionSample]) -> HeadingState {
        if let [.., prev, curr] = samples {
            let speed = speed_between(prev, curr);
            if speed > self.min_speed_mps {
                self.state.current_bearing = bearing_between(prev, curr);
            }
            self.state.speed_mps = speed;
        }
        self.state.smooth_bearing = smooth_bearing(
            samples,
            self.window,
            self.min_speed_mps,
            self.state.smooth_bearing,
        );
        self.state
    }

    pub fn state(&self) -> HeadingState {
        self.state
    }
}

// =============================================================================
// Compass Filter
// =============================================================================

/// Smooths a raw device compass heading for rotating the map.
///
/// Changes smaller than the dead zone are ignored; larger ones are followed a
/// fraction of the way along the shortest arc.
#[derive(Debug, Clone)]
pub struct CompassFilter {
    dead_zone_deg: f64,
    smoothing_factor: f64,
    last: Option<f64>,
}

impl Default for CompassFilter {
    fn default() -> Self {
        Self::new(5.0, 0.2)
    }
}

impl CompassFilter {
    /// `smoothing_factor` is clamped to `(0, 1]`; smaller is smoother.
    pub fn new(dead_zone_deg: f64, smoothing_factor: f64) -> Self {
        Self {
            dead_zone_deg: dead_zone_deg.max(0.0),
            smoothing_factor: smoothing_factor.clamp(f64::EPSILON, 1.0),
            last: None,
        }
    }

    /// Feed a raw heading in degrees; returns the filtered heading, or `None`
    /// until a finite reading has been seen.
    pub fn update(&mut self, raw_deg: f64) -> Option<f64> {
        if !raw_deg.is_finite() {
            return self.last;
        }
        let raw = normalize_bearing(raw_deg);

        let next = match self.last {
            None => raw,
            Some(last) => {
                let diff = signed_angle_delta(last, raw);
                if diff.abs() < self.dead_zone_deg {
                    last
                } else {
                    normalize_bearing(last + diff * self.smoothing_factor)
                }
            }
        };
        self.last = Some(next);
        self.last
    }

    pub fn heading(&self) -> Option<f64> {
        self.last
    }
}
