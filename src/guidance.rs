//! Look-ahead turn guidance.
//!
//! Advisory only: the guidance layer turns a [`Turn`] into text or speech. The
//! classification is deliberately coarse.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo_utils::{self, normalize_bearing, signed_angle_delta};
use crate::progress::NavigationProgress;
use crate::route_model::RouteModel;
use crate::Coordinate;

/// Below this absolute bearing change (degrees) the course goes straight on.
const STRAIGHT_MAX_DEG: f64 = 20.0;
/// Below this it is a normal left/right turn.
const TURN_MAX_DEG: f64 = 75.0;
/// Up to this it is a sharp turn; beyond, a u-turn.
const SHARP_MAX_DEG: f64 = 150.0;

/// Kind of direction change ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Straight,
    Left,
    Right,
    SharpLeft,
    SharpRight,
    UTurn,
}

impl TurnKind {
    /// Classify a signed bearing change in degrees (positive = clockwise).
    pub fn from_angle(angle_deg: f64) -> Self {
        let abs = angle_deg.abs();
        let right = angle_deg > 0.0;
        if abs < STRAIGHT_MAX_DEG {
            TurnKind::Straight
        } else if abs < TURN_MAX_DEG {
            if right { TurnKind::Right } else { TurnKind::Left }
        } else if abs <= SHARP_MAX_DEG {
            if right { TurnKind::SharpRight } else { TurnKind::SharpLeft }
        } else {
            TurnKind::UTurn
        }
    }
}

impl fmt::Display for TurnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnKind::Straight => "straight",
            TurnKind::Left => "left",
            TurnKind::Right => "right",
            TurnKind::SharpLeft => "sharp_left",
            TurnKind::SharpRight => "sharp_right",
            TurnKind::UTurn => "u_turn",
        };
        f.write_str(s)
    }
}

/// The next direction change along the course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Turn {
    pub kind: TurnKind,
    /// Signed bearing change in degrees, `(-180, 180]`, positive = right
    pub angle_deg: f64,
    /// Distance from the runner's matched position to the turn (meters)
    pub distance_m: f64,
    /// Course vertex where the turn happens
    pub vertex_index: u32,
}

/// Find the next turn within `lookahead_m` of the runner's matched position.
///
/// Scans forward from the matched segment and reports the first vertex where
/// the course bearing differs from the current segment's by at least 20°.
/// With no such vertex inside the look-ahead, reports `Straight` for the
/// scanned distance. Returns `None` on the last segment or for an unmatched
/// (sentinel) progress.
pub fn next_turn(
    model: &RouteModel,
    progress: &NavigationProgress,
    lookahead_m: f64,
) -> Option<Turn> {
    if !progress.is_matched() {
        return None;
    }
    let current = progress.segment_index as usize;
    let segments = model.segment_count();
    if current + 1 >= segments {
        return None;
    }

    let current_bearing = model.segment_bearing(current)?;
    let cumulative = model.cumulative_distances();

    let mut last_vertex = current + 1;
    for j in current + 1..segments {
        let to_vertex = cumulative[j] - progress.cumulative_dist;
        if to_vertex > lookahead_m {
            break;
        }
        last_vertex = j;

        let angle = signed_angle_delta(current_bearing, model.segment_bearing(j)?);
        if angle.abs() >= STRAIGHT_MAX_DEG {
            return Some(Turn {
                kind: TurnKind::from_angle(angle),
                angle_deg: angle,
                distance_m: to_vertex.max(0.0),
                vertex_index: j as u32,
            });
        }
    }

    Some(Turn {
        kind: TurnKind::Straight,
        angle_deg: 0.0,
        distance_m: lookahead_m.min(progress.remaining_distance),
        vertex_index: last_vertex as u32,
    })
}

/// Which way to go to reach `waypoint` given the runner's current heading.
///
/// Used by the heading-up view, where the map rotates with the runner: within
/// ±30° is straight on, 150°–210° behind is a u-turn, otherwise left or right.
pub fn relative_direction(position: &Coordinate, heading_deg: f64, waypoint: &Coordinate) -> TurnKind {
    let target = geo_utils::bearing(position, waypoint);
    let relative = normalize_bearing(target - heading_deg);

    if !(30.0..=330.0).contains(&relative) {
        TurnKind::Straight
    } else if relative < 150.0 {
        TurnKind::Right
    } else if relative < 210.0 {
        TurnKind::UTurn
    } else {
        TurnKind::Left
    }
}
