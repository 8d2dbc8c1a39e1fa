//! # Course Tracker
//!
//! Real-time navigation and progress tracking along a fixed running course.
//!
//! This library provides:
//! - An immutable, precomputed course model ([`RouteModel`])
//! - Map-matching of noisy GPS fixes onto the course ([`progress`])
//! - Off-route detection with a single configurable threshold
//! - Bearing, smoothed heading and speed estimation from recent fixes
//! - Look-ahead turn guidance
//! - An explicit tracking session that emits start / off-route / completed events
//! - Post-run completion checks and track plausibility scoring
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel replay of recorded tracks with rayon
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use course_tracker::{progress, Coordinate, RouteModel, RoutePoint};
//!
//! let course = vec![
//!     RoutePoint::new(37.0000, 127.0000),
//!     RoutePoint::new(37.0010, 127.0000),
//! ];
//! let model = RouteModel::build(&course).expect("valid course");
//!
//! let here = Coordinate::new(37.0005, 127.0000);
//! let p = progress(&model, &here, 30.0, None);
//!
//! assert!((p.progress_ratio - 0.5).abs() < 0.01);
//! assert!(!p.is_off_route);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackerError};

// Configuration shared by every component
pub mod config;
pub use config::TrackerConfig;

// Geographic utilities (distance, bearing, planar frame, bounds)
pub mod geo_utils;

// Immutable precomputed course
pub mod route_model;
pub use route_model::{simplify_points, RouteModel, RouteSplit};

// Closest point on a single segment
pub mod projection;
pub use projection::{project, Projection};

// Off-route thresholding
pub mod off_route;
pub use off_route::is_off_route;

// Map-matching a fix onto the whole course
pub mod progress;
#[cfg(feature = "parallel")]
pub use progress::replay_track_parallel;
pub use progress::{
    progress, progress_from, progress_in_window, progress_with_config, replay_track,
    NavigationProgress, SegmentIndex,
};

// Bearing, heading smoothing and speed
pub mod heading;
pub use heading::{
    smooth_bearing, speed_between, CompassFilter, HeadingEstimator, HeadingState, PositionHistory,
};

// Turn look-ahead
pub mod guidance;
pub use guidance::{next_turn, relative_direction, Turn, TurnKind};

// Tracking session state machine
pub mod session;
pub use session::{RunSummary, SessionEvent, SessionState, SessionUpdate, TrackingSession};

// Post-run completion checks
pub mod completion;
pub use completion::{CompletionCriteria, CompletionFailure, CompletionVerdict};

// Post-run track plausibility scoring
pub mod verification;
pub use verification::{
    verify_track, Recommendation, VerificationIssue, VerificationMetrics, VerificationResult,
};

// External course records
pub mod course;
pub use course::{parse_course_json, CourseRecord, RawCoursePoint};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("CourseTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A bare latitude/longitude pair in WGS84 degrees.
///
/// # Example
/// ```
/// use course_tracker::Coordinate;
/// let seoul = Coordinate::new(37.5665, 126.9780);
/// assert!(seoul.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the coordinate is finite and within latitude/longitude range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }
}

/// One vertex of a course polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    /// Position of this point in the recorded course, if the source had one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Elevation in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl RoutePoint {
    /// Create a new route point without order or elevation.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, order: None, elevation: None }
    }

    /// Create a route point carrying its source order.
    pub fn with_order(lat: f64, lng: f64, order: u32) -> Self {
        Self { lat, lng, order: Some(order), elevation: None }
    }

    /// The point's coordinate.
    #[inline]
    pub fn coord(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    pub fn is_valid(&self) -> bool {
        self.coord().is_valid()
    }
}

impl From<Coordinate> for RoutePoint {
    fn from(c: Coordinate) -> Self {
        RoutePoint::new(c.lat, c.lng)
    }
}

/// A live fix from the platform location service.
///
/// `accuracy`, `speed` and `heading` are platform dependent and may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PositionSample {
    pub lat: f64,
    pub lng: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Horizontal accuracy in meters
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Ground speed in m/s as reported by the platform
    #[serde(default)]
    pub speed: Option<f64>,
    /// Course over ground in degrees as reported by the platform
    #[serde(default)]
    pub heading: Option<f64>,
}

impl PositionSample {
    /// Create a sample with only position and time.
    pub fn new(lat: f64, lng: f64, timestamp: i64) -> Self {
        Self { lat, lng, timestamp, accuracy: None, speed: None, heading: None }
    }

    /// The sample's coordinate.
    #[inline]
    pub fn coord(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    pub fn is_valid(&self) -> bool {
        self.coord().is_valid()
    }

    /// Platform speed if present and usable.
    pub fn reported_speed(&self) -> Option<f64> {
        self.speed.filter(|s| s.is_finite() && *s >= 0.0)
    }
}

/// Bounding box of a course, for fitting the map viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(37.5665, 126.9780).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_position_sample_optional_fields() {
        let json = r#"{"lat": 37.0, "lng": 127.0, "timestamp": 1000}"#;
        let sample: PositionSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.timestamp, 1000);
        assert!(sample.accuracy.is_none());
        assert!(sample.reported_speed().is_none());

        let mut fast = sample;
        fast.speed = Some(f64::NAN);
        assert!(fast.reported_speed().is_none());
        fast.speed = Some(3.2);
        assert_eq!(fast.reported_speed(), Some(3.2));
    }

    #[test]
    fn test_route_point_serde_skips_empty() {
        let p = RoutePoint::new(37.0, 127.0);
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("order"));
        assert!(!json.contains("elevation"));
    }

    #[test]
    fn test_bounds_center() {
        let b = Bounds { min_lat: 37.0, max_lat: 37.2, min_lng: 127.0, max_lng: 127.4 };
        let c = b.center();
        assert!((c.lat - 37.1).abs() < 1e-9);
        assert!((c.lng - 127.2).abs() < 1e-9);
    }
}
