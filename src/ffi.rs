//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Stateless helpers take the course as a point list and rebuild the model per
//! call. A live run should use [`FfiTrackingSession`], which builds the model
//! once and keeps the session state on the Rust side.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::{
    init_logging, next_turn, parse_course_json, progress_with_config, smooth_bearing,
    verify_track, CompletionCriteria, CompletionVerdict, Coordinate, NavigationProgress,
    PositionSample, RouteModel, RoutePoint, RouteSplit, RunSummary, SessionUpdate,
    TrackerConfig, TrackingSession, Turn, VerificationResult,
};

fn build_model(points: &[RoutePoint]) -> Option<RouteModel> {
    match RouteModel::build(points) {
        Ok(model) => Some(model),
        Err(e) => {
            warn!("[CourseTrackerRust] course rejected: {}", e);
            None
        }
    }
}

/// Default tracking configuration.
#[uniffi::export]
pub fn default_tracker_config() -> TrackerConfig {
    init_logging();
    info!("[CourseTrackerRust] default_tracker_config called");
    TrackerConfig::default()
}

/// Default completion criteria.
#[uniffi::export]
pub fn default_completion_criteria() -> CompletionCriteria {
    CompletionCriteria::default()
}

/// Parse a course record JSON into validated route points.
/// Returns `None` when the record is malformed or has an invalid coordinate.
#[uniffi::export]
pub fn ffi_parse_course(json: String) -> Option<Vec<RoutePoint>> {
    init_logging();
    match parse_course_json(&json).and_then(|c| c.route_points()) {
        Ok(points) => {
            info!("[CourseTrackerRust] parsed course with {} points", points.len());
            Some(points)
        }
        Err(e) => {
            warn!("[CourseTrackerRust] course parse failed: {}", e);
            None
        }
    }
}

/// One-shot progress for a fix. Returns `None` when the course is invalid.
#[uniffi::export]
pub fn ffi_compute_progress(
    points: Vec<RoutePoint>,
    position: Coordinate,
    config: TrackerConfig,
    speed_mps: Option<f64>,
) -> Option<NavigationProgress> {
    init_logging();
    let model = build_model(&points)?;
    Some(progress_with_config(&model, &position, &config, speed_mps))
}

/// Smoothed heading over the latest fixes, oldest first.
#[uniffi::export]
pub fn ffi_smooth_bearing(samples: Vec<PositionSample>, config: TrackerConfig, previous: f64) -> f64 {
    smooth_bearing(
        &samples,
        config.bearing_window as usize,
        config.min_speed_for_bearing,
        previous,
    )
}

/// Recompute progress for a whole recorded run.
#[uniffi::export]
pub fn ffi_replay_track(
    points: Vec<RoutePoint>,
    samples: Vec<PositionSample>,
    config: TrackerConfig,
) -> Vec<NavigationProgress> {
    init_logging();
    info!("[CourseTrackerRust] replaying {} fixes over {} course points", samples.len(), points.len());
    let Some(model) = build_model(&points) else {
        return Vec::new();
    };

    let start = std::time::Instant::now();

    #[cfg(feature = "parallel")]
    let result = crate::replay_track_parallel(&model, &samples, &config);

    #[cfg(not(feature = "parallel"))]
    let result = crate::replay_track(&model, &samples, &config);

    info!("[CourseTrackerRust] replay done in {:?}", start.elapsed());
    result
}

/// Check a finished run against completion criteria.
#[uniffi::export]
pub fn ffi_evaluate_completion(summary: RunSummary, criteria: CompletionCriteria) -> CompletionVerdict {
    init_logging();
    criteria.evaluate(&summary)
}

/// Score a recorded track for plausibility. An invalid course is ignored and
/// the track is scored on its own.
#[uniffi::export]
pub fn ffi_verify_track(
    samples: Vec<PositionSample>,
    course: Option<Vec<RoutePoint>>,
) -> VerificationResult {
    init_logging();
    let model = course.as_deref().and_then(build_model);
    let result = verify_track(&samples, model.as_ref());
    info!(
        "[CourseTrackerRust] verified {} fixes: confidence={:.2} {:?}",
        samples.len(),
        result.confidence,
        result.recommendation
    );
    result
}

// =============================================================================
// Tracking Session Object
// =============================================================================

/// A live tracking session owned by the mobile app.
#[derive(uniffi::Object)]
pub struct FfiTrackingSession {
    inner: Mutex<TrackingSession>,
}

/// Start a session on a course. Returns `None` when the course or
/// configuration is invalid.
#[uniffi::export]
pub fn create_tracking_session(
    points: Vec<RoutePoint>,
    config: TrackerConfig,
) -> Option<Arc<FfiTrackingSession>> {
    init_logging();
    if let Err(e) = config.validate() {
        warn!("[CourseTrackerRust] config rejected: {}", e);
        return None;
    }
    let model = build_model(&points)?;
    info!(
        "[CourseTrackerRust] session created: {} points, {:.0}m",
        model.points().len(),
        model.total_distance()
    );
    Some(Arc::new(FfiTrackingSession {
        inner: Mutex::new(TrackingSession::new(Arc::new(model), config)),
    }))
}

impl FfiTrackingSession {
    fn session(&self) -> MutexGuard<'_, TrackingSession> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[uniffi::export]
impl FfiTrackingSession {
    /// Feed one fix.
    pub fn update(&self, sample: PositionSample) -> SessionUpdate {
        let update = self.session().update(&sample);
        if !update.events.is_empty() {
            debug!("[CourseTrackerRust] events: {:?}", update.events);
        }
        update
    }

    /// Next turn from the latest matched position.
    pub fn next_turn(&self) -> Option<Turn> {
        let session = self.session();
        let last = session.last_update()?;
        next_turn(session.model(), &last.progress, session.config().turn_lookahead_m)
    }

    /// Passed and upcoming parts of the course for drawing.
    pub fn split(&self) -> Option<RouteSplit> {
        let session = self.session();
        let last = session.last_update()?;
        Some(session.model().split_at(&last.progress))
    }

    pub fn summary(&self) -> RunSummary {
        self.session().summary()
    }
}
