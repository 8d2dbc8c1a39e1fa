//! # Tracking Session
//!
//! Wraps the pure engine in the per-run state a UI needs: the position ring
//! buffer, the heading estimator, the high-water mark of progress, and the
//! run's lifecycle.
//!
//! ```text
//! NotStarted ──first valid fix──▶ Tracking ◀──▶ OffRoute
//!                                    │
//!                      ratio ≥ completion_ratio, on-route
//!                                    ▼
//!                                Completed (terminal)
//! ```
//!
//! A session owns everything it mutates. The [`RouteModel`] is shared through
//! an `Arc`, so many sessions (or a replay running next to a live run) can use
//! one model without copying it.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use course_tracker::{PositionSample, RouteModel, SessionEvent, TrackerConfig, TrackingSession};
//!
//! let model = Arc::new(RouteModel::from_coords(&[(37.0, 127.0), (37.001, 127.0)]).unwrap());
//! let mut session = TrackingSession::new(model, TrackerConfig::default());
//!
//! let update = session.update(&PositionSample::new(37.0002, 127.0, 0));
//! assert_eq!(update.events, vec![SessionEvent::Started]);
//!
//! let update = session.update(&PositionSample::new(37.001, 127.0, 60_000));
//! assert!(update.events.contains(&SessionEvent::Completed));
//! ```

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::heading::{average_speed, HeadingEstimator, HeadingState, PositionHistory};
use crate::progress::{progress_from, progress_in_window, progress_with_config, NavigationProgress};
use crate::route_model::RouteModel;
use crate::{PositionSample, TrackerConfig};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Tracking,
    OffRoute,
    Completed,
}

/// Something that happened on this fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// First valid fix of the run
    Started,
    LeftRoute,
    RejoinedRoute,
    /// The course was completed. Emitted exactly once per session.
    Completed,
}

/// Everything the UI needs after one fix.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SessionUpdate {
    pub progress: NavigationProgress,
    pub heading: HeadingState,
    pub state: SessionState,
    pub events: Vec<SessionEvent>,
}

/// Totals for a run, consumed by completion verification.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RunSummary {
    /// Seconds between the first and the latest valid fix
    pub elapsed_secs: f64,
    /// Seconds spent off-route
    pub off_route_secs: f64,
    /// Highest progress ratio reached
    pub max_progress_ratio: f64,
    /// Valid fixes processed
    pub sample_count: u32,
    pub completed: bool,
}

/// State for one runner on one course.
pub struct TrackingSession {
    model: Arc<RouteModel>,
    config: TrackerConfig,
    state: SessionState,
    history: PositionHistory,
    heading: HeadingEstimator,
    last: Option<SessionUpdate>,
    high_water_m: f64,
    started_at: Option<i64>,
    last_timestamp: Option<i64>,
    off_route_ms: i64,
    max_progress_ratio: f64,
    sample_count: u32,
}

impl TrackingSession {
    /// `config` is assumed valid; see [`TrackerConfig::validate`].
    pub fn new(model: Arc<RouteModel>, config: TrackerConfig) -> Self {
        let capacity = (config.history_capacity as usize).max(config.bearing_window as usize + 1);
        Self {
            history: PositionHistory::new(capacity),
            heading: HeadingEstimator::from_config(&config),
            model,
            config,
            state: SessionState::NotStarted,
            last: None,
            high_water_m: 0.0,
            started_at: None,
            last_timestamp: None,
            off_route_ms: 0,
            max_progress_ratio: 0.0,
            sample_count: 0,
        }
    }

    pub fn model(&self) -> &Arc<RouteModel> {
        &self.model
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The latest update, if any valid fix has been processed.
    pub fn last_update(&self) -> Option<&SessionUpdate> {
        self.last.as_ref()
    }

    /// Feed one fix.
    ///
    /// Invalid fixes are logged and ignored: the previous update is returned
    /// again, without events. Once completed, the session ignores further
    /// fixes the same way.
    pub fn update(&mut self, sample: &PositionSample) -> SessionUpdate {
        if self.state == SessionState::Completed {
            return self.repeat_last();
        }
        if !sample.is_valid() {
            warn!("session: ignoring invalid fix {:?}", sample);
            return self.repeat_last();
        }

        self.history.push(*sample);
        let heading = self.heading.update(self.history.as_slice());
        let speed = self.speed_for_eta(sample);
        let matched = self.match_fix(sample, speed);
        let progress = self.hold_high_water(matched);

        // The interval leading up to an off-route fix counts as off-route
        if progress.is_off_route {
            if let Some(prev) = self.last_timestamp {
                let gap = sample.timestamp.checked_sub(prev).filter(|ms| *ms > 0).unwrap_or(0);
                self.off_route_ms = self.off_route_ms.saturating_add(gap);
            }
        }
        if self.started_at.is_none() {
            self.started_at = Some(sample.timestamp);
        }
        self.last_timestamp = Some(sample.timestamp);
        self.sample_count += 1;
        self.max_progress_ratio = self.max_progress_ratio.max(progress.progress_ratio);

        let mut events = Vec::new();
        let next_state = if progress.is_off_route {
            SessionState::OffRoute
        } else {
            SessionState::Tracking
        };
        match (self.state, next_state) {
            (SessionState::NotStarted, _) => {
                info!("session: started, {:.0}m course", self.model.total_distance());
                events.push(SessionEvent::Started);
            }
            (SessionState::Tracking, SessionState::OffRoute) => {
                info!(
                    "session: left route at {:.0}m ({:.1}m from course)",
                    progress.cumulative_dist, progress.distance_to_segment
                );
                events.push(SessionEvent::LeftRoute);
            }
            (SessionState::OffRoute, SessionState::Tracking) => {
                info!("session: rejoined route at {:.0}m", progress.cumulative_dist);
                events.push(SessionEvent::RejoinedRoute);
            }
            _ => {}
        }
        self.state = next_state;

        if !progress.is_off_route && progress.progress_ratio >= self.config.completion_ratio {
            info!(
                "session: completed, ratio={:.3} after {} fixes",
                progress.progress_ratio, self.sample_count
            );
            self.state = SessionState::Completed;
            events.push(SessionEvent::Completed);
        }

        let update = SessionUpdate { progress, heading, state: self.state, events };
        self.last = Some(SessionUpdate { events: Vec::new(), ..update.clone() });
        update
    }

    /// Totals for the run so far.
    pub fn summary(&self) -> RunSummary {
        let elapsed_ms = match (self.started_at, self.last_timestamp) {
            (Some(start), Some(end)) => end.checked_sub(start).filter(|ms| *ms > 0).unwrap_or(0),
            _ => 0,
        };
        RunSummary {
            elapsed_secs: elapsed_ms as f64 / 1000.0,
            off_route_secs: self.off_route_ms as f64 / 1000.0,
            max_progress_ratio: self.max_progress_ratio,
            sample_count: self.sample_count,
            completed: self.state == SessionState::Completed,
        }
    }

    fn repeat_last(&self) -> SessionUpdate {
        match &self.last {
            Some(last) => last.clone(),
            None => SessionUpdate {
                progress: NavigationProgress::sentinel(&self.model),
                heading: self.heading.state(),
                state: self.state,
                events: Vec::new(),
            },
        }
    }

    /// Platform speed when reported, otherwise the mean over the history.
    fn speed_for_eta(&mut self, sample: &PositionSample) -> Option<f64> {
        let speed = match sample.reported_speed() {
            Some(s) => s,
            None => average_speed(self.history.as_slice(), self.config.bearing_window as usize),
        };
        (speed > 0.0).then_some(speed)
    }

    /// Continue from the previous match when there is one, so overlapping
    /// legs resolve to the leg the runner is on.
    fn match_fix(&self, sample: &PositionSample, speed: Option<f64>) -> NavigationProgress {
        let window = self.config.search_window as usize;
        let position = sample.coord();
        match &self.last {
            Some(last) if last.progress.is_matched() && window > 0 => {
                let previous = &last.progress;
                progress_in_window(&self.model, &position, &self.config, previous, window, speed)
            }
            Some(last) if last.progress.is_matched() => {
                progress_from(&self.model, &position, &self.config, &last.progress, speed)
            }
            _ => progress_with_config(&self.model, &position, &self.config, speed),
        }
    }

    /// Hold small backward jumps at the high-water mark; let larger ones
    /// through as a genuine revisit.
    fn hold_high_water(&mut self, raw: NavigationProgress) -> NavigationProgress {
        if !raw.is_matched() {
            return raw;
        }
        let tolerance = self.config.regression_tolerance_m;
        let regression = self.high_water_m - raw.cumulative_dist;

        let held = if tolerance > 0.0 && regression > 0.0 && regression <= tolerance {
            debug!("session: holding {:.1}m regression at {:.1}m", regression, self.high_water_m);
            raw.with_cumulative(&self.model, self.high_water_m)
        } else {
            raw
        };
        self.high_water_m = held.cumulative_dist;
        held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::{destination, signed_angle_delta};
    use crate::Coordinate;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    const START: Coordinate = Coordinate { lat: 37.0, lng: 127.0 };

    /// Straight course ~1112 m due north.
    fn session(config: TrackerConfig) -> TrackingSession {
        let model = RouteModel::from_coords(&[(37.0, 127.0), (37.01, 127.0)]).unwrap();
        TrackingSession::new(Arc::new(model), config)
    }

    /// Fix `along_m` north of the start and `east_m` east of the course.
    fn fix(along_m: f64, east_m: f64, secs: i64) -> PositionSample {
        let on = destination(&START, 0.0, along_m);
        let p = if east_m > 0.0 { destination(&on, 90.0, east_m) } else { on };
        PositionSample::new(p.lat, p.lng, secs * 1000)
    }

    #[test]
    fn test_first_fix_starts() {
        let mut s = session(TrackerConfig::default());
        assert_eq!(s.state(), SessionState::NotStarted);

        let u = s.update(&fix(10.0, 0.0, 0));
        assert_eq!(u.events, vec![SessionEvent::Started]);
        assert_eq!(u.state, SessionState::Tracking);
        assert!(approx_eq(u.progress.cumulative_dist, 10.0, 0.5));
    }

    #[test]
    fn test_first_fix_off_route() {
        let mut s = session(TrackerConfig::default());
        let u = s.update(&fix(10.0, 50.0, 0));
        assert_eq!(u.events, vec![SessionEvent::Started]);
        assert_eq!(u.state, SessionState::OffRoute);
    }

    #[test]
    fn test_leave_and_rejoin() {
        let mut s = session(TrackerConfig::default());
        s.update(&fix(100.0, 0.0, 0));

        let u = s.update(&fix(110.0, 40.0, 5));
        assert_eq!(u.events, vec![SessionEvent::LeftRoute]);
        assert_eq!(u.state, SessionState::OffRoute);

        let u = s.update(&fix(120.0, 45.0, 10));
        assert!(u.events.is_empty());

        let u = s.update(&fix(130.0, 0.0, 15));
        assert_eq!(u.events, vec![SessionEvent::RejoinedRoute]);
        assert_eq!(u.state, SessionState::Tracking);

        let summary = s.summary();
        assert!(approx_eq(summary.off_route_secs, 10.0, 1e-9));
        assert!(approx_eq(summary.elapsed_secs, 15.0, 1e-9));
        assert_eq!(summary.sample_count, 4);
    }

    #[test]
    fn test_invalid_fix_keeps_previous_progress() {
        let mut s = session(TrackerConfig::default());
        let good = s.update(&fix(200.0, 0.0, 0));

        let u = s.update(&PositionSample::new(f64::NAN, 127.0, 1000));
        assert_eq!(u.progress, good.progress);
        assert!(u.events.is_empty());
        assert_eq!(u.state, SessionState::Tracking);
        assert_eq!(s.summary().sample_count, 1);
    }

    #[test]
    fn test_invalid_fix_before_start() {
        let mut s = session(TrackerConfig::default());
        let u = s.update(&PositionSample::new(95.0, 127.0, 0));
        assert_eq!(u.state, SessionState::NotStarted);
        assert!(!u.progress.is_matched());
        assert!(u.events.is_empty());
    }

    #[test]
    fn test_completed_once_and_terminal() {
        let mut s = session(TrackerConfig::default());
        s.update(&fix(0.0, 0.0, 0));
        s.update(&fix(600.0, 0.0, 300));

        let u = s.update(&fix(1100.0, 0.0, 550));
        assert!(u.events.contains(&SessionEvent::Completed));
        assert_eq!(u.state, SessionState::Completed);

        let again = s.update(&fix(1111.0, 0.0, 560));
        assert!(again.events.is_empty());
        assert_eq!(again.state, SessionState::Completed);
        assert_eq!(again.progress, u.progress);

        let summary = s.summary();
        assert!(summary.completed);
        assert_eq!(summary.sample_count, 3);
        assert!(summary.max_progress_ratio >= 0.98);
    }

    #[test]
    fn test_no_completion_while_off_route() {
        let mut s = session(TrackerConfig::default());
        s.update(&fix(0.0, 0.0, 0));
        let u = s.update(&fix(1105.0, 40.0, 500));
        assert_eq!(u.state, SessionState::OffRoute);
        assert!(!u.events.contains(&SessionEvent::Completed));
    }

    #[test]
    fn test_high_water_holds_small_regression() {
        let mut s = session(TrackerConfig::default());
        s.update(&fix(500.0, 0.0, 0));

        let u = s.update(&fix(490.0, 0.0, 1));
        assert!(approx_eq(u.progress.cumulative_dist, 500.0, 0.5));
        assert!(approx_eq(
            u.progress.remaining_distance,
            u.progress.total_distance - u.progress.cumulative_dist,
            1e-9
        ));

        // A large jump back is a genuine revisit
        let u = s.update(&fix(100.0, 0.0, 2));
        assert!(approx_eq(u.progress.cumulative_dist, 100.0, 0.5));
    }

    #[test]
    fn test_high_water_disabled() {
        let config = TrackerConfig { regression_tolerance_m: 0.0, ..TrackerConfig::default() };
        let mut s = session(config);
        s.update(&fix(500.0, 0.0, 0));
        let u = s.update(&fix(490.0, 0.0, 1));
        assert!(approx_eq(u.progress.cumulative_dist, 490.0, 0.5));
    }

    #[test]
    fn test_eta_prefers_platform_speed() {
        let mut s = session(TrackerConfig::default());
        let mut sample = fix(100.0, 0.0, 0);
        sample.speed = Some(2.0);
        let u = s.update(&sample);
        let eta = u.progress.estimated_time_to_finish.unwrap();
        assert!(approx_eq(eta, u.progress.remaining_distance / 2.0, 1e-6));
    }

    #[test]
    fn test_eta_from_history() {
        let mut s = session(TrackerConfig::default());
        let u = s.update(&fix(100.0, 0.0, 0));
        assert!(u.progress.estimated_time_to_finish.is_none());

        // 3 m/s
        s.update(&fix(103.0, 0.0, 1));
        let u = s.update(&fix(106.0, 0.0, 2));
        let eta = u.progress.estimated_time_to_finish.unwrap();
        assert!(approx_eq(eta, u.progress.remaining_distance / 3.0, 5.0));
        assert!(signed_angle_delta(0.0, u.heading.smooth_bearing).abs() < 0.5);
    }

    #[test]
    fn test_search_window_session() {
        let model = RouteModel::from_coords(&[
            (37.0, 127.0),
            (37.001, 127.0),
            (37.002, 127.0),
            (37.003, 127.0),
        ])
        .unwrap();
        let config = TrackerConfig { search_window: 1, ..TrackerConfig::default() };
        let mut s = TrackingSession::new(Arc::new(model), config);

        s.update(&fix(50.0, 0.0, 0));
        let u = s.update(&fix(150.0, 0.0, 30));
        assert_eq!(u.progress.segment_index, 1);
        let u = s.update(&fix(300.0, 0.0, 60));
        assert_eq!(u.progress.segment_index, 2);
    }

    #[test]
    fn test_off_route_time_counts_interval_before_off_route_fix() {
        let mut s = session(TrackerConfig::default());
        s.update(&fix(100.0, 0.0, 0));
        // Off at 20 s: the 20 s leading up to it count
        s.update(&fix(110.0, 40.0, 20));
        assert!(approx_eq(s.summary().off_route_secs, 20.0, 1e-9));
        // Back on at 25 s: that interval does not
        s.update(&fix(120.0, 0.0, 25));
        assert!(approx_eq(s.summary().off_route_secs, 20.0, 1e-9));
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let mut s = session(TrackerConfig::default());
        let mut first = fix(100.0, 40.0, 0);
        first.timestamp = 1_700_000_000_000;
        s.update(&first);

        let mut second = fix(110.0, 40.0, 0);
        second.timestamp = i64::MIN;
        let u = s.update(&second);
        assert_eq!(u.state, SessionState::OffRoute);

        let mut third = fix(120.0, 40.0, 0);
        third.timestamp = i64::MAX;
        s.update(&third);

        let summary = s.summary();
        assert_eq!(summary.sample_count, 3);
        assert!(summary.off_route_secs >= 0.0 && summary.off_route_secs.is_finite());
        assert!(summary.elapsed_secs >= 0.0 && summary.elapsed_secs.is_finite());
    }

    #[test]
    fn test_out_and_back_completes() {
        // ~500 m north and back along the same street
        let model = Arc::new(
            RouteModel::from_coords(&[(37.0, 127.0), (37.0045, 127.0), (37.0, 127.0)]).unwrap(),
        );
        for search_window in [0, 2] {
            let config = TrackerConfig { search_window, ..TrackerConfig::default() };
            let mut s = TrackingSession::new(Arc::clone(&model), config);

            let total = model.total_distance();
            let mut events = Vec::new();
            let mut last_cum = 0.0;
            let mut step = 0;
            loop {
                let along = (step as f64 * 10.0).min(total);
                let at = model.point_at_distance(along);
                let u = s.update(&PositionSample::new(at.lat, at.lng, step * 4000));
                if u.state != SessionState::Completed {
                    let cum = u.progress.cumulative_dist;
                    assert!(cum >= last_cum - 1e-6, "window={} at {}m", search_window, along);
                    last_cum = cum;
                }
                events.extend(u.events);
                if along >= total {
                    break;
                }
                step += 1;
            }

            assert_eq!(
                events,
                vec![SessionEvent::Started, SessionEvent::Completed],
                "window={}",
                search_window
            );
            assert!(s.summary().completed);
        }
    }
}
