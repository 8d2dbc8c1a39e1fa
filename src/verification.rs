//! # Track Plausibility
//!
//! Scores a recorded run for how believable it is as a run on foot, before
//! the reward workflow decides whether a human needs to look at it.
//! [`CompletionCriteria`](crate::CompletionCriteria) answers "did the session
//! reach the end of the course"; this module answers "does the raw track
//! look like a real run".
//!
//! ## Scoring
//!
//! Four scores in `[0, 1]`, each starting at 1 and multiplied down by every
//! check that fails:
//!
//! | Score | Checks |
//! |-------|--------|
//! | data quality | fix count, share of inaccurate fixes, signal gaps |
//! | speed profile | average speed, top speed, speed changes between pairs |
//! | route consistency | detour ratio, distance covered, start/end vs. the course |
//! | duration | first-to-last fix time |
//!
//! The overall confidence is their weighted sum. Each failed check also adds
//! one [`VerificationIssue`], and the issue count feeds the
//! [`Recommendation`].

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geo_utils::distance;
use crate::heading::{interval_secs, speed_between};
use crate::route_model::RouteModel;
use crate::PositionSample;

const MIN_FIXES: usize = 10;
const LOW_FIXES: usize = 30;
/// Fixes with a worse horizontal accuracy than this (meters) are inaccurate
const POOR_ACCURACY_M: f64 = 50.0;
/// A gap between fixes longer than this (seconds) is a signal loss
const SIGNAL_GAP_SECS: f64 = 60.0;

const WALKING_KMH: f64 = 3.0;
const VEHICLE_AVG_KMH: f64 = 50.0;
const VEHICLE_MAX_KMH: f64 = 80.0;
const ERRATIC_CHANGE_KMH: f64 = 20.0;

const MAX_DETOUR_RATIO: f64 = 10.0;
/// Floor on the straight-line distance, so loops don't read as detours
const MIN_STRAIGHT_M: f64 = 100.0;
const MIN_TRACK_M: f64 = 500.0;
const MAX_ENDPOINT_OFFSET_M: f64 = 200.0;

const WEIGHT_DATA_QUALITY: f64 = 0.3;
const WEIGHT_SPEED_PROFILE: f64 = 0.25;
const WEIGHT_ROUTE_CONSISTENCY: f64 = 0.3;
const WEIGHT_DURATION: f64 = 0.15;

const VALID_CONFIDENCE: f64 = 0.6;
const AUTO_APPROVE_CONFIDENCE: f64 = 0.8;

/// One failed plausibility check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationIssue {
    /// Fewer than 10 fixes
    VeryFewFixes { count: u32 },
    /// Fewer than 30 fixes
    FewFixes { count: u32 },
    /// More than half the fixes are inaccurate
    PoorAccuracy { share: f64 },
    /// More than 30 % of the fixes are inaccurate
    SomePoorAccuracy { share: f64 },
    SignalGaps { count: u32 },
    NoSpeedData,
    WalkingPace { avg_kmh: f64 },
    VehiclePace { avg_kmh: f64 },
    UnrealisticTopSpeed { max_kmh: f64 },
    ErraticSpeed { avg_change_kmh: f64 },
    NoRouteData,
    ExcessiveDetour { ratio: f64 },
    TooLittleDistance { meters: f64 },
    StartAwayFromCourse { meters: f64 },
    EndAwayFromCourse { meters: f64 },
    NoDuration,
    VeryShortDuration { minutes: f64 },
    ShortDuration { minutes: f64 },
    ExcessiveDuration { minutes: f64 },
}

impl fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VerificationIssue::*;
        match self {
            VeryFewFixes { count } => write!(f, "very few fixes ({}, need {})", count, MIN_FIXES),
            FewFixes { count } => write!(f, "few fixes ({})", count),
            PoorAccuracy { share } => write!(f, "poor accuracy on {:.0}% of fixes", share * 100.0),
            SomePoorAccuracy { share } => {
                write!(f, "some inaccurate fixes ({:.0}%)", share * 100.0)
            }
            SignalGaps { count } => write!(f, "{} signal gaps over {:.0}s", count, SIGNAL_GAP_SECS),
            NoSpeedData => write!(f, "no speed could be computed"),
            WalkingPace { avg_kmh } => write!(f, "average speed too low ({:.1} km/h)", avg_kmh),
            VehiclePace { avg_kmh } => write!(f, "average speed too high ({:.1} km/h)", avg_kmh),
            UnrealisticTopSpeed { max_kmh } => {
                write!(f, "unrealistic top speed ({:.1} km/h)", max_kmh)
            }
            ErraticSpeed { avg_change_kmh } => {
                write!(f, "erratic speed changes ({:.1} km/h)", avg_change_kmh)
            }
            NoRouteData => write!(f, "not enough fixes to follow the route"),
            ExcessiveDetour { ratio } => write!(f, "inefficient path ({:.1}x detour)", ratio),
            TooLittleDistance { meters } => write!(f, "distance too short ({:.0}m)", meters),
            StartAwayFromCourse { meters } => {
                write!(f, "started {:.0}m from the course start", meters)
            }
            EndAwayFromCourse { meters } => write!(f, "ended {:.0}m from the course end", meters),
            NoDuration => write!(f, "no run duration"),
            VeryShortDuration { minutes } => write!(f, "run far too short ({:.1} min)", minutes),
            ShortDuration { minutes } => write!(f, "run short ({:.1} min)", minutes),
            ExcessiveDuration { minutes } => {
                write!(f, "run unrealistically long ({:.0} min)", minutes)
            }
        }
    }
}

/// What the reward workflow should do with the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    AutoApprove,
    ManualReview,
    /// Ask the runner for a screenshot from their tracking app
    ScreenshotRequired,
}

/// Per-score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct VerificationMetrics {
    pub data_quality: f64,
    pub route_consistency: f64,
    pub speed_profile: f64,
    pub duration: f64,
    /// Distance covered by the track
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct VerificationResult {
    /// `confidence >= 0.6`
    pub is_valid: bool,
    /// Weighted overall score in `[0, 1]`
    pub confidence: f64,
    pub issues: Vec<VerificationIssue>,
    pub metrics: VerificationMetrics,
    pub recommendation: Recommendation,
}

/// Running score for one category.
struct Score {
    value: f64,
    issues: Vec<VerificationIssue>,
}

impl Score {
    fn new() -> Self {
        Self { value: 1.0, issues: Vec::new() }
    }

    fn zero(issue: VerificationIssue) -> Self {
        Self { value: 0.0, issues: vec![issue] }
    }

    fn penalize(&mut self, factor: f64, issue: VerificationIssue) {
        self.value *= factor;
        self.issues.push(issue);
    }
}

fn data_quality(samples: &[PositionSample]) -> Score {
    let mut score = Score::new();
    let count = samples.len();

    if count < MIN_FIXES {
        score.penalize(0.3, VerificationIssue::VeryFewFixes { count: count as u32 });
    } else if count < LOW_FIXES {
        score.penalize(0.7, VerificationIssue::FewFixes { count: count as u32 });
    }

    if count > 0 {
        let inaccurate = samples
            .iter()
            .filter(|s| s.accuracy.is_some_and(|a| a > POOR_ACCURACY_M))
            .count();
        let share = inaccurate as f64 / count as f64;
        if share > 0.5 {
            score.penalize(0.6, VerificationIssue::PoorAccuracy { share });
        } else if share > 0.3 {
            score.penalize(0.8, VerificationIssue::SomePoorAccuracy { share });
        }
    }

    let gaps = samples
        .windows(2)
        .filter(|w| interval_secs(w[0].timestamp, w[1].timestamp) > SIGNAL_GAP_SECS)
        .count();
    if gaps as f64 > count as f64 * 0.2 {
        score.penalize(0.7, VerificationIssue::SignalGaps { count: gaps as u32 });
    }

    score
}

fn speed_profile(samples: &[PositionSample]) -> Score {
    if samples.len() < 2 {
        return Score::zero(VerificationIssue::NoSpeedData);
    }

    let speeds_kmh: Vec<f64> = samples
        .windows(2)
        .filter(|w| interval_secs(w[0].timestamp, w[1].timestamp) > 0.0)
        .map(|w| speed_between(&w[0], &w[1]) * 3.6)
        .collect();
    if speeds_kmh.is_empty() {
        return Score::zero(VerificationIssue::NoSpeedData);
    }

    let mut score = Score::new();
    let avg_kmh = speeds_kmh.iter().sum::<f64>() / speeds_kmh.len() as f64;
    let max_kmh = speeds_kmh.iter().copied().fold(0.0, f64::max);

    if avg_kmh < WALKING_KMH {
        score.penalize(0.6, VerificationIssue::WalkingPace { avg_kmh });
    } else if avg_kmh > VEHICLE_AVG_KMH {
        score.penalize(0.3, VerificationIssue::VehiclePace { avg_kmh });
    }
    if max_kmh > VEHICLE_MAX_KMH {
        score.penalize(0.4, VerificationIssue::UnrealisticTopSpeed { max_kmh });
    }

    if speeds_kmh.len() >= 2 {
        let changes = speeds_kmh.windows(2).map(|w| (w[1] - w[0]).abs());
        let avg_change_kmh = changes.sum::<f64>() / (speeds_kmh.len() - 1) as f64;
        if avg_change_kmh > ERRATIC_CHANGE_KMH {
            score.penalize(0.7, VerificationIssue::ErraticSpeed { avg_change_kmh });
        }
    }

    score
}

fn route_consistency(
    samples: &[PositionSample],
    track_m: f64,
    course: Option<&RouteModel>,
) -> Score {
    let (first, last) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) if samples.len() >= 2 => (first.coord(), last.coord()),
        _ => return Score::zero(VerificationIssue::NoRouteData),
    };

    let mut score = Score::new();
    let ratio = track_m / distance(&first, &last).max(MIN_STRAIGHT_M);
    if ratio > MAX_DETOUR_RATIO {
        score.penalize(0.7, VerificationIssue::ExcessiveDetour { ratio });
    }
    if track_m < MIN_TRACK_M {
        score.penalize(0.5, VerificationIssue::TooLittleDistance { meters: track_m });
    }

    if let Some(model) = course {
        let points = model.points();
        if let (Some(start), Some(end)) = (points.first(), points.last()) {
            let meters = distance(&first, &start.coord());
            if meters > MAX_ENDPOINT_OFFSET_M {
                score.penalize(0.8, VerificationIssue::StartAwayFromCourse { meters });
            }
            let meters = distance(&last, &end.coord());
            if meters > MAX_ENDPOINT_OFFSET_M {
                score.penalize(0.8, VerificationIssue::EndAwayFromCourse { meters });
            }
        }
    }

    score
}

fn duration(samples: &[PositionSample]) -> Score {
    let secs = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => interval_secs(first.timestamp, last.timestamp),
        _ => 0.0,
    };
    if secs <= 0.0 {
        return Score::zero(VerificationIssue::NoDuration);
    }

    let mut score = Score::new();
    let minutes = secs / 60.0;
    if minutes < 2.0 {
        score.penalize(0.4, VerificationIssue::VeryShortDuration { minutes });
    } else if minutes < 5.0 {
        score.penalize(0.7, VerificationIssue::ShortDuration { minutes });
    }
    if minutes > 480.0 {
        score.penalize(0.5, VerificationIssue::ExcessiveDuration { minutes });
    }

    score
}

fn recommend(confidence: f64, issue_count: usize) -> Recommendation {
    if confidence >= AUTO_APPROVE_CONFIDENCE && issue_count <= 1 {
        Recommendation::AutoApprove
    } else if confidence >= VALID_CONFIDENCE && issue_count <= 3 {
        Recommendation::ManualReview
    } else {
        Recommendation::ScreenshotRequired
    }
}

/// Score a recorded track, optionally against the course it claims to follow.
///
/// Fixes with invalid coordinates are dropped before scoring. Samples should
/// be in recording order.
///
/// # Example
///
/// ```rust
/// use course_tracker::{verify_track, PositionSample, Recommendation};
///
/// // 20 minutes north at 3 m/s, one fix every 10 s
/// let samples: Vec<PositionSample> = (0..=120)
///     .map(|i| PositionSample::new(37.0 + i as f64 * 0.00027, 127.0, i * 10_000))
///     .collect();
/// let result = verify_track(&samples, None);
///
/// assert!(result.is_valid);
/// assert_eq!(result.recommendation, Recommendation::AutoApprove);
/// assert!((result.metrics.distance_km - 3.6).abs() < 0.1);
/// ```
pub fn verify_track(samples: &[PositionSample], course: Option<&RouteModel>) -> VerificationResult {
    let fixes: Vec<PositionSample> =
        samples.iter().copied().filter(PositionSample::is_valid).collect();
    if fixes.len() < samples.len() {
        debug!("verification: dropped {} invalid fixes", samples.len() - fixes.len());
    }

    let track_m: f64 = fixes.windows(2).map(|w| distance(&w[0].coord(), &w[1].coord())).sum();

    let data_quality = data_quality(&fixes);
    let speed_profile = speed_profile(&fixes);
    let route_consistency = route_consistency(&fixes, track_m, course);
    let duration = duration(&fixes);

    let confidence = data_quality.value * WEIGHT_DATA_QUALITY
        + speed_profile.value * WEIGHT_SPEED_PROFILE
        + route_consistency.value * WEIGHT_ROUTE_CONSISTENCY
        + duration.value * WEIGHT_DURATION;

    let metrics = VerificationMetrics {
        data_quality: data_quality.value,
        route_consistency: route_consistency.value,
        speed_profile: speed_profile.value,
        duration: duration.value,
        distance_km: track_m / 1000.0,
    };

    let issues: Vec<VerificationIssue> = [data_quality, speed_profile, route_consistency, duration]
        .into_iter()
        .flat_map(|s| s.issues)
        .collect();
    let recommendation = recommend(confidence, issues.len());

    info!(
        "verification: {} fixes, {:.2}km, confidence={:.2}, {} issues, {:?}",
        fixes.len(),
        metrics.distance_km,
        confidence,
        issues.len(),
        recommendation
    );

    VerificationResult {
        is_valid: confidence >= VALID_CONFIDENCE,
        confidence,
        issues,
        metrics,
        recommendation,
    }
}
