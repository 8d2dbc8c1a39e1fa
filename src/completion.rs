//! Post-run completion verification.
//!
//! A session's `Completed` event says the runner reached the end of the
//! course. Before the external reward workflow accepts the run, the whole run
//! is checked against [`CompletionCriteria`]: enough of the course covered, a
//! plausible duration, and not too long spent away from the course.

use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::session::RunSummary;

/// Thresholds a finished run must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct CompletionCriteria {
    /// Minimum progress ratio reached at any point. Default: 0.9
    pub min_progress_ratio: f64,
    /// Maximum total time off-route. Default: 300 s
    pub max_off_route_secs: f64,
    /// Minimum run duration. Default: 600 s
    pub min_total_secs: f64,
    /// Maximum run duration. Default: 7200 s
    pub max_total_secs: f64,
}

impl Default for CompletionCriteria {
    fn default() -> Self {
        Self {
            min_progress_ratio: 0.9,
            max_off_route_secs: 300.0,
            min_total_secs: 600.0,
            max_total_secs: 7200.0,
        }
    }
}

/// Why a run was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionFailure {
    NoFixes,
    InsufficientProgress { ratio: f64 },
    TooShort { secs: f64 },
    TooLong { secs: f64 },
    TooMuchOffRoute { secs: f64 },
}

impl fmt::Display for CompletionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionFailure::NoFixes => write!(f, "no fixes recorded"),
            CompletionFailure::InsufficientProgress { ratio } => {
                write!(f, "insufficient progress ({:.1}%)", ratio * 100.0)
            }
            CompletionFailure::TooShort { secs } => write!(f, "run too short ({:.0}s)", secs),
            CompletionFailure::TooLong { secs } => write!(f, "run too long ({:.0}s)", secs),
            CompletionFailure::TooMuchOffRoute { secs } => {
                write!(f, "too long off-route ({:.0}s)", secs)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CompletionVerdict {
    pub completed: bool,
    /// First failed check, `None` when completed
    pub reason: Option<CompletionFailure>,
    /// Share of the run spent on the course, in percent
    pub on_route_percent: f64,
}

impl CompletionCriteria {
    /// Check a run. Checks are applied in order (progress, too short, too
    /// long, off-route time) and the first failure is reported.
    pub fn evaluate(&self, summary: &RunSummary) -> CompletionVerdict {
        let on_route_percent = if summary.elapsed_secs > 0.0 {
            ((summary.elapsed_secs - summary.off_route_secs) / summary.elapsed_secs * 100.0)
                .clamp(0.0, 100.0)
        } else {
            0.0
        };

        let reason = if summary.sample_count == 0 {
            Some(CompletionFailure::NoFixes)
        } else if summary.max_progress_ratio < self.min_progress_ratio {
            Some(CompletionFailure::InsufficientProgress { ratio: summary.max_progress_ratio })
        } else if summary.elapsed_secs < self.min_total_secs {
            Some(CompletionFailure::TooShort { secs: summary.elapsed_secs })
        } else if summary.elapsed_secs > self.max_total_secs {
            Some(CompletionFailure::TooLong { secs: summary.elapsed_secs })
        } else if summary.off_route_secs > self.max_off_route_secs {
            Some(CompletionFailure::TooMuchOffRoute { secs: summary.off_route_secs })
        } else {
            None
        };

        match &reason {
            Some(r) => info!("completion: rejected, {}", r),
            None => info!(
                "completion: accepted, {:.0}s, {:.1}% on route",
                summary.elapsed_secs, on_route_percent
            ),
        }

        CompletionVerdict { completed: reason.is_none(), reason, on_route_percent }
    }
}
