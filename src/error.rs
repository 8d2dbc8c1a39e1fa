//! Unified error type for the tracking engine.
//!
//! Construction-time failures (bad course data, bad configuration) are returned
//! to the caller as [`TrackerError`]. Per-fix failures inside the live tracking
//! loop are absorbed into sentinel results instead, so only the `checked_*`
//! helpers and the course parser ever surface [`TrackerError::InvalidCoordinate`].

use std::fmt;

/// Errors produced by the course tracking engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// The course cannot be used for tracking (too few points, zero or
    /// non-finite length, corrupt coordinates).
    InvalidRoute { reason: String },
    /// A latitude/longitude pair is non-finite or out of range.
    InvalidCoordinate { lat: f64, lng: f64 },
    /// A configuration value is out of its allowed range.
    InvalidConfig { field: &'static str, reason: String },
    /// External JSON (course record or configuration) could not be decoded.
    Parse(String),
}

impl TrackerError {
    pub(crate) fn invalid_route(reason: impl Into<String>) -> Self {
        TrackerError::InvalidRoute { reason: reason.into() }
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::InvalidRoute { reason } => write!(f, "invalid route: {}", reason),
            TrackerError::InvalidCoordinate { lat, lng } => {
                write!(f, "invalid coordinate: ({}, {})", lat, lng)
            }
            TrackerError::InvalidConfig { field, reason } => {
                write!(f, "invalid config value for `{}`: {}", field, reason)
            }
            TrackerError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Parse(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TrackerError>;
