//! Tracking configuration.
//!
//! One [`TrackerConfig`] is injected into every component that needs a
//! threshold, so the off-route distance, completion ratio and smoothing window
//! are decided in a single place. The struct deserializes from partial JSON;
//! missing fields take their defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Configuration for course tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TrackerConfig {
    /// Distance from the course beyond which the runner is off-route.
    /// Default: 30.0 meters
    pub off_route_threshold_m: f64,

    /// Progress ratio at which a session declares the course completed.
    /// Default: 0.98
    pub completion_ratio: f64,

    /// Minimum speed for a pair of fixes to contribute to heading smoothing.
    /// Below this, GPS jitter dominates the bearing. Default: 0.5 m/s
    pub min_speed_for_bearing: f64,

    /// Number of consecutive pairwise bearings averaged for the smoothed heading.
    /// Default: 3
    pub bearing_window: u32,

    /// Capacity of the position ring buffer kept by a session.
    /// Default: 10
    pub history_capacity: u32,

    /// How far ahead along the course to look for the next turn.
    /// Default: 150.0 meters
    pub turn_lookahead_m: f64,

    /// Backward jumps in matched progress smaller than this are treated as GPS
    /// noise and the previous high-water mark is reported instead.
    /// 0 disables the hold. Default: 25.0 meters
    pub regression_tolerance_m: f64,

    /// Number of segments searched on each side of the previous match.
    /// 0 searches the whole course on every fix. Default: 0
    pub search_window: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            off_route_threshold_m: 30.0,
            completion_ratio: 0.98,
            min_speed_for_bearing: 0.5,
            bearing_window: 3,
            history_capacity: 10,
            turn_lookahead_m: 150.0,
            regression_tolerance_m: 25.0,
            search_window: 0,
        }
    }
}

impl TrackerConfig {
    /// Parse a configuration from JSON, filling unspecified fields with
    /// defaults, and validate it.
    ///
    /// ```
    /// use course_tracker::TrackerConfig;
    ///
    /// let config = TrackerConfig::from_json_str(r#"{"off_route_threshold_m": 50}"#).unwrap();
    /// assert_eq!(config.off_route_threshold_m, 50.0);
    /// assert_eq!(config.bearing_window, 3);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is within its usable range.
    pub fn validate(&self) -> Result<()> {
        fn positive(field: &'static str, v: f64) -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(TrackerError::InvalidConfig {
                    field,
                    reason: format!("must be a positive finite number, got {}", v),
                })
            }
        }

        positive("off_route_threshold_m", self.off_route_threshold_m)?;
        positive("turn_lookahead_m", self.turn_lookahead_m)?;

        if !(self.completion_ratio > 0.0 && self.completion_ratio <= 1.0) {
            return Err(TrackerError::InvalidConfig {
                field: "completion_ratio",
                reason: format!("must be in (0, 1], got {}", self.completion_ratio),
            });
        }
        if !(self.min_speed_for_bearing.is_finite() && self.min_speed_for_bearing >= 0.0) {
            return Err(TrackerError::InvalidConfig {
                field: "min_speed_for_bearing",
                reason: format!("must be >= 0, got {}", self.min_speed_for_bearing),
            });
        }
        if !(self.regression_tolerance_m.is_finite() && self.regression_tolerance_m >= 0.0) {
            return Err(TrackerError::InvalidConfig {
                field: "regression_tolerance_m",
                reason: format!("must be >= 0, got {}", self.regression_tolerance_m),
            });
        }
        if self.bearing_window < 1 {
            return Err(TrackerError::InvalidConfig {
                field: "bearing_window",
                reason: "must be at least 1".to_string(),
            });
        }
        // The window needs window + 1 fixes, so the buffer has to hold them.
        if self.history_capacity < 2 || self.history_capacity < self.bearing_window + 1 {
            return Err(TrackerError::InvalidConfig {
                field: "history_capacity",
                reason: format!(
                    "must be at least max(2, bearing_window + 1), got {}",
                    self.history_capacity
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.off_route_threshold_m, 30.0);
        assert_eq!(config.completion_ratio, 0.98);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TrackerConfig::from_json_str(r#"{"completion_ratio": 0.95}"#).unwrap();
        assert_eq!(config.completion_ratio, 0.95);
        assert_eq!(config.off_route_threshold_m, 30.0);
        assert_eq!(config.history_capacity, 10);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = TrackerConfig::from_json_str(r#"{"off_route_threshold_m": -5}"#).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidConfig { field: "off_route_threshold_m", .. }
        ));

        let config = TrackerConfig { completion_ratio: 1.5, ..TrackerConfig::default() };
        assert!(config.validate().is_err());

        let config = TrackerConfig { bearing_window: 12, ..TrackerConfig::default() };
        assert!(matches!(
            config.validate(),
            Err(TrackerError::InvalidConfig { field: "history_capacity", .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            TrackerConfig::from_json_str("{not json"),
            Err(TrackerError::Parse(_))
        ));
    }
}
