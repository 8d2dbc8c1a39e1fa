//! Off-route classification.

/// Whether a runner `distance_to_segment` meters from the course is off-route.
///
/// The comparison is strict: exactly at the threshold still counts as on
/// the course. A non-finite distance (the sentinel for an invalid fix) is
/// always off-route.
#[inline]
pub fn is_off_route(distance_to_segment: f64, threshold_m: f64) -> bool {
    !distance_to_segment.is_finite() || distance_to_segment > threshold_m
}
