//! Distance, bearing and heading properties.

use course_tracker::geo_utils::{bearing, checked_distance, distance, haversine_distance};
use course_tracker::{smooth_bearing, speed_between, Coordinate, PositionSample, TrackerError};

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[test]
fn test_distance_zero_and_symmetric() {
    let points = [
        Coordinate::new(37.5665, 126.9780),
        Coordinate::new(35.1796, 129.0756),
        Coordinate::new(-33.8688, 151.2093),
        Coordinate::new(0.0, 179.9999),
    ];
    for a in &points {
        assert_eq!(haversine_distance(a, a), 0.0);
        for b in &points {
            assert_eq!(haversine_distance(a, b), haversine_distance(b, a));
        }
    }
    // Seoul to Busan is ~325 km
    assert!(approx_eq(haversine_distance(&points[0], &points[1]), 325_000.0, 5_000.0));
}

#[test]
fn test_checked_distance_rejects_invalid() {
    let ok = Coordinate::new(37.0, 127.0);
    assert!(matches!(
        checked_distance(&ok, &Coordinate::new(91.0, 0.0)),
        Err(TrackerError::InvalidCoordinate { .. })
    ));
    assert!(checked_distance(&ok, &ok).is_ok());
}

#[test]
fn test_distance_matches_haversine() {
    let a = Coordinate::new(37.5665, 126.9780);
    let b = Coordinate::new(37.5700, 126.9800);
    assert_eq!(distance(&a, &a), 0.0);
    assert_eq!(distance(&a, &b), haversine_distance(&a, &b));
    assert_eq!(distance(&a, &b), distance(&b, &a));
    assert_eq!(distance(&a, &Coordinate::new(f64::NAN, 0.0)), 0.0);
}

#[test]
fn test_bearing_conventions() {
    let a = Coordinate::new(0.0, 10.0);
    assert_eq!(bearing(&a, &a), 0.0);
    assert!(approx_eq(bearing(&a, &Coordinate::new(0.0, 10.01)), 90.0, 1e-6));
    assert!(approx_eq(bearing(&a, &Coordinate::new(0.0, 9.99)), 270.0, 1e-6));
    assert!(approx_eq(bearing(&a, &Coordinate::new(-0.01, 10.0)), 180.0, 1e-6));
}

#[test]
fn test_smoothing_across_north() {
    // Zig-zag between 350° and 10°: the mean is north, not south
    let mut samples = vec![PositionSample::new(37.0, 127.0, 0)];
    for i in 1..=4 {
        let prev = samples[i - 1].coord();
        let b = if i % 2 == 0 { 350.0 } else { 10.0 };
        let next = course_tracker::geo_utils::destination(&prev, b, 3.0);
        samples.push(PositionSample::new(next.lat, next.lng, i as i64 * 1000));
    }
    let heading = smooth_bearing(&samples, 4, 0.5, 180.0);
    assert!(heading < 1.0 || heading > 359.0, "heading={}", heading);
}

#[test]
fn test_zero_displacement_keeps_previous() {
    let still: Vec<PositionSample> =
        (0..4).map(|i| PositionSample::new(37.0, 127.0, i * 1000)).collect();
    let heading = smooth_bearing(&still, 3, 0.5, 123.0);
    assert_eq!(heading, 123.0);
    assert!(!heading.is_nan());
}

#[test]
fn test_speed_guards_time() {
    let a = PositionSample::new(37.0, 127.0, 1000);
    let b = PositionSample::new(37.0001, 127.0, 1000);
    assert_eq!(speed_between(&a, &b), 0.0);

    let c = PositionSample { timestamp: 3000, ..b };
    assert!(approx_eq(speed_between(&a, &c), 11.12 / 2.0, 0.05));
}
