//! End-to-end map-matching tests over the public API.

use course_tracker::geo_utils::{destination, haversine_distance};
use course_tracker::{
    next_turn, progress, project, Coordinate, RouteModel, RoutePoint, SegmentIndex,
    TrackerError, TurnKind,
};

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// ~1 km course with four legs around a block in Seoul.
fn block_course() -> RouteModel {
    RouteModel::from_coords(&[
        (37.5000, 127.0000),
        (37.5020, 127.0000),
        (37.5020, 127.0025),
        (37.5000, 127.0025),
        (37.5000, 127.0050),
    ])
    .unwrap()
}

#[test]
fn test_midpoint_of_two_point_route() {
    let model = RouteModel::from_coords(&[(37.0, 127.0), (37.001, 127.0)]).unwrap();
    let p = progress(&model, &Coordinate::new(37.0005, 127.0), 30.0, None);

    assert!(approx_eq(p.progress_ratio, 0.5, 0.01));
    assert!(approx_eq(p.cumulative_dist, 55.5, 1.0));
    assert!(p.distance_to_segment < 1.0);
    assert!(!p.is_off_route);
    assert_eq!(p.segment_index, 0);
}

#[test]
fn test_l_shape_offset_is_off_route() {
    let model =
        RouteModel::from_coords(&[(37.0, 127.0), (37.001, 127.0), (37.001, 127.001)]).unwrap();
    // 40 m west of the first leg's midpoint, far from the second leg
    let here = destination(&Coordinate::new(37.0005, 127.0), 270.0, 40.0);
    let p = progress(&model, &here, 30.0, None);

    assert!(approx_eq(p.distance_to_segment, 40.0, 1.0));
    assert!(p.is_off_route);
    assert_eq!(p.segment_index, 0);
}

#[test]
fn test_degenerate_routes_rejected() {
    assert!(matches!(RouteModel::build(&[]), Err(TrackerError::InvalidRoute { .. })));
    assert!(matches!(
        RouteModel::build(&[RoutePoint::new(37.0, 127.0)]),
        Err(TrackerError::InvalidRoute { .. })
    ));
    assert!(matches!(
        RouteModel::build(&[RoutePoint::new(37.0, 127.0), RoutePoint::new(37.0, 127.0)]),
        Err(TrackerError::InvalidRoute { .. })
    ));
}

#[test]
fn test_total_distance_is_sum_of_legs() {
    let model = block_course();
    let coords = model.coords();
    let sum: f64 = coords.windows(2).map(|w| haversine_distance(&w[0], &w[1])).sum();
    assert!(approx_eq(model.total_distance(), sum, 1e-6));
    assert_eq!(model.cumulative_distances().len(), model.points().len());
    assert_eq!(model.cumulative_distances()[0], 0.0);
}

#[test]
fn test_walk_the_course() {
    let model = block_course();
    let total = model.total_distance();
    let mut last = -1.0;

    for i in 0..=40 {
        let d = total * i as f64 / 40.0;
        let p = progress(&model, &model.point_at_distance(d), 30.0, Some(3.0));

        assert!(approx_eq(p.cumulative_dist, d, 1.0), "d={} got {}", d, p.cumulative_dist);
        assert!(p.cumulative_dist >= last - 1e-6);
        assert!(!p.is_off_route);
        assert!(approx_eq(p.remaining_distance, total - p.cumulative_dist, 1e-9));
        assert!(p.segment_index as usize <= model.points().len() - 2);
        last = p.cumulative_dist;
    }
}

#[test]
fn test_projection_clamps_at_course_ends() {
    let model = block_course();
    let before = destination(&model.points()[0].coord(), 180.0, 50.0);
    let p = progress(&model, &before, 100.0, None);
    assert_eq!(p.cumulative_dist, 0.0);
    assert!(approx_eq(p.distance_to_segment, 50.0, 1.0));

    let a = model.points()[0].coord();
    let b = model.points()[1].coord();
    assert_eq!(project(&a, &b, &before).t, 0.0);
}

#[test]
fn test_index_agrees_with_full_scan() {
    let model = block_course();
    let index = SegmentIndex::new(&model);
    assert_eq!(index.len(), 4);

    let queries = [
        Coordinate::new(37.5010, 127.0003),
        Coordinate::new(37.5021, 127.0010),
        Coordinate::new(37.5005, 127.0030),
        Coordinate::new(37.4990, 127.0050),
        Coordinate::new(37.6000, 127.1000),
    ];
    for query in queries {
        let full = progress(&model, &query, 30.0, None);
        let indexed = index.progress(&model, &query, 30.0, None);
        assert_eq!(full.segment_index, indexed.segment_index);
        assert!(approx_eq(full.cumulative_dist, indexed.cumulative_dist, 1e-9));
    }
}

#[test]
fn test_guidance_along_block() {
    let model = block_course();
    // 50 m before the first corner; the course turns east
    let near_corner = destination(&model.points()[1].coord(), 180.0, 50.0);
    let p = progress(&model, &near_corner, 30.0, None);

    let turn = next_turn(&model, &p, 150.0).unwrap();
    assert_eq!(turn.kind, TurnKind::SharpRight);
    assert_eq!(turn.vertex_index, 1);
    assert!(approx_eq(turn.distance_m, 50.0, 1.0));
}

#[test]
fn test_split_for_rendering() {
    let model = block_course();
    let p = progress(&model, &Coordinate::new(37.5020, 127.0010), 30.0, None);
    let split = model.split_at(&p);

    assert_eq!(split.passed.len(), 3);
    assert_eq!(split.upcoming.len(), 4);
    assert_eq!(split.passed.last(), split.upcoming.first());
}
