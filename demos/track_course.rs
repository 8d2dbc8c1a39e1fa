//! Simulated run along a short course, printing what the UI would show.
//!
//! Run with: cargo run --example track_course

use std::sync::Arc;

use course_tracker::geo_utils::destination;
use course_tracker::{
    next_turn, parse_course_json, CompletionCriteria, PositionSample, SessionEvent,
    TrackerConfig, TrackingSession,
};

const COURSE: &str = r#"{
    "id": "yeouido-loop",
    "name": "Yeouido Park Loop",
    "gps_route": [
        {"lat": 37.5260, "lng": 126.9220, "order": 0},
        {"lat": 37.5290, "lng": 126.9220, "order": 1},
        {"lat": 37.5290, "lng": 126.9260, "order": 2},
        {"lat": 37.5260, "lng": 126.9260, "order": 3}
    ]
}"#;

fn main() {
    let course = parse_course_json(COURSE).expect("course record");
    let model = Arc::new(course.into_model().expect("valid course"));
    let config = TrackerConfig::default();

    println!("Course Tracking Example\n");
    println!(
        "{}: {} points, {:.0}m",
        course.name.as_deref().unwrap_or(&course.id),
        model.points().len(),
        model.total_distance()
    );
    println!(
        "Config: off_route={}m, completion={:.0}%\n",
        config.off_route_threshold_m,
        config.completion_ratio * 100.0
    );

    let mut session = TrackingSession::new(Arc::clone(&model), config.clone());

    // 3 m/s along the course, one fix every 5 s, with a detour on the second leg
    let step_m = 15.0;
    let mut t = 0i64;
    let mut along = 0.0;
    while along <= model.total_distance() + step_m {
        let on_course = model.point_at_distance(along);
        let detour = along > 420.0 && along < 500.0;
        let fix = if detour { destination(&on_course, 0.0, 45.0) } else { on_course };

        let update = session.update(&PositionSample::new(fix.lat, fix.lng, t));
        for event in &update.events {
            match event {
                SessionEvent::Started => println!("[{:>4}s] started", t / 1000),
                SessionEvent::LeftRoute => println!(
                    "[{:>4}s] OFF ROUTE ({:.0}m from course)",
                    t / 1000,
                    update.progress.distance_to_segment
                ),
                SessionEvent::RejoinedRoute => println!("[{:>4}s] back on course", t / 1000),
                SessionEvent::Completed => println!("[{:>4}s] COMPLETED", t / 1000),
            }
        }

        if (t / 1000) % 30 == 0 {
            let turn = next_turn(&model, &update.progress, config.turn_lookahead_m)
                .map(|turn| format!("{} in {:.0}m", turn.kind, turn.distance_m))
                .unwrap_or_else(|| "finish ahead".to_string());
            println!(
                "[{:>4}s] {:5.1}%  {:4.0}m left  heading {:3.0}°  next: {}",
                t / 1000,
                update.progress.percent(),
                update.progress.remaining_distance,
                update.heading.smooth_bearing,
                turn
            );
        }

        along += step_m;
        t += 5000;
    }

    let summary = session.summary();
    println!(
        "\nSummary: {:.0}s, {:.0}s off-route, max {:.1}%",
        summary.elapsed_secs,
        summary.off_route_secs,
        summary.max_progress_ratio * 100.0
    );

    // A short demo run, so relax the duration floor
    let criteria = CompletionCriteria { min_total_secs: 60.0, ..CompletionCriteria::default() };
    let verdict = criteria.evaluate(&summary);
    match verdict.reason {
        None => println!("Verified: {:.1}% on route", verdict.on_route_percent),
        Some(reason) => println!("Not verified: {}", reason),
    }
}
