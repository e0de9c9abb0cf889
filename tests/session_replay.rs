//! Drive session integration tests: route load -> simulated drive -> report.
//!
//! Run with: `cargo test --test session_replay`

use std::sync::{Arc, Mutex};

use drive_telemetry::{
    CurveCallout, CurveDirection, DriveConfig, DriveSession, EncodedPolylineSource, GpsPoint,
    ManualClock, PositionSink, PositionUpdate, RouteZone, SimulationPhase, StaticRouteSource,
    TelemetryError, ZoneCharacter,
};

/// Sink that keeps a handle the test can read after the session takes ownership.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<PositionUpdate>>>);

impl Recorder {
    fn updates(&self) -> Vec<PositionUpdate> {
        self.0.lock().unwrap().clone()
    }
}

impl PositionSink for Recorder {
    fn publish(&mut self, update: &PositionUpdate) {
        self.0.lock().unwrap().push(*update);
    }
}

/// Helper: an L-shaped route, about 1.1 km north then 1.1 km east.
fn l_shaped_route() -> Vec<GpsPoint> {
    let mut points: Vec<GpsPoint> = (0..=10)
        .map(|i| GpsPoint::new(47.0 + i as f64 * 0.001, 11.0))
        .collect();
    points.extend((1..=10).map(|i| GpsPoint::new(47.01, 11.0 + i as f64 * 0.0015)));
    points
}

fn zones_for(total: f64) -> Vec<RouteZone> {
    vec![
        RouteZone::new(0.0, 300.0, ZoneCharacter::Urban),
        RouteZone::new(300.0, 1200.0, ZoneCharacter::Technical),
        RouteZone::new(1200.0, total, ZoneCharacter::Transit),
    ]
}

fn session_with_recorder() -> (DriveSession<ManualClock>, ManualClock, Recorder) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = ManualClock::new(1_700_000_000_000);
    let recorder = Recorder::default();
    let mut session =
        DriveSession::with_clock(DriveConfig::default(), clock.clone()).with_sink(recorder.clone());
    session
        .load_route(&StaticRouteSource::new(l_shaped_route()), &[])
        .expect("route should load");
    (session, clock, recorder)
}

// ============================================================================
// Simulated drive
// ============================================================================

#[test]
fn test_full_simulated_drive() {
    let (mut session, clock, recorder) = session_with_recorder();
    let total = session.driver().total_distance();
    session.set_zones(zones_for(total));
    session.set_speed(60.0);
    assert!(session.play());

    let mut ticks = 0;
    while session.progress().phase == SimulationPhase::Playing {
        clock.advance(1000);
        session.tick();
        ticks += 1;

        // Curve callouts at the corner, the way the callout planner would
        if ticks == 40 {
            session.record_curve_callout(CurveCallout::new(90.0, CurveDirection::Right, 0.7));
            session.record_callout_spoken();
        }
        assert!(ticks < 500);
    }

    let updates = recorder.updates();
    assert_eq!(updates.len(), ticks);
    assert!(updates
        .windows(2)
        .all(|w| w[1].distance_along >= w[0].distance_along));
    let last = updates.last().unwrap();
    assert_eq!(last.distance_along, total);
    assert_eq!(last.speed_mph, 0.0);

    let stats = session.finish();
    assert!((stats.total_distance - total).abs() < 1e-6);
    assert_eq!(stats.top_speed, 60.0);
    assert_eq!(stats.callouts_delivered, 1);
    assert_eq!(stats.technical_curves, 1);
    assert_eq!(stats.hardest_curve.map(|c| c.angle), Some(90.0));
    assert_eq!(stats.fastest_apex.map(|a| a.speed), Some(60.0));

    let zone_distance: f64 = stats.zone_breakdown.iter().map(|r| r.distance).sum();
    assert!((zone_distance - total).abs() < 1e-6);
    assert!((stats.technical_distance - 900.0).abs() < 1e-6);
    assert!((stats.highway_distance - (total - 1200.0)).abs() < 1e-6);
    assert_eq!(stats.technical_avg_speed, 60.0);
}

#[test]
fn test_heading_turns_at_the_corner() {
    let (mut session, clock, recorder) = session_with_recorder();
    session.set_speed(60.0);
    session.play();
    for _ in 0..80 {
        clock.advance(1000);
        session.tick();
    }

    let updates = recorder.updates();
    let first = updates.first().unwrap();
    let last = updates.last().unwrap();
    // North at the start, east after the corner
    assert!(first.heading < 1.0 || first.heading > 359.0);
    assert!((last.heading - 90.0).abs() < 1.0);
}

#[test]
fn test_pause_excludes_time_from_distance() {
    let (mut session, clock, _) = session_with_recorder();
    session.play();
    clock.advance(1000);
    session.tick();

    session.pause();
    clock.advance(60_000);
    assert!(session.tick().is_none());

    assert!(!session.toggle_pause());
    clock.advance(1000);
    session.tick();

    let progress = session.progress();
    assert!((progress.distance_along - 2.0 * 17.8816).abs() < 1e-9);
}

#[test]
fn test_report_json_round_trip_fields() {
    let (mut session, clock, _) = session_with_recorder();
    let total = session.driver().total_distance();
    session.set_zones(zones_for(total));
    session.play();
    for _ in 0..20 {
        clock.advance(1000);
        session.tick();
    }

    let json = session.finish().to_json();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["top_speed"], 40.0);
    assert_eq!(value["callouts_delivered"], 0);
    let zones: Vec<&str> = value["zone_breakdown"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["zone"].as_str().unwrap())
        .collect();
    assert_eq!(zones, vec!["urban", "technical"]);
}

// ============================================================================
// Route loading
// ============================================================================

#[test]
fn test_encoded_polyline_route() {
    let clock = ManualClock::new(0);
    let mut session = DriveSession::with_clock(DriveConfig::default(), clock.clone());
    session
        .load_route(&EncodedPolylineSource::new("_p~iF~ps|U_ulLnnqC_mqNvxq`@", 5), &[])
        .unwrap();

    let progress = session.progress();
    assert!(progress.ready);
    let start = progress.position.unwrap();
    assert!((start.latitude - 38.5).abs() < 1e-9);
    assert!((start.longitude - -120.2).abs() < 1e-9);
    assert!(progress.total_distance > 500_000.0);
}

#[test]
fn test_failed_route_load_leaves_session_idle() {
    let clock = ManualClock::new(0);
    let mut session = DriveSession::with_clock(DriveConfig::default(), clock.clone());

    let offline = |_: &[GpsPoint]| -> drive_telemetry::Result<Vec<GpsPoint>> {
        Err(TelemetryError::RouteFetch {
            message: "network unreachable".to_string(),
        })
    };
    let waypoints = [GpsPoint::new(47.0, 11.0), GpsPoint::new(47.1, 11.1)];
    let result = session.load_route(&offline, &waypoints);

    assert!(matches!(result, Err(TelemetryError::RouteFetch { .. })));
    assert!(!session.play());
    assert!(session.tick().is_none());
    assert_eq!(session.progress().phase, SimulationPhase::Uninitialized);
    assert!(session.driver().last_error().is_some());
}

// ============================================================================
// Real GPS replay
// ============================================================================

#[test]
fn test_gps_fix_replay() {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut session = DriveSession::with_clock(DriveConfig::default(), clock.clone());
    session.set_zones(vec![
        RouteZone::new(0.0, 500.0, ZoneCharacter::Urban),
        RouteZone::new(500.0, 3000.0, ZoneCharacter::Transit),
    ]);

    session.begin_drive();

    // Accelerate, cruise, then stop at the destination
    let fixes = [
        (10.0, 12.0),
        (40.0, 25.0),
        (120.0, 40.0),
        (300.0, 55.0),
        (560.0, 65.0),
        (850.0, 68.0),
        (1150.0, 70.0),
        (1440.0, 66.0),
        (1600.0, 30.0),
        (1650.0, 4.0),
        (1652.0, 0.0),
    ];
    for (distance, speed) in fixes {
        clock.advance(2000);
        session.ingest_fix(distance, speed);
    }
    assert!(session.was_moving_recently());

    let stats = session.finish();
    assert_eq!(stats.total_distance, 1652.0);
    assert_eq!(stats.drive_time, 22.0);
    assert_eq!(stats.top_speed, 70.0);
    assert_eq!(stats.highway_top_speed, 70.0);
    assert!((stats.highway_distance - 1152.0).abs() < 1e-9);
    assert!(stats.avg_speed > 0.0 && stats.avg_speed < stats.top_speed);
}
