//! End-to-end drive scenarios for the simulator and the telemetry aggregator.
//!
//! Every test runs on a `ManualClock`, so rate limits and windows are
//! deterministic.
//!
//! Run with: `cargo test --test drive_scenarios`

use drive_telemetry::{
    CurveCallout, CurveDirection, GpsPoint, ManualClock, RoutePathIndex, RouteZone,
    SimulationConfig, SimulationDriver, SimulationPhase, StaticRouteSource, TelemetryAggregator,
    TelemetryConfig, ZoneCharacter,
};

const START_MS: i64 = 1_700_000_000_000;

/// Degrees of latitude spanning `meters` on the haversine sphere.
fn lat_offset(meters: f64) -> f64 {
    (meters / 6_371_000.0).to_degrees()
}

/// Helper: three points due north forming two 1000 m segments.
fn two_segment_route() -> Vec<GpsPoint> {
    (0..3)
        .map(|i| GpsPoint::new(40.0 + lat_offset(1000.0 * i as f64), -105.0))
        .collect()
}

/// Helper: a zig-zag route so headings and interpolation are non-trivial.
fn zig_zag_route() -> Vec<GpsPoint> {
    vec![
        GpsPoint::new(46.0000, 8.0000),
        GpsPoint::new(46.0040, 8.0030),
        GpsPoint::new(46.0050, 8.0100),
        GpsPoint::new(46.0120, 8.0110),
        GpsPoint::new(46.0125, 8.0200),
    ]
}

fn driver_on(route: Vec<GpsPoint>) -> (SimulationDriver<ManualClock>, ManualClock) {
    let clock = ManualClock::new(START_MS);
    let mut driver = SimulationDriver::with_config(SimulationConfig::default(), clock.clone());
    driver
        .start(&StaticRouteSource::new(route), &[])
        .expect("route should load");
    (driver, clock)
}

fn telemetry() -> (TelemetryAggregator<ManualClock>, ManualClock) {
    let clock = ManualClock::new(START_MS);
    let mut telemetry = TelemetryAggregator::with_config(TelemetryConfig::default(), clock.clone());
    telemetry.start();
    (telemetry, clock)
}

/// Perpendicular-free check that `p` lies on segment `a`-`b`: the two partial
/// distances add up to the segment length.
fn lies_on_segment(p: &GpsPoint, a: &GpsPoint, b: &GpsPoint) -> bool {
    use drive_telemetry::geo_utils::haversine_distance;
    let direct = haversine_distance(a, b);
    let via = haversine_distance(a, p) + haversine_distance(p, b);
    (via - direct).abs() < 1e-3
}

// ============================================================================
// Scenario A: one tick at 40 mph
// ============================================================================

#[test]
fn test_scenario_a_single_tick() {
    let route = two_segment_route();
    let (mut driver, clock) = driver_on(route.clone());
    assert!((driver.total_distance() - 2000.0).abs() < 1e-3);

    // 3600 mph is clamped to the 120 mph ceiling
    assert_eq!(driver.set_speed(3600.0), 120.0);
    driver.set_speed(40.0);
    assert!(driver.play());

    clock.advance(1000);
    let update = driver.tick().expect("playing driver must publish");

    assert!((update.distance_along - 17.8816).abs() < 1e-9);
    assert!((driver.progress().distance_along - 17.8816).abs() < 1e-9);
    assert!(lies_on_segment(&update.position, &route[0], &route[1]));
    assert!(update.position.latitude > route[0].latitude);
    assert!(update.heading < 1e-6 || update.heading > 360.0 - 1e-6);
}

// ============================================================================
// Scenario B: zone breakdown across a boundary
// ============================================================================

#[test]
fn test_scenario_b_zone_breakdown() {
    let (mut telemetry, clock) = telemetry();
    let zones = vec![
        RouteZone::new(0.0, 100.0, ZoneCharacter::Urban),
        RouteZone::new(100.0, 500.0, ZoneCharacter::Technical),
    ];

    clock.advance(5_000);
    telemetry.on_sample(50.0, 25.0, &zones);
    clock.advance(20_000);
    telemetry.on_sample(300.0, 35.0, &zones);
    let stats = telemetry.flush();

    let urban = stats
        .zone_breakdown
        .iter()
        .find(|r| r.zone == ZoneCharacter::Urban)
        .expect("urban record");
    let technical = stats
        .zone_breakdown
        .iter()
        .find(|r| r.zone == ZoneCharacter::Technical)
        .expect("technical record");

    assert!((urban.distance - 100.0).abs() < 1e-6);
    assert!((technical.distance - 200.0).abs() < 1e-6);
    assert!((stats.technical_distance - 200.0).abs() < 1e-6);
    assert_eq!(stats.highway_distance, 0.0);
}

// ============================================================================
// Scenario C: fastest apex after a curve callout
// ============================================================================

#[test]
fn test_scenario_c_fastest_apex() {
    let (mut telemetry, clock) = telemetry();

    telemetry.record_curve_callout(CurveCallout::new(40.0, CurveDirection::Left, 2.0));
    clock.advance(3_000);
    telemetry.on_sample(50.0, 65.0, &[]);
    clock.advance(9_000);
    let stats = telemetry.flush();

    let apex = stats.fastest_apex.expect("apex committed on flush");
    assert_eq!(apex.speed, 65.0);
    assert_eq!(apex.curve_angle, 40.0);
    assert_eq!(apex.curve_direction, CurveDirection::Left);
    assert_eq!(apex.mile, 2.0);
}

// ============================================================================
// Scenario D: recent-motion check
// ============================================================================

#[test]
fn test_scenario_d_was_moving_recently() {
    let (mut slow, clock) = telemetry();
    for i in 0..15 {
        clock.advance(2_000);
        slow.on_sample(i as f64, 5.0, &[]);
    }
    assert!(!slow.was_moving_recently());

    let (mut moving, clock) = telemetry();
    for i in 0..15 {
        clock.advance(2_000);
        moving.on_sample(i as f64, if i == 10 { 5.5 } else { 2.0 }, &[]);
    }
    assert!(moving.was_moving_recently());
}

// ============================================================================
// Path index properties
// ============================================================================

#[test]
fn test_positions_lie_on_polyline() {
    let route = zig_zag_route();
    let index = RoutePathIndex::build(route.clone()).unwrap();
    let total = index.total_length();

    assert_eq!(index.position_at_distance(0.0).position, route[0]);
    assert_eq!(index.position_at_distance(total).position, route[4]);

    for step in 0..=50 {
        let d = total * step as f64 / 50.0;
        let resolved = index.position_at_distance(d);
        let seg = resolved.segment_index as usize;
        assert!(
            lies_on_segment(&resolved.position, &route[seg], &route[seg + 1]),
            "distance {d} resolved off segment {seg}"
        );
        assert!((0.0..360.0).contains(&resolved.heading));
    }
}

#[test]
fn test_seek_clamps_to_route() {
    let (mut driver, _) = driver_on(zig_zag_route());
    let total = driver.total_distance();

    for target in [-50.0, 0.0, 123.4, total - 1.0, total, total + 999.0] {
        driver.seek(target);
        assert_eq!(driver.progress().distance_along, target.clamp(0.0, total));
    }
}

#[test]
fn test_drive_to_finish() {
    let (mut driver, clock) = driver_on(two_segment_route());
    driver.set_speed(120.0);
    driver.play();

    let mut ticks = 0;
    while driver.phase() == SimulationPhase::Playing {
        clock.advance(1000);
        driver.tick();
        ticks += 1;
        assert!(ticks < 100, "driver never finished");
    }
    // 2000 m at 53.6448 m/s
    assert_eq!(ticks, 38);
    assert_eq!(driver.phase(), SimulationPhase::Finished);
    assert!(driver.progress().paused);
    assert_eq!(driver.progress().progress_percent, 100.0);

    clock.advance(1000);
    assert!(driver.tick().is_none());
}

// ============================================================================
// Aggregator properties
// ============================================================================

#[test]
fn test_top_speed_never_decreases() {
    let (mut telemetry, clock) = telemetry();
    let speeds = [12.0, 48.0, 33.0, 61.0, 0.0, 59.9, 61.0, 8.0];
    let mut previous = 0.0;
    for (i, speed) in speeds.iter().enumerate() {
        clock.advance(1_500);
        telemetry.on_sample(i as f64 * 20.0, *speed, &[]);
        let top = telemetry.live_stats().top_speed;
        assert!(top >= previous);
        previous = top;
    }
    assert_eq!(previous, 61.0);
}

#[test]
fn test_breakdown_sums_match_totals() {
    let (mut telemetry, clock) = telemetry();
    let zones = vec![
        RouteZone::new(0.0, 400.0, ZoneCharacter::Urban),
        RouteZone::new(400.0, 1500.0, ZoneCharacter::Technical),
        RouteZone::new(1800.0, 5000.0, ZoneCharacter::Transit),
    ];

    let mut distance = 0.0;
    for i in 0..120 {
        clock.advance(1_000 + (i % 3) * 250);
        distance += 22.0 + (i % 7) as f64;
        telemetry.on_sample(distance, 45.0 + (i % 11) as f64, &zones);
        if i == 60 {
            telemetry.record_curve_callout(CurveCallout::new(55.0, CurveDirection::Right, 0.9));
        }
    }
    clock.advance(4_000);
    let stats = telemetry.flush();

    let zone_distance: f64 = stats.zone_breakdown.iter().map(|r| r.distance).sum();
    let zone_time: f64 = stats.zone_breakdown.iter().map(|r| r.time).sum();
    assert!((zone_distance - stats.total_distance).abs() < 1e-6);
    assert!((zone_time - stats.drive_time).abs() < 1e-6);
    assert!((stats.total_distance - distance).abs() < 1e-9);

    // Passes through all three zones and the unclassified gap
    assert_eq!(stats.zone_breakdown.len(), 4);
    assert!(stats.technical_time > 0.0 && stats.highway_time > 0.0);
    assert!(stats.highway_top_speed <= stats.top_speed);
}

#[test]
fn test_flush_twice_is_identical() {
    let (mut telemetry, clock) = telemetry();
    let zones = vec![RouteZone::new(0.0, 1000.0, ZoneCharacter::Technical)];
    for i in 1..=10 {
        clock.advance(1_000);
        telemetry.on_sample(i as f64 * 15.0, 30.0, &zones);
    }
    telemetry.record_curve_callout(CurveCallout::new(70.0, CurveDirection::Left, 0.1));

    let first = telemetry.flush();
    let second = telemetry.flush();
    assert_eq!(first, second);
    assert_eq!(first.technical_curves, 1);
}

#[test]
fn test_seek_backward_mid_drive() {
    let (mut driver, clock) = driver_on(two_segment_route());
    let mut telemetry = TelemetryAggregator::with_config(TelemetryConfig::default(), clock.clone());
    telemetry.start();
    let zones = vec![
        RouteZone::new(0.0, 1000.0, ZoneCharacter::Urban),
        RouteZone::new(1000.0, 2000.0, ZoneCharacter::Transit),
    ];

    driver.set_speed(120.0);
    driver.play();
    for _ in 0..25 {
        clock.advance(1000);
        if let Some(update) = driver.tick() {
            telemetry.on_sample(update.distance_along, update.speed_mph, &zones);
        }
    }
    driver.seek(200.0);
    for _ in 0..5 {
        clock.advance(1000);
        if let Some(update) = driver.tick() {
            telemetry.on_sample(update.distance_along, update.speed_mph, &zones);
        }
    }
    let stats = telemetry.flush();

    assert!(stats.zone_breakdown.iter().all(|r| r.distance >= 0.0));
    let zone_distance: f64 = stats.zone_breakdown.iter().map(|r| r.distance).sum();
    assert!((zone_distance - stats.total_distance).abs() < 1e-6);
    // The first tick after the seek lands behind the last sample, so only
    // 29 of the 30 ticks count as forward progress
    assert!((stats.total_distance - 29.0 * 53.6448).abs() < 1e-6);
}
