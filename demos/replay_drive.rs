//! Simulate a short mountain drive end to end and print the drive report.
//!
//! Run with: `RUST_LOG=debug cargo run --example replay_drive`

use drive_telemetry::{
    CurveCallout, CurveDirection, DriveConfig, DriveSession, GpsPoint, ManualClock, PositionSink,
    PositionUpdate, RouteZone, StaticRouteSource, ZoneCharacter,
};

/// Prints every tenth position, like a throttled map marker.
struct ConsoleSink {
    published: usize,
}

impl PositionSink for ConsoleSink {
    fn publish(&mut self, update: &PositionUpdate) {
        if self.published % 10 == 0 {
            println!(
                "{:>6.0} m  ({:.5}, {:.5})  heading {:>5.1}  {:>4.0} mph",
                update.distance_along,
                update.position.latitude,
                update.position.longitude,
                update.heading,
                update.speed_mph
            );
        }
        self.published += 1;
    }
}

/// A town exit, a switchback section and a highway run.
fn demo_route() -> Vec<GpsPoint> {
    let mut points = vec![GpsPoint::new(46.5000, 9.8000), GpsPoint::new(46.5030, 9.8010)];
    for i in 1..=8 {
        let side = if i % 2 == 0 { 0.0 } else { 0.004 };
        points.push(GpsPoint::new(46.5030 + i as f64 * 0.0012, 9.8010 + side));
    }
    for i in 1..=10 {
        points.push(GpsPoint::new(46.5126 + i as f64 * 0.002, 9.8010 + i as f64 * 0.003));
    }
    points
}

/// Curve callouts the planner would speak, keyed by distance along the route.
fn planned_callouts() -> Vec<(f64, CurveCallout)> {
    vec![
        (450.0, CurveCallout::new(35.0, CurveDirection::Right, 0.3)),
        (800.0, CurveCallout::new(120.0, CurveDirection::Left, 0.5)),
        (1150.0, CurveCallout::new(115.0, CurveDirection::Right, 0.7)),
        (1500.0, CurveCallout::new(90.0, CurveDirection::Left, 0.9)),
    ]
}

fn main() -> drive_telemetry::Result<()> {
    env_logger::init();

    let clock = ManualClock::new(1_700_000_000_000);
    let mut session = DriveSession::with_clock(DriveConfig::default(), clock.clone())
        .with_sink(ConsoleSink { published: 0 });
    session.load_route(&StaticRouteSource::new(demo_route()), &[])?;

    let total = session.driver().total_distance();
    session.set_zones(vec![
        RouteZone::new(0.0, 350.0, ZoneCharacter::Urban),
        RouteZone::new(350.0, 1900.0, ZoneCharacter::Technical),
        RouteZone::new(1900.0, total, ZoneCharacter::Transit),
    ]);

    let mut callouts = planned_callouts().into_iter().peekable();
    session.set_speed(25.0);
    session.play();

    let tick_ms = session.driver().config().tick_interval_ms as i64;
    while let Some(update) = session.tick() {
        clock.advance(tick_ms);

        if let Some((at, callout)) = callouts.peek() {
            if update.distance_along >= *at {
                session.record_curve_callout(*callout);
                session.record_callout_spoken();
                callouts.next();
            }
        }

        // Slow through the switchbacks, open up on the highway
        let target = if update.distance_along < 350.0 {
            25.0
        } else if update.distance_along < 1900.0 {
            32.0 + (update.distance_along / 100.0).sin() * 6.0
        } else {
            68.0
        };
        session.set_speed(target);
    }

    let stats = session.finish();
    println!("{}", stats.to_json());
    Ok(())
}
