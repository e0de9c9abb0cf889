//! # Drive Session
//!
//! One drive: a [`SimulationDriver`] and a [`TelemetryAggregator`] owned
//! together, plus the route's zone list.
//!
//! The session does the wiring the host would otherwise do by hand. Each
//! simulated tick is published to the position sink and fed to the
//! aggregator, and curve callouts are forwarded. For real driving the host
//! skips the simulator and calls [`DriveSession::ingest_fix`] with each GPS
//! fix instead.
//!
//! Sessions are not reused. Start a new drive with a new session.

use log::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::DriveConfig;
use crate::error::Result;
use crate::path_index::RoutePathIndex;
use crate::route_source::RouteSource;
use crate::simulation::{PositionSink, PositionUpdate, SimulationDriver, SimulationProgress};
use crate::telemetry::{CurveCallout, DriveStats, TelemetryAggregator};
use crate::zones::{zones_are_ordered, RouteZone};
use crate::GpsPoint;

/// A single drive from route load to final report.
pub struct DriveSession<C: Clock + Clone = SystemClock> {
    driver: SimulationDriver<C>,
    telemetry: TelemetryAggregator<C>,
    zones: Vec<RouteZone>,
    sink: Option<Box<dyn PositionSink + Send>>,
    finished: bool,
}

impl DriveSession<SystemClock> {
    /// Create a session on the system clock.
    pub fn new(config: DriveConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + Clone> DriveSession<C> {
    /// Create a session whose driver and aggregator share `clock`.
    pub fn with_clock(config: DriveConfig, clock: C) -> Self {
        Self {
            driver: SimulationDriver::with_config(config.simulation, clock.clone()),
            telemetry: TelemetryAggregator::with_config(config.telemetry, clock),
            zones: Vec::new(),
            sink: None,
            finished: false,
        }
    }

    /// Attach the receiver for published positions.
    pub fn with_sink(mut self, sink: impl PositionSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn PositionSink + Send>) {
        self.sink = Some(sink);
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Fetch and index the route through `source`.
    pub fn load_route(&mut self, source: &dyn RouteSource, waypoints: &[GpsPoint]) -> Result<()> {
        self.driver.start(source, waypoints)
    }

    /// Use an already-built index.
    pub fn load_index(&mut self, index: RoutePathIndex) {
        self.driver.load_index(index);
    }

    /// Replace the zone list the aggregator classifies samples against.
    pub fn set_zones(&mut self, zones: Vec<RouteZone>) {
        if !zones_are_ordered(&zones) {
            warn!(
                "[DriveSession] {} zones are unordered or overlapping; later zones win on overlap",
                zones.len()
            );
        }
        debug!("[DriveSession] Zone list set ({} zones)", zones.len());
        self.zones = zones;
    }

    pub fn zones(&self) -> &[RouteZone] {
        &self.zones
    }

    /// Start telemetry for the drive. Called implicitly by the first
    /// [`play`](Self::play) or [`ingest_fix`](Self::ingest_fix).
    pub fn begin_drive(&mut self) {
        self.finished = false;
        self.telemetry.start_at(self.driver.state().distance_along);
        info!("[DriveSession] Drive begun");
    }

    fn ensure_started(&mut self) {
        if !self.telemetry.is_active() || self.finished {
            self.begin_drive();
        }
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Start or resume playback.
    pub fn play(&mut self) -> bool {
        if !self.driver.is_ready() {
            return false;
        }
        let playing = self.driver.play();
        if playing {
            self.ensure_started();
        }
        playing
    }

    pub fn pause(&mut self) {
        self.driver.pause();
    }

    pub fn toggle_pause(&mut self) -> bool {
        let paused = self.driver.toggle_pause();
        if !paused {
            self.ensure_started();
        }
        paused
    }

    pub fn set_speed(&mut self, mph: f64) -> f64 {
        self.driver.set_speed(mph)
    }

    /// Jump along the route. Skipped distance is not counted as driven.
    pub fn seek(&mut self, target_meters: f64) -> f64 {
        let applied = self.driver.seek(target_meters);
        if self.driver.is_ready() && self.telemetry.is_active() && !self.finished {
            self.telemetry.reanchor(applied, &self.zones);
        }
        applied
    }

    /// Advance the simulator one tick, publish the position and record it.
    pub fn tick(&mut self) -> Option<PositionUpdate> {
        let update = self.driver.tick()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.publish(&update);
        }
        self.telemetry
            .on_sample(update.distance_along, update.speed_mph, &self.zones);
        Some(update)
    }

    /// Record a real GPS fix already projected onto the route.
    pub fn ingest_fix(&mut self, distance_along_route: f64, speed_mph: f64) {
        self.ensure_started();
        self.telemetry
            .on_sample(distance_along_route, speed_mph, &self.zones);
    }

    // ========================================================================
    // Callouts
    // ========================================================================

    pub fn record_curve_callout(&mut self, callout: CurveCallout) {
        self.telemetry.record_curve_callout(callout);
    }

    pub fn record_callout_spoken(&mut self) {
        self.telemetry.record_callout_spoken();
    }

    pub fn was_moving_recently(&self) -> bool {
        self.telemetry.was_moving_recently()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn progress(&self) -> SimulationProgress {
        self.driver.progress()
    }

    pub fn live_stats(&self) -> DriveStats {
        self.telemetry.live_stats()
    }

    pub fn driver(&self) -> &SimulationDriver<C> {
        &self.driver
    }

    pub fn telemetry(&self) -> &TelemetryAggregator<C> {
        &self.telemetry
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// End the drive: stop the simulator, release the route, and return the
    /// final report. Repeated calls return the same report.
    pub fn finish(&mut self) -> DriveStats {
        if !self.finished {
            self.driver.stop();
            self.finished = true;
        }
        let stats = self.telemetry.flush();
        info!(
            "[DriveSession] Drive finished: {:.1} km, {} zones",
            stats.total_distance / 1000.0,
            stats.zone_breakdown.len()
        );
        stats
    }
}
