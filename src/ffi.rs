//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Exposes a drive session to Kotlin and Swift as a UniFFI object. Calls
//! never throw across the boundary: failures are logged and reported as
//! `false` / `None`.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use crate::route_source::{EncodedPolylineSource, StaticRouteSource};
use crate::{
    init_logging, CurveCallout, DriveConfig, DriveSession, DriveStats, GpsPoint, PositionSink,
    PositionUpdate, RouteZone, SimulationProgress,
};

// ============================================================================
// Position Callback Interface
// ============================================================================

/// Receives each simulated position as it is published.
/// Implement this in Kotlin/Swift to move the map marker.
#[uniffi::export(callback_interface)]
pub trait PositionListener: Send + Sync {
    fn on_position(&self, update: PositionUpdate);
}

struct ListenerSink(Box<dyn PositionListener>);

impl PositionSink for ListenerSink {
    fn publish(&mut self, update: &PositionUpdate) {
        self.0.on_position(*update);
    }
}

/// Default configuration, for hosts that want to tweak a few fields.
#[uniffi::export]
pub fn default_drive_config() -> DriveConfig {
    DriveConfig::default()
}

// ============================================================================
// Drive Session Object
// ============================================================================

/// One drive, shared with the host behind a lock.
#[derive(uniffi::Object)]
pub struct DriveSessionHandle {
    inner: Mutex<DriveSession>,
}

impl DriveSessionHandle {
    fn session(&self) -> MutexGuard<'_, DriveSession> {
        // A panic mid-call leaves plain data behind; keep serving it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[uniffi::export]
impl DriveSessionHandle {
    /// Create a session. `None` uses the default configuration; an invalid
    /// configuration falls back to the default with a warning.
    #[uniffi::constructor]
    pub fn new(config: Option<DriveConfig>) -> Arc<Self> {
        init_logging();
        let config = match config {
            Some(config) => match config.validate() {
                Ok(()) => config,
                Err(e) => {
                    warn!("[DriveSession] {}; using defaults", e);
                    DriveConfig::default()
                }
            },
            None => DriveConfig::default(),
        };
        info!("[DriveSession] Created session");
        Arc::new(Self {
            inner: Mutex::new(DriveSession::new(config)),
        })
    }

    pub fn set_position_listener(&self, listener: Box<dyn PositionListener>) {
        self.session().set_sink(Box::new(ListenerSink(listener)));
    }

    /// Load a route polyline already fetched by the host.
    pub fn load_route(&self, points: Vec<GpsPoint>) -> bool {
        let source = StaticRouteSource::new(points);
        self.session().load_route(&source, &[]).is_ok()
    }

    /// Load a route from a Google encoded polyline.
    pub fn load_encoded_route(&self, encoded: String, precision: u32) -> bool {
        let source = EncodedPolylineSource::new(encoded, precision);
        self.session().load_route(&source, &[]).is_ok()
    }

    /// Message of the most recent route load failure.
    pub fn last_error(&self) -> Option<String> {
        self.session()
            .driver()
            .last_error()
            .map(|e| e.to_string())
    }

    pub fn set_zones(&self, zones: Vec<RouteZone>) {
        self.session().set_zones(zones);
    }

    pub fn play(&self) -> bool {
        self.session().play()
    }

    pub fn pause(&self) {
        self.session().pause();
    }

    pub fn toggle_pause(&self) -> bool {
        self.session().toggle_pause()
    }

    pub fn set_speed(&self, mph: f64) -> f64 {
        self.session().set_speed(mph)
    }

    pub fn seek(&self, meters: f64) -> f64 {
        self.session().seek(meters)
    }

    /// Call at the configured tick interval (about 1 Hz).
    pub fn tick(&self) -> Option<PositionUpdate> {
        self.session().tick()
    }

    pub fn ingest_fix(&self, distance_along_route: f64, speed_mph: f64) {
        self.session().ingest_fix(distance_along_route, speed_mph);
    }

    pub fn record_curve_callout(&self, callout: CurveCallout) {
        self.session().record_curve_callout(callout);
    }

    pub fn record_callout_spoken(&self) {
        self.session().record_callout_spoken();
    }

    pub fn was_moving_recently(&self) -> bool {
        self.session().was_moving_recently()
    }

    pub fn progress(&self) -> SimulationProgress {
        self.session().progress()
    }

    pub fn live_stats(&self) -> DriveStats {
        self.session().live_stats()
    }

    pub fn finish(&self) -> DriveStats {
        self.session().finish()
    }

    /// Finish and return the report as JSON.
    pub fn finish_json(&self) -> String {
        self.session().finish().to_json()
    }
}
