//! # Drive Telemetry
//!
//! Route-following drive simulation and live drive telemetry for a
//! turn-by-turn driving companion.
//!
//! This library provides:
//! - A route path index that resolves any distance along a polyline to a
//!   position and heading
//! - A simulation driver that moves a virtual vehicle along the route at a
//!   configurable speed, with play/pause/seek
//! - A telemetry aggregator that turns a stream of position/speed samples and
//!   curve callouts into a drive summary with per-zone breakdowns
//!
//! ## Features
//!
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//!
//! ## Quick Start
//!
//! ```rust
//! use drive_telemetry::{
//!     DriveConfig, DriveSession, GpsPoint, ManualClock, RouteZone, StaticRouteSource, ZoneCharacter,
//! };
//!
//! let route: Vec<GpsPoint> = (0..=10)
//!     .map(|i| GpsPoint::new(51.50 + i as f64 * 0.001, -0.12))
//!     .collect();
//!
//! let clock = ManualClock::new(0);
//! let mut session = DriveSession::with_clock(DriveConfig::default(), clock.clone());
//! session.load_route(&StaticRouteSource::new(route), &[]).unwrap();
//! session.set_zones(vec![RouteZone::new(0.0, 2000.0, ZoneCharacter::Urban)]);
//!
//! session.play();
//! for _ in 0..30 {
//!     clock.advance(1000);
//!     session.tick();
//! }
//!
//! let stats = session.finish();
//! println!("{}", stats.to_json());
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TelemetryError};

// Geographic utilities (distance, bearing, interpolation)
pub mod geo_utils;

// Injectable wall-clock time
pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

// Tunables
pub mod config;
pub use config::{DriveConfig, SimulationConfig, TelemetryConfig};

// Distance -> position lookup over a route polyline
pub mod path_index;
pub use path_index::{PathPosition, RoutePathIndex};

// Route geometry providers
pub mod route_source;
pub use route_source::{EncodedPolylineSource, RouteSource, StaticRouteSource};

// Route-following position simulator
pub mod simulation;
pub use simulation::{
    PositionSink, PositionUpdate, SimulationDriver, SimulationPhase, SimulationProgress,
    SimulationState, MPS_PER_MPH,
};

// Route zones and dwell accounting
pub mod zones;
pub use zones::{RouteZone, ZoneBreakdown, ZoneBreakdownRecord, ZoneCharacter};

// Drive telemetry aggregation
pub mod telemetry;
pub use telemetry::{CurveCallout, CurveDirection, DriveStats, FastestApex, TelemetryAggregator};

// One drive: driver + aggregator
pub mod session;
pub use session::DriveSession;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("DriveTelemetryRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use drive_telemetry::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}
