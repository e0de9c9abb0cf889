//! # Simulation Driver
//!
//! Plays a vehicle along an indexed route so the app has a believable,
//! replayable position / heading / speed stream when no real GPS is available.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --start--> Loading --route indexed--> Ready --play--> Playing <--> Paused
//!       ^                     |                                          |
//!       +----fetch failed-----+                          end of route --> Finished
//! ```
//!
//! The host calls [`SimulationDriver::tick`] at roughly 1 Hz. Each tick
//! advances the distance along the route by the configured speed times the
//! elapsed wall-clock time (capped) and produces one [`PositionUpdate`].

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::SimulationConfig;
use crate::error::{Result, TelemetryError};
use crate::path_index::RoutePathIndex;
use crate::route_source::{fetch_checked, RouteSource};
use crate::GpsPoint;

/// Meters per second in one mile per hour.
pub const MPS_PER_MPH: f64 = 0.44704;

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum SimulationPhase {
    Uninitialized,
    Loading,
    Ready,
    Playing,
    Paused,
    Finished,
}

/// Mutable playback state owned by one driver.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// Meters from the route start, within `[0, total_length]`
    pub distance_along: f64,
    pub paused: bool,
    /// Playback speed, always within the configured bounds
    pub speed_mph: f64,
    /// Baseline for the next tick's elapsed-time computation
    pub last_tick_ms: Option<i64>,
}

/// One published position, delivered atomically to the position sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PositionUpdate {
    pub position: GpsPoint,
    /// Compass heading in degrees `[0, 360)`
    pub heading: f64,
    pub speed_mph: f64,
    pub distance_along: f64,
    pub timestamp_ms: i64,
}

/// Receives published positions (map marker, "current position" state, ...).
pub trait PositionSink {
    fn publish(&mut self, update: &PositionUpdate);
}

impl PositionSink for Vec<PositionUpdate> {
    fn publish(&mut self, update: &PositionUpdate) {
        self.push(*update);
    }
}

/// Read-only snapshot for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SimulationProgress {
    pub paused: bool,
    pub speed_mph: f64,
    pub distance_along: f64,
    pub total_distance: f64,
    pub progress_percent: f64,
    /// `None` until a route is indexed
    pub position: Option<GpsPoint>,
    pub heading: f64,
    pub ready: bool,
    pub phase: SimulationPhase,
}

/// Route-following position simulator.
pub struct SimulationDriver<C: Clock = SystemClock> {
    config: SimulationConfig,
    clock: C,
    route: Option<Arc<RoutePathIndex>>,
    state: SimulationState,
    phase: SimulationPhase,
    last_error: Option<TelemetryError>,
}

impl SimulationDriver<SystemClock> {
    /// Create a driver on the system clock with default configuration.
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default(), SystemClock)
    }
}

impl Default for SimulationDriver<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SimulationDriver<C> {
    /// Create a driver with custom configuration and clock.
    pub fn with_config(config: SimulationConfig, clock: C) -> Self {
        let state = Self::initial_state(&config);
        Self {
            config,
            clock,
            route: None,
            state,
            phase: SimulationPhase::Uninitialized,
            last_error: None,
        }
    }

    fn initial_state(config: &SimulationConfig) -> SimulationState {
        SimulationState {
            distance_along: 0.0,
            paused: true,
            speed_mph: config.clamp_speed(config.default_speed_mph),
            last_tick_ms: None,
        }
    }

    // ========================================================================
    // Route Loading
    // ========================================================================

    /// Enter `Loading`, dropping any previously indexed route.
    ///
    /// Hosts that fetch geometry asynchronously call this, fetch, and then
    /// hand the outcome to [`complete_loading`](Self::complete_loading).
    pub fn begin_loading(&mut self) {
        debug!("[Simulation] Loading route");
        self.route = None;
        self.last_error = None;
        self.state = Self::initial_state(&self.config);
        self.phase = SimulationPhase::Loading;
    }

    /// Finish loading with the route source's result.
    ///
    /// On success the route is indexed and the driver becomes `Ready` at the
    /// route start. On failure the driver returns to `Uninitialized`, keeps the
    /// error in [`last_error`](Self::last_error) and can be retried.
    pub fn complete_loading(&mut self, fetched: Result<Vec<GpsPoint>>) -> Result<()> {
        let lookahead = self.config.heading_lookahead_segments as usize;
        let indexed = fetched
            .and_then(|points| RoutePathIndex::build_with_lookahead(points, lookahead))
            .map_err(TelemetryError::into_fetch_error);

        match indexed {
            Ok(index) => {
                self.install(index);
                Ok(())
            }
            Err(err) => {
                warn!("[Simulation] Route unavailable, simulation not started: {}", err);
                self.route = None;
                self.phase = SimulationPhase::Uninitialized;
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Fetch a route from `source` and index it.
    pub fn start(&mut self, source: &dyn RouteSource, waypoints: &[GpsPoint]) -> Result<()> {
        self.begin_loading();
        let fetched = fetch_checked(source, waypoints);
        self.complete_loading(fetched)
    }

    /// Use an already indexed route.
    pub fn load_index(&mut self, index: RoutePathIndex) {
        self.begin_loading();
        self.install(index);
    }

    fn install(&mut self, index: RoutePathIndex) {
        info!(
            "[Simulation] Ready: {:.0}m route at {:.0} mph",
            index.total_length(),
            self.state.speed_mph
        );
        self.route = Some(Arc::new(index));
        self.state = SimulationState {
            speed_mph: self.state.speed_mph,
            ..Self::initial_state(&self.config)
        };
        self.phase = SimulationPhase::Ready;
    }

    /// Stop the simulation and release the route.
    pub fn stop(&mut self) {
        if self.route.is_some() {
            info!(
                "[Simulation] Stopped at {:.0}m",
                self.state.distance_along
            );
        }
        self.route = None;
        self.state = Self::initial_state(&self.config);
        self.phase = SimulationPhase::Uninitialized;
    }

    // ========================================================================
    // Playback Control
    // ========================================================================

    /// Start or resume playback. Returns whether the driver is now playing.
    ///
    /// No-op once `Finished` until a backward seek, and before a route is ready.
    pub fn play(&mut self) -> bool {
        match self.phase {
            SimulationPhase::Ready | SimulationPhase::Paused => {
                // Time spent paused must not count as driving time
                self.state.last_tick_ms = Some(self.clock.now_ms());
                self.state.paused = false;
                self.phase = SimulationPhase::Playing;
                debug!("[Simulation] Playing from {:.0}m", self.state.distance_along);
                true
            }
            SimulationPhase::Playing => true,
            _ => false,
        }
    }

    /// Pause playback. No-op unless playing.
    pub fn pause(&mut self) {
        if self.phase == SimulationPhase::Playing {
            self.state.paused = true;
            self.phase = SimulationPhase::Paused;
            debug!("[Simulation] Paused at {:.0}m", self.state.distance_along);
        }
    }

    /// Toggle between playing and paused. Returns the new paused flag.
    pub fn toggle_pause(&mut self) -> bool {
        if self.phase == SimulationPhase::Playing {
            self.pause();
        } else {
            self.play();
        }
        self.state.paused
    }

    /// Set playback speed, clamped to the configured bounds. Returns the applied speed.
    pub fn set_speed(&mut self, mph: f64) -> f64 {
        self.state.speed_mph = self.config.clamp_speed(mph);
        self.state.speed_mph
    }

    /// Jump to `target_meters` along the route, clamped to the route.
    /// Returns the applied distance. Playing/paused is unchanged, except that a
    /// finished drive seeking backward becomes paused.
    pub fn seek(&mut self, target_meters: f64) -> f64 {
        let Some(route) = &self.route else {
            return self.state.distance_along;
        };
        let total = route.total_length();
        let target = if target_meters.is_finite() {
            target_meters.clamp(0.0, total)
        } else {
            self.state.distance_along
        };

        self.state.distance_along = target;
        if self.phase == SimulationPhase::Finished && target < total {
            self.phase = SimulationPhase::Paused;
        }
        debug!("[Simulation] Seek to {:.0}m", target);
        target
    }

    /// Advance the simulation by the wall-clock time since the previous tick.
    ///
    /// Returns the new position, or `None` when not playing.
    pub fn tick(&mut self) -> Option<PositionUpdate> {
        if self.phase != SimulationPhase::Playing {
            return None;
        }
        let route = Arc::clone(self.route.as_ref()?);

        let now = self.clock.now_ms();
        let last = self.state.last_tick_ms.unwrap_or(now);
        let dt_ms = (now - last).clamp(0, self.config.max_tick_delta_ms as i64);
        self.state.last_tick_ms = Some(now);

        let speed_mps = self.state.speed_mph * MPS_PER_MPH;
        let advanced = self.state.distance_along + speed_mps * (dt_ms as f64 / 1000.0);
        let total = route.total_length();

        let speed_mph = if advanced >= total {
            self.state.distance_along = total;
            self.state.paused = true;
            self.phase = SimulationPhase::Finished;
            info!("[Simulation] Reached end of route ({:.0}m)", total);
            0.0
        } else {
            self.state.distance_along = advanced;
            self.state.speed_mph
        };

        let resolved = route.position_at_distance(self.state.distance_along);
        Some(PositionUpdate {
            position: resolved.position,
            heading: resolved.heading,
            speed_mph,
            distance_along: self.state.distance_along,
            timestamp_ms: now,
        })
    }

    /// Tick and hand the resulting position to `sink`. Returns whether anything
    /// was published.
    pub fn tick_and_publish(&mut self, sink: &mut dyn PositionSink) -> bool {
        match self.tick() {
            Some(update) => {
                sink.publish(&update);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Snapshot of playback state. Never mutates.
    pub fn progress(&self) -> SimulationProgress {
        let total = self.total_distance();
        let resolved = self
            .route
            .as_ref()
            .map(|r| r.position_at_distance(self.state.distance_along));

        SimulationProgress {
            paused: self.state.paused,
            speed_mph: self.state.speed_mph,
            distance_along: self.state.distance_along,
            total_distance: total,
            progress_percent: if total > 0.0 {
                self.state.distance_along / total * 100.0
            } else {
                0.0
            },
            position: resolved.map(|r| r.position),
            heading: resolved.map(|r| r.heading).unwrap_or(0.0),
            ready: self.is_ready(),
            phase: self.phase,
        }
    }

    /// True once a route is indexed.
    pub fn is_ready(&self) -> bool {
        self.route.is_some()
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Total route length, 0 when no route is loaded.
    pub fn total_distance(&self) -> f64 {
        self.route.as_ref().map(|r| r.total_length()).unwrap_or(0.0)
    }

    /// The indexed route, shareable read-only with other components.
    pub fn route(&self) -> Option<Arc<RoutePathIndex>> {
        self.route.clone()
    }

    /// Most recent loading failure, cleared when loading starts again.
    pub fn last_error(&self) -> Option<&TelemetryError> {
        self.last_error.as_ref()
    }

    /// Current position on the route.
    pub fn current_position(&self) -> Result<PositionUpdate> {
        let route = self.route.as_ref().ok_or(TelemetryError::NotReady)?;
        let resolved = route.position_at_distance(self.state.distance_along);
        Ok(PositionUpdate {
            position: resolved.position,
            heading: resolved.heading,
            speed_mph: if self.phase == SimulationPhase::Playing {
                self.state.speed_mph
            } else {
                0.0
            },
            distance_along: self.state.distance_along,
            timestamp_ms: self.clock.now_ms(),
        })
    }
}
