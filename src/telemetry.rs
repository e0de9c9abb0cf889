//! # Telemetry Aggregator
//!
//! Turns a live stream of (distance along route, speed, zone list) samples
//! plus curve callout events into a [`DriveStats`] report.
//!
//! The aggregator has no timers of its own. It reads the clock whenever the
//! host hands it a sample or an event, so it behaves the same whether the
//! stream comes from the simulator or from real GPS.
//!
//! ## Accounting
//! - Every sample updates total distance, drive time and top speed.
//! - Speed samples are retained at most once per `sample_interval_ms`, in a
//!   rolling window of `sample_window` entries; average speed is the mean of
//!   that window.
//! - Zone dwell is tracked through a single open [`ZoneEntry`]. Crossing into a
//!   zone of a different character closes the entry at the zone boundary (time
//!   interpolated between samples) and opens a new one.
//! - A curve callout opens an apex window that watches the peak speed for
//!   `apex_window_ms`; the fastest committed apex of the drive is kept.
//!
//! ## Example
//! ```rust
//! use drive_telemetry::{ManualClock, RouteZone, TelemetryAggregator, TelemetryConfig, ZoneCharacter};
//!
//! let clock = ManualClock::new(0);
//! let mut telemetry = TelemetryAggregator::with_config(TelemetryConfig::default(), clock.clone());
//! let zones = vec![RouteZone::new(0.0, 10_000.0, ZoneCharacter::Transit)];
//!
//! telemetry.start();
//! for second in 1..=60 {
//!     clock.advance(1000);
//!     telemetry.on_sample(second as f64 * 30.0, 67.0, &zones);
//! }
//! let stats = telemetry.flush();
//! assert_eq!(stats.top_speed, 67.0);
//! assert_eq!(stats.highway_distance, 1800.0);
//! ```

use std::collections::VecDeque;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::TelemetryConfig;
use crate::zones::{
    resolve_character, RouteZone, ZoneBreakdown, ZoneBreakdownRecord, ZoneCharacter, ZoneEntry,
};

// ============================================================================
// Types
// ============================================================================

/// Which way a curve bends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "lowercase")]
pub enum CurveDirection {
    Left,
    Right,
}

/// A spoken curve warning, as reported by the callout planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CurveCallout {
    /// Curve severity in degrees
    pub angle: f64,
    pub direction: CurveDirection,
    /// Route mile marker where the curve sits
    pub mile: f64,
}

impl CurveCallout {
    pub fn new(angle: f64, direction: CurveDirection, mile: f64) -> Self {
        Self {
            angle,
            direction,
            mile,
        }
    }
}

/// Fastest observed pass through a called-out curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FastestApex {
    /// Peak speed in mph, rounded to the nearest whole mph
    pub speed: f64,
    pub curve_angle: f64,
    pub curve_direction: CurveDirection,
    pub mile: f64,
}

/// Summary of one drive.
///
/// Speeds are in mph, distances in meters, times in seconds and `start_time`
/// in milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DriveStats {
    pub start_time: i64,
    pub total_distance: f64,
    pub drive_time: f64,
    pub avg_speed: f64,
    pub top_speed: f64,
    pub technical_time: f64,
    pub technical_curves: u32,
    pub technical_avg_speed: f64,
    pub technical_distance: f64,
    pub highway_time: f64,
    pub highway_avg_speed: f64,
    pub highway_top_speed: f64,
    pub highway_distance: f64,
    pub fastest_apex: Option<FastestApex>,
    pub hardest_curve: Option<CurveCallout>,
    pub callouts_delivered: u32,
    pub zone_breakdown: Vec<ZoneBreakdownRecord>,
}

impl DriveStats {
    fn empty(start_time: i64) -> Self {
        Self {
            start_time,
            total_distance: 0.0,
            drive_time: 0.0,
            avg_speed: 0.0,
            top_speed: 0.0,
            technical_time: 0.0,
            technical_curves: 0,
            technical_avg_speed: 0.0,
            technical_distance: 0.0,
            highway_time: 0.0,
            highway_avg_speed: 0.0,
            highway_top_speed: 0.0,
            highway_distance: 0.0,
            fastest_apex: None,
            hardest_curve: None,
            callouts_delivered: 0,
            zone_breakdown: Vec::new(),
        }
    }

    /// Serialize for the report consumer.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Observation window opened by a curve callout.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ApexWindow {
    opened_at_ms: i64,
    curve_angle: f64,
    curve_direction: CurveDirection,
    mile: f64,
    max_speed_seen: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SpeedSample {
    timestamp_ms: i64,
    speed: f64,
}

// ============================================================================
// Aggregator
// ============================================================================

/// Accumulates one drive's telemetry.
pub struct TelemetryAggregator<C: Clock = SystemClock> {
    config: TelemetryConfig,
    clock: C,
    active: bool,
    stats: DriveStats,
    breakdown: ZoneBreakdown,
    zone_entry: Option<ZoneEntry>,
    apex: Option<ApexWindow>,
    speed_samples: VecDeque<SpeedSample>,
    technical_samples: VecDeque<f64>,
    transit_samples: VecDeque<f64>,
    last_retained_ms: Option<i64>,
    last_distance: f64,
    last_sample_ms: i64,
    last_speed: f64,
    flushed_at_ms: Option<i64>,
}

impl TelemetryAggregator<SystemClock> {
    /// Create an aggregator on the system clock with default configuration.
    pub fn new() -> Self {
        Self::with_config(TelemetryConfig::default(), SystemClock)
    }
}

impl Default for TelemetryAggregator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TelemetryAggregator<C> {
    pub fn with_config(config: TelemetryConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            active: false,
            stats: DriveStats::empty(0),
            breakdown: ZoneBreakdown::new(),
            zone_entry: None,
            apex: None,
            speed_samples: VecDeque::new(),
            technical_samples: VecDeque::new(),
            transit_samples: VecDeque::new(),
            last_retained_ms: None,
            last_distance: 0.0,
            last_sample_ms: 0,
            last_speed: 0.0,
            flushed_at_ms: None,
        }
    }

    /// Reset all accumulators and start a new drive at the current time,
    /// from the route start.
    pub fn start(&mut self) {
        self.start_at(0.0);
    }

    /// Start a new drive with the vehicle already `distance` meters along the
    /// route. Distance before the anchor is never credited.
    pub fn start_at(&mut self, distance: f64) {
        let distance = if distance.is_finite() {
            distance.max(0.0)
        } else {
            0.0
        };
        let now = self.clock.now_ms();
        self.active = true;
        self.stats = DriveStats::empty(now);
        self.breakdown.clear();
        self.zone_entry = None;
        self.apex = None;
        self.speed_samples.clear();
        self.technical_samples.clear();
        self.transit_samples.clear();
        self.last_retained_ms = None;
        self.last_distance = distance;
        self.last_sample_ms = now;
        self.last_speed = 0.0;
        self.flushed_at_ms = None;
        info!("[Telemetry] Drive started at {:.0}m", distance);
    }

    /// Move the vehicle to `distance` (a seek) without crediting the jump.
    ///
    /// The open zone entry closes at the last sampled distance and a fresh one
    /// opens at `distance`.
    pub fn reanchor(&mut self, distance: f64, zones: &[RouteZone]) {
        if !self.active || !distance.is_finite() {
            return;
        }
        let now = self.clock.now_ms();
        self.flushed_at_ms = None;
        debug!(
            "[Telemetry] Reanchored {:.0}m -> {:.0}m",
            self.last_distance, distance
        );
        self.restart_zone_entry(zones, distance, now);
        self.last_distance = distance;
        self.last_sample_ms = now;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    // ========================================================================
    // Sample Ingestion
    // ========================================================================

    /// Feed one position/speed update.
    ///
    /// `distance_along_route` is in meters, `speed_now` in mph, and `zones` is
    /// the classifier's zone list for this route. Samples are expected in
    /// non-decreasing distance order; a backward jump (e.g. after a seek) closes
    /// the current zone entry without crediting negative distance and starts a
    /// fresh one at the new position.
    pub fn on_sample(&mut self, distance_along_route: f64, speed_now: f64, zones: &[RouteZone]) {
        if !self.active {
            debug!("[Telemetry] Sample ignored: no active drive");
            return;
        }
        if !distance_along_route.is_finite() {
            debug!("[Telemetry] Sample ignored: distance {}", distance_along_route);
            return;
        }
        let speed = if speed_now.is_finite() {
            speed_now.max(0.0)
        } else {
            0.0
        };

        let now = self.clock.now_ms();
        self.flushed_at_ms = None;

        let prev_distance = self.last_distance;
        let prev_ms = self.last_sample_ms.min(now);

        if distance_along_route >= prev_distance {
            self.stats.total_distance += distance_along_route - prev_distance;
            self.advance_zone_dwell(zones, prev_distance, prev_ms, distance_along_route, now);
        } else {
            debug!(
                "[Telemetry] Backward jump {:.0}m -> {:.0}m, restarting zone entry",
                prev_distance, distance_along_route
            );
            self.restart_zone_entry(zones, distance_along_route, now);
        }

        self.last_distance = distance_along_route;
        self.last_sample_ms = now;
        self.last_speed = speed;
        self.stats.drive_time = elapsed_secs(self.stats.start_time, now);
        self.stats.top_speed = self.stats.top_speed.max(speed);

        self.observe_apex(speed, now);
        self.retain_speed_sample(speed, now);
    }

    /// Walk the zone boundaries between two samples, closing and opening
    /// entries at each change of character.
    fn advance_zone_dwell(
        &mut self,
        zones: &[RouteZone],
        from_distance: f64,
        from_ms: i64,
        to_distance: f64,
        to_ms: i64,
    ) {
        let time_at = |distance: f64| -> i64 {
            let span = to_distance - from_distance;
            if span <= 0.0 {
                return to_ms;
            }
            let fraction = (distance - from_distance) / span;
            from_ms + ((to_ms - from_ms) as f64 * fraction).round() as i64
        };

        let mut cuts: Vec<f64> = zones
            .iter()
            .flat_map(|z| [z.start_distance, z.end_distance])
            .filter(|&b| b > from_distance && b < to_distance)
            .collect();
        cuts.sort_by(f64::total_cmp);
        cuts.dedup();

        let mut span_start = from_distance;
        for cut in cuts.into_iter().chain(std::iter::once(to_distance)) {
            let character = resolve_character(zones, (span_start + cut) / 2.0);
            self.transition_to(character, span_start, time_at(span_start));
            span_start = cut;
        }
        // The sample itself may sit exactly on a boundary
        self.transition_to(resolve_character(zones, to_distance), to_distance, to_ms);
    }

    /// Close the open entry at the last sampled distance and open one at
    /// `distance`, crediting nothing in between.
    fn restart_zone_entry(&mut self, zones: &[RouteZone], distance: f64, timestamp_ms: i64) {
        self.close_zone_entry(self.last_distance, timestamp_ms);
        self.open_zone_entry(resolve_character(zones, distance), distance, timestamp_ms);
    }

    /// Make `character` the current zone, closing the previous entry at
    /// (`distance`, `timestamp_ms`) if it differs.
    fn transition_to(&mut self, character: ZoneCharacter, distance: f64, timestamp_ms: i64) {
        if matches!(self.zone_entry, Some(entry) if entry.character == character) {
            return;
        }
        self.close_zone_entry(distance, timestamp_ms);
        self.open_zone_entry(character, distance, timestamp_ms);
    }

    fn open_zone_entry(&mut self, character: ZoneCharacter, distance: f64, timestamp_ms: i64) {
        debug!("[Telemetry] Entered {} zone at {:.0}m", character, distance);
        self.zone_entry = Some(ZoneEntry {
            character,
            entry_timestamp_ms: timestamp_ms,
            entry_distance: distance,
        });
    }

    /// Close the open zone entry, merging its span into the breakdown.
    fn close_zone_entry(&mut self, distance: f64, timestamp_ms: i64) {
        let Some(entry) = self.zone_entry.take() else {
            return;
        };
        let dwell_distance = (distance - entry.entry_distance).max(0.0);
        let dwell_time = elapsed_secs(entry.entry_timestamp_ms, timestamp_ms);

        self.breakdown.merge(entry.character, dwell_distance, dwell_time);
        match entry.character {
            ZoneCharacter::Technical => self.stats.technical_time += dwell_time,
            ZoneCharacter::Transit => self.stats.highway_time += dwell_time,
            _ => {}
        }
        debug!(
            "[Telemetry] Left {} zone: {:.0}m in {:.1}s",
            entry.character, dwell_distance, dwell_time
        );
    }

    fn retain_speed_sample(&mut self, speed: f64, now: i64) {
        let due = self
            .last_retained_ms
            .map_or(true, |last| now - last >= self.config.sample_interval_ms as i64);
        if !due {
            return;
        }
        self.last_retained_ms = Some(now);

        let window = self.config.sample_window as usize;
        push_bounded(
            &mut self.speed_samples,
            SpeedSample {
                timestamp_ms: now,
                speed,
            },
            window,
        );
        if let Some(avg) = mean(self.speed_samples.iter().map(|s| s.speed)) {
            self.stats.avg_speed = avg;
        }

        match self.current_zone() {
            Some(ZoneCharacter::Technical) => push_bounded(&mut self.technical_samples, speed, window),
            Some(ZoneCharacter::Transit) => push_bounded(&mut self.transit_samples, speed, window),
            _ => {}
        }
    }

    // ========================================================================
    // Curve Callouts
    // ========================================================================

    /// Record a curve warning at the moment it is spoken.
    pub fn record_curve_callout(&mut self, callout: CurveCallout) {
        if !self.active {
            debug!("[Telemetry] Curve callout ignored: no active drive");
            return;
        }
        let now = self.clock.now_ms();
        self.flushed_at_ms = None;

        if callout.angle.is_finite()
            && self
                .stats
                .hardest_curve
                .map_or(true, |hardest| callout.angle > hardest.angle)
        {
            self.stats.hardest_curve = Some(callout);
        }

        if self.current_zone() == Some(ZoneCharacter::Technical) {
            self.stats.technical_curves += 1;
        }

        // A new callout supersedes the live window; keep what it saw
        self.commit_apex();
        self.apex = Some(ApexWindow {
            opened_at_ms: now,
            curve_angle: callout.angle,
            curve_direction: callout.direction,
            mile: callout.mile,
            max_speed_seen: self.last_speed,
        });
        debug!(
            "[Telemetry] Apex window opened: {:.0} deg {:?} at mile {:.1}",
            callout.angle, callout.direction, callout.mile
        );
    }

    /// Count any spoken callout, curve or otherwise.
    pub fn record_callout_spoken(&mut self) {
        if self.active {
            self.stats.callouts_delivered += 1;
        }
    }

    fn observe_apex(&mut self, speed: f64, now: i64) {
        let expired = self
            .apex
            .map_or(false, |w| now - w.opened_at_ms > self.config.apex_window_ms as i64);
        if expired {
            self.commit_apex();
        }
        if let Some(window) = self.apex.as_mut() {
            window.max_speed_seen = window.max_speed_seen.max(speed);
        }
    }

    /// Close the apex window, keeping it if it beat the fastest apex so far.
    fn commit_apex(&mut self) {
        let Some(window) = self.apex.take() else {
            return;
        };
        let beats_record = self
            .stats
            .fastest_apex
            .map_or(true, |best| window.max_speed_seen > best.speed);
        if beats_record {
            debug!(
                "[Telemetry] New fastest apex: {:.0} mph through {:.0} deg curve",
                window.max_speed_seen, window.curve_angle
            );
            self.stats.fastest_apex = Some(FastestApex {
                speed: window.max_speed_seen.round(),
                curve_angle: window.curve_angle,
                curve_direction: window.curve_direction,
                mile: window.mile,
            });
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// True if any retained sample from the last `moving_lookback_ms` exceeds
    /// the moving threshold. Lets the host tell a genuine stop at the finish
    /// line from GPS noise.
    pub fn was_moving_recently(&self) -> bool {
        let cutoff = self.clock.now_ms() - self.config.moving_lookback_ms as i64;
        self.speed_samples
            .iter()
            .rev()
            .take_while(|s| s.timestamp_ms >= cutoff)
            .any(|s| s.speed > self.config.moving_threshold_mph)
    }

    /// Character of the zone currently being dwelled in.
    pub fn current_zone(&self) -> Option<ZoneCharacter> {
        self.zone_entry.map(|e| e.character)
    }

    /// Running summary without closing anything.
    ///
    /// The open zone entry is credited up to the last sample. A still-open
    /// apex window is not reflected until it closes.
    pub fn live_stats(&self) -> DriveStats {
        let mut breakdown = self.breakdown.clone();
        let mut stats = self.stats.clone();
        if let Some(entry) = self.zone_entry {
            let distance = (self.last_distance - entry.entry_distance).max(0.0);
            let time = elapsed_secs(entry.entry_timestamp_ms, self.last_sample_ms);
            breakdown.merge(entry.character, distance, time);
            match entry.character {
                ZoneCharacter::Technical => stats.technical_time += time,
                ZoneCharacter::Transit => stats.highway_time += time,
                _ => {}
            }
        }
        self.derive(stats, &breakdown)
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Close everything still open and return the final report.
    ///
    /// Safe to call more than once: without new samples in between, repeated
    /// calls return identical stats.
    pub fn flush(&mut self) -> DriveStats {
        if self.flushed_at_ms.is_none() {
            let now = self.clock.now_ms();
            self.commit_apex();
            self.close_zone_entry(self.last_distance, now);
            if self.active {
                self.stats.drive_time = elapsed_secs(self.stats.start_time, now);
            }
            // A sample after the flush reopens accounting from here
            self.last_sample_ms = now;
            self.flushed_at_ms = Some(now);
        }

        let stats = self.derive(self.stats.clone(), &self.breakdown);
        info!(
            "[Telemetry] Drive flushed: {:.0}m in {:.0}s, avg {:.1} mph, top {:.1} mph, {} callouts",
            stats.total_distance,
            stats.drive_time,
            stats.avg_speed,
            stats.top_speed,
            stats.callouts_delivered
        );
        debug!(
            "[Telemetry] Zone breakdown covers {:.0}m in {:.0}s",
            self.breakdown.total_distance(),
            self.breakdown.total_time()
        );
        stats
    }

    /// Fill in fields derived from the sample buffers and zone breakdown.
    fn derive(&self, mut stats: DriveStats, breakdown: &ZoneBreakdown) -> DriveStats {
        if let Some(avg) = mean(self.speed_samples.iter().map(|s| s.speed)) {
            stats.avg_speed = avg;
        }
        if let Some(avg) = mean(self.technical_samples.iter().copied()) {
            stats.technical_avg_speed = avg;
        }
        if let Some(avg) = mean(self.transit_samples.iter().copied()) {
            stats.highway_avg_speed = avg;
        }
        if let Some(top) = self.transit_samples.iter().copied().reduce(f64::max) {
            stats.highway_top_speed = top;
        }
        stats.technical_distance = breakdown.distance_for(ZoneCharacter::Technical);
        stats.highway_distance = breakdown.distance_for(ZoneCharacter::Transit);
        stats.zone_breakdown = breakdown.records().to_vec();
        stats
    }
}

fn elapsed_secs(from_ms: i64, to_ms: i64) -> f64 {
    (to_ms - from_ms).max(0) as f64 / 1000.0
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, value: T, capacity: usize) {
    while buffer.len() >= capacity.max(1) {
        buffer.pop_front();
    }
    buffer.push_back(value);
}

/// Arithmetic mean, `None` for an empty sequence.
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count > 0 {
        Some(sum / count as f64)
    } else {
        None
    }
}
