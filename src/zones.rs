//! Route zones and per-zone dwell accounting.
//!
//! A zone classifier (outside this crate) splits the route into stretches such
//! as `urban`, `technical` or `transit`. This module resolves which zone a
//! distance falls in and accumulates how much distance and time the drive
//! spent in each zone character.
//!
//! ## Example
//! ```rust
//! use drive_telemetry::zones::{resolve_character, RouteZone, ZoneCharacter};
//!
//! let zones = vec![
//!     RouteZone::new(0.0, 100.0, ZoneCharacter::Urban),
//!     RouteZone::new(100.0, 500.0, ZoneCharacter::Technical),
//! ];
//! assert_eq!(resolve_character(&zones, 50.0), ZoneCharacter::Urban);
//! assert_eq!(resolve_character(&zones, 100.0), ZoneCharacter::Technical);
//! assert_eq!(resolve_character(&zones, 900.0), ZoneCharacter::Unclassified);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Driving character of a stretch of road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "lowercase")]
pub enum ZoneCharacter {
    /// Built-up area, low speeds
    Urban,
    /// Twisty road with frequent curves
    Technical,
    /// Highway / open road
    Transit,
    /// Distance not covered by any classified zone
    Unclassified,
}

impl ZoneCharacter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneCharacter::Urban => "urban",
            ZoneCharacter::Technical => "technical",
            ZoneCharacter::Transit => "transit",
            ZoneCharacter::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ZoneCharacter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified stretch of the route, in meters from the route start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteZone {
    pub start_distance: f64,
    pub end_distance: f64,
    pub character: ZoneCharacter,
}

impl RouteZone {
    pub fn new(start_distance: f64, end_distance: f64, character: ZoneCharacter) -> Self {
        Self {
            start_distance,
            end_distance,
            character,
        }
    }

    /// True if `distance` lies within `[start, end]`.
    pub fn contains(&self, distance: f64) -> bool {
        distance >= self.start_distance && distance <= self.end_distance
    }

    pub fn length(&self) -> f64 {
        (self.end_distance - self.start_distance).max(0.0)
    }
}

/// Find the zone covering `distance`.
///
/// Where two zones share a boundary the later one wins, so a vehicle sitting
/// exactly on a boundary is already in the zone it is entering.
pub fn resolve_zone(zones: &[RouteZone], distance: f64) -> Option<&RouteZone> {
    zones.iter().rev().find(|z| z.contains(distance))
}

/// Character of the zone covering `distance`, or `Unclassified` if none does.
pub fn resolve_character(zones: &[RouteZone], distance: f64) -> ZoneCharacter {
    resolve_zone(zones, distance)
        .map(|z| z.character)
        .unwrap_or(ZoneCharacter::Unclassified)
}

/// Check that zones are ordered by start distance and do not overlap.
pub fn zones_are_ordered(zones: &[RouteZone]) -> bool {
    zones
        .iter()
        .all(|z| z.start_distance <= z.end_distance)
        && zones
            .windows(2)
            .all(|w| w[0].end_distance <= w[1].start_distance)
}

/// Cumulative dwell in one zone character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ZoneBreakdownRecord {
    pub zone: ZoneCharacter,
    /// Cumulative distance in meters
    pub distance: f64,
    /// Cumulative time in seconds
    pub time: f64,
}

/// The zone currently being dwelled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ZoneEntry {
    pub character: ZoneCharacter,
    pub entry_timestamp_ms: i64,
    pub entry_distance: f64,
}

/// Per-character dwell totals, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneBreakdown {
    records: Vec<ZoneBreakdownRecord>,
}

impl ZoneBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a closed dwell span, creating the record if this character is new.
    /// Negative spans are ignored.
    pub fn merge(&mut self, zone: ZoneCharacter, distance: f64, time_secs: f64) {
        let distance = if distance.is_finite() { distance.max(0.0) } else { 0.0 };
        let time = if time_secs.is_finite() { time_secs.max(0.0) } else { 0.0 };

        match self.records.iter_mut().find(|r| r.zone == zone) {
            Some(record) => {
                record.distance += distance;
                record.time += time;
            }
            None => self.records.push(ZoneBreakdownRecord {
                zone,
                distance,
                time,
            }),
        }
    }

    pub fn records(&self) -> &[ZoneBreakdownRecord] {
        &self.records
    }

    /// Total distance dwelled in `zone`, 0 if never entered.
    pub fn distance_for(&self, zone: ZoneCharacter) -> f64 {
        self.records
            .iter()
            .filter(|r| r.zone == zone)
            .map(|r| r.distance)
            .sum()
    }

    pub fn total_distance(&self) -> f64 {
        self.records.iter().map(|r| r.distance).sum()
    }

    pub fn total_time(&self) -> f64 {
        self.records.iter().map(|r| r.time).sum()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
