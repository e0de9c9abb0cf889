//! Distance-along-route index over an immutable route polyline.
//!
//! A [`RoutePathIndex`] precomputes per-segment lengths once and then answers
//! "where am I, and which way am I facing, `d` meters along this route".
//! The index is read-only after construction and can be shared freely.

use geo::{Coord, LineString};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, TelemetryError};
use crate::geo_utils::{bearing_degrees, haversine_distance, interpolate};
use crate::GpsPoint;

/// Minimum number of coordinates needed to form a route.
pub const MIN_ROUTE_POINTS: usize = 2;

/// Default number of segments the heading looks ahead.
pub const DEFAULT_HEADING_LOOKAHEAD: usize = 5;

/// Tolerance used when checking that segment lengths add up to the total.
const LENGTH_TOLERANCE: f64 = 1e-6;

/// A resolved position along the route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PathPosition {
    /// Interpolated coordinate on the polyline
    pub position: GpsPoint,
    /// Compass heading in degrees `[0, 360)`
    pub heading: f64,
    /// Index of the segment containing the position
    pub segment_index: u32,
}

/// Route geometry plus its segment table.
#[derive(Debug, Clone)]
pub struct RoutePathIndex {
    coordinates: Vec<GpsPoint>,
    segment_lengths: Vec<f64>,
    /// `cumulative[i]` is the distance from the route start to coordinate `i`
    cumulative: Vec<f64>,
    total_length: f64,
    heading_lookahead: usize,
}

impl RoutePathIndex {
    /// Index a route from ordered GPS points.
    ///
    /// Fails with [`TelemetryError::EmptyRoute`] for fewer than two points and
    /// with [`TelemetryError::InvalidCoordinates`] if any point is out of range.
    /// A route is either indexed whole or not at all.
    ///
    /// # Example
    /// ```
    /// use drive_telemetry::{GpsPoint, RoutePathIndex};
    ///
    /// let index = RoutePathIndex::build(vec![
    ///     GpsPoint::new(46.0, 7.0),
    ///     GpsPoint::new(46.01, 7.0),
    /// ]).unwrap();
    /// let halfway = index.position_at_distance(index.total_length() / 2.0);
    /// assert!((halfway.position.latitude - 46.005).abs() < 1e-9);
    /// ```
    pub fn build(coordinates: Vec<GpsPoint>) -> Result<Self> {
        Self::build_with_lookahead(coordinates, DEFAULT_HEADING_LOOKAHEAD)
    }

    /// Index a route with a custom heading look-ahead (in segments, minimum 1).
    pub fn build_with_lookahead(coordinates: Vec<GpsPoint>, heading_lookahead: usize) -> Result<Self> {
        let point_count = coordinates.len();
        let coordinates = Some(coordinates)
            .filter(|c| c.len() >= MIN_ROUTE_POINTS)
            .ok_or_empty_route(point_count, MIN_ROUTE_POINTS)?;

        if let Some((i, bad)) = coordinates.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(TelemetryError::InvalidCoordinates {
                message: format!(
                    "point {} ({}, {}) is out of range",
                    i, bad.latitude, bad.longitude
                ),
            });
        }

        let segment_lengths: Vec<f64> = coordinates
            .windows(2)
            .map(|w| haversine_distance(&w[0], &w[1]))
            .collect();

        let mut cumulative = Vec::with_capacity(coordinates.len());
        let mut running = 0.0;
        cumulative.push(0.0);
        for len in &segment_lengths {
            running += len;
            cumulative.push(running);
        }
        let total_length = running;

        debug_assert!(
            (segment_lengths.iter().sum::<f64>() - total_length).abs()
                <= LENGTH_TOLERANCE * total_length.max(1.0)
        );

        info!(
            "[PathIndex] Indexed route: {} points, {} segments, {:.0}m",
            coordinates.len(),
            segment_lengths.len(),
            total_length
        );

        Ok(Self {
            coordinates,
            segment_lengths,
            cumulative,
            total_length,
            heading_lookahead: heading_lookahead.max(1),
        })
    }

    /// Index a route from a `geo` line string (x = longitude, y = latitude).
    pub fn from_line_string(line: &LineString<f64>) -> Result<Self> {
        let points = line.coords().map(|c| GpsPoint::new(c.y, c.x)).collect();
        Self::build(points)
    }

    /// Index a route from a Google encoded polyline, as returned by most
    /// routing services. `precision` is 5 for Google/OSRM, 6 for Valhalla.
    pub fn from_encoded_polyline(encoded: &str, precision: u32) -> Result<Self> {
        let line = polyline::decode_polyline(encoded, precision)
            .map_err(|e| TelemetryError::InvalidCoordinates {
                message: e.to_string(),
            })?;
        Self::from_line_string(&line)
    }

    /// Resolve the coordinate, heading and segment at `distance` meters along
    /// the route. `distance` is clamped to `[0, total_length]`.
    pub fn position_at_distance(&self, distance: f64) -> PathPosition {
        let last = self.coordinates.len() - 1;
        let distance = if distance.is_finite() {
            distance.clamp(0.0, self.total_length)
        } else {
            0.0
        };

        if distance >= self.total_length {
            return PathPosition {
                position: self.coordinates[last],
                heading: bearing_degrees(&self.coordinates[last - 1], &self.coordinates[last]),
                segment_index: (last - 1) as u32,
            };
        }

        let segment = self.segment_at(distance);
        let start = &self.coordinates[segment];
        let end = &self.coordinates[segment + 1];
        let length = self.segment_lengths[segment];
        let fraction = if length > 0.0 {
            (distance - self.cumulative[segment]) / length
        } else {
            0.0
        };
        let position = interpolate(start, end, fraction);

        let ahead = (segment + self.heading_lookahead).min(last);
        let heading = bearing_degrees(&position, &self.coordinates[ahead]);

        PathPosition {
            position,
            heading,
            segment_index: segment as u32,
        }
    }

    /// Index of the segment containing `distance`, for `distance < total_length`.
    ///
    /// Binary search over the cumulative table. Zero-length segments are
    /// skipped because the search lands on the last segment starting at or
    /// before `distance`.
    fn segment_at(&self, distance: f64) -> usize {
        let segment_starts = &self.cumulative[..self.segment_lengths.len()];
        let after = segment_starts.partition_point(|&start| start <= distance);
        after.saturating_sub(1)
    }

    /// Total route length in meters.
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    /// Per-segment lengths in meters; one fewer than the coordinate count.
    pub fn segment_lengths(&self) -> &[f64] {
        &self.segment_lengths
    }

    /// Route coordinates in travel order.
    pub fn coordinates(&self) -> &[GpsPoint] {
        &self.coordinates
    }

    /// Number of coordinates.
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Always false: an index holds at least two coordinates.
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Distance from the route start to the start of segment `index`.
    pub fn distance_to_segment_start(&self, index: usize) -> Option<f64> {
        if index >= self.segment_lengths.len() {
            return None;
        }
        self.cumulative.get(index).copied()
    }

    /// The route as a `geo` line string (x = longitude, y = latitude).
    pub fn to_line_string(&self) -> LineString<f64> {
        self.coordinates
            .iter()
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect()
    }

    /// First coordinate of the route.
    pub fn start(&self) -> GpsPoint {
        self.coordinates[0]
    }

    /// Last coordinate of the route.
    pub fn end(&self) -> GpsPoint {
        self.coordinates[self.coordinates.len() - 1]
    }
}
