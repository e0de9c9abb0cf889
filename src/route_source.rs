//! Route sources: collaborators that turn waypoints into a drivable polyline.
//!
//! Route computation itself lives outside this crate. A host adapts its
//! routing service to [`RouteSource`]; the simulator only indexes what it
//! gets back.

use log::debug;

use crate::error::{OptionExt, Result, TelemetryError};
use crate::path_index::MIN_ROUTE_POINTS;
use crate::GpsPoint;

/// Supplies route geometry for a set of ordered waypoints.
pub trait RouteSource {
    /// Return the drivable polyline through `waypoints`, in travel order.
    fn fetch_route(&self, waypoints: &[GpsPoint]) -> Result<Vec<GpsPoint>>;
}

/// A source that always returns the same polyline, ignoring waypoints.
///
/// Used for pre-recorded demo routes and tests.
#[derive(Debug, Clone)]
pub struct StaticRouteSource {
    points: Vec<GpsPoint>,
}

impl StaticRouteSource {
    pub fn new(points: Vec<GpsPoint>) -> Self {
        Self { points }
    }
}

impl RouteSource for StaticRouteSource {
    fn fetch_route(&self, _waypoints: &[GpsPoint]) -> Result<Vec<GpsPoint>> {
        Ok(self.points.clone())
    }
}

/// A source holding a Google encoded polyline, as cached from a routing API.
#[derive(Debug, Clone)]
pub struct EncodedPolylineSource {
    encoded: String,
    precision: u32,
}

impl EncodedPolylineSource {
    pub fn new(encoded: impl Into<String>, precision: u32) -> Self {
        Self {
            encoded: encoded.into(),
            precision,
        }
    }
}

impl RouteSource for EncodedPolylineSource {
    fn fetch_route(&self, _waypoints: &[GpsPoint]) -> Result<Vec<GpsPoint>> {
        let line = polyline::decode_polyline(&self.encoded, self.precision)
            .map_err(|e| TelemetryError::RouteFetch {
                message: e.to_string(),
            })?;
        debug!("[RouteSource] Decoded {} points from polyline", line.0.len());
        Ok(line.coords().map(|c| GpsPoint::new(c.y, c.x)).collect())
    }
}

impl<F> RouteSource for F
where
    F: Fn(&[GpsPoint]) -> Result<Vec<GpsPoint>>,
{
    fn fetch_route(&self, waypoints: &[GpsPoint]) -> Result<Vec<GpsPoint>> {
        self(waypoints)
    }
}

/// Fetch from `source` and reject anything too short to index.
pub(crate) fn fetch_checked(source: &dyn RouteSource, waypoints: &[GpsPoint]) -> Result<Vec<GpsPoint>> {
    let points = source
        .fetch_route(waypoints)
        .map_err(TelemetryError::into_fetch_error)?;
    Some(points)
        .filter(|p| p.len() >= MIN_ROUTE_POINTS)
        .ok_or_fetch_error("route source returned fewer than 2 points")
}
