//! Geographic utilities: great-circle distance, initial bearing and
//! straight-line interpolation between GPS points.
//!
//! All functions are total over finite inputs and never panic.

use crate::GpsPoint;

/// Mean Earth radius in meters used for all distance calculations.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine formula).
///
/// Symmetric, and zero for identical points.
///
/// # Example
/// ```
/// use drive_telemetry::GpsPoint;
/// use drive_telemetry::geo_utils::haversine_distance;
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
/// let km = haversine_distance(&london, &paris) / 1000.0;
/// assert!((km - 343.5).abs() < 1.0);
/// ```
pub fn haversine_distance(a: &GpsPoint, b: &GpsPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push h marginally past 1.0 for antipodal points
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_METERS * c
}

/// Initial compass bearing from `a` to `b` in degrees, normalized to `[0, 360)`.
///
/// Identical points have no defined bearing; this returns 0.
pub fn bearing_degrees(a: &GpsPoint, b: &GpsPoint) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let x = delta_lng.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

    let bearing = x.atan2(y).to_degrees().rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Linear interpolation of latitude/longitude between two points.
///
/// `fraction` is clamped to `[0, 1]`; 0 returns `a`, 1 returns `b` exactly.
pub fn interpolate(a: &GpsPoint, b: &GpsPoint, fraction: f64) -> GpsPoint {
    if fraction <= 0.0 || !fraction.is_finite() {
        return *a;
    }
    if fraction >= 1.0 {
        return *b;
    }
    GpsPoint::new(
        a.latitude + (b.latitude - a.latitude) * fraction,
        a.longitude + (b.longitude - a.longitude) * fraction,
    )
}
