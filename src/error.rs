//! Unified error handling for the drive-telemetry library.
//!
//! Only route loading and configuration can fail. Everything that runs inside
//! an active drive (ticks, samples, callouts) clamps or ignores bad input
//! instead of returning an error.

use thiserror::Error;

/// Unified error type for drive-telemetry operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// Route has too few coordinates to form a single segment
    #[error("Route has {point_count} points, minimum {minimum_required} required")]
    EmptyRoute {
        point_count: usize,
        minimum_required: usize,
    },
    /// Route contains coordinates that cannot be indexed
    #[error("Route has invalid coordinates: {message}")]
    InvalidCoordinates { message: String },
    /// Upstream route source failed or returned an unusable polyline
    #[error("Route fetch failed: {message}")]
    RouteFetch { message: String },
    /// Operation requires an indexed route
    #[error("Simulation is not ready: no route loaded")]
    NotReady,
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for drive-telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Extension trait for converting Option to TelemetryError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an empty route error.
    fn ok_or_empty_route(self, point_count: usize, minimum: usize) -> Result<T>;

    /// Convert Option to Result with a route fetch error.
    fn ok_or_fetch_error(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_empty_route(self, point_count: usize, minimum: usize) -> Result<T> {
        self.ok_or(TelemetryError::EmptyRoute {
            point_count,
            minimum_required: minimum,
        })
    }

    fn ok_or_fetch_error(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TelemetryError::RouteFetch {
            message: message.to_string(),
        })
    }
}

impl TelemetryError {
    /// Rewrap any loading failure as a route fetch failure, keeping the cause.
    pub(crate) fn into_fetch_error(self) -> Self {
        match self {
            TelemetryError::RouteFetch { .. } => self,
            other => TelemetryError::RouteFetch {
                message: other.to_string(),
            },
        }
    }
}
