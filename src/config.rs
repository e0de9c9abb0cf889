//! Tunables for the simulation driver and the telemetry aggregator.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};

/// Configuration for the route-following simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct SimulationConfig {
    /// Nominal interval between ticks, in milliseconds.
    /// Default: 1000 (1 Hz)
    pub tick_interval_ms: u32,

    /// Largest time step a single tick may apply, in milliseconds.
    /// Caps the jump after a missed tick (e.g. app backgrounded).
    /// Default: 2000
    pub max_tick_delta_ms: u32,

    /// Lowest selectable playback speed in mph. Default: 5
    pub min_speed_mph: f64,

    /// Highest selectable playback speed in mph. Default: 120
    pub max_speed_mph: f64,

    /// Playback speed a new driver starts with, in mph. Default: 40
    pub default_speed_mph: f64,

    /// How many segments ahead of the current position the heading looks.
    /// Smooths heading noise on short, near-straight segments. Default: 5
    pub heading_lookahead_segments: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            max_tick_delta_ms: 2000,
            min_speed_mph: 5.0,
            max_speed_mph: 120.0,
            default_speed_mph: 40.0,
            heading_lookahead_segments: 5,
        }
    }
}

impl SimulationConfig {
    /// Clamp a requested speed to the configured bounds.
    pub fn clamp_speed(&self, mph: f64) -> f64 {
        if !mph.is_finite() {
            return self.min_speed_mph;
        }
        mph.clamp(self.min_speed_mph, self.max_speed_mph)
    }
}

/// Configuration for drive telemetry aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TelemetryConfig {
    /// Minimum wall-clock gap between retained speed samples, in milliseconds.
    /// Default: 2000
    pub sample_interval_ms: u32,

    /// Number of most recent speed samples retained. Default: 500
    pub sample_window: u32,

    /// How long an apex window observes speed after a curve callout, in milliseconds.
    /// Default: 10000
    pub apex_window_ms: u32,

    /// Look-back used by `was_moving_recently`, in milliseconds. Default: 30000
    pub moving_lookback_ms: u32,

    /// Speed a sample must exceed to count as moving, in mph. Default: 5
    pub moving_threshold_mph: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 2000,
            sample_window: 500,
            apex_window_ms: 10_000,
            moving_lookback_ms: 30_000,
            moving_threshold_mph: 5.0,
        }
    }
}

/// Combined configuration for a drive session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct DriveConfig {
    pub simulation: SimulationConfig,
    pub telemetry: TelemetryConfig,
}

impl DriveConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Example
    /// ```
    /// use drive_telemetry::DriveConfig;
    ///
    /// let config = DriveConfig::from_json(r#"{"simulation": {"default_speed_mph": 55}}"#).unwrap();
    /// assert_eq!(config.simulation.default_speed_mph, 55.0);
    /// assert_eq!(config.telemetry.sample_window, 500);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DriveConfig =
            serde_json::from_str(json).map_err(|e| TelemetryError::Config {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make the components misbehave.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        let tel = &self.telemetry;

        let problem = if sim.tick_interval_ms == 0 {
            Some("tick_interval_ms must be positive".to_string())
        } else if sim.max_tick_delta_ms < sim.tick_interval_ms {
            Some("max_tick_delta_ms must be at least tick_interval_ms".to_string())
        } else if !(sim.min_speed_mph > 0.0 && sim.min_speed_mph <= sim.max_speed_mph) {
            Some(format!(
                "speed bounds [{}, {}] are invalid",
                sim.min_speed_mph, sim.max_speed_mph
            ))
        } else if sim.heading_lookahead_segments == 0 {
            Some("heading_lookahead_segments must be at least 1".to_string())
        } else if tel.sample_window == 0 {
            Some("sample_window must be at least 1".to_string())
        } else if !tel.moving_threshold_mph.is_finite() || tel.moving_threshold_mph < 0.0 {
            Some("moving_threshold_mph must be a non-negative number".to_string())
        } else {
            None
        };

        match problem {
            Some(message) => Err(TelemetryError::Config { message }),
            None => Ok(()),
        }
    }
}
