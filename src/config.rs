// Engine configuration
// Timing constants of the schedulers, loadable from a RON file

use crate::project::ProjectError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Scheduler timing parameters shared by both engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the scheduler tick, in milliseconds
    pub tick_interval_ms: u64,
    /// How far ahead the drum engine dispatches, in seconds
    pub drum_horizon: f64,
    /// How far ahead the song engine dispatches, in seconds
    pub song_horizon: f64,
    /// Delay between `play` and the first event, in seconds
    pub start_offset: f64,
    /// Margin added when the cursor is clamped after a scheduling gap
    pub gap_epsilon: f64,
    /// Fade applied to sounding voices on stop, in seconds
    pub stop_fade: f64,
    /// Capacity of position notification channels
    pub notification_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 25,
            drum_horizon: 0.1,
            song_horizon: 0.2,
            start_offset: 0.05,
            gap_epsilon: 0.005,
            stop_fade: 0.03,
            notification_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a RON file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProjectError::FileSystemError(format!(
                "Failed to read config '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_ron(&content)
    }

    /// Parse a RON string
    pub fn from_ron(content: &str) -> Result<Self, ProjectError> {
        let config: Self = ron::from_str(content).map_err(|e| {
            ProjectError::SerializationError(format!("Failed to parse config: {}", e))
        })?;
        Ok(config.sanitized())
    }

    /// Clamp every value into a usable range
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let positive = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        let non_negative = |value: f64, fallback: f64| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                fallback
            }
        };

        let sanitized = Self {
            tick_interval_ms: self.tick_interval_ms.clamp(1, 1000),
            drum_horizon: positive(self.drum_horizon, defaults.drum_horizon),
            song_horizon: positive(self.song_horizon, defaults.song_horizon),
            start_offset: non_negative(self.start_offset, defaults.start_offset),
            gap_epsilon: non_negative(self.gap_epsilon, defaults.gap_epsilon),
            stop_fade: non_negative(self.stop_fade, defaults.stop_fade),
            notification_capacity: self.notification_capacity.max(1),
        };
        if sanitized != self {
            tracing::warn!(?sanitized, "engine config adjusted");
        }
        sanitized
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
