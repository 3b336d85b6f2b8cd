// Tempo - BPM, swing and step-count configuration
// Handles conversion between steps, beats, bars and seconds

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest supported tempo
pub const MIN_BPM: f64 = 40.0;
/// Highest supported tempo
pub const MAX_BPM: f64 = 240.0;

/// Steps per quarter note (a step is a sixteenth note)
pub const STEPS_PER_BEAT: u32 = 4;
/// Beats in one bar (4/4)
pub const BEATS_PER_BAR: u32 = 4;
/// Steps in one bar
pub const STEPS_PER_BAR: u32 = STEPS_PER_BEAT * BEATS_PER_BAR;

/// Step counts a pattern may have (whole bars, so swing pairs never straddle the loop)
pub const SUPPORTED_STEPS: [u32; 3] = [16, 32, 64];
/// Largest step count a pattern may have
pub const MAX_STEPS: u32 = SUPPORTED_STEPS[2];

/// Largest swing amount (exclusive bound 0.5 keeps odd steps longer than zero)
pub const MAX_SWING: f64 = 0.49;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo, clamped to [MIN_BPM, MAX_BPM]
    pub fn new(bpm: f64) -> Self {
        let clamped = if bpm.is_finite() {
            bpm.clamp(MIN_BPM, MAX_BPM)
        } else {
            120.0
        };
        if clamped != bpm {
            tracing::debug!(requested = bpm, applied = clamped, "tempo clamped");
        }
        Self { bpm: clamped }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Set BPM value (clamped)
    pub fn set_bpm(&mut self, bpm: f64) {
        *self = Self::new(bpm);
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one unswung step (sixteenth note) in seconds
    pub fn step_duration_seconds(&self) -> f64 {
        self.beat_duration_seconds() / STEPS_PER_BEAT as f64
    }

    /// Duration of one bar in seconds
    pub fn bar_duration_seconds(&self) -> f64 {
        self.beat_duration_seconds() * BEATS_PER_BAR as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl From<f64> for Tempo {
    fn from(bpm: f64) -> Self {
        Self::new(bpm)
    }
}

impl From<Tempo> for f64 {
    fn from(tempo: Tempo) -> Self {
        tempo.bpm
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Pair-based swing amount, as a fraction of a step
///
/// Even steps are lengthened and odd steps shortened by the same amount, so
/// every even+odd pair lasts exactly two unswung steps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Swing(f64);

impl Swing {
    /// Creates a swing amount, clamped to [0, MAX_SWING]
    pub fn new(amount: f64) -> Self {
        if !amount.is_finite() {
            return Self(0.0);
        }
        Self(amount.clamp(0.0, MAX_SWING))
    }

    /// Swing from a 0-100 percentage (UI slider value)
    pub fn from_percent(percent: u32) -> Self {
        Self::new(percent as f64 / 100.0)
    }

    pub fn amount(&self) -> f64 {
        self.0
    }

    /// Duration of `step` in seconds at the given tempo
    pub fn step_duration(&self, tempo: &Tempo, step: u32) -> f64 {
        let base = tempo.step_duration_seconds();
        if step % 2 == 0 {
            base * (1.0 + self.0)
        } else {
            base * (1.0 - self.0)
        }
    }

    /// Offset of `step` from the start of its bar, in seconds
    pub fn step_offset(&self, tempo: &Tempo, step: u32) -> f64 {
        (0..step).map(|s| self.step_duration(tempo, s)).sum()
    }
}

impl From<f64> for Swing {
    fn from(amount: f64) -> Self {
        Self::new(amount)
    }
}

impl From<Swing> for f64 {
    fn from(swing: Swing) -> Self {
        swing.0
    }
}

/// Number of steps in every pattern of a drum engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct StepCount(u32);

impl StepCount {
    /// Validated step count, rejecting anything but 16, 32 or 64
    pub fn new(steps: u32) -> EngineResult<Self> {
        if SUPPORTED_STEPS.contains(&steps) {
            Ok(Self(steps))
        } else {
            Err(EngineError::UnsupportedStepCount(steps))
        }
    }

    /// Smallest supported count holding `steps`, capped at MAX_STEPS (used when loading state)
    pub fn clamped(steps: u32) -> Self {
        let steps = SUPPORTED_STEPS
            .into_iter()
            .find(|&supported| supported >= steps)
            .unwrap_or(MAX_STEPS);
        Self(steps)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for StepCount {
    fn default() -> Self {
        Self(STEPS_PER_BAR)
    }
}

impl From<u32> for StepCount {
    fn from(steps: u32) -> Self {
        Self::clamped(steps)
    }
}

impl From<StepCount> for u32 {
    fn from(steps: StepCount) -> Self {
        steps.0
    }
}
