// Voice capability - the sound-generation side the schedulers dispatch into
// Synthesis lives outside this crate; we only describe what to play and when

use crate::drum::DrumInstrument;
use crate::song::SongInstrument;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Instrument addressed by a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstrumentId {
    Drum(DrumInstrument),
    Song(SongInstrument),
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentId::Drum(instrument) => write!(f, "{}", instrument),
            InstrumentId::Song(instrument) => write!(f, "{}", instrument),
        }
    }
}

/// One scheduled sound
///
/// `start_time` is always an absolute time on the dispatching engine's clock,
/// never "now".
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub instrument: InstrumentId,
    /// MIDI pitches (empty for unpitched drum hits)
    pub pitches: Vec<u8>,
    /// Absolute start time in seconds
    pub start_time: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Velocity (0.0 - 1.0)
    pub velocity: f32,
    /// Optional voice variant ("ghost", a patch name, ...)
    pub variant: Option<String>,
}

/// Sound generator invoked by the schedulers
///
/// Fire-and-forget: no result is awaited.
pub trait Voice: Send {
    fn trigger(&mut self, trigger: Trigger);

    /// Fade out everything still sounding, starting at `at`, over `fade` seconds
    fn release_all(&mut self, _at: f64, _fade: f64) {}
}

/// Voice that stores every trigger (used by tests and offline rendering)
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct RecordingVoice {
    triggers: Arc<Mutex<Vec<Trigger>>>,
    releases: Arc<Mutex<Vec<(f64, f64)>>>,
}

impl RecordingVoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every trigger received so far
    pub fn triggers(&self) -> Vec<Trigger> {
        self.triggers
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// Triggers for a single instrument, in dispatch order
    pub fn triggers_for(&self, instrument: InstrumentId) -> Vec<Trigger> {
        self.triggers()
            .into_iter()
            .filter(|t| t.instrument == instrument)
            .collect()
    }

    /// `(at, fade)` pairs received through `release_all`
    pub fn releases(&self) -> Vec<(f64, f64)> {
        self.releases
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut triggers) = self.triggers.lock() {
            triggers.clear();
        }
        if let Ok(mut releases) = self.releases.lock() {
            releases.clear();
        }
    }
}

impl Voice for RecordingVoice {
    fn trigger(&mut self, trigger: Trigger) {
        if let Ok(mut triggers) = self.triggers.lock() {
            triggers.push(trigger);
        }
    }

    fn release_all(&mut self, at: f64, fade: f64) {
        if let Ok(mut releases) = self.releases.lock() {
            releases.push((at, fade));
        }
    }
}

/// Voice that only logs what it would play
#[derive(Debug, Clone, Default)]
pub struct TracingVoice {
    label: String,
}

impl TracingVoice {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Voice for TracingVoice {
    fn trigger(&mut self, trigger: Trigger) {
        tracing::info!(
            voice = %self.label,
            instrument = %trigger.instrument,
            pitches = ?trigger.pitches,
            start = trigger.start_time,
            duration = trigger.duration,
            velocity = trigger.velocity,
            variant = trigger.variant.as_deref().unwrap_or("-"),
            "trigger"
        );
    }

    fn release_all(&mut self, at: f64, fade: f64) {
        tracing::info!(voice = %self.label, at, fade, "release all");
    }
}
