// Position updates published by the schedulers
// Observers (UI, loggers) read them without ever touching the engine lock

use crate::sequencer::pattern::PatternId;
use crate::song::section::SectionId;

/// Which scheduler produced an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Drum,
    Song,
}

/// Playback position change
///
/// `time` is the absolute dispatch time on the producing engine's clock, so an
/// observer can delay its own display until the sound is actually heard.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionUpdate {
    /// The drum engine dispatched a step
    DrumStep {
        pattern: PatternId,
        step: u32,
        /// Timeline slot when playing the timeline
        slot: Option<usize>,
        time: f64,
    },
    /// The song engine dispatched a bar
    SongBar {
        section: SectionId,
        bar: u32,
        /// Arrangement entry when playing the arrangement
        arrangement_index: Option<usize>,
        time: f64,
    },
    /// Transport stopped (explicitly, or at the end of a non-looping timeline)
    Stopped { engine: EngineKind },
}

impl PositionUpdate {
    pub fn engine(&self) -> EngineKind {
        match self {
            PositionUpdate::DrumStep { .. } => EngineKind::Drum,
            PositionUpdate::SongBar { .. } => EngineKind::Song,
            PositionUpdate::Stopped { engine } => *engine,
        }
    }

    /// Dispatch time, if the update refers to a sounding position
    pub fn time(&self) -> Option<f64> {
        match self {
            PositionUpdate::DrumStep { time, .. } | PositionUpdate::SongBar { time, .. } => {
                Some(*time)
            }
            PositionUpdate::Stopped { .. } => None,
        }
    }
}
