// Transport - Playback state machine and cursor
// Controls which macro structure (single pattern or timeline) is playing

use serde::{Deserialize, Serialize};
use std::fmt;

/// What `play` should loop over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Loop the current pattern (drum) or current section (song)
    Pattern,
    /// Walk the timeline (drum) or arrangement (song)
    Timeline,
}

/// Transport state reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    PlayingPattern,
    PlayingTimeline,
}

/// What the engine has to do to honour a play request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    /// Allocate a cursor and arm the scheduler
    Start,
    /// Already playing in the requested mode
    NoOp,
    /// Playing in the other mode: hard stop, then start
    Restart,
}

impl TransportState {
    /// State entered when playing in `mode`
    pub fn playing(mode: PlayMode) -> Self {
        match mode {
            PlayMode::Pattern => TransportState::PlayingPattern,
            PlayMode::Timeline => TransportState::PlayingTimeline,
        }
    }

    /// Check if transport is in a playing state
    pub fn is_playing(&self) -> bool {
        !matches!(self, TransportState::Stopped)
    }

    /// Mode being played, if any
    pub fn mode(&self) -> Option<PlayMode> {
        match self {
            TransportState::Stopped => None,
            TransportState::PlayingPattern => Some(PlayMode::Pattern),
            TransportState::PlayingTimeline => Some(PlayMode::Timeline),
        }
    }

    /// Decide how to handle `play(requested)` from this state
    pub fn transition(&self, requested: PlayMode) -> TransportAction {
        match self.mode() {
            None => TransportAction::Start,
            Some(mode) if mode == requested => TransportAction::NoOp,
            Some(_) => TransportAction::Restart,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportState::Stopped => "stopped",
            TransportState::PlayingPattern => "playing pattern",
            TransportState::PlayingTimeline => "playing timeline",
        };
        f.write_str(label)
    }
}

/// Transient playback position
///
/// Created when the transport starts and dropped when it stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    /// Step inside the current pattern or bar
    pub step: u32,
    /// Bar inside the current section (song engine)
    pub bar: u32,
    /// Current timeline slot (drum engine, timeline mode)
    pub slot: usize,
    /// Current arrangement entry (song engine, timeline mode)
    pub arrangement_index: usize,
    /// Absolute time of the next dispatch, on the engine's clock
    pub next_event_time: f64,
}

impl PlaybackCursor {
    /// Cursor at the very beginning, first event at `start_time`
    pub fn new(start_time: f64) -> Self {
        Self {
            step: 0,
            bar: 0,
            slot: 0,
            arrangement_index: 0,
            next_event_time: start_time,
        }
    }

    /// Start from a given timeline slot
    pub fn at_slot(start_time: f64, slot: usize) -> Self {
        Self {
            slot,
            ..Self::new(start_time)
        }
    }

    /// Start from a given arrangement entry
    pub fn at_arrangement(start_time: f64, arrangement_index: usize) -> Self {
        Self {
            arrangement_index,
            ..Self::new(start_time)
        }
    }
}
