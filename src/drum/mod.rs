// Drum module
// Step-sequenced drum machine: kit definition, editable state and engine

pub mod engine;
pub mod state;

pub use engine::DrumEngine;
pub use state::{DrumChannel, DrumState};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default channel volume of every drum instrument
pub const DEFAULT_DRUM_VOLUME: f32 = 0.8;

/// Instruments of the drum kit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrumInstrument {
    Kick,
    Snare,
    HiHat,
    OpenHat,
    Clap,
    Tom,
    Cowbell,
    Crash,
}

impl DrumInstrument {
    /// Every instrument, in kit order
    pub const ALL: [DrumInstrument; 8] = [
        DrumInstrument::Kick,
        DrumInstrument::Snare,
        DrumInstrument::HiHat,
        DrumInstrument::OpenHat,
        DrumInstrument::Clap,
        DrumInstrument::Tom,
        DrumInstrument::Cowbell,
        DrumInstrument::Crash,
    ];

    /// Identifier used in saved state and logs
    pub fn id(&self) -> &'static str {
        match self {
            DrumInstrument::Kick => "kick",
            DrumInstrument::Snare => "snare",
            DrumInstrument::HiHat => "hihat",
            DrumInstrument::OpenHat => "openhat",
            DrumInstrument::Clap => "clap",
            DrumInstrument::Tom => "tom",
            DrumInstrument::Cowbell => "cowbell",
            DrumInstrument::Crash => "crash",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            DrumInstrument::Kick => "Kick",
            DrumInstrument::Snare => "Snare",
            DrumInstrument::HiHat => "Hi-Hat",
            DrumInstrument::OpenHat => "Open Hat",
            DrumInstrument::Clap => "Clap",
            DrumInstrument::Tom => "Tom",
            DrumInstrument::Cowbell => "Cowbell",
            DrumInstrument::Crash => "Crash",
        }
    }
}

impl fmt::Display for DrumInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DrumInstrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DrumInstrument::ALL
            .into_iter()
            .find(|instrument| instrument.id() == s)
            .ok_or_else(|| format!("unknown drum instrument '{}'", s))
    }
}
