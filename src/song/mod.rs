// Song module
// Bar/chord based arranger: sections of chord progressions played by melodic instruments

pub mod arrangement;
pub mod engine;
pub mod section;
pub mod state;

pub use arrangement::Arrangement;
pub use engine::SongEngine;
pub use section::{InstrumentPart, Section, SectionId};
pub use state::SongState;

use crate::harmony::chord::Chord;
use crate::harmony::range::PitchRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Melodic instruments of the arranger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongInstrument {
    Piano,
    Guitar,
    Bass,
    Pad,
    Strings,
}

/// How an instrument voices chords by default
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentProfile {
    pub enabled: bool,
    pub volume: f32,
    /// Octave of the chord root (C4 = 60)
    pub octave: i32,
    pub range: PitchRange,
}

impl SongInstrument {
    pub const ALL: [SongInstrument; 5] = [
        SongInstrument::Piano,
        SongInstrument::Guitar,
        SongInstrument::Bass,
        SongInstrument::Pad,
        SongInstrument::Strings,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SongInstrument::Piano => "piano",
            SongInstrument::Guitar => "guitar",
            SongInstrument::Bass => "bass",
            SongInstrument::Pad => "pad",
            SongInstrument::Strings => "strings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SongInstrument::Piano => "Piano",
            SongInstrument::Guitar => "Guitar",
            SongInstrument::Bass => "Bass",
            SongInstrument::Pad => "Pad",
            SongInstrument::Strings => "Strings",
        }
    }

    pub fn profile(&self) -> InstrumentProfile {
        let (enabled, volume, octave, range) = match self {
            SongInstrument::Piano => (true, 0.65, 4, PitchRange::new(21, 108)),
            SongInstrument::Guitar => (false, 0.55, 4, PitchRange::new(40, 88)),
            SongInstrument::Bass => (true, 0.75, 2, PitchRange::new(28, 60)),
            SongInstrument::Pad => (false, 0.45, 3, PitchRange::new(36, 84)),
            SongInstrument::Strings => (false, 0.35, 4, PitchRange::new(40, 96)),
        };
        InstrumentProfile {
            enabled,
            volume,
            octave,
            range,
        }
    }

    /// Pitches (before range folding) played for `chord`
    ///
    /// Bass plays the root alone; every other instrument plays all chord tones.
    pub fn voicing(&self, chord: &Chord) -> Vec<i32> {
        let octave = self.profile().octave;
        match self {
            SongInstrument::Bass => chord.notes(octave).into_iter().take(1).collect(),
            _ => chord.notes(octave),
        }
    }
}

impl fmt::Display for SongInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SongInstrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SongInstrument::ALL
            .into_iter()
            .find(|instrument| instrument.id() == s)
            .ok_or_else(|| format!("unknown song instrument '{}'", s))
    }
}
