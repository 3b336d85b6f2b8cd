// Section - a named part of a song (verse, chorus, ...)
// Binds a progression, per-instrument parts and an optional drum pattern

use crate::harmony::progression::ProgressionId;
use crate::sequencer::note::NotePattern;
use crate::sequencer::pattern::PatternId;
use crate::song::SongInstrument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for sections
pub type SectionId = u64;

/// Palette cycled through when sections are created
pub const SECTION_COLORS: [&str; 8] = [
    "#4ECDC4", "#FF6B6B", "#A29BFE", "#FF9F43", "#55EFC4", "#FD79A8", "#74B9FF", "#FDCB6E",
];

/// Suggested section names
pub const SECTION_TYPES: [&str; 9] = [
    "Verse",
    "Chorus",
    "Bridge",
    "Intro",
    "Outro",
    "Pre-Chorus",
    "Break",
    "Solo",
    "Interlude",
];

/// How one instrument plays in a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentPart {
    pub enabled: bool,
    /// Velocity of chord tones, and scale for note-pattern velocities
    pub volume: f32,
    /// Voice variant passed through to the synth
    #[serde(default)]
    pub variant: Option<String>,
    /// Explicit notes overriding chord tones when active
    #[serde(default)]
    pub notes: Option<NotePattern>,
}

impl InstrumentPart {
    pub fn for_instrument(instrument: SongInstrument) -> Self {
        let profile = instrument.profile();
        Self {
            enabled: profile.enabled,
            volume: profile.volume,
            variant: None,
            notes: None,
        }
    }

    /// Active note overlay, if any
    pub fn active_notes(&self) -> Option<&NotePattern> {
        self.notes.as_ref().filter(|notes| notes.active)
    }
}

/// A section of the song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub color: String,
    pub progression: ProgressionId,
    parts: BTreeMap<SongInstrument, InstrumentPart>,
    /// Drum pattern owned by the drum engine, played through the bridge
    #[serde(default)]
    pub drum_pattern: Option<PatternId>,
}

impl Section {
    pub fn new(id: SectionId, name: String, color: String, progression: ProgressionId) -> Self {
        let parts = SongInstrument::ALL
            .into_iter()
            .map(|instrument| (instrument, InstrumentPart::for_instrument(instrument)))
            .collect();
        Self {
            id,
            name,
            color,
            progression,
            parts,
            drum_pattern: None,
        }
    }

    /// Color for the n-th created section (1-based)
    pub fn palette_color(n: u64) -> String {
        let index = (n.max(1) - 1) as usize % SECTION_COLORS.len();
        SECTION_COLORS[index].to_string()
    }

    pub fn part(&self, instrument: SongInstrument) -> Option<&InstrumentPart> {
        self.parts.get(&instrument)
    }

    /// Part of an instrument, created with defaults when missing
    pub fn part_mut(&mut self, instrument: SongInstrument) -> &mut InstrumentPart {
        self.parts
            .entry(instrument)
            .or_insert_with(|| InstrumentPart::for_instrument(instrument))
    }

    /// Enabled parts, in instrument order
    pub fn enabled_parts(&self) -> impl Iterator<Item = (SongInstrument, &InstrumentPart)> + '_ {
        self.parts
            .iter()
            .filter(|(_, part)| part.enabled)
            .map(|(&instrument, part)| (instrument, part))
    }

    /// Add any instrument missing from a loaded section and clamp volumes
    pub fn normalize(&mut self) {
        for instrument in SongInstrument::ALL {
            let part = self.part_mut(instrument);
            part.volume = if part.volume.is_finite() {
                part.volume.clamp(0.0, 1.0)
            } else {
                instrument.profile().volume
            };
        }
    }
}
