// Harmony module
// Chord vocabulary, progressions and instrument ranges for the song engine

pub mod chord;
pub mod progression;
pub mod range;

pub use chord::{Chord, ChordQuality, NOTE_NAMES, PitchClass, midi_note_name};
pub use progression::{MAX_CHORD_BARS, Progression, ProgressionId, ProgressionPreset};
pub use range::PitchRange;
