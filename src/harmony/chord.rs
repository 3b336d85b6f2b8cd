// Chord vocabulary - pitch classes, chord qualities and voicing
// A chord is a root pitch class plus an interval set, held for a number of bars

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sharp-based note names, indexed by pitch class
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Flat spellings accepted when parsing, indexed by pitch class
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Name of a MIDI note, e.g. 60 → "C4"
pub fn midi_note_name(pitch: u8) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// Pitch class 0-11 (C = 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);
    pub const F: PitchClass = PitchClass(5);
    pub const G: PitchClass = PitchClass(7);
    pub const A: PitchClass = PitchClass(9);

    /// Pitch class of any semitone value (wraps modulo 12)
    pub fn new(semitone: i32) -> Self {
        Self(semitone.rem_euclid(12) as u8)
    }

    pub fn index(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        NOTE_NAMES[self.0 as usize]
    }

    /// Pitch class `semitones` above this one
    pub fn transpose(&self, semitones: i32) -> Self {
        Self::new(self.0 as i32 + semitones)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NOTE_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(s))
            .or_else(|| FLAT_NAMES.iter().position(|name| name.eq_ignore_ascii_case(s)))
            .map(|index| PitchClass(index as u8))
            .ok_or_else(|| format!("unknown note name '{}'", s))
    }
}

impl TryFrom<String> for PitchClass {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PitchClass> for String {
    fn from(pitch: PitchClass) -> Self {
        pitch.name().to_string()
    }
}

/// Chord quality: the interval set stacked on the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChordQuality {
    #[default]
    #[serde(rename = "maj")]
    Major,
    #[serde(rename = "min")]
    Minor,
    #[serde(rename = "7")]
    Dominant7,
    #[serde(rename = "maj7")]
    Major7,
    #[serde(rename = "min7")]
    Minor7,
    #[serde(rename = "dim")]
    Diminished,
    #[serde(rename = "aug")]
    Augmented,
    #[serde(rename = "sus2")]
    Sus2,
    #[serde(rename = "sus4")]
    Sus4,
    #[serde(rename = "add9")]
    Add9,
    #[serde(rename = "min9")]
    Minor9,
    #[serde(rename = "maj9")]
    Major9,
    #[serde(rename = "6")]
    Sixth,
    #[serde(rename = "min6")]
    Minor6,
    #[serde(rename = "dim7")]
    Diminished7,
    #[serde(rename = "hdim7", alias = "min7b5")]
    HalfDiminished7,
}

impl ChordQuality {
    /// Every quality, in picker order
    pub const ALL: [ChordQuality; 16] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Dominant7,
        ChordQuality::Major7,
        ChordQuality::Minor7,
        ChordQuality::Diminished,
        ChordQuality::Augmented,
        ChordQuality::Sus2,
        ChordQuality::Sus4,
        ChordQuality::Add9,
        ChordQuality::Minor9,
        ChordQuality::Major9,
        ChordQuality::Sixth,
        ChordQuality::Minor6,
        ChordQuality::Diminished7,
        ChordQuality::HalfDiminished7,
    ];

    /// Semitone offsets from the root
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Augmented => &[0, 4, 8],
            ChordQuality::Sus2 => &[0, 2, 7],
            ChordQuality::Sus4 => &[0, 5, 7],
            ChordQuality::Add9 => &[0, 4, 7, 14],
            ChordQuality::Minor9 => &[0, 3, 7, 10, 14],
            ChordQuality::Major9 => &[0, 4, 7, 11, 14],
            ChordQuality::Sixth => &[0, 4, 7, 9],
            ChordQuality::Minor6 => &[0, 3, 7, 9],
            ChordQuality::Diminished7 => &[0, 3, 6, 9],
            ChordQuality::HalfDiminished7 => &[0, 3, 6, 10],
        }
    }

    /// Identifier used in saved state ("maj", "min7", ...)
    pub fn id(&self) -> &'static str {
        match self {
            ChordQuality::Major => "maj",
            ChordQuality::Minor => "min",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "min7",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Sus2 => "sus2",
            ChordQuality::Sus4 => "sus4",
            ChordQuality::Add9 => "add9",
            ChordQuality::Minor9 => "min9",
            ChordQuality::Major9 => "maj9",
            ChordQuality::Sixth => "6",
            ChordQuality::Minor6 => "min6",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "hdim7",
        }
    }

    /// Suffix printed after the root name ("" for major, "m", "°", "ø7", ...)
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Minor7 => "m7",
            ChordQuality::Diminished => "°",
            ChordQuality::Augmented => "+",
            ChordQuality::Minor9 => "m9",
            ChordQuality::Minor6 => "m6",
            ChordQuality::Diminished7 => "°7",
            ChordQuality::HalfDiminished7 => "ø7",
            other => other.id(),
        }
    }
}

impl FromStr for ChordQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "min7b5" {
            return Ok(ChordQuality::HalfDiminished7);
        }
        ChordQuality::ALL
            .into_iter()
            .find(|quality| quality.id() == s)
            .ok_or_else(|| format!("unknown chord quality '{}'", s))
    }
}

/// One chord of a progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    pub root: PitchClass,
    pub quality: ChordQuality,
    /// How many bars the chord is held (>= 1)
    pub bars: u32,
}

impl Chord {
    pub fn new(root: PitchClass, quality: ChordQuality, bars: u32) -> Self {
        Self {
            root,
            quality,
            bars: bars.max(1),
        }
    }

    /// MIDI pitches of the chord with its root in `octave` (C4 = 60)
    pub fn notes(&self, octave: i32) -> Vec<i32> {
        let base = (octave + 1) * 12 + self.root.index() as i32;
        self.quality
            .intervals()
            .iter()
            .map(|&interval| base + interval as i32)
            .collect()
    }

    /// Display label, e.g. "Am", "G7", "Bø7"
    pub fn label(&self) -> String {
        format!("{}{}", self.root, self.quality.suffix())
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
