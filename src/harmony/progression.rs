// Progression - Run-length encoded chord sequence
// Resolves "bar index → active chord" for the song scheduler

use crate::error::{EngineError, EngineResult};
use crate::harmony::chord::{Chord, ChordQuality, PitchClass};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unique identifier for progressions
pub type ProgressionId = u64;

/// Longest a single chord can be held, in bars
pub const MAX_CHORD_BARS: u32 = 8;

/// Ordered, never-empty list of chords
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    pub id: ProgressionId,
    chords: Vec<Chord>,
}

impl Progression {
    /// Build a progression; an empty chord list is rejected
    pub fn new(id: ProgressionId, chords: Vec<Chord>) -> EngineResult<Self> {
        if chords.is_empty() {
            return Err(EngineError::LastChord);
        }
        let chords = chords
            .into_iter()
            .map(|c| Chord::new(c.root, c.quality, c.bars.min(MAX_CHORD_BARS)))
            .collect();
        Ok(Self { id, chords })
    }

    /// Starter progression for a new section: i - VI - III - VII feel (root m, F, C, G)
    pub fn starter(id: ProgressionId, root: PitchClass) -> Self {
        Self {
            id,
            chords: vec![
                Chord::new(root, ChordQuality::Minor, 1),
                Chord::new(PitchClass::F, ChordQuality::Major, 1),
                Chord::new(PitchClass::C, ChordQuality::Major, 1),
                Chord::new(PitchClass::G, ChordQuality::Major, 1),
            ],
        }
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn chord(&self, index: usize) -> Option<&Chord> {
        self.chords.get(index)
    }

    /// Sum of every chord's bar count (always > 0)
    pub fn total_bars(&self) -> u32 {
        self.chords.iter().map(|c| c.bars).sum()
    }

    /// Chord sounding at `bar`, wrapping modulo the total length
    pub fn chord_at_bar(&self, bar: u32) -> &Chord {
        let wrapped = bar % self.total_bars();
        let mut end = 0;
        for chord in &self.chords {
            end += chord.bars;
            if wrapped < end {
                return chord;
            }
        }
        &self.chords[0]
    }

    /// Append a copy of the last chord held for one bar, returning its index
    pub fn add_chord(&mut self) -> usize {
        let last = self.chords[self.chords.len() - 1];
        self.chords.push(Chord::new(last.root, last.quality, 1));
        self.chords.len() - 1
    }

    /// Insert a specific chord at the end
    pub fn push_chord(&mut self, chord: Chord) {
        self.chords
            .push(Chord::new(chord.root, chord.quality, chord.bars.min(MAX_CHORD_BARS)));
    }

    /// Remove a chord; the last one cannot be removed
    pub fn remove_chord(&mut self, index: usize) -> EngineResult<Chord> {
        if index >= self.chords.len() {
            return Err(EngineError::ChordOutOfRange(index));
        }
        if self.chords.len() == 1 {
            return Err(EngineError::LastChord);
        }
        Ok(self.chords.remove(index))
    }

    pub fn set_root(&mut self, index: usize, root: PitchClass) -> EngineResult<()> {
        self.chord_mut(index)?.root = root;
        Ok(())
    }

    pub fn set_quality(&mut self, index: usize, quality: ChordQuality) -> EngineResult<()> {
        self.chord_mut(index)?.quality = quality;
        Ok(())
    }

    /// Set how many bars a chord lasts (clamped to 1..=8)
    pub fn set_bars(&mut self, index: usize, bars: u32) -> EngineResult<()> {
        self.chord_mut(index)?.bars = bars.clamp(1, MAX_CHORD_BARS);
        Ok(())
    }

    /// Replace every chord with a preset transposed to `root`
    pub fn apply_preset(&mut self, preset: ProgressionPreset, root: PitchClass) {
        self.chords = preset.chords(root);
    }

    fn chord_mut(&mut self, index: usize) -> EngineResult<&mut Chord> {
        self.chords
            .get_mut(index)
            .ok_or(EngineError::ChordOutOfRange(index))
    }
}

/// Built-in progressions, stored as semitone offsets from the song key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressionPreset {
    PopMajor,
    PopMinor,
    DooWop,
    Blues,
    #[serde(rename = "jazz-ii-V-I")]
    JazzTwoFiveOne,
    Sad,
    Flamenco,
    Bossa,
    Andalusian,
    #[serde(rename = "circle-of-5ths")]
    CircleOfFifths,
}

impl ProgressionPreset {
    pub const ALL: [ProgressionPreset; 10] = [
        ProgressionPreset::PopMajor,
        ProgressionPreset::PopMinor,
        ProgressionPreset::DooWop,
        ProgressionPreset::Blues,
        ProgressionPreset::JazzTwoFiveOne,
        ProgressionPreset::Sad,
        ProgressionPreset::Flamenco,
        ProgressionPreset::Bossa,
        ProgressionPreset::Andalusian,
        ProgressionPreset::CircleOfFifths,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ProgressionPreset::PopMajor => "pop-major",
            ProgressionPreset::PopMinor => "pop-minor",
            ProgressionPreset::DooWop => "doo-wop",
            ProgressionPreset::Blues => "blues",
            ProgressionPreset::JazzTwoFiveOne => "jazz-ii-V-I",
            ProgressionPreset::Sad => "sad",
            ProgressionPreset::Flamenco => "flamenco",
            ProgressionPreset::Bossa => "bossa",
            ProgressionPreset::Andalusian => "andalusian",
            ProgressionPreset::CircleOfFifths => "circle-of-5ths",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProgressionPreset::PopMajor => "Pop - I V vi IV",
            ProgressionPreset::PopMinor => "Minor Pop - i VI III VII",
            ProgressionPreset::DooWop => "Doo-Wop - I vi IV V",
            ProgressionPreset::Blues => "12-Bar Blues",
            ProgressionPreset::JazzTwoFiveOne => "Jazz - ii7 V7 Imaj7",
            ProgressionPreset::Sad => "Sad - i v VI III",
            ProgressionPreset::Flamenco => "Flamenco - i VII VI V",
            ProgressionPreset::Bossa => "Bossa Nova - IIm7 V7 Imaj7 viim7",
            ProgressionPreset::Andalusian => "Andalusian Cadence - i VII VI V",
            ProgressionPreset::CircleOfFifths => "Circle - I IV VII III",
        }
    }

    /// (semitones above key, quality, bars) for every chord
    fn degrees(&self) -> &'static [(i32, ChordQuality, u32)] {
        use ChordQuality::*;
        match self {
            ProgressionPreset::PopMajor => &[(0, Major, 1), (7, Major, 1), (9, Minor, 1), (5, Major, 1)],
            ProgressionPreset::PopMinor => &[(0, Minor, 1), (8, Major, 1), (3, Major, 1), (10, Major, 1)],
            ProgressionPreset::DooWop => &[(0, Major, 1), (9, Minor, 1), (5, Major, 1), (7, Major, 1)],
            ProgressionPreset::Blues => &[
                (0, Dominant7, 1),
                (0, Dominant7, 1),
                (0, Dominant7, 1),
                (0, Dominant7, 1),
                (5, Dominant7, 1),
                (5, Dominant7, 1),
                (0, Dominant7, 1),
                (0, Dominant7, 1),
                (7, Dominant7, 1),
                (5, Dominant7, 1),
                (0, Dominant7, 1),
                (7, Dominant7, 1),
            ],
            ProgressionPreset::JazzTwoFiveOne => &[(2, Minor7, 2), (7, Dominant7, 2), (0, Major7, 4)],
            ProgressionPreset::Sad => &[(0, Minor, 1), (7, Minor, 1), (8, Major, 1), (3, Major, 1)],
            ProgressionPreset::Flamenco => &[(0, Minor, 1), (10, Major, 1), (8, Major, 1), (7, Major, 1)],
            ProgressionPreset::Bossa => &[
                (2, Minor7, 2),
                (7, Dominant7, 2),
                (0, Major7, 2),
                (11, HalfDiminished7, 2),
            ],
            ProgressionPreset::Andalusian => &[(0, Minor, 2), (10, Major, 2), (8, Major, 2), (7, Dominant7, 2)],
            ProgressionPreset::CircleOfFifths => &[(0, Major7, 2), (5, Major7, 2), (10, Dominant7, 2), (4, Minor7, 2)],
        }
    }

    /// Chords of the preset transposed to `root`
    pub fn chords(&self, root: PitchClass) -> Vec<Chord> {
        self.degrees()
            .iter()
            .map(|&(offset, quality, bars)| Chord::new(root.transpose(offset), quality, bars))
            .collect()
    }
}

impl FromStr for ProgressionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProgressionPreset::ALL
            .into_iter()
            .find(|preset| preset.id() == s)
            .ok_or_else(|| format!("unknown progression preset '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verse() -> Progression {
        Progression::new(
            1,
            vec![
                Chord::new(PitchClass::A, ChordQuality::Minor, 2),
                Chord::new(PitchClass::F, ChordQuality::Major, 2),
                Chord::new(PitchClass::C, ChordQuality::Major, 2),
                Chord::new(PitchClass::G, ChordQuality::Major, 2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_progression_rejected() {
        assert!(matches!(
            Progression::new(1, Vec::new()),
            Err(EngineError::LastChord)
        ));
    }

    #[test]
    fn test_chord_at_bar() {
        let progression = verse();
        assert_eq!(progression.total_bars(), 8);

        let labels: Vec<String> = (0..8).map(|b| progression.chord_at_bar(b).label()).collect();
        assert_eq!(labels, vec!["Am", "Am", "F", "F", "C", "C", "G", "G"]);
    }

    #[test]
    fn test_chord_at_bar_is_periodic() {
        let mut progression = verse();
        progression.set_bars(1, 3).unwrap();
        let total = progression.total_bars();

        for bar in 0..40 {
            assert_eq!(
                progression.chord_at_bar(bar),
                progression.chord_at_bar(bar + total)
            );
            assert_eq!(
                progression.chord_at_bar(bar),
                progression.chord_at_bar(bar + 3 * total)
            );
        }
    }

    #[test]
    fn test_add_chord_copies_last() {
        let mut progression = verse();
        let index = progression.add_chord();
        let added = progression.chord(index).unwrap();
        assert_eq!(added.root, PitchClass::G);
        assert_eq!(added.bars, 1);
        assert_eq!(progression.total_bars(), 9);
    }

    #[test]
    fn test_remove_chord_keeps_one() {
        let mut progression = Progression::starter(1, PitchClass::A);
        for _ in 0..3 {
            progression.remove_chord(0).unwrap();
        }
        assert!(matches!(
            progression.remove_chord(0),
            Err(EngineError::LastChord)
        ));
        assert!(matches!(
            progression.remove_chord(5),
            Err(EngineError::ChordOutOfRange(5))
        ));
    }

    #[test]
    fn test_set_bars_clamped() {
        let mut progression = verse();
        progression.set_bars(0, 20).unwrap();
        assert_eq!(progression.chord(0).unwrap().bars, MAX_CHORD_BARS);
        progression.set_bars(0, 0).unwrap();
        assert_eq!(progression.chord(0).unwrap().bars, 1);
        assert!(progression.set_bars(10, 2).is_err());
    }

    #[test]
    fn test_apply_preset_transposes() {
        let mut progression = verse();
        progression.apply_preset(ProgressionPreset::PopMajor, PitchClass::A);

        let labels: Vec<String> = progression.chords().iter().map(Chord::label).collect();
        assert_eq!(labels, vec!["A", "E", "F#m", "D"]);
    }

    #[test]
    fn test_blues_is_twelve_bars() {
        let mut progression = verse();
        progression.apply_preset(ProgressionPreset::Blues, PitchClass::C);
        assert_eq!(progression.total_bars(), 12);
        assert_eq!(progression.chord_at_bar(4).label(), "F7");
    }

    #[test]
    fn test_preset_ids() {
        for preset in ProgressionPreset::ALL {
            assert_eq!(preset.id().parse::<ProgressionPreset>(), Ok(preset));
        }
        assert_eq!(
            ProgressionPreset::Bossa.chords(PitchClass::C)[3].label(),
            "Bø7"
        );
    }
}
