// Pitch ranges for melodic instruments
// Out-of-range pitches are folded by octaves, never clipped

use serde::{Deserialize, Serialize};

/// Playable MIDI range of an instrument (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchRange {
    pub min: u8,
    pub max: u8,
}

impl PitchRange {
    pub const fn new(min: u8, max: u8) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn contains(&self, pitch: i32) -> bool {
        (self.min as i32..=self.max as i32).contains(&pitch)
    }

    /// Shift `pitch` by whole octaves until it lands in range
    ///
    /// Returns `None` when no octave of the pitch class fits (ranges narrower
    /// than an octave). The pitch class is always preserved.
    pub fn fold(&self, pitch: i32) -> Option<u8> {
        if self.contains(pitch) {
            return Some(pitch as u8);
        }

        let (min, max, pitch) = (self.min as i64, self.max as i64, pitch as i64);
        let folded = if pitch < min {
            // Lowest octave of the pitch class at or above `min`
            min + (pitch - min).rem_euclid(12)
        } else {
            // Highest octave at or below `max`
            max - (max - pitch).rem_euclid(12)
        };
        (min..=max).contains(&folded).then_some(folded as u8)
    }

    /// Fold every pitch, dropping those that cannot fit
    pub fn fold_all(&self, pitches: &[i32]) -> Vec<u8> {
        pitches
            .iter()
            .filter_map(|&pitch| {
                let folded = self.fold(pitch);
                if folded.is_none() {
                    tracing::debug!(pitch, min = self.min, max = self.max, "pitch dropped by range fold");
                }
                folded
            })
            .collect()
    }
}

impl Default for PitchRange {
    fn default() -> Self {
        Self::new(0, 127)
    }
}
