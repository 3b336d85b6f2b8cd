// Note representation for piano-roll overlays
// A note is an explicit pitch placed on the step grid of a section

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A note in a section's piano roll
///
/// Positions and lengths are in steps (sixteenth notes) from the start of the section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI note number (0-127, where 60 = C4)
    pub pitch: u8,

    /// Start step, relative to the section start
    pub start_step: u32,

    /// Length in steps (>= 1)
    pub duration_steps: u32,

    /// Velocity (0.0 - 1.0)
    pub velocity: f32,
}

impl NoteEvent {
    /// Creates a new note; pitch, length and velocity are clamped into range
    pub fn new(pitch: u8, start_step: u32, duration_steps: u32, velocity: f32) -> Self {
        Self {
            pitch: pitch.min(127),
            start_step,
            duration_steps: duration_steps.max(1),
            velocity: if velocity.is_finite() {
                velocity.clamp(0.0, 1.0)
            } else {
                1.0
            },
        }
    }

    /// Check if the note starts inside a step window
    pub fn starts_in(&self, window: &Range<u32>) -> bool {
        window.contains(&self.start_step)
    }

    /// Get the note name (e.g., "C4", "A#5")
    pub fn note_name(&self) -> String {
        crate::harmony::chord::midi_note_name(self.pitch)
    }
}

/// Optional per-instrument overlay replacing chord-tone playback
///
/// When `active`, the instrument plays only these notes; otherwise it plays the
/// section's chords and the notes are kept for later.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotePattern {
    pub active: bool,
    notes: Vec<NoteEvent>,
}

impl NotePattern {
    /// Create an empty, active overlay
    pub fn new() -> Self {
        Self {
            active: true,
            notes: Vec::new(),
        }
    }

    /// Build an overlay from notes in any order
    pub fn from_notes(notes: impl IntoIterator<Item = NoteEvent>) -> Self {
        let mut pattern = Self::new();
        for note in notes {
            pattern.add_note(note);
        }
        pattern
    }

    /// Get all notes, ordered by start step
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    /// Add a note, keeping notes sorted by start step
    pub fn add_note(&mut self, note: NoteEvent) {
        let note = NoteEvent::new(note.pitch, note.start_step, note.duration_steps, note.velocity);
        let insert_pos = self
            .notes
            .partition_point(|n| n.start_step <= note.start_step);

        self.notes.insert(insert_pos, note);
    }

    /// Remove the note at `index`
    pub fn remove_note(&mut self, index: usize) -> Option<NoteEvent> {
        (index < self.notes.len()).then(|| self.notes.remove(index))
    }

    /// Notes whose start step falls inside `window`
    pub fn notes_starting_in(&self, window: Range<u32>) -> impl Iterator<Item = &NoteEvent> + '_ {
        let first = self.notes.partition_point(|n| n.start_step < window.start);
        self.notes[first..]
            .iter()
            .take_while(move |n| n.starts_in(&window))
    }

    /// Clear all notes
    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
