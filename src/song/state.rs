// Song state - sections, progressions and arrangement edited by the user
// Progressions and sections are owned here and referenced by id

use crate::error::{EngineError, EngineResult};
use crate::harmony::chord::{Chord, ChordQuality, PitchClass};
use crate::harmony::progression::{Progression, ProgressionId, ProgressionPreset};
use crate::project::types::SongSnapshot;
use crate::sequencer::note::{NoteEvent, NotePattern};
use crate::sequencer::pattern::PatternId;
use crate::sequencer::tempo::Tempo;
use crate::song::SongInstrument;
use crate::song::arrangement::Arrangement;
use crate::song::section::{Section, SectionId};
use std::collections::BTreeMap;

/// Editable song arranger state
#[derive(Debug, Clone, PartialEq)]
pub struct SongState {
    tempo: Tempo,
    root_key: PitchClass,
    progressions: BTreeMap<ProgressionId, Progression>,
    sections: BTreeMap<SectionId, Section>,
    arrangement: Arrangement,
    current: SectionId,
    progression_counter: ProgressionId,
    section_counter: SectionId,
}

impl SongState {
    /// State with a single "Section 1" in A
    pub fn new() -> Self {
        let mut state = Self {
            tempo: Tempo::default(),
            root_key: PitchClass::A,
            progressions: BTreeMap::new(),
            sections: BTreeMap::new(),
            arrangement: Arrangement::new(),
            current: 0,
            progression_counter: 0,
            section_counter: 0,
        };
        state.current = state.create_section(None);
        state
    }

    /// Verse (Am F C G) and Chorus (F C G Am), two bars per chord, arranged V V C V C
    pub fn with_default_content() -> Self {
        let mut state = Self {
            tempo: Tempo::default(),
            root_key: PitchClass::A,
            progressions: BTreeMap::new(),
            sections: BTreeMap::new(),
            arrangement: Arrangement::new(),
            current: 0,
            progression_counter: 0,
            section_counter: 0,
        };

        let verse = state.create_section(Some("Verse"));
        let chorus = state.create_section(Some("Chorus"));

        let two_bars = |root, quality| Chord::new(root, quality, 2);
        let verse_chords = vec![
            two_bars(PitchClass::A, ChordQuality::Minor),
            two_bars(PitchClass::F, ChordQuality::Major),
            two_bars(PitchClass::C, ChordQuality::Major),
            two_bars(PitchClass::G, ChordQuality::Major),
        ];
        let chorus_chords = vec![
            two_bars(PitchClass::F, ChordQuality::Major),
            two_bars(PitchClass::C, ChordQuality::Major),
            two_bars(PitchClass::G, ChordQuality::Major),
            two_bars(PitchClass::A, ChordQuality::Minor),
        ];
        for (section, chords, extra) in [
            (verse, verse_chords, SongInstrument::Pad),
            (chorus, chorus_chords, SongInstrument::Guitar),
        ] {
            if let Some(section) = state.sections.get_mut(&section) {
                section.part_mut(extra).enabled = true;
                let id = section.progression;
                if let Ok(progression) = Progression::new(id, chords) {
                    state.progressions.insert(id, progression);
                }
            }
        }

        for section in [verse, verse, chorus, verse, chorus] {
            state.arrangement.append(section);
        }
        state.current = verse;
        state
    }

    // Tempo and key

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.tempo.set_bpm(bpm);
    }

    pub fn root_key(&self) -> PitchClass {
        self.root_key
    }

    /// Key used when applying presets; existing chords are untouched
    pub fn set_root_key(&mut self, root: PitchClass) {
        self.root_key = root;
    }

    // Sections

    pub fn sections(&self) -> impl Iterator<Item = &Section> + '_ {
        self.sections.values()
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(&id)
    }

    pub fn contains_section(&self, id: SectionId) -> bool {
        self.sections.contains_key(&id)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn current_section_id(&self) -> SectionId {
        self.current
    }

    pub fn current_section(&self) -> Option<&Section> {
        self.sections.get(&self.current)
    }

    pub fn select_section(&mut self, id: SectionId) -> EngineResult<()> {
        if !self.sections.contains_key(&id) {
            return Err(EngineError::UnknownSection(id));
        }
        self.current = id;
        Ok(())
    }

    /// Create a section with its own starter progression in the root key
    pub fn create_section(&mut self, name: Option<&str>) -> SectionId {
        self.progression_counter += 1;
        let progression = self.progression_counter;
        self.progressions
            .insert(progression, Progression::starter(progression, self.root_key));

        self.section_counter += 1;
        let id = self.section_counter;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Section {}", id));
        self.sections.insert(
            id,
            Section::new(id, name, Section::palette_color(id), progression),
        );
        tracing::debug!(section = id, progression, "section created");
        id
    }

    pub fn rename_section(&mut self, id: SectionId, name: &str) -> EngineResult<()> {
        let section = self.section_mut(id)?;
        let trimmed = name.trim();
        section.name = if trimmed.is_empty() {
            "Section".to_string()
        } else {
            trimmed.to_string()
        };
        Ok(())
    }

    pub fn set_section_color(&mut self, id: SectionId, color: &str) -> EngineResult<()> {
        self.section_mut(id)?.color = color.to_string();
        Ok(())
    }

    /// Delete a section
    ///
    /// Refuses the last section. Arrangement entries of the section are removed,
    /// as is its progression unless another section shares it.
    pub fn delete_section(&mut self, id: SectionId) -> EngineResult<()> {
        if !self.sections.contains_key(&id) {
            return Err(EngineError::UnknownSection(id));
        }
        if self.sections.len() <= 1 {
            return Err(EngineError::LastSection);
        }

        let Some(section) = self.sections.remove(&id) else {
            return Err(EngineError::UnknownSection(id));
        };
        let shared = self
            .sections
            .values()
            .any(|other| other.progression == section.progression);
        if !shared {
            self.progressions.remove(&section.progression);
        }
        let removed = self.arrangement.remove_section(id);

        if self.current == id {
            self.current = self.sections.keys().next().copied().unwrap_or_default();
        }
        tracing::debug!(section = id, arrangement_entries = removed, "section deleted");
        Ok(())
    }

    /// Play `pattern` (owned by the drum engine) on every bar of the section
    pub fn set_section_drum_pattern(
        &mut self,
        id: SectionId,
        pattern: Option<PatternId>,
    ) -> EngineResult<()> {
        self.section_mut(id)?.drum_pattern = pattern;
        Ok(())
    }

    /// Clear drum pattern references that `is_live` rejects, returning how many were cleared
    pub fn clear_dangling_drum_patterns(&mut self, is_live: impl Fn(PatternId) -> bool) -> usize {
        let mut cleared = 0;
        for section in self.sections.values_mut() {
            if section.drum_pattern.is_some_and(|p| !is_live(p)) {
                section.drum_pattern = None;
                cleared += 1;
            }
        }
        cleared
    }

    // Instruments

    pub fn set_instrument_enabled(
        &mut self,
        id: SectionId,
        instrument: SongInstrument,
        enabled: bool,
    ) -> EngineResult<()> {
        self.section_mut(id)?.part_mut(instrument).enabled = enabled;
        Ok(())
    }

    pub fn set_instrument_volume(
        &mut self,
        id: SectionId,
        instrument: SongInstrument,
        volume: f32,
    ) -> EngineResult<()> {
        self.section_mut(id)?.part_mut(instrument).volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_instrument_variant(
        &mut self,
        id: SectionId,
        instrument: SongInstrument,
        variant: Option<String>,
    ) -> EngineResult<()> {
        self.section_mut(id)?.part_mut(instrument).variant = variant;
        Ok(())
    }

    // Note overlays

    /// Add a note to the instrument's overlay, creating an active overlay if needed
    pub fn add_note(
        &mut self,
        id: SectionId,
        instrument: SongInstrument,
        note: NoteEvent,
    ) -> EngineResult<()> {
        self.section_mut(id)?
            .part_mut(instrument)
            .notes
            .get_or_insert_with(NotePattern::new)
            .add_note(note);
        Ok(())
    }

    pub fn remove_note(
        &mut self,
        id: SectionId,
        instrument: SongInstrument,
        index: usize,
    ) -> EngineResult<NoteEvent> {
        self.section_mut(id)?
            .part_mut(instrument)
            .notes
            .as_mut()
            .and_then(|notes| notes.remove_note(index))
            .ok_or(EngineError::NoteOutOfRange(index))
    }

    /// Switch between the note overlay and chord tones
    pub fn set_notes_active(
        &mut self,
        id: SectionId,
        instrument: SongInstrument,
        active: bool,
    ) -> EngineResult<()> {
        let part = self.section_mut(id)?.part_mut(instrument);
        match part.notes.as_mut() {
            Some(notes) => notes.active = active,
            None if active => part.notes = Some(NotePattern::new()),
            None => {}
        }
        Ok(())
    }

    /// Drop the overlay entirely; the instrument plays chord tones again
    pub fn clear_notes(&mut self, id: SectionId, instrument: SongInstrument) -> EngineResult<()> {
        self.section_mut(id)?.part_mut(instrument).notes = None;
        Ok(())
    }

    // Progressions

    pub fn progression(&self, id: ProgressionId) -> Option<&Progression> {
        self.progressions.get(&id)
    }

    pub fn progressions(&self) -> impl Iterator<Item = &Progression> + '_ {
        self.progressions.values()
    }

    /// Progression of a section, if it still exists
    pub fn section_progression(&self, id: SectionId) -> Option<&Progression> {
        self.sections
            .get(&id)
            .and_then(|section| self.progressions.get(&section.progression))
    }

    /// Bars a section lasts; a missing progression counts as four silent bars
    pub fn section_bars(&self, id: SectionId) -> u32 {
        self.section_progression(id)
            .map(Progression::total_bars)
            .unwrap_or(4)
    }

    /// Mutable progression of a section
    pub fn progression_mut(&mut self, section: SectionId) -> EngineResult<&mut Progression> {
        let id = self
            .sections
            .get(&section)
            .ok_or(EngineError::UnknownSection(section))?
            .progression;
        self.progressions
            .get_mut(&id)
            .ok_or(EngineError::UnknownProgression(id))
    }

    pub fn add_chord(&mut self, section: SectionId) -> EngineResult<usize> {
        Ok(self.progression_mut(section)?.add_chord())
    }

    pub fn remove_chord(&mut self, section: SectionId, index: usize) -> EngineResult<Chord> {
        self.progression_mut(section)?.remove_chord(index)
    }

    pub fn set_chord_root(
        &mut self,
        section: SectionId,
        index: usize,
        root: PitchClass,
    ) -> EngineResult<()> {
        self.progression_mut(section)?.set_root(index, root)
    }

    pub fn set_chord_quality(
        &mut self,
        section: SectionId,
        index: usize,
        quality: ChordQuality,
    ) -> EngineResult<()> {
        self.progression_mut(section)?.set_quality(index, quality)
    }

    pub fn set_chord_bars(&mut self, section: SectionId, index: usize, bars: u32) -> EngineResult<()> {
        self.progression_mut(section)?.set_bars(index, bars)
    }

    /// Replace a section's chords with a preset transposed to the root key
    pub fn apply_preset(&mut self, section: SectionId, preset: ProgressionPreset) -> EngineResult<()> {
        let root = self.root_key;
        self.progression_mut(section)?.apply_preset(preset, root);
        tracing::debug!(section, preset = preset.id(), root = root.name(), "preset applied");
        Ok(())
    }

    // Arrangement

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    pub fn append_to_arrangement(&mut self, section: SectionId) -> EngineResult<usize> {
        if !self.sections.contains_key(&section) {
            return Err(EngineError::UnknownSection(section));
        }
        Ok(self.arrangement.append(section))
    }

    pub fn remove_from_arrangement(&mut self, index: usize) -> EngineResult<SectionId> {
        self.arrangement.remove_at(index)
    }

    pub fn clear_arrangement(&mut self) {
        self.arrangement.clear();
    }

    pub fn set_arrangement_loop(&mut self, enabled: bool) {
        self.arrangement.loop_enabled = enabled;
    }

    fn section_mut(&mut self, id: SectionId) -> EngineResult<&mut Section> {
        self.sections
            .get_mut(&id)
            .ok_or(EngineError::UnknownSection(id))
    }

    // Persistence

    pub fn snapshot(&self) -> SongSnapshot {
        SongSnapshot {
            bpm: self.tempo.bpm(),
            root_key: self.root_key,
            progressions: self.progressions.values().cloned().collect(),
            sections: self.sections.values().cloned().collect(),
            arrangement: self.arrangement.clone(),
            current_section: Some(self.current),
            progression_counter: self.progression_counter,
            section_counter: self.section_counter,
        }
    }

    /// Rebuild state from a snapshot
    ///
    /// Empty progressions are replaced with a starter progression, arrangement
    /// entries pointing at missing sections are removed, and an empty snapshot
    /// yields a single fresh section.
    pub fn from_snapshot(snapshot: SongSnapshot) -> Self {
        let root_key = snapshot.root_key;
        let progressions: BTreeMap<ProgressionId, Progression> = snapshot
            .progressions
            .into_iter()
            .map(|progression| {
                let id = progression.id;
                let progression = Progression::new(id, progression.chords().to_vec())
                    .unwrap_or_else(|_| {
                        tracing::warn!(progression = id, "empty progression replaced with starter");
                        Progression::starter(id, root_key)
                    });
                (id, progression)
            })
            .collect();

        let sections: BTreeMap<SectionId, Section> = snapshot
            .sections
            .into_iter()
            .map(|mut section| {
                section.normalize();
                (section.id, section)
            })
            .collect();

        let progression_counter = progressions
            .keys()
            .copied()
            .max()
            .unwrap_or(0)
            .max(snapshot.progression_counter);
        let section_counter = sections
            .keys()
            .copied()
            .max()
            .unwrap_or(0)
            .max(snapshot.section_counter);

        let mut state = Self {
            tempo: Tempo::new(snapshot.bpm),
            root_key,
            progressions,
            sections,
            arrangement: snapshot.arrangement,
            current: 0,
            progression_counter,
            section_counter,
        };

        if state.sections.is_empty() {
            tracing::warn!("snapshot without sections, creating an empty one");
            state.create_section(None);
        }

        let dangling: Vec<SectionId> = state
            .arrangement
            .entries()
            .iter()
            .copied()
            .filter(|id| !state.sections.contains_key(id))
            .collect();
        for id in dangling {
            tracing::warn!(section = id, "dangling arrangement entry removed");
            state.arrangement.remove_section(id);
        }

        state.current = snapshot
            .current_section
            .filter(|id| state.sections.contains_key(id))
            .or_else(|| state.sections.keys().next().copied())
            .unwrap_or_default();
        state
    }
}

impl Default for SongState {
    fn default() -> Self {
        Self::with_default_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_song() {
        let state = SongState::with_default_content();
        let ids: Vec<SectionId> = state.sections().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(state.arrangement().entries(), &[1, 1, 2, 1, 2]);
        assert_eq!(state.section_bars(1), 8);
        assert_eq!(state.current_section_id(), 1);

        let verse = state.section_progression(1).unwrap();
        let labels: Vec<String> = verse.chords().iter().map(Chord::label).collect();
        assert_eq!(labels, vec!["Am", "F", "C", "G"]);

        let chorus = state.section(2).unwrap();
        assert_eq!(chorus.color, "#FF6B6B");
        assert!(chorus.part(SongInstrument::Guitar).unwrap().enabled);
        assert!(state.section(1).unwrap().part(SongInstrument::Pad).unwrap().enabled);
    }

    #[test]
    fn test_create_section_uses_root_key() {
        let mut state = SongState::new();
        state.set_root_key(PitchClass::new(2));
        let id = state.create_section(None);

        let section = state.section(id).unwrap();
        assert_eq!(section.name, "Section 2");
        assert_eq!(section.color, "#FF6B6B");
        assert_eq!(
            state.section_progression(id).unwrap().chords()[0].label(),
            "Dm"
        );
    }

    #[test]
    fn test_delete_section_cleans_references() {
        let mut state = SongState::with_default_content();
        let verse_progression = state.section(1).unwrap().progression;

        state.delete_section(1).unwrap();

        assert_eq!(state.arrangement().entries(), &[2, 2]);
        assert!(state.progression(verse_progression).is_none());
        assert_eq!(state.current_section_id(), 2);
        assert!(matches!(state.delete_section(2), Err(EngineError::LastSection)));
        assert!(matches!(
            state.delete_section(1),
            Err(EngineError::UnknownSection(1))
        ));
    }

    #[test]
    fn test_shared_progression_survives_delete() {
        let mut state = SongState::with_default_content();
        let extra = state.create_section(Some("Outro"));
        let chorus_progression = state.section(2).unwrap().progression;
        state.sections.get_mut(&extra).unwrap().progression = chorus_progression;

        state.delete_section(extra).unwrap();
        assert!(state.progression(chorus_progression).is_some());
    }

    #[test]
    fn test_chord_editing() {
        let mut state = SongState::new();
        let id = state.current_section_id();

        assert_eq!(state.add_chord(id).unwrap(), 4);
        state.set_chord_bars(id, 4, 20).unwrap();
        assert_eq!(state.section_bars(id), 4 + 8);

        state.set_chord_quality(id, 0, ChordQuality::Minor7).unwrap();
        state.set_chord_root(id, 0, PitchClass::new(4)).unwrap();
        assert_eq!(state.section_progression(id).unwrap().chords()[0].label(), "Em7");

        assert!(matches!(
            state.remove_chord(id, 10),
            Err(EngineError::ChordOutOfRange(10))
        ));
    }

    #[test]
    fn test_apply_preset_in_root_key() {
        let mut state = SongState::new();
        let id = state.current_section_id();
        state.set_root_key(PitchClass::C);
        state.apply_preset(id, ProgressionPreset::PopMajor).unwrap();

        let labels: Vec<String> = state
            .section_progression(id)
            .unwrap()
            .chords()
            .iter()
            .map(Chord::label)
            .collect();
        assert_eq!(labels, vec!["C", "G", "Am", "F"]);
    }

    #[test]
    fn test_note_overlay_editing() {
        let mut state = SongState::new();
        let id = state.current_section_id();
        state
            .add_note(id, SongInstrument::Piano, NoteEvent::new(64, 4, 2, 0.9))
            .unwrap();

        let part = state.section(id).unwrap().part(SongInstrument::Piano).unwrap();
        assert_eq!(part.active_notes().unwrap().len(), 1);

        state.set_notes_active(id, SongInstrument::Piano, false).unwrap();
        let part = state.section(id).unwrap().part(SongInstrument::Piano).unwrap();
        assert!(part.active_notes().is_none());

        assert!(state.remove_note(id, SongInstrument::Piano, 0).is_ok());
        assert!(matches!(
            state.remove_note(id, SongInstrument::Piano, 0),
            Err(EngineError::NoteOutOfRange(0))
        ));
    }

    #[test]
    fn test_arrangement_rejects_unknown_section() {
        let mut state = SongState::new();
        assert!(matches!(
            state.append_to_arrangement(42),
            Err(EngineError::UnknownSection(42))
        ));
        assert_eq!(state.append_to_arrangement(1).unwrap(), 0);
    }

    #[test]
    fn test_snapshot_restore_repairs_references() {
        let mut snapshot = SongState::with_default_content().snapshot();
        snapshot.arrangement.append(99);
        snapshot.current_section = Some(99);
        snapshot.bpm = 1000.0;

        let state = SongState::from_snapshot(snapshot);
        assert_eq!(state.arrangement().entries(), &[1, 1, 2, 1, 2]);
        assert_eq!(state.current_section_id(), 1);
        assert_eq!(state.tempo().bpm(), crate::sequencer::tempo::MAX_BPM);

        // Counters continue after restored ids
        let mut state = state;
        assert_eq!(state.create_section(None), 3);
    }

    #[test]
    fn test_clear_dangling_drum_patterns() {
        let mut state = SongState::with_default_content();
        state.set_section_drum_pattern(1, Some(1)).unwrap();
        state.set_section_drum_pattern(2, Some(7)).unwrap();

        assert_eq!(state.clear_dangling_drum_patterns(|p| p == 1), 1);
        assert_eq!(state.section(1).unwrap().drum_pattern, Some(1));
        assert_eq!(state.section(2).unwrap().drum_pattern, None);
    }
}
