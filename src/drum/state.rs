// Drum state - everything the user edits on the drum machine
// Patterns, timeline, tempo and per-instrument channels, owned by one engine

use crate::drum::{DEFAULT_DRUM_VOLUME, DrumInstrument};
use crate::error::{EngineError, EngineResult};
use crate::project::types::DrumSnapshot;
use crate::sequencer::pattern::{
    Pattern, PatternId, PatternStore, PatternSummary, Probability, Step, StepState,
};
use crate::sequencer::tempo::{StepCount, Swing, Tempo};
use crate::sequencer::timeline::Timeline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mixer settings of one drum instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrumChannel {
    /// Scales the velocity of every hit (0.0 - 1.0)
    pub volume: f32,
    /// Muted channels are not dispatched (their steps are kept)
    pub muted: bool,
}

impl Default for DrumChannel {
    fn default() -> Self {
        Self {
            volume: DEFAULT_DRUM_VOLUME,
            muted: false,
        }
    }
}

/// Editable drum machine state
#[derive(Debug, Clone, PartialEq)]
pub struct DrumState {
    tempo: Tempo,
    swing: Swing,
    patterns: PatternStore,
    timeline: Timeline,
    current: PatternId,
    channels: BTreeMap<DrumInstrument, DrumChannel>,
}

impl DrumState {
    /// State with a single empty pattern
    pub fn new(steps: StepCount) -> Self {
        let mut patterns = PatternStore::new(steps);
        let current = patterns.create(None);
        Self {
            tempo: Tempo::default(),
            swing: Swing::default(),
            patterns,
            timeline: Timeline::default(),
            current,
            channels: default_channels(),
        }
    }

    /// "Pattern 1" with a basic rock beat: kick on the beats, snare on 2 and 4, 8th-note hats
    pub fn with_default_content() -> Self {
        let mut state = Self::new(StepCount::default());
        if let Some(pattern) = state.patterns.get_mut(state.current) {
            pattern.set_hits(DrumInstrument::Kick, &[0, 4, 8, 12]);
            pattern.set_hits(DrumInstrument::Snare, &[4, 12]);
            pattern.set_hits(DrumInstrument::HiHat, &[0, 2, 4, 6, 8, 10, 12, 14]);
        }
        state
    }

    // Tempo

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Set tempo; out-of-range values are clamped
    pub fn set_bpm(&mut self, bpm: f64) {
        self.tempo.set_bpm(bpm);
    }

    pub fn swing(&self) -> Swing {
        self.swing
    }

    pub fn set_swing(&mut self, amount: f64) {
        self.swing = Swing::new(amount);
    }

    pub fn steps(&self) -> StepCount {
        self.patterns.step_count()
    }

    /// Resize every pattern; only the engine calls this so it can restart playback
    pub(crate) fn set_steps(&mut self, steps: StepCount) {
        self.patterns.resize_all(steps);
    }

    // Patterns

    pub fn patterns(&self) -> &PatternStore {
        &self.patterns
    }

    pub fn pattern(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(id)
    }

    pub fn pattern_list(&self) -> Vec<PatternSummary> {
        self.patterns.list()
    }

    pub fn current_pattern_id(&self) -> PatternId {
        self.current
    }

    pub fn current_pattern(&self) -> Option<&Pattern> {
        self.patterns.get(self.current)
    }

    pub fn select_pattern(&mut self, id: PatternId) -> EngineResult<()> {
        if !self.patterns.contains(id) {
            return Err(EngineError::UnknownPattern(id));
        }
        self.current = id;
        Ok(())
    }

    /// Create an empty pattern and select it
    pub fn create_pattern(&mut self, name: Option<&str>) -> PatternId {
        let id = self.patterns.create(name);
        self.current = id;
        id
    }

    /// Copy a pattern and select the copy
    pub fn duplicate_pattern(&mut self, id: PatternId) -> EngineResult<PatternId> {
        let copy = self.patterns.duplicate(id)?;
        self.current = copy;
        Ok(copy)
    }

    pub fn rename_pattern(&mut self, id: PatternId, name: &str) -> EngineResult<()> {
        self.patterns.rename(id, name)
    }

    /// Delete a pattern, emptying the timeline slots that referenced it
    ///
    /// The last pattern cannot be deleted. If the deleted pattern was selected,
    /// the previous pattern (by id order) becomes current.
    pub fn delete_pattern(&mut self, id: PatternId) -> EngineResult<()> {
        let ids = self.patterns.ids();
        let position = ids.iter().position(|&p| p == id);
        self.patterns.remove(id)?;

        let cleared = self.timeline.remove_references(id);
        if cleared > 0 {
            tracing::debug!(pattern = id, slots = cleared, "timeline slots cleared");
        }

        if self.current == id {
            let remaining = self.patterns.ids();
            let fallback = position.unwrap_or(0).saturating_sub(1);
            if let Some(&next) = remaining.get(fallback).or_else(|| remaining.first()) {
                self.current = next;
            }
        }
        Ok(())
    }

    // Steps

    pub fn toggle_step(
        &mut self,
        pattern: PatternId,
        instrument: DrumInstrument,
        step: u32,
    ) -> EngineResult<bool> {
        self.pattern_mut(pattern)?
            .toggle_step(instrument, step)
            .ok_or(EngineError::StepOutOfRange(step))
    }

    /// Advance a step through off → full → ghost → 75% → 50% → 25% → off
    pub fn cycle_step(
        &mut self,
        pattern: PatternId,
        instrument: DrumInstrument,
        step: u32,
    ) -> EngineResult<StepState> {
        self.pattern_mut(pattern)?
            .cycle_step(instrument, step)
            .ok_or(EngineError::StepOutOfRange(step))
    }

    pub fn set_step_velocity(
        &mut self,
        pattern: PatternId,
        instrument: DrumInstrument,
        step: u32,
        velocity: f32,
    ) -> EngineResult<()> {
        self.step_mut(pattern, instrument, step)?
            .set_velocity(velocity);
        Ok(())
    }

    pub fn set_step_probability(
        &mut self,
        pattern: PatternId,
        instrument: DrumInstrument,
        step: u32,
        probability: Probability,
    ) -> EngineResult<()> {
        self.step_mut(pattern, instrument, step)?
            .set_probability(probability);
        Ok(())
    }

    pub fn set_step_duration(
        &mut self,
        pattern: PatternId,
        instrument: DrumInstrument,
        step: u32,
        steps: u32,
    ) -> EngineResult<()> {
        self.step_mut(pattern, instrument, step)?.set_duration(steps);
        Ok(())
    }

    /// Turn every step of a pattern off
    pub fn clear_pattern(&mut self, pattern: PatternId) -> EngineResult<()> {
        self.pattern_mut(pattern)?.clear();
        Ok(())
    }

    fn pattern_mut(&mut self, id: PatternId) -> EngineResult<&mut Pattern> {
        self.patterns
            .get_mut(id)
            .ok_or(EngineError::UnknownPattern(id))
    }

    fn step_mut(
        &mut self,
        pattern: PatternId,
        instrument: DrumInstrument,
        step: u32,
    ) -> EngineResult<&mut Step> {
        self.pattern_mut(pattern)?
            .step_mut(instrument, step)
            .ok_or(EngineError::StepOutOfRange(step))
    }

    // Channels

    pub fn channel(&self, instrument: DrumInstrument) -> DrumChannel {
        self.channels.get(&instrument).copied().unwrap_or_default()
    }

    pub fn set_volume(&mut self, instrument: DrumInstrument, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            DEFAULT_DRUM_VOLUME
        };
        self.channels.entry(instrument).or_default().volume = volume;
    }

    pub fn set_muted(&mut self, instrument: DrumInstrument, muted: bool) {
        self.channels.entry(instrument).or_default().muted = muted;
    }

    pub fn is_muted(&self, instrument: DrumInstrument) -> bool {
        self.channel(instrument).muted
    }

    // Timeline

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Put a pattern (or nothing) in a timeline slot
    pub fn set_timeline_slot(&mut self, slot: usize, pattern: Option<PatternId>) -> EngineResult<()> {
        if let Some(id) = pattern
            && !self.patterns.contains(id)
        {
            return Err(EngineError::UnknownPattern(id));
        }
        self.timeline.set_slot(slot, pattern)
    }

    /// Place the current pattern in the first empty slot
    pub fn append_current_to_timeline(&mut self) -> Option<usize> {
        self.timeline.append(self.current)
    }

    pub fn clear_timeline(&mut self) {
        self.timeline.clear();
    }

    pub fn set_timeline_loop(&mut self, enabled: bool) {
        self.timeline.loop_enabled = enabled;
    }

    // Persistence

    pub fn snapshot(&self) -> DrumSnapshot {
        DrumSnapshot {
            bpm: self.tempo.bpm(),
            steps_per_pattern: self.steps().get(),
            swing: self.swing.amount(),
            patterns: self.patterns.iter().cloned().collect(),
            pattern_counter: self.patterns.counter(),
            current_pattern: Some(self.current),
            timeline: self.timeline.clone(),
            channels: self.channels.clone(),
        }
    }

    /// Rebuild state from a snapshot
    ///
    /// Configuration values are clamped, rows are normalized to the step count,
    /// and timeline slots pointing at missing patterns are emptied.
    pub fn from_snapshot(snapshot: DrumSnapshot) -> Self {
        let steps = StepCount::clamped(snapshot.steps_per_pattern);
        let mut patterns =
            PatternStore::from_patterns(snapshot.patterns, snapshot.pattern_counter, steps);
        if patterns.is_empty() {
            tracing::warn!("snapshot without drum patterns, creating an empty one");
            patterns.create(None);
        }

        let mut timeline = Timeline::default();
        timeline.loop_enabled = snapshot.timeline.loop_enabled;
        for (index, slot) in snapshot.timeline.slots().iter().enumerate() {
            if let Some(id) = *slot {
                if patterns.contains(id) {
                    let _ = timeline.set_slot(index, Some(id));
                } else {
                    tracing::warn!(slot = index, pattern = id, "dangling timeline slot cleared");
                }
            }
        }

        let current = snapshot
            .current_pattern
            .filter(|&id| patterns.contains(id))
            .or_else(|| patterns.ids().first().copied())
            .unwrap_or_default();

        let mut channels = default_channels();
        channels.extend(snapshot.channels);
        let mut state = Self {
            tempo: Tempo::new(snapshot.bpm),
            swing: Swing::new(snapshot.swing),
            patterns,
            timeline,
            current,
            channels,
        };
        for instrument in DrumInstrument::ALL {
            let volume = state.channel(instrument).volume;
            state.set_volume(instrument, volume);
        }
        state
    }
}

impl Default for DrumState {
    fn default() -> Self {
        Self::with_default_content()
    }
}

fn default_channels() -> BTreeMap<DrumInstrument, DrumChannel> {
    DrumInstrument::ALL
        .into_iter()
        .map(|instrument| (instrument, DrumChannel::default()))
        .collect()
}
