// Pattern - Per-instrument step grids for the drum engine
// A pattern is one loopable bar (or more) of steps for every drum instrument

use crate::drum::DrumInstrument;
use crate::error::{EngineError, EngineResult};
use crate::sequencer::tempo::StepCount;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for patterns
pub type PatternId = u64;

/// Velocity below this renders as a ghost hit
pub const GHOST_THRESHOLD: f32 = 0.5;

/// Velocity given to a step when it is cycled into the ghost state
pub const GHOST_VELOCITY: f32 = 0.35;

/// Trigger probability of a step, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Probability {
    P25,
    P50,
    P75,
    #[default]
    P100,
}

impl Probability {
    pub fn percent(&self) -> u8 {
        match self {
            Probability::P25 => 25,
            Probability::P50 => 50,
            Probability::P75 => 75,
            Probability::P100 => 100,
        }
    }

    /// Roll once: true with probability `percent / 100`
    ///
    /// Every call is an independent draw in [0, 100).
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_range(0.0..100.0) < self.percent() as f64
    }
}

impl TryFrom<u8> for Probability {
    type Error = String;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        match percent {
            25 => Ok(Probability::P25),
            50 => Ok(Probability::P50),
            75 => Ok(Probability::P75),
            100 => Ok(Probability::P100),
            other => Err(format!("unsupported step probability {}%", other)),
        }
    }
}

impl From<Probability> for u8 {
    fn from(probability: Probability) -> Self {
        probability.percent()
    }
}

/// Editing state a step cycles through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Off,
    Full,
    Ghost,
    Chance75,
    Chance50,
    Chance25,
}

impl StepState {
    /// Next state in the edit cycle: off → full → ghost → 75% → 50% → 25% → off
    pub fn next(self) -> Self {
        match self {
            StepState::Off => StepState::Full,
            StepState::Full => StepState::Ghost,
            StepState::Ghost => StepState::Chance75,
            StepState::Chance75 => StepState::Chance50,
            StepState::Chance50 => StepState::Chance25,
            StepState::Chance25 => StepState::Off,
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepState::Off => "off",
            StepState::Full => "full",
            StepState::Ghost => "ghost",
            StepState::Chance75 => "75%",
            StepState::Chance50 => "50%",
            StepState::Chance25 => "25%",
        };
        f.write_str(label)
    }
}

/// A single cell of the step grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    active: bool,
    velocity: f32,
    probability: Probability,
    /// Length in steps (>= 1)
    duration: u32,
}

impl Step {
    /// Inactive step with full velocity, 100% probability, one step long
    pub const OFF: Step = Step {
        active: false,
        velocity: 1.0,
        probability: Probability::P100,
        duration: 1,
    };

    /// Active step at the given velocity
    pub fn on(velocity: f32) -> Self {
        Self {
            active: true,
            velocity: velocity.clamp(0.0, 1.0),
            ..Self::OFF
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn probability(&self) -> Probability {
        self.probability
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn is_ghost(&self) -> bool {
        self.velocity < GHOST_THRESHOLD
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_velocity(&mut self, velocity: f32) {
        self.velocity = if velocity.is_finite() {
            velocity.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    pub fn set_probability(&mut self, probability: Probability) {
        self.probability = probability;
    }

    pub fn set_duration(&mut self, steps: u32) {
        self.duration = steps.max(1);
    }

    /// Current position in the edit cycle
    pub fn state(&self) -> StepState {
        if !self.active {
            return StepState::Off;
        }
        match self.probability {
            Probability::P100 if self.is_ghost() => StepState::Ghost,
            Probability::P100 => StepState::Full,
            Probability::P75 => StepState::Chance75,
            Probability::P50 => StepState::Chance50,
            Probability::P25 => StepState::Chance25,
        }
    }

    /// Overwrite activation, velocity and probability to match `state`
    pub fn apply_state(&mut self, state: StepState) {
        let (active, velocity, probability) = match state {
            StepState::Off => (false, 1.0, Probability::P100),
            StepState::Full => (true, 1.0, Probability::P100),
            StepState::Ghost => (true, GHOST_VELOCITY, Probability::P100),
            StepState::Chance75 => (true, 1.0, Probability::P75),
            StepState::Chance50 => (true, 1.0, Probability::P50),
            StepState::Chance25 => (true, 1.0, Probability::P25),
        };
        self.active = active;
        self.velocity = velocity;
        self.probability = probability;
    }

    /// Advance to the next edit state and return it
    pub fn cycle(&mut self) -> StepState {
        let next = self.state().next();
        self.apply_state(next);
        next
    }

    /// Decide whether this occurrence of the step sounds
    ///
    /// Inactive steps never fire; active ones reroll their probability on every call.
    pub fn should_fire<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.active && self.probability.roll(rng)
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::OFF
    }
}

/// Read-only pattern listing entry, for binding from other engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub id: PatternId,
    pub name: String,
}

/// A drum pattern: one row of steps per instrument
///
/// Every row always has the same length (the engine's step count).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Unique identifier
    pub id: PatternId,

    /// Pattern name
    pub name: String,

    /// Step rows, one per instrument
    tracks: BTreeMap<DrumInstrument, Vec<Step>>,
}

impl Pattern {
    /// Create a new empty pattern with every instrument present
    pub fn new(id: PatternId, name: String, steps: StepCount) -> Self {
        let tracks = DrumInstrument::ALL
            .iter()
            .map(|&instrument| (instrument, vec![Step::OFF; steps.get() as usize]))
            .collect();

        Self { id, name, tracks }
    }

    /// Number of steps in every row
    pub fn steps_per_pattern(&self) -> u32 {
        self.tracks
            .values()
            .next()
            .map(|row| row.len() as u32)
            .unwrap_or(0)
    }

    /// Row of steps for one instrument
    pub fn track(&self, instrument: DrumInstrument) -> &[Step] {
        self.tracks
            .get(&instrument)
            .map(|row| row.as_slice())
            .unwrap_or(&[])
    }

    pub fn step(&self, instrument: DrumInstrument, index: u32) -> Option<&Step> {
        self.tracks.get(&instrument)?.get(index as usize)
    }

    pub fn step_mut(&mut self, instrument: DrumInstrument, index: u32) -> Option<&mut Step> {
        self.tracks.get_mut(&instrument)?.get_mut(index as usize)
    }

    /// Flip a step on/off, returning its new activation
    pub fn toggle_step(&mut self, instrument: DrumInstrument, index: u32) -> Option<bool> {
        let step = self.step_mut(instrument, index)?;
        step.set_active(!step.is_active());
        Some(step.is_active())
    }

    /// Advance a step through the edit cycle, returning its new state
    pub fn cycle_step(&mut self, instrument: DrumInstrument, index: u32) -> Option<StepState> {
        self.step_mut(instrument, index).map(Step::cycle)
    }

    /// Activate the given step indices for an instrument (out-of-range indices are ignored)
    pub fn set_hits(&mut self, instrument: DrumInstrument, indices: &[u32]) {
        for &index in indices {
            if let Some(step) = self.step_mut(instrument, index) {
                step.set_active(true);
            }
        }
    }

    /// Indices of active steps for an instrument
    pub fn active_steps(&self, instrument: DrumInstrument) -> Vec<u32> {
        self.track(instrument)
            .iter()
            .enumerate()
            .filter(|(_, step)| step.is_active())
            .map(|(index, _)| index as u32)
            .collect()
    }

    /// Active steps of every instrument at a given index
    pub fn hits_at(&self, index: u32) -> impl Iterator<Item = (DrumInstrument, &Step)> + '_ {
        self.tracks.iter().filter_map(move |(&instrument, row)| {
            row.get(index as usize)
                .filter(|step| step.is_active())
                .map(|step| (instrument, step))
        })
    }

    /// Change the step count, keeping existing indices and filling new ones with OFF
    pub fn resize(&mut self, steps: StepCount) {
        for row in self.tracks.values_mut() {
            row.resize(steps.get() as usize, Step::OFF);
        }
    }

    /// Make sure every instrument has a row of the right length
    ///
    /// Used after loading external state, which may miss instruments.
    pub fn normalize(&mut self, steps: StepCount) {
        for instrument in DrumInstrument::ALL {
            self.tracks.entry(instrument).or_default();
        }
        self.resize(steps);
        for row in self.tracks.values_mut() {
            for step in row.iter_mut() {
                step.set_velocity(step.velocity);
                step.set_duration(step.duration);
            }
        }
    }

    /// Turn every step off
    pub fn clear(&mut self) {
        for row in self.tracks.values_mut() {
            row.fill(Step::OFF);
        }
    }

    /// Check if no step is active
    pub fn is_empty(&self) -> bool {
        self.tracks
            .values()
            .all(|row| row.iter().all(|step| !step.is_active()))
    }

    pub fn summary(&self) -> PatternSummary {
        PatternSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Owns every pattern of one drum engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStore {
    patterns: BTreeMap<PatternId, Pattern>,
    /// Last id handed out; ids are never reused
    counter: PatternId,
    steps: StepCount,
}

impl PatternStore {
    /// Create an empty store
    pub fn new(steps: StepCount) -> Self {
        Self {
            patterns: BTreeMap::new(),
            counter: 0,
            steps,
        }
    }

    /// Rebuild a store from loaded patterns, normalizing every row
    pub fn from_patterns(patterns: Vec<Pattern>, counter: PatternId, steps: StepCount) -> Self {
        let mut store = Self::new(steps);
        for mut pattern in patterns {
            pattern.normalize(steps);
            store.counter = store.counter.max(pattern.id);
            store.patterns.insert(pattern.id, pattern);
        }
        store.counter = store.counter.max(counter);
        store
    }

    pub fn step_count(&self) -> StepCount {
        self.steps
    }

    /// Create a new empty pattern; `None` names it "Pattern N"
    pub fn create(&mut self, name: Option<&str>) -> PatternId {
        self.counter += 1;
        let id = self.counter;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Pattern {}", id));
        self.patterns.insert(id, Pattern::new(id, name, self.steps));
        id
    }

    /// Copy a pattern under a new id, named "<name> Copy"
    pub fn duplicate(&mut self, id: PatternId) -> EngineResult<PatternId> {
        let source = self.get(id).ok_or(EngineError::UnknownPattern(id))?.clone();
        let copy_id = self.create(Some(&format!("{} Copy", source.name)));
        if let Some(copy) = self.patterns.get_mut(&copy_id) {
            copy.tracks = source.tracks;
        }
        Ok(copy_id)
    }

    /// Remove a pattern; the last remaining pattern cannot be removed
    pub fn remove(&mut self, id: PatternId) -> EngineResult<Pattern> {
        if !self.patterns.contains_key(&id) {
            return Err(EngineError::UnknownPattern(id));
        }
        if self.patterns.len() <= 1 {
            return Err(EngineError::LastPattern);
        }
        self.patterns
            .remove(&id)
            .ok_or(EngineError::UnknownPattern(id))
    }

    pub fn rename(&mut self, id: PatternId, name: &str) -> EngineResult<()> {
        let pattern = self.get_mut(id).ok_or(EngineError::UnknownPattern(id))?;
        pattern.name = name.to_string();
        Ok(())
    }

    pub fn get(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(&id)
    }

    pub fn get_mut(&mut self, id: PatternId) -> Option<&mut Pattern> {
        self.patterns.get_mut(&id)
    }

    pub fn contains(&self, id: PatternId) -> bool {
        self.patterns.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<PatternId> {
        self.patterns.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.values()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn counter(&self) -> PatternId {
        self.counter
    }

    /// Resize every pattern to a new step count
    pub fn resize_all(&mut self, steps: StepCount) {
        self.steps = steps;
        for pattern in self.patterns.values_mut() {
            pattern.resize(steps);
        }
    }

    /// `{id, name}` for every pattern, ordered by id
    pub fn list(&self) -> Vec<PatternSummary> {
        self.patterns.values().map(Pattern::summary).collect()
    }
}
