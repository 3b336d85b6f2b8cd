// Timeline - Slot-addressed sequence of pattern references
// Slots are played in order, skipping empty ones, for macro looping

use crate::error::{EngineError, EngineResult};
use crate::sequencer::pattern::PatternId;
use serde::{Deserialize, Serialize};

/// Number of slots in a drum timeline
pub const TIMELINE_SLOTS: usize = 32;

/// Fixed-capacity list of pattern slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    slots: Vec<Option<PatternId>>,
    /// Wrap from the last filled slot back to the first
    pub loop_enabled: bool,
}

impl Timeline {
    /// Create an empty timeline with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            loop_enabled: true,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<PatternId>] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<PatternId> {
        self.slots.get(index).copied().flatten()
    }

    /// Put a pattern in a slot (or empty it with `None`)
    pub fn set_slot(&mut self, index: usize, pattern: Option<PatternId>) -> EngineResult<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(EngineError::SlotOutOfRange(index))?;
        *slot = pattern;
        Ok(())
    }

    /// Place a pattern in the first empty slot, returning its index
    pub fn append(&mut self, pattern: PatternId) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(pattern);
        Some(index)
    }

    /// Empty every slot
    pub fn clear(&mut self) {
        self.slots.fill(None);
    }

    /// Empty every slot referencing `pattern`, returning how many were cleared
    pub fn remove_references(&mut self, pattern: PatternId) -> usize {
        let mut cleared = 0;
        for slot in self.slots.iter_mut().filter(|s| **s == Some(pattern)) {
            *slot = None;
            cleared += 1;
        }
        cleared
    }

    /// Empty every slot whose pattern fails `is_live`
    pub fn retain(&mut self, is_live: impl Fn(PatternId) -> bool) {
        for slot in self.slots.iter_mut() {
            if slot.is_some_and(|id| !is_live(id)) {
                *slot = None;
            }
        }
    }

    /// Index of the first filled slot
    pub fn first_filled(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_some)
    }

    /// Next filled slot after `current`, wrapping around the end
    ///
    /// Returns the slot index and whether the search wrapped. With a single
    /// filled slot this returns that same slot (wrapped).
    pub fn next_filled_after(&self, current: usize) -> Option<(usize, bool)> {
        let capacity = self.slots.len();
        (1..=capacity)
            .map(|offset| current + offset)
            .find(|&index| self.slots[index % capacity].is_some())
            .map(|index| (index % capacity, index >= capacity))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(TIMELINE_SLOTS)
    }
}
