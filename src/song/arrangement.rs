// Arrangement - ordered list of sections forming the song

use crate::error::{EngineError, EngineResult};
use crate::song::section::SectionId;
use serde::{Deserialize, Serialize};

/// Song order; a section may appear several times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    sections: Vec<SectionId>,
    /// Start again from the top after the last entry
    #[serde(default = "default_loop")]
    pub loop_enabled: bool,
}

fn default_loop() -> bool {
    true
}

impl Arrangement {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            loop_enabled: true,
        }
    }

    pub fn from_sections(sections: Vec<SectionId>) -> Self {
        Self {
            sections,
            loop_enabled: true,
        }
    }

    pub fn entries(&self) -> &[SectionId] {
        &self.sections
    }

    pub fn get(&self, index: usize) -> Option<SectionId> {
        self.sections.get(index).copied()
    }

    pub fn append(&mut self, section: SectionId) -> usize {
        self.sections.push(section);
        self.sections.len() - 1
    }

    pub fn remove_at(&mut self, index: usize) -> EngineResult<SectionId> {
        if index >= self.sections.len() {
            return Err(EngineError::ArrangementOutOfRange(index));
        }
        Ok(self.sections.remove(index))
    }

    /// Remove every entry of `section`, returning how many were removed
    pub fn remove_section(&mut self, section: SectionId) -> usize {
        let before = self.sections.len();
        self.sections.retain(|&s| s != section);
        before - self.sections.len()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// First entry whose section passes `is_live`
    pub fn first_valid(&self, is_live: impl Fn(SectionId) -> bool) -> Option<usize> {
        self.sections.iter().position(|&s| is_live(s))
    }

    /// Next entry after `current` whose section passes `is_live`, wrapping around
    ///
    /// Returns the index and whether the search wrapped past the end.
    pub fn next_valid_after(
        &self,
        current: usize,
        is_live: impl Fn(SectionId) -> bool,
    ) -> Option<(usize, bool)> {
        let len = self.sections.len();
        (1..=len)
            .map(|offset| current + offset)
            .find(|&index| is_live(self.sections[index % len]))
            .map(|index| (index % len, index >= len))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Default for Arrangement {
    fn default() -> Self {
        Self::new()
    }
}
