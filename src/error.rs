// Engine errors
// Only setup and editing entry points return these; the tick path recovers locally.

use crate::sequencer::pattern::PatternId;
use crate::song::section::SectionId;
use crate::harmony::progression::ProgressionId;

/// Errors raised by configuration and editing operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Unsupported step count: {0} (must be 16, 32 or 64)")]
    UnsupportedStepCount(u32),

    #[error("Unknown pattern: {0}")]
    UnknownPattern(PatternId),

    #[error("Unknown section: {0}")]
    UnknownSection(SectionId),

    #[error("Unknown progression: {0}")]
    UnknownProgression(ProgressionId),

    #[error("Cannot delete the last remaining pattern")]
    LastPattern,

    #[error("Cannot delete the last remaining section")]
    LastSection,

    #[error("A progression must keep at least one chord")]
    LastChord,

    #[error("Step {0} is out of range")]
    StepOutOfRange(u32),

    #[error("Timeline slot {0} is out of range")]
    SlotOutOfRange(usize),

    #[error("Chord index {0} is out of range")]
    ChordOutOfRange(usize),

    #[error("Note index {0} is out of range")]
    NoteOutOfRange(usize),

    #[error("Arrangement index {0} is out of range")]
    ArrangementOutOfRange(usize),

    #[error("Failed to spawn scheduler thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
