// Sequencer module
// Step grids, note overlays, timelines, tempo math and transport state

pub mod note;
pub mod pattern;
pub mod tempo;
pub mod timeline;
pub mod transport;

pub use note::{NoteEvent, NotePattern};
pub use pattern::{
    GHOST_THRESHOLD, GHOST_VELOCITY, Pattern, PatternId, PatternStore, PatternSummary,
    Probability, Step, StepState,
};
pub use tempo::{StepCount, Swing, Tempo};
pub use timeline::{TIMELINE_SLOTS, Timeline};
pub use transport::{PlayMode, PlaybackCursor, TransportAction, TransportState};
