// Wavr sequencer - Library exports for the binary, tests and benchmarks

pub mod clock;
pub mod config;
pub mod drum;
pub mod engine;
pub mod error;
pub mod harmony;
pub mod messaging;
pub mod project;
pub mod sequencer;
pub mod song;
pub mod voice;

// Re-export commonly used types for convenience
pub use clock::{Clock, ManualClock, SystemClock, WallClock};
pub use config::EngineConfig;
pub use drum::{DrumEngine, DrumInstrument, DrumState};
pub use engine::{CrossEngineBridge, Engine, PatternHost, SharedEngine};
pub use error::{EngineError, EngineResult};
pub use harmony::{Chord, ChordQuality, PitchClass, Progression, ProgressionPreset};
pub use messaging::{PositionConsumer, PositionUpdate};
pub use project::{ProjectError, Snapshot};
pub use sequencer::{PlayMode, TransportAction, TransportState};
pub use song::{SongEngine, SongInstrument, SongState};
pub use voice::{InstrumentId, RecordingVoice, TracingVoice, Trigger, Voice};
