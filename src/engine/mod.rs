// Engine module
// Shared scheduling machinery for the drum and song engines

pub mod bridge;
pub mod runner;
pub mod scheduler;

pub use bridge::{CrossEngineBridge, PatternHost};
pub use runner::{SharedEngine, TickThread};
pub use scheduler::LookaheadScheduler;

use crate::sequencer::transport::{PlayMode, TransportAction, TransportState};
use std::time::Duration;

/// A scheduler-driven playback engine
///
/// All methods are called with the engine lock held; `tick` must never block.
pub trait Engine: Send + 'static {
    /// Short name used for thread names and logs
    fn name(&self) -> &'static str;

    /// Period between two ticks
    fn tick_interval(&self) -> Duration;

    fn transport(&self) -> TransportState;

    /// Handle a play request, following the transport state machine
    fn play(&mut self, mode: PlayMode) -> TransportAction;

    /// Stop playback and fade out sounding voices
    fn stop(&mut self);

    /// Dispatch every event due inside the lookahead window
    fn tick(&mut self);

    fn is_playing(&self) -> bool {
        self.transport().is_playing()
    }
}
