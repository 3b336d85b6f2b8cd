// Messaging module
// Lock-free channels from the schedulers to observers

pub mod channels;
pub mod position;

pub use channels::{PositionConsumer, PositionProducer, PositionSink, create_position_channel};
pub use position::{EngineKind, PositionUpdate};
