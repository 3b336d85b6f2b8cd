// Lock-free position channel

use crate::messaging::position::PositionUpdate;
use ringbuf::{HeapRb, traits::Producer, traits::Split};

pub type PositionProducer = ringbuf::HeapProd<PositionUpdate>;
pub type PositionConsumer = ringbuf::HeapCons<PositionUpdate>;

pub fn create_position_channel(capacity: usize) -> (PositionProducer, PositionConsumer) {
    let rb = HeapRb::<PositionUpdate>::new(capacity.max(1));
    rb.split()
}

/// Optional producer end held by an engine
///
/// Publishing never blocks: when nobody subscribed or the buffer is full the
/// update is dropped.
#[derive(Default)]
pub struct PositionSink {
    producer: Option<PositionProducer>,
    dropped: u64,
}

impl PositionSink {
    /// Replace the current subscriber with a fresh channel and return its consumer
    pub fn subscribe(&mut self, capacity: usize) -> PositionConsumer {
        let (producer, consumer) = create_position_channel(capacity);
        self.producer = Some(producer);
        self.dropped = 0;
        consumer
    }

    pub fn publish(&mut self, update: PositionUpdate) {
        let Some(producer) = self.producer.as_mut() else {
            return;
        };
        if producer.try_push(update).is_err() {
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                tracing::trace!(dropped = self.dropped, "position channel full");
            }
        }
    }

    /// Updates lost because the consumer fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl std::fmt::Debug for PositionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionSink")
            .field("subscribed", &self.producer.is_some())
            .field("dropped", &self.dropped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::position::EngineKind;
    use ringbuf::traits::Consumer;

    fn stopped() -> PositionUpdate {
        PositionUpdate::Stopped {
            engine: EngineKind::Drum,
        }
    }

    #[test]
    fn test_publish_without_subscriber_is_noop() {
        let mut sink = PositionSink::default();
        sink.publish(stopped());
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_publish_and_receive() {
        let mut sink = PositionSink::default();
        let mut rx = sink.subscribe(4);

        sink.publish(PositionUpdate::DrumStep {
            pattern: 1,
            step: 3,
            slot: None,
            time: 0.375,
        });

        let update = rx.try_pop().unwrap();
        assert_eq!(update.engine(), EngineKind::Drum);
        assert_eq!(update.time(), Some(0.375));
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_full_channel_drops() {
        let mut sink = PositionSink::default();
        let _rx = sink.subscribe(2);
        for _ in 0..5 {
            sink.publish(stopped());
        }
        assert_eq!(sink.dropped(), 3);
    }
}
