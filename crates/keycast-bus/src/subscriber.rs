//! # Receiver
//!
//! Consuming side of a bounded channel. Pass-through to the channel's
//! blocking operations.

use crate::channel::BoundedChannel;
use crate::events::Event;
use std::sync::Arc;
use std::time::Duration;

/// Consuming handle to a bounded channel.
#[derive(Debug)]
pub struct Receiver {
    channel: Arc<BoundedChannel>,
}

impl Receiver {
    /// Wrap a channel.
    #[must_use]
    pub fn new(channel: Arc<BoundedChannel>) -> Self {
        Self { channel }
    }

    /// Receive the oldest event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - the next event in FIFO order
    /// - `None` - the channel is closed or shut down, and drained
    pub fn receive_message(&self) -> Option<Event> {
        self.channel.receive_one()
    }

    /// Block for at least one event, then drain up to `max`.
    pub fn receive_batch(&self, max: usize) -> Vec<Event> {
        self.channel.receive_batch(max)
    }

    /// Bounded-wait variant of `receive_batch`.
    pub fn receive_batch_timeout(&self, max: usize, timeout: Duration) -> Vec<Event> {
        self.channel.receive_batch_timeout(max, timeout)
    }

    /// Closed or shut down, and nothing left to drain.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.channel.is_finished()
    }

    /// The underlying channel.
    #[must_use]
    pub fn channel(&self) -> &Arc<BoundedChannel> {
        &self.channel
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.channel.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Command;
    use crate::publisher::Sender;
    use crate::shutdown::ShutdownSignal;
    use std::thread;

    #[test]
    fn test_sender_receiver_pair() {
        let shutdown = ShutdownSignal::new();
        let channel = BoundedChannel::new(&shutdown);
        let sender = Sender::new(Arc::clone(&channel));
        let receiver = Receiver::new(channel);

        sender
            .send_batch(vec![
                Event::new(Command::Ping, 1, "a"),
                Event::new(Command::Ping, 2, "b"),
            ])
            .unwrap();

        let first = receiver.receive_message().unwrap();
        assert_eq!(first.payload(), "a");
        let rest = receiver.receive_batch(10);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].payload(), "b");
    }

    #[test]
    fn test_cross_thread_delivery_preserves_order() {
        let shutdown = ShutdownSignal::new();
        let channel = BoundedChannel::with_capacity(8, &shutdown);
        let sender = Sender::new(Arc::clone(&channel));
        let receiver = Receiver::new(channel);

        let producer = thread::spawn(move || {
            for id in 0..500 {
                sender
                    .send_blocking(Event::new(Command::Ping, id, ""))
                    .unwrap();
            }
        });

        let mut expected = 0;
        while expected < 500 {
            for event in receiver.receive_batch(7) {
                assert_eq!(event.sequence_id(), expected);
                expected += 1;
            }
        }
        producer.join().unwrap();
    }

    #[test]
    fn test_finished_after_shutdown_and_drain() {
        let shutdown = ShutdownSignal::new();
        let channel = BoundedChannel::new(&shutdown);
        let receiver = Receiver::new(Arc::clone(&channel));
        channel.try_send(Event::new(Command::Ping, 1, "")).unwrap();

        shutdown.trigger();
        assert!(!receiver.is_finished());
        assert_eq!(receiver.receive_batch(10).len(), 1);
        assert!(receiver.is_finished());
    }
}
