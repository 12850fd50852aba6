//! # Sender
//!
//! Producing side of a bounded channel.

use crate::channel::{BoundedChannel, SendError, Stopped, TrySendError};
use crate::events::Event;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Batch send failure. Nothing from the batch was enqueued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchSendError {
    /// The batch does not fit in the remaining capacity. Retry it whole.
    #[error("batch of {} events does not fit (capacity {capacity})", .events.len())]
    Full {
        /// The rejected batch.
        events: Vec<Event>,
        /// Channel capacity.
        capacity: usize,
    },
    /// The route owning the channel was detached.
    #[error("channel closed")]
    Closed(Vec<Event>),
    /// Global shutdown in progress.
    #[error("shutdown in progress")]
    Shutdown(Vec<Event>),
}

impl BatchSendError {
    /// Recover the rejected batch.
    #[must_use]
    pub fn into_inner(self) -> Vec<Event> {
        match self {
            Self::Full { events, .. } | Self::Closed(events) | Self::Shutdown(events) => events,
        }
    }

    /// Whether the failure is plain backpressure.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }
}

/// Producing handle to a bounded channel.
///
/// Cheap to clone; several producers may share one channel.
#[derive(Debug, Clone)]
pub struct Sender {
    channel: Arc<BoundedChannel>,
}

impl Sender {
    /// Wrap a channel. The channel carries the shutdown signal it observes.
    #[must_use]
    pub fn new(channel: Arc<BoundedChannel>) -> Self {
        Self { channel }
    }

    /// Non-blocking send. `Err(TrySendError::Full(_))` is capacity pressure,
    /// not a fault.
    pub fn send_message(&self, event: Event) -> Result<(), TrySendError> {
        let sequence_id = event.sequence_id();
        let result = self.channel.try_send(event);
        if let Err(ref e) = result {
            trace!(sequence_id, error = %e, "send_message rejected");
        }
        result
    }

    /// Enqueue the whole batch or nothing.
    pub fn send_batch(&self, events: Vec<Event>) -> Result<(), BatchSendError> {
        self.channel
            .try_send_all(events)
            .map_err(|(events, reason)| match reason {
                Some(Stopped::Closed) => BatchSendError::Closed(events),
                Some(Stopped::Shutdown) => BatchSendError::Shutdown(events),
                None => BatchSendError::Full {
                    events,
                    capacity: self.channel.capacity(),
                },
            })
    }

    /// Block until there is room.
    pub fn send_blocking(&self, event: Event) -> Result<(), SendError> {
        self.channel.send_blocking(event)
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

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }
}
