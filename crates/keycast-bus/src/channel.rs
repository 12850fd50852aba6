//! # Bounded Channel
//!
//! Fixed-capacity FIFO shared by one producer side and one consumer side.
//! Monitor discipline: one mutex guards the queue, `not_empty` parks
//! consumers and `not_full` parks producers. Waits release the lock while
//! blocked and re-check their predicate on every wake-up.

use crate::events::Event;
use crate::shutdown::{ShutdownObserver, ShutdownSignal};
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{trace, warn};

/// Non-blocking send failure. The rejected event is handed back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrySendError {
    /// Channel at capacity. Expected under load: retry or drop.
    #[error("channel full")]
    Full(Event),
    /// The route owning this channel was detached.
    #[error("channel closed")]
    Closed(Event),
    /// Global shutdown in progress.
    #[error("shutdown in progress")]
    Shutdown(Event),
}

impl TrySendError {
    /// Recover the event that was not sent.
    #[must_use]
    pub fn into_inner(self) -> Event {
        match self {
            Self::Full(event) | Self::Closed(event) | Self::Shutdown(event) => event,
        }
    }

    /// Whether the failure is plain backpressure.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

/// Blocking send failure. The event was not enqueued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The route owning this channel was detached.
    #[error("channel closed")]
    Closed(Event),
    /// Shutdown was signaled before space became available.
    #[error("shutdown in progress")]
    Shutdown(Event),
}

impl SendError {
    /// Recover the event that was not sent.
    #[must_use]
    pub fn into_inner(self) -> Event {
        match self {
            Self::Closed(event) | Self::Shutdown(event) => event,
        }
    }
}

/// Why a channel no longer accepts sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stopped {
    Closed,
    Shutdown,
}

struct ChannelState {
    queue: VecDeque<Event>,
    closed: bool,
}

/// Fixed-capacity FIFO with blocking producer/consumer coordination.
pub struct BoundedChannel {
    state: Mutex<ChannelState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    shutdown: ShutdownSignal,
}

impl BoundedChannel {
    /// Create a channel with the default capacity.
    #[must_use]
    pub fn new(shutdown: &ShutdownSignal) -> Arc<Self> {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY, shutdown)
    }

    /// Create a channel holding at most `capacity` events.
    ///
    /// The channel registers itself with `shutdown` so that triggering it
    /// wakes this channel's waiters.
    #[must_use]
    pub fn with_capacity(capacity: usize, shutdown: &ShutdownSignal) -> Arc<Self> {
        let capacity = if capacity == 0 {
            warn!("Channel capacity 0 requested, using 1");
            1
        } else {
            capacity
        };

        let channel = Arc::new(Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::with_capacity(capacity.min(DEFAULT_CHANNEL_CAPACITY)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            shutdown: shutdown.clone(),
        });

        let observer: Arc<dyn ShutdownObserver> = channel.clone();
        shutdown.observe(Arc::downgrade(&observer));
        channel
    }

    /// Maximum number of queued events.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Whether `close()` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Whether no more events will ever be delivered: stopped and drained.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let state = self.state.lock();
        self.stopped(&state).is_some() && state.queue.is_empty()
    }

    fn stopped(&self, state: &ChannelState) -> Option<Stopped> {
        if state.closed {
            Some(Stopped::Closed)
        } else if self.shutdown.is_triggered() {
            Some(Stopped::Shutdown)
        } else {
            None
        }
    }

    /// Enqueue iff there is room. Never blocks.
    pub fn try_send(&self, event: Event) -> Result<(), TrySendError> {
        let mut state = self.state.lock();
        match self.stopped(&state) {
            Some(Stopped::Closed) => return Err(TrySendError::Closed(event)),
            Some(Stopped::Shutdown) => return Err(TrySendError::Shutdown(event)),
            None => {}
        }
        if state.queue.len() >= self.capacity {
            return Err(TrySendError::Full(event));
        }

        state.queue.push_back(event);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue every event or none of them. Never blocks.
    ///
    /// On failure the whole batch is handed back untouched.
    pub(crate) fn try_send_all(&self, events: Vec<Event>) -> Result<(), (Vec<Event>, Option<Stopped>)> {
        if events.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock();
        if let Some(reason) = self.stopped(&state) {
            return Err((events, Some(reason)));
        }
        if state.queue.len() + events.len() > self.capacity {
            return Err((events, None));
        }

        state.queue.extend(events);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Block until there is room, then enqueue.
    ///
    /// Fails without enqueuing if the channel is closed or shutdown is
    /// observed first.
    pub fn send_blocking(&self, event: Event) -> Result<(), SendError> {
        let mut state = self.state.lock();
        loop {
            match self.stopped(&state) {
                Some(Stopped::Closed) => return Err(SendError::Closed(event)),
                Some(Stopped::Shutdown) => return Err(SendError::Shutdown(event)),
                None => {}
            }
            if state.queue.len() < self.capacity {
                break;
            }
            self.not_full.wait(&mut state);
        }

        state.queue.push_back(event);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Block until an event is available, or the channel is stopped and
    /// drained (`None`).
    pub fn receive_one(&self) -> Option<Event> {
        let mut state = self.wait_not_empty(None)?;
        let event = state.queue.pop_front();
        drop(state);
        self.not_full.notify_one();
        event
    }

    /// Block until at least one event is available, then drain up to `max`
    /// (at least 1) of the oldest events in one critical section.
    ///
    /// Returns an empty batch only when the channel is stopped and drained.
    pub fn receive_batch(&self, max: usize) -> Vec<Event> {
        match self.wait_not_empty(None) {
            Some(state) => self.drain(state, max),
            None => Vec::new(),
        }
    }

    /// Like `receive_batch`, but gives up after `timeout` with an empty batch.
    pub fn receive_batch_timeout(&self, max: usize, timeout: Duration) -> Vec<Event> {
        let deadline = Instant::now() + timeout;
        match self.wait_not_empty(Some(deadline)) {
            Some(state) => self.drain(state, max),
            None => Vec::new(),
        }
    }

    /// Stop accepting sends and release every waiter. Queued events stay
    /// available to the consumer.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        trace!(pending = state.queue.len(), "Channel closed");
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Wait until the queue is non-empty. `None` means stopped-and-empty or
    /// deadline reached.
    fn wait_not_empty(&self, deadline: Option<Instant>) -> Option<MutexGuard<'_, ChannelState>> {
        let mut state = self.state.lock();
        while state.queue.is_empty() {
            if self.stopped(&state).is_some() {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut state, deadline).timed_out()
                        && state.queue.is_empty()
                    {
                        return None;
                    }
                }
                None => self.not_empty.wait(&mut state),
            }
        }
        Some(state)
    }

    fn drain(&self, mut state: MutexGuard<'_, ChannelState>, max: usize) -> Vec<Event> {
        let count = max.max(1).min(state.queue.len());
        let batch: Vec<Event> = state.queue.drain(..count).collect();
        drop(state);
        if !batch.is_empty() {
            self.not_full.notify_all();
        }
        batch
    }
}

impl ShutdownObserver for BoundedChannel {
    fn on_shutdown(&self) {
        // Taking the lock orders this wake-up after any in-progress
        // predicate check, so no waiter can miss it.
        let _state = self.state.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

impl std::fmt::Debug for BoundedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedChannel")
            .field("len", &state.queue.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}
