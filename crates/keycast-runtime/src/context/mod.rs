//! # Worker Contexts
//!
//! A worker context owns one inbound channel, one outbound channel and a
//! dedicated thread that drains the inbound side in batches.
//!
//! ```text
//!   inbound ──► [ receive_batch ] ──► accepts? ──no──► filtered++
//!                                        │
//!                                       yes
//!                                        ▼
//!                                 process_message ──► Some(response) ──► outbound
//!                                        │
//!                                   processed++
//! ```
//!
//! ## Lifecycle
//!
//! `Created → Running → Stopping → Stopped`. `start` and `stop` are both
//! safe to call more than once; `stop` on a context that never started is
//! a no-op.

pub mod dispatcher;
pub mod input_sender;

pub use dispatcher::Dispatcher;
pub use input_sender::InputSender;

use keycast_bus::{BoundedChannel, Event, Receiver, Sender, DEFAULT_BATCH_SIZE};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Default bounded wait of an idle worker before it re-checks for exit.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle state of a worker context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Context errors
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to spawn worker thread for {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Named per-context counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Processed,
    Sent,
    Filtered,
    Injected,
    Failures,
    Triggers,
    Acks,
    AddressingMisses,
    Dropped,
}

/// Lock-free counters, readable from any thread while the worker runs.
#[derive(Debug, Default)]
pub struct ContextMetrics {
    processed: AtomicU64,
    sent: AtomicU64,
    filtered: AtomicU64,
    injected: AtomicU64,
    failures: AtomicU64,
    triggers: AtomicU64,
    acks: AtomicU64,
    addressing_misses: AtomicU64,
    dropped: AtomicU64,
}

impl ContextMetrics {
    fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Processed => &self.processed,
            Counter::Sent => &self.sent,
            Counter::Filtered => &self.filtered,
            Counter::Injected => &self.injected,
            Counter::Failures => &self.failures,
            Counter::Triggers => &self.triggers,
            Counter::Acks => &self.acks,
            Counter::AddressingMisses => &self.addressing_misses,
            Counter::Dropped => &self.dropped,
        }
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.counter(counter).fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.counter(counter).load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.get(Counter::Processed),
            sent: self.get(Counter::Sent),
            filtered: self.get(Counter::Filtered),
            injected: self.get(Counter::Injected),
            failures: self.get(Counter::Failures),
            triggers: self.get(Counter::Triggers),
            acks: self.get(Counter::Acks),
            addressing_misses: self.get(Counter::AddressingMisses),
            dropped: self.get(Counter::Dropped),
        }
    }
}

/// Point-in-time copy of [`ContextMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub sent: u64,
    pub filtered: u64,
    pub injected: u64,
    pub failures: u64,
    pub triggers: u64,
    pub acks: u64,
    pub addressing_misses: u64,
    pub dropped: u64,
}

/// What a worker's thread sees while handling an event.
pub struct ContextIo<'a> {
    pub name: &'a str,
    pub metrics: &'a ContextMetrics,
}

/// Per-kind behavior plugged into the generic worker loop.
pub trait Behavior: Send + 'static {
    /// Whether this worker handles the event. Rejected events count as
    /// filtered and are dropped.
    fn accepts(&self, event: &Event) -> bool;

    /// Handle one accepted event, optionally producing a response for the
    /// outbound channel.
    fn process_message(&mut self, event: Event, io: &ContextIo<'_>) -> Option<Event>;
}

/// A named worker bound to an inbound and an outbound channel.
pub struct WorkerContext {
    name: String,
    inbound: Arc<BoundedChannel>,
    outbound: Arc<BoundedChannel>,
    metrics: Arc<ContextMetrics>,
    state: Mutex<ContextState>,
    /// Signalled once the state reaches `Stopped`.
    stopped: Condvar,
    behavior: Mutex<Option<Box<dyn Behavior>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    batch_size: usize,
    poll_interval: Duration,
}

impl WorkerContext {
    /// Create a context in `Created` state. No thread runs until `start`.
    pub fn new(
        name: impl Into<String>,
        behavior: Box<dyn Behavior>,
        inbound: Arc<BoundedChannel>,
        outbound: Arc<BoundedChannel>,
    ) -> Self {
        Self {
            name: name.into(),
            inbound,
            outbound,
            metrics: Arc::new(ContextMetrics::default()),
            state: Mutex::new(ContextState::Created),
            stopped: Condvar::new(),
            behavior: Mutex::new(Some(behavior)),
            handle: Mutex::new(None),
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Maximum events drained per loop iteration (at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Spawn the worker thread. A context that is already running or
    /// stopped is left untouched.
    pub fn start(&self) -> Result<(), ContextError> {
        let mut state = self.state.lock();
        if *state != ContextState::Created {
            debug!(context = %self.name, state = ?*state, "start ignored");
            return Ok(());
        }

        let Some(behavior) = self.behavior.lock().take() else {
            return Ok(());
        };

        let worker = WorkerLoop {
            name: self.name.clone(),
            behavior,
            receiver: Receiver::new(Arc::clone(&self.inbound)),
            outbound: Sender::new(Arc::clone(&self.outbound)),
            metrics: Arc::clone(&self.metrics),
            batch_size: self.batch_size,
            poll_interval: self.poll_interval,
        };

        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                *state = ContextState::Running;
                info!(context = %self.name, "Worker context started");
                Ok(())
            }
            Err(source) => {
                *state = ContextState::Stopped;
                error!(context = %self.name, error = %source, "Failed to spawn worker thread");
                Err(ContextError::Spawn {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Close the inbound channel and wait for the worker thread to exit.
    ///
    /// Events already queued are drained before the thread exits. A call
    /// racing with another `stop` returns only once the context is `Stopped`.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                ContextState::Running => *state = ContextState::Stopping,
                ContextState::Created => {
                    debug!(context = %self.name, "stop before start, nothing to do");
                    return;
                }
                ContextState::Stopping => {
                    while *state != ContextState::Stopped {
                        self.stopped.wait(&mut state);
                    }
                    return;
                }
                ContextState::Stopped => return,
            }
        }

        self.inbound.close();

        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!(context = %self.name, "Worker thread panicked");
            }
        }

        *self.state.lock() = ContextState::Stopped;
        self.stopped.notify_all();
        debug!(context = %self.name, "Worker context stopped");
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Producing handle to this context's inbound channel.
    #[must_use]
    pub fn inbound(&self) -> Sender {
        Sender::new(Arc::clone(&self.inbound))
    }

    #[must_use]
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    #[must_use]
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Log the counters and queue depths. Does not mutate anything.
    pub fn print_metrics(&self) {
        let m = self.metrics();
        info!(
            context = %self.name,
            state = ?self.state(),
            processed = m.processed,
            sent = m.sent,
            filtered = m.filtered,
            injected = m.injected,
            failures = m.failures,
            triggers = m.triggers,
            acks = m.acks,
            addressing_misses = m.addressing_misses,
            dropped = m.dropped,
            inbound_queue = self.inbound_len(),
            outbound_queue = self.outbound_len(),
            "Context metrics"
        );
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("inbound_len", &self.inbound_len())
            .finish_non_exhaustive()
    }
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        self.stop();
    }
}

struct WorkerLoop {
    name: String,
    behavior: Box<dyn Behavior>,
    receiver: Receiver,
    outbound: Sender,
    metrics: Arc<ContextMetrics>,
    batch_size: usize,
    poll_interval: Duration,
}

impl WorkerLoop {
    fn run(mut self) {
        debug!(context = %self.name, batch_size = self.batch_size, "Worker loop entered");

        loop {
            let batch = self
                .receiver
                .receive_batch_timeout(self.batch_size, self.poll_interval);

            if batch.is_empty() {
                if self.receiver.is_finished() {
                    break;
                }
                continue;
            }

            for event in batch {
                self.handle(event);
            }
        }

        info!(context = %self.name, "Worker context exiting");
    }

    fn handle(&mut self, event: Event) {
        if !self.behavior.accepts(&event) {
            trace!(
                context = %self.name,
                sequence_id = event.sequence_id(),
                target_id = event.target_id(),
                target_instance = event.target_instance(),
                "Event filtered"
            );
            self.metrics.incr(Counter::Filtered);
            return;
        }

        let delay = event.delay_after_ms();
        let io = ContextIo {
            name: &self.name,
            metrics: &self.metrics,
        };
        let response = self.behavior.process_message(event, &io);
        self.metrics.incr(Counter::Processed);

        if let Some(response) = response {
            match self.outbound.send_message(response) {
                Ok(()) => self.metrics.incr(Counter::Sent),
                Err(e) if e.is_full() => {
                    warn!(context = %self.name, error = %e, "Response dropped");
                    self.metrics.incr(Counter::Dropped);
                }
                Err(e) => {
                    debug!(context = %self.name, error = %e, "Outbound stopped, response discarded");
                    self.metrics.incr(Counter::Dropped);
                }
            }
        }

        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
    }
}
