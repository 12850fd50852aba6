//! # Dispatcher
//!
//! Turns trigger events into addressed key-press batches.
//!
//! For a trigger the first matching binding wins. Each of its sequences is
//! delivered as one all-or-nothing batch per matching route, so a target
//! never sees a partial sequence. Acknowledgements from input workers
//! arrive on the same inbound channel and are only counted.

use super::{Behavior, ContextIo, Counter};
use crate::ports::{BindingSource, TargetSequence};
use crate::registry::RouteTable;
use keycast_bus::{Command, Event};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Context name of the dispatcher.
pub const DISPATCHER_NAME: &str = "Dispatcher";

/// Monotonic sequence ids, shared by everything producing on behalf of one
/// dispatcher.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
    #[must_use]
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct Dispatcher {
    routes: RouteTable,
    bindings: Arc<dyn BindingSource>,
    sequence: SequenceCounter,
}

impl Dispatcher {
    pub fn new(
        routes: RouteTable,
        bindings: Arc<dyn BindingSource>,
        sequence: SequenceCounter,
    ) -> Self {
        Self {
            routes,
            bindings,
            sequence,
        }
    }

    fn dispatch_trigger(&self, trigger: &str, io: &ContextIo<'_>) {
        let Some(binding) = self.bindings.binding_for(trigger) else {
            debug!(context = io.name, trigger, "No binding for trigger");
            return;
        };

        io.metrics.incr(Counter::Triggers);
        info!(
            context = io.name,
            trigger,
            sequences = binding.sequences.len(),
            "Dispatching trigger"
        );

        for sequence in &binding.sequences {
            self.dispatch_sequence(sequence, io);
        }
    }

    fn dispatch_sequence(&self, sequence: &TargetSequence, io: &ContextIo<'_>) {
        if sequence.actions.is_empty() {
            return;
        }

        let batch: Vec<Event> = sequence
            .actions
            .iter()
            .map(|action| {
                Event::key_press(
                    self.sequence.next(),
                    &action.key,
                    &sequence.target_id,
                    sequence.instance,
                )
                .with_delay_after(action.delay_ms)
            })
            .collect();

        let report = self.routes.deliver_batch(batch);
        io.metrics.add(Counter::Sent, report.enqueued);

        if report.missed {
            io.metrics.incr(Counter::AddressingMisses);
        }
        if !report.rejected.is_empty() {
            io.metrics.add(Counter::Dropped, report.rejected.len() as u64);
        }
        trace!(
            context = io.name,
            target_id = %sequence.target_id,
            instance = sequence.instance,
            delivered = report.delivered.len(),
            rejected = report.rejected.len(),
            "Sequence dispatched"
        );
    }
}

impl Behavior for Dispatcher {
    fn accepts(&self, event: &Event) -> bool {
        event.target_id().is_empty()
    }

    fn process_message(&mut self, event: Event, io: &ContextIo<'_>) -> Option<Event> {
        match event.command() {
            Command::Trigger => self.dispatch_trigger(event.payload(), io),
            Command::Ack => {
                io.metrics.incr(Counter::Acks);
                trace!(
                    context = io.name,
                    sequence_id = event.sequence_id(),
                    payload = event.payload(),
                    "Ack"
                );
            }
            Command::Ping => debug!(context = io.name, sequence_id = event.sequence_id(), "Ping"),
            other => warn!(context = io.name, command = ?other, "Dispatcher ignored command"),
        }
        None
    }
}
