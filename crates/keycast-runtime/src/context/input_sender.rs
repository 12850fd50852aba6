//! Input worker: one per attached route.

use super::{Behavior, ContextIo, Counter};
use crate::adapters::keys::KeyCode;
use crate::ports::{InputInjector, TargetHandle};
use keycast_bus::{Command, Event, RouteIdentity};
use keycast_telemetry::{INJECTIONS, INJECTION_FAILURES};
use std::sync::Arc;
use tracing::{debug, warn};

/// Context name for the input worker of `identity`.
#[must_use]
pub fn context_name(identity: &RouteIdentity) -> String {
    format!("InputSender_{identity}")
}

/// Injects key presses addressed to its own route into the resolved target.
pub struct InputSender {
    identity: RouteIdentity,
    target: TargetHandle,
    injector: Arc<dyn InputInjector>,
}

impl InputSender {
    pub fn new(identity: RouteIdentity, target: TargetHandle, injector: Arc<dyn InputInjector>) -> Self {
        Self {
            identity,
            target,
            injector,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &RouteIdentity {
        &self.identity
    }

    fn inject(&self, key_name: &str, io: &ContextIo<'_>) {
        let Some(key) = KeyCode::from_name(key_name) else {
            warn!(context = io.name, key = key_name, "Unknown key, not injected");
            io.metrics.incr(Counter::Failures);
            return;
        };

        match self.injector.inject(self.target, key) {
            Ok(()) => {
                io.metrics.incr(Counter::Injected);
                INJECTIONS.inc();
                debug!(context = io.name, %key, "Key injected");
            }
            Err(e) => {
                io.metrics.incr(Counter::Failures);
                INJECTION_FAILURES.inc();
                warn!(context = io.name, %key, error = %e, "Injection failed");
            }
        }
    }
}

impl Behavior for InputSender {
    fn accepts(&self, event: &Event) -> bool {
        event.is_addressed_to(&self.identity)
    }

    fn process_message(&mut self, event: Event, io: &ContextIo<'_>) -> Option<Event> {
        if event.command() != Command::KeyPress {
            debug!(context = io.name, command = ?event.command(), "Ignoring non key-press event");
            return None;
        }

        let Some(key_name) = event.key() else {
            warn!(context = io.name, payload = event.payload(), "Malformed key-press payload");
            io.metrics.incr(Counter::Failures);
            return None;
        };

        self.inject(key_name, io);
        Some(Event::new(
            Command::Ack,
            event.sequence_id(),
            format!("{} handled {key_name}", io.name),
        ))
    }
}
