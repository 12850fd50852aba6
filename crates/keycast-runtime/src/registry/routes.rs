//! Route table shared by the registry (writer) and the dispatcher (reader).

use crate::context::WorkerContext;
use keycast_bus::{Addressing, BatchSendError, Event, RouteIdentity, Sender};
use keycast_telemetry::{ADDRESSING_MISSES, EVENTS_ENQUEUED, EVENTS_REJECTED};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A live route: the input worker and a producer on its inbound channel.
pub(crate) struct RouteEntry {
    pub(crate) sender: Sender,
    pub(crate) context: Arc<WorkerContext>,
}

#[derive(Default)]
struct Routes {
    entries: BTreeMap<RouteIdentity, RouteEntry>,
    sealed: bool,
}

/// Why an insert was refused.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InsertRefused {
    Duplicate,
    Sealed,
}

/// Outcome of delivering one event or one all-or-nothing batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Routes that accepted the batch.
    pub delivered: Vec<RouteIdentity>,
    /// Routes whose channel was full.
    pub rejected: Vec<RouteIdentity>,
    /// Routes detached between lookup and send.
    pub closed: Vec<RouteIdentity>,
    /// Events enqueued across all routes.
    pub enqueued: u64,
    /// No route matched the addressing.
    pub missed: bool,
}

impl DeliveryReport {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }
}

/// Ordered map from route identity to worker, cheap to clone.
#[derive(Clone)]
pub struct RouteTable {
    inner: Arc<RwLock<Routes>>,
    dead_letters: Sender,
    misses: Arc<AtomicU64>,
}

impl RouteTable {
    /// Undeliverable events are offered to `dead_letters`.
    pub(crate) fn new(dead_letters: Sender) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Routes::default())),
            dead_letters,
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn contains(&self, identity: &RouteIdentity) -> bool {
        self.inner.read().entries.contains_key(identity)
    }

    pub(crate) fn insert(
        &self,
        identity: RouteIdentity,
        entry: RouteEntry,
    ) -> Result<(), (InsertRefused, RouteEntry)> {
        let mut routes = self.inner.write();
        if routes.sealed {
            return Err((InsertRefused::Sealed, entry));
        }
        if routes.entries.contains_key(&identity) {
            return Err((InsertRefused::Duplicate, entry));
        }
        routes.entries.insert(identity, entry);
        Ok(())
    }

    /// Remove a route and close its inbound channel. Once this returns no
    /// sender can enqueue to the route.
    pub(crate) fn remove(&self, identity: &RouteIdentity) -> Option<RouteEntry> {
        let mut routes = self.inner.write();
        let entry = routes.entries.remove(identity)?;
        entry.sender.channel().close();
        Some(entry)
    }

    /// Refuse further inserts and hand back every route, channels closed.
    pub(crate) fn seal(&self) -> Vec<(RouteIdentity, RouteEntry)> {
        let mut routes = self.inner.write();
        routes.sealed = true;
        let drained = std::mem::take(&mut routes.entries);
        drained
            .into_iter()
            .inspect(|(_, entry)| entry.sender.channel().close())
            .collect()
    }

    pub(crate) fn context(&self, identity: &RouteIdentity) -> Option<Arc<WorkerContext>> {
        self.inner
            .read()
            .entries
            .get(identity)
            .map(|entry| Arc::clone(&entry.context))
    }

    pub(crate) fn contexts(&self) -> Vec<Arc<WorkerContext>> {
        self.inner
            .read()
            .entries
            .values()
            .map(|entry| Arc::clone(&entry.context))
            .collect()
    }

    #[must_use]
    pub fn identities(&self) -> Vec<RouteIdentity> {
        self.inner.read().entries.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total addressing misses since creation.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Deliver one event by its addressing.
    pub fn deliver(&self, event: Event) -> DeliveryReport {
        self.deliver_batch(vec![event])
    }

    /// Deliver a batch addressed like its first event.
    ///
    /// Each matching route receives the whole batch or none of it. A
    /// broadcast targets the routes present when the lookup ran; routes
    /// attached later are not included.
    pub fn deliver_batch(&self, events: Vec<Event>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let Some(first) = events.first() else {
            return report;
        };

        let targets = self.lookup(first.addressing());
        if targets.is_empty() {
            self.record_miss(first);
            report.missed = true;
            self.dead_letter(events);
            return report;
        }

        let count = events.len() as u64;
        let last = targets.len() - 1;
        let mut events = Some(events);
        for (idx, (identity, sender)) in targets.into_iter().enumerate() {
            let batch = if idx == last {
                events.take().unwrap_or_default()
            } else {
                events.clone().unwrap_or_default()
            };

            match sender.send_batch(batch) {
                Ok(()) => {
                    EVENTS_ENQUEUED.inc_by(count);
                    report.enqueued += count;
                    report.delivered.push(identity);
                }
                Err(e @ BatchSendError::Full { .. }) => {
                    warn!(route = %identity, error = %e, "Route queue full, batch dropped");
                    EVENTS_REJECTED.with_label_values(&["full"]).inc_by(count);
                    report.rejected.push(identity);
                    self.dead_letter(e.into_inner());
                }
                Err(BatchSendError::Closed(_)) => {
                    debug!(route = %identity, "Route detached during delivery");
                    EVENTS_REJECTED.with_label_values(&["closed"]).inc_by(count);
                    report.closed.push(identity);
                }
                Err(BatchSendError::Shutdown(_)) => {
                    trace!(route = %identity, "Delivery refused, shutting down");
                    EVENTS_REJECTED.with_label_values(&["shutdown"]).inc_by(count);
                    report.closed.push(identity);
                }
            }
        }

        report
    }

    fn lookup(&self, addressing: Addressing<'_>) -> Vec<(RouteIdentity, Sender)> {
        let routes = self.inner.read();
        match addressing {
            Addressing::Unaddressed => Vec::new(),
            Addressing::Exact(target_id, instance) => {
                let identity = RouteIdentity::new(target_id, instance);
                routes
                    .entries
                    .get(&identity)
                    .map(|entry| (identity, entry.sender.clone()))
                    .into_iter()
                    .collect()
            }
            Addressing::Broadcast(target_id) => routes
                .entries
                .iter()
                .filter(|(identity, _)| identity.target_id() == target_id)
                .map(|(identity, entry)| (identity.clone(), entry.sender.clone()))
                .collect(),
        }
    }

    fn record_miss(&self, event: &Event) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        ADDRESSING_MISSES.inc();
        warn!(
            sequence_id = event.sequence_id(),
            target_id = event.target_id(),
            target_instance = event.target_instance(),
            "Addressing miss: no route for target"
        );
    }

    fn dead_letter(&self, events: Vec<Event>) {
        for event in events {
            if let Err(e) = self.dead_letters.send_message(event) {
                trace!(error = %e, "Dead letter dropped");
            }
        }
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.identities())
            .field("misses", &self.misses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Behavior, ContextIo};
    use keycast_bus::{BoundedChannel, Receiver, ShutdownSignal};

    struct Idle;

    impl Behavior for Idle {
        fn accepts(&self, _event: &Event) -> bool {
            true
        }

        fn process_message(&mut self, _event: Event, _io: &ContextIo<'_>) -> Option<Event> {
            None
        }
    }

    /// A table with one unstarted route `P:0` of the given capacity.
    fn table(
        shutdown: &ShutdownSignal,
        capacity: usize,
    ) -> (RouteTable, Arc<BoundedChannel>, Arc<BoundedChannel>) {
        let inbound = BoundedChannel::with_capacity(capacity, shutdown);
        let dead = BoundedChannel::with_capacity(16, shutdown);
        let context = WorkerContext::new(
            "InputSender_P:0",
            Box::new(Idle),
            Arc::clone(&inbound),
            Arc::clone(&dead),
        );
        let routes = RouteTable::new(Sender::new(Arc::clone(&dead)));
        let entry = RouteEntry {
            sender: Sender::new(Arc::clone(&inbound)),
            context: Arc::new(context),
        };
        assert!(routes.insert(RouteIdentity::new("P", 0), entry).is_ok());
        (routes, inbound, dead)
    }

    #[test]
    fn test_closed_route_reported_not_delivered() {
        let shutdown = ShutdownSignal::new();
        let (routes, inbound, dead) = table(&shutdown, 8);

        // Looked up while still present, closed before the send.
        inbound.close();
        let report = routes.deliver(Event::key_press(1, "X", "P", -1));

        assert_eq!(report.closed, vec![RouteIdentity::new("P", 0)]);
        assert!(report.delivered.is_empty());
        assert!(!report.missed);
        assert_eq!(report.enqueued, 0);
        assert!(inbound.is_empty());
        assert!(dead.is_empty());
    }

    #[test]
    fn test_full_route_rejects_whole_batch_to_dead_letters() {
        let shutdown = ShutdownSignal::new();
        let (routes, inbound, dead) = table(&shutdown, 1);

        let batch = vec![
            Event::key_press(1, "X", "P", 0),
            Event::key_press(2, "Y", "P", 0),
        ];
        let report = routes.deliver_batch(batch);

        assert_eq!(report.rejected, vec![RouteIdentity::new("P", 0)]);
        assert!(inbound.is_empty());
        let dead_ids: Vec<u64> = Receiver::new(dead)
            .receive_batch(10)
            .iter()
            .map(Event::sequence_id)
            .collect();
        assert_eq!(dead_ids, vec![1, 2]);
    }

    #[test]
    fn test_insert_refused_after_seal() {
        let shutdown = ShutdownSignal::new();
        let (routes, inbound, dead) = table(&shutdown, 8);

        let sealed = routes.seal();
        assert_eq!(sealed.len(), 1);
        assert!(inbound.is_closed());
        assert!(routes.is_empty());

        let late = BoundedChannel::with_capacity(8, &shutdown);
        let context =
            WorkerContext::new("InputSender_P:1", Box::new(Idle), Arc::clone(&late), dead);
        let entry = RouteEntry {
            sender: Sender::new(late),
            context: Arc::new(context),
        };
        let refused = routes.insert(RouteIdentity::new("P", 1), entry);
        assert!(matches!(refused, Err((InsertRefused::Sealed, _))));
    }
}
