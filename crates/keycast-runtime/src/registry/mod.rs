//! # Routing Registry
//!
//! Owns the dispatcher and one input worker per attached route, and maps
//! `(target_id, instance)` to the worker's inbound channel.
//!
//! ```text
//!  trigger("A") ──► [Dispatcher inbound] ──► Dispatcher ──► RouteTable
//!                          ▲                                  │
//!                          │ Ack                  ┌───────────┼───────────┐
//!                          │                      ▼           ▼           ▼
//!                          └──────────────── P:0 worker   P:1 worker   Q:0 worker
//!
//!  misses / full routes ──► dead letters (dispatcher outbound)
//! ```
//!
//! ## Locking
//!
//! The route table is read-many/write-rare behind an `RwLock`. Lookups and
//! broadcast snapshots hold the read lock only long enough to clone the
//! matching senders; sends happen after it is released. `detach` removes
//! the route and closes its channel under the write lock, so no send can
//! land after it, then joins the worker outside the lock.

mod routes;

pub use routes::{DeliveryReport, RouteTable};

use crate::context::dispatcher::{SequenceCounter, DISPATCHER_NAME};
use crate::context::input_sender::context_name;
use crate::context::{
    ContextError, ContextState, Dispatcher, InputSender, MetricsSnapshot, WorkerContext,
    DEFAULT_POLL_INTERVAL,
};
use crate::ports::{BindingSource, InputInjector, TargetResolver};
use keycast_bus::{
    BoundedChannel, Event, Receiver, RouteIdentity, Sender, ShutdownSignal, TrySendError,
    DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY,
};
use keycast_telemetry::ROUTES_ACTIVE;
use routes::{InsertRefused, RouteEntry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Channel and worker tuning shared by every context the registry creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub channel_capacity: usize,
    pub batch_size: usize,
    pub poll_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("route {0} is already attached")]
    DuplicateRoute(RouteIdentity),

    #[error("no destination handle for {0}")]
    UnresolvableTarget(RouteIdentity),

    #[error("instance of {0} is beyond what an event can address")]
    InstanceOutOfRange(RouteIdentity),

    #[error("failed to start worker for {route}: {source}")]
    Spawn {
        route: RouteIdentity,
        #[source]
        source: ContextError,
    },

    #[error("cannot attach {0}: registry is shutting down")]
    ShuttingDown(RouteIdentity),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetachError {
    #[error("route {0} is not attached")]
    RouteNotFound(RouteIdentity),
}

/// Read-only view of an attached route.
#[derive(Debug, Clone)]
pub struct RouteHandle {
    identity: RouteIdentity,
    context: Arc<WorkerContext>,
}

impl RouteHandle {
    #[must_use]
    pub fn identity(&self) -> &RouteIdentity {
        &self.identity
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.context.name()
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        self.context.state()
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.context.metrics()
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.context.inbound_len()
    }
}

/// Routes addressed events to per-target workers.
pub struct RoutingRegistry {
    config: RegistryConfig,
    shutdown: ShutdownSignal,
    stopped: AtomicBool,
    routes: RouteTable,
    resolver: Arc<dyn TargetResolver>,
    injector: Arc<dyn InputInjector>,
    dispatcher: WorkerContext,
    dispatcher_inbound: Arc<BoundedChannel>,
    dead_letters: Arc<BoundedChannel>,
    sequence: SequenceCounter,
}

impl RoutingRegistry {
    /// Build the registry and start the dispatcher.
    pub fn new(
        config: RegistryConfig,
        resolver: Arc<dyn TargetResolver>,
        injector: Arc<dyn InputInjector>,
        bindings: Arc<dyn BindingSource>,
    ) -> Result<Self, ContextError> {
        let shutdown = ShutdownSignal::new();
        let dispatcher_inbound = BoundedChannel::with_capacity(config.channel_capacity, &shutdown);
        let dead_letters = BoundedChannel::with_capacity(config.channel_capacity, &shutdown);
        let routes = RouteTable::new(Sender::new(Arc::clone(&dead_letters)));
        let sequence = SequenceCounter::default();

        let dispatcher = WorkerContext::new(
            DISPATCHER_NAME,
            Box::new(Dispatcher::new(routes.clone(), bindings, sequence.clone())),
            Arc::clone(&dispatcher_inbound),
            Arc::clone(&dead_letters),
        )
        .with_batch_size(config.batch_size)
        .with_poll_interval(config.poll_interval);
        dispatcher.start()?;

        info!(
            channel_capacity = config.channel_capacity,
            batch_size = config.batch_size,
            "[Registry] Routing registry ready"
        );

        Ok(Self {
            config,
            shutdown,
            stopped: AtomicBool::new(false),
            routes,
            resolver,
            injector,
            dispatcher,
            dispatcher_inbound,
            dead_letters,
            sequence,
        })
    }

    /// Resolve the target, start an input worker and register the route.
    ///
    /// On any error the registry is left unchanged. Instances above
    /// `i32::MAX` are refused: events address instances as `i32`.
    pub fn attach(&self, target_id: &str, instance: u32) -> Result<RouteHandle, AttachError> {
        let identity = RouteIdentity::new(target_id, instance);

        if i32::try_from(instance).is_err() {
            warn!(route = %identity, "[Registry] Instance not addressable");
            return Err(AttachError::InstanceOutOfRange(identity));
        }

        if self.stopped.load(Ordering::Acquire) || self.shutdown.is_triggered() {
            return Err(AttachError::ShuttingDown(identity));
        }
        if self.routes.contains(&identity) {
            warn!(route = %identity, "[Registry] Route already attached");
            return Err(AttachError::DuplicateRoute(identity));
        }

        let Some(target) = self.resolver.resolve(target_id, instance) else {
            warn!(route = %identity, "[Registry] Target could not be resolved");
            return Err(AttachError::UnresolvableTarget(identity));
        };

        let inbound = BoundedChannel::with_capacity(self.config.channel_capacity, &self.shutdown);
        let behavior = InputSender::new(identity.clone(), target, Arc::clone(&self.injector));
        let context = Arc::new(
            WorkerContext::new(
                context_name(&identity),
                Box::new(behavior),
                Arc::clone(&inbound),
                Arc::clone(&self.dispatcher_inbound),
            )
            .with_batch_size(self.config.batch_size)
            .with_poll_interval(self.config.poll_interval),
        );

        context.start().map_err(|source| AttachError::Spawn {
            route: identity.clone(),
            source,
        })?;

        let entry = RouteEntry {
            sender: Sender::new(inbound),
            context: Arc::clone(&context),
        };
        if let Err((reason, entry)) = self.routes.insert(identity.clone(), entry) {
            entry.context.stop();
            return Err(match reason {
                InsertRefused::Duplicate => {
                    warn!(route = %identity, "[Registry] Lost attach race, route already attached");
                    AttachError::DuplicateRoute(identity)
                }
                InsertRefused::Sealed => AttachError::ShuttingDown(identity),
            });
        }

        ROUTES_ACTIVE.inc();
        info!(route = %identity, handle = ?target, "[Registry] Route attached");
        Ok(RouteHandle { identity, context })
    }

    /// Stop the route's worker and remove it.
    ///
    /// Events already queued for the route are handled before this returns;
    /// nothing is delivered to it afterwards.
    pub fn detach(&self, target_id: &str, instance: u32) -> Result<(), DetachError> {
        let identity = RouteIdentity::new(target_id, instance);
        let Some(entry) = self.routes.remove(&identity) else {
            debug!(route = %identity, "[Registry] Detach of unknown route");
            return Err(DetachError::RouteNotFound(identity));
        };

        entry.context.stop();
        entry.context.print_metrics();
        ROUTES_ACTIVE.dec();
        info!(route = %identity, "[Registry] Route detached");
        Ok(())
    }

    /// Enqueue a trigger for the dispatcher. Returns its sequence id.
    pub fn trigger(&self, name: &str) -> Result<u64, TrySendError> {
        let sequence_id = self.sequence.next();
        self.dispatcher
            .inbound()
            .send_message(Event::trigger(sequence_id, name))?;
        debug!(trigger = name, sequence_id, "[Registry] Trigger queued");
        Ok(sequence_id)
    }

    /// Deliver an addressed event directly, bypassing the dispatcher.
    pub fn deliver(&self, event: Event) -> DeliveryReport {
        self.routes.deliver(event)
    }

    /// Consumer for events that missed their address or found a full route.
    #[must_use]
    pub fn dead_letters(&self) -> Receiver {
        Receiver::new(Arc::clone(&self.dead_letters))
    }

    #[must_use]
    pub fn route(&self, target_id: &str, instance: u32) -> Option<RouteHandle> {
        let identity = RouteIdentity::new(target_id, instance);
        self.routes
            .context(&identity)
            .map(|context| RouteHandle { identity, context })
    }

    /// Attached routes in `(target_id, instance)` order.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteIdentity> {
        self.routes.identities()
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn route_metrics(&self, target_id: &str, instance: u32) -> Option<MetricsSnapshot> {
        self.route(target_id, instance).map(|route| route.metrics())
    }

    #[must_use]
    pub fn dispatcher_metrics(&self) -> MetricsSnapshot {
        self.dispatcher.metrics()
    }

    #[must_use]
    pub fn addressing_misses(&self) -> u64 {
        self.routes.misses()
    }

    #[must_use]
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Log metrics for the dispatcher and every route.
    pub fn print_metrics(&self) {
        info!(
            routes = self.route_count(),
            addressing_misses = self.addressing_misses(),
            dead_letters = self.dead_letters.len(),
            "=== System Metrics ==="
        );
        self.dispatcher.print_metrics();
        for context in self.routes.contexts() {
            context.print_metrics();
        }
    }

    /// Set the shutdown flag, stop every worker and log final metrics.
    /// Later calls do nothing.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("[Registry] Shutting down");
        self.shutdown.trigger();

        let drained = self.routes.seal();
        for (identity, entry) in &drained {
            entry.context.stop();
            debug!(route = %identity, "[Registry] Worker stopped");
        }
        self.dispatcher.stop();

        self.dispatcher.print_metrics();
        for (_, entry) in &drained {
            entry.context.print_metrics();
        }
        ROUTES_ACTIVE.sub(drained.len() as i64);
        info!(
            routes = drained.len(),
            addressing_misses = self.addressing_misses(),
            "[Registry] Shutdown complete"
        );
    }
}

impl Drop for RoutingRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RoutingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingRegistry")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
