//! # Keycast Runtime
//!
//! Worker contexts, the routing registry and the adapters that connect
//! them to settings and to the platform.
//!
//! ## Modular Structure
//!
//! - `ports/` - contracts for target resolution, input injection, bindings
//! - `context/` - worker lifecycle, dispatcher and input-sender behaviors
//! - `registry/` - route table, attach/detach, delivery
//! - `adapters/` - settings file, static resolver, injectors, key names
//! - `container/` - configuration and composition root

pub mod adapters;
pub mod container;
pub mod context;
pub mod ports;
pub mod registry;

pub use container::{Runtime, RuntimeConfig, RuntimeError};
pub use context::{ContextError, ContextState, MetricsSnapshot, WorkerContext};
pub use registry::{AttachError, DeliveryReport, DetachError, RegistryConfig, RouteHandle, RoutingRegistry};
