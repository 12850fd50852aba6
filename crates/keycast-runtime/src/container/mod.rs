//! # Composition Root
//!
//! Wires settings, resolver, injector and registry into a [`Runtime`].
//! The registry is an owned value; nothing here is process-global.

pub mod config;

pub use config::{ConfigError, RuntimeConfig};

use crate::adapters::{Settings, StaticResolver};
use crate::context::ContextError;
use crate::ports::InputInjector;
use crate::registry::{AttachError, RoutingRegistry};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start dispatcher: {0}")]
    Dispatcher(#[from] ContextError),
}

/// A running registry built from settings.
pub struct Runtime {
    settings: Arc<Settings>,
    resolver: Arc<StaticResolver>,
    registry: RoutingRegistry,
}

impl Runtime {
    /// Build the registry. One synthetic target handle is registered per
    /// configured process instance; no routes are attached yet.
    pub fn new(
        config: &RuntimeConfig,
        settings: Settings,
        injector: Arc<dyn InputInjector>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;

        let settings = Arc::new(settings);
        let resolver = Arc::new(StaticResolver::from_processes(settings.processes()));
        let registry = RoutingRegistry::new(
            config.registry,
            resolver.clone(),
            injector,
            settings.clone(),
        )?;

        Ok(Self {
            settings,
            resolver,
            registry,
        })
    }

    /// Attach a route for every configured process instance. Failures are
    /// logged and skipped.
    pub fn attach_configured_routes(&self) -> Vec<AttachError> {
        let mut errors = Vec::new();
        for process in self.settings.processes() {
            for instance in 0..process.instances {
                if let Err(e) = self.registry.attach(&process.id, instance) {
                    warn!(error = %e, "Route not attached");
                    errors.push(e);
                }
            }
        }
        info!(
            routes = self.registry.route_count(),
            failed = errors.len(),
            "Configured routes attached"
        );
        errors
    }

    #[must_use]
    pub fn registry(&self) -> &RoutingRegistry {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn resolver(&self) -> &StaticResolver {
        &self.resolver
    }

    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
