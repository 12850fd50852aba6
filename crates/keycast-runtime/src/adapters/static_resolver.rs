//! Resolver backed by an in-memory table.

use super::settings::ProcessConfig;
use crate::ports::{TargetHandle, TargetResolver};
use keycast_bus::RouteIdentity;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// First synthetic handle handed out by [`StaticResolver::from_processes`].
const SYNTHETIC_HANDLE_BASE: u64 = 0x1_0000;

/// Maps route identities to handles. Entries may be added or removed at
/// runtime, e.g. when a target process appears or exits.
#[derive(Debug, Default)]
pub struct StaticResolver {
    handles: RwLock<HashMap<RouteIdentity, TargetHandle>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One synthetic handle per configured process instance.
    #[must_use]
    pub fn from_processes(processes: &[ProcessConfig]) -> Self {
        let resolver = Self::new();
        let mut next = SYNTHETIC_HANDLE_BASE;
        for process in processes {
            for instance in 0..process.instances {
                resolver.register(&process.id, instance, TargetHandle::from_raw(next));
                next += 1;
            }
        }
        resolver
    }

    #[must_use]
    pub fn with_target(self, target_id: &str, instance: u32, handle: TargetHandle) -> Self {
        self.register(target_id, instance, handle);
        self
    }

    pub fn register(&self, target_id: &str, instance: u32, handle: TargetHandle) {
        debug!(target_id, instance, ?handle, "Target registered");
        self.handles
            .write()
            .insert(RouteIdentity::new(target_id, instance), handle);
    }

    pub fn unregister(&self, target_id: &str, instance: u32) -> Option<TargetHandle> {
        self.handles
            .write()
            .remove(&RouteIdentity::new(target_id, instance))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TargetResolver for StaticResolver {
    fn resolve(&self, target_id: &str, instance: u32) -> Option<TargetHandle> {
        self.handles
            .read()
            .get(&RouteIdentity::new(target_id, instance))
            .copied()
    }
}
