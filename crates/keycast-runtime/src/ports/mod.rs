//! # Ports
//!
//! Narrow contracts the runtime depends on but does not implement:
//! locating a target's handle, injecting input into it, and the binding
//! table that maps triggers to action sequences.

use crate::adapters::keys::KeyCode;
use std::fmt;
use thiserror::Error;

/// Opaque destination handle supplied by a [`TargetResolver`].
///
/// The runtime never inspects it; it is only handed back to the
/// [`InputInjector`] of the route it was resolved for.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u64);

impl TargetHandle {
    /// Wrap a platform handle value.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Platform handle value, for adapters.
    #[must_use]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetHandle({:#x})", self.0)
    }
}

/// Supplies a destination handle for a route identity.
pub trait TargetResolver: Send + Sync {
    /// `None` when the target is not (or no longer) available.
    fn resolve(&self, target_id: &str, instance: u32) -> Option<TargetHandle>;
}

/// Injection failures. Never fatal for the worker loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectError {
    /// The destination no longer exists.
    #[error("target {0:?} is no longer valid")]
    InvalidTarget(TargetHandle),

    /// The platform refused the input.
    #[error("injection failed: {0}")]
    Failed(String),
}

/// Turns a logical key into a simulated input on the destination.
pub trait InputInjector: Send + Sync {
    /// Called at most once per matched key-press event.
    fn inject(&self, target: TargetHandle, key: KeyCode) -> Result<(), InjectError>;
}

/// One step of a target sequence: press `key`, then wait `delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAction {
    pub key: String,
    pub delay_ms: u64,
}

/// Actions destined for one target. `instance == -1` broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSequence {
    pub target_id: String,
    pub instance: i32,
    pub actions: Vec<KeyAction>,
}

/// A trigger and the ordered sequences it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub trigger: String,
    pub sequences: Vec<TargetSequence>,
}

/// Read-only binding table, loaded once at startup.
pub trait BindingSource: Send + Sync {
    /// All bindings, in configuration order.
    fn bindings(&self) -> &[KeyBinding];

    /// First binding whose trigger matches.
    fn binding_for(&self, trigger: &str) -> Option<&KeyBinding> {
        self.bindings().iter().find(|b| b.trigger == trigger)
    }
}

impl BindingSource for Vec<KeyBinding> {
    fn bindings(&self) -> &[KeyBinding] {
        self
    }
}
