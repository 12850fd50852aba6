//! # Shutdown Signal
//!
//! Process-wide stop flag, set once and observed by every channel's waits.
//! Triggering it wakes all blocked senders and receivers on every live
//! channel so each blocked thread can re-evaluate and exit.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Something that must be woken when shutdown is triggered.
pub(crate) trait ShutdownObserver: Send + Sync {
    /// Wake every waiter. Called after the flag is already set.
    fn on_shutdown(&self);
}

struct Inner {
    triggered: AtomicBool,
    observers: Mutex<Vec<Weak<dyn ShutdownObserver>>>,
}

/// Shared, cloneable handle to the global shutdown flag.
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    /// Create a new, untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Whether shutdown has been signaled.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Set the flag and wake every observer.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn trigger(&self) -> bool {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }

        let observers: Vec<_> = self
            .inner
            .observers
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        debug!(observers = observers.len(), "Shutdown triggered, waking waiters");
        for observer in observers {
            observer.on_shutdown();
        }
        true
    }

    /// Register an observer. Dead observers are pruned on the way.
    pub(crate) fn observe(&self, observer: Weak<dyn ShutdownObserver>) {
        let mut observers = self.inner.observers.lock();
        observers.retain(|o| o.strong_count() > 0);
        observers.push(observer);
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .lock()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}
