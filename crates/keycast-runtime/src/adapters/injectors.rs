//! Input injectors that do not touch a desktop session.

use super::keys::KeyCode;
use crate::ports::{InjectError, InputInjector, TargetHandle};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::info;

/// Logs each injection instead of performing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInjector;

impl InputInjector for LoggingInjector {
    fn inject(&self, target: TargetHandle, key: KeyCode) -> Result<(), InjectError> {
        info!(
            handle = ?target,
            %key,
            virtual_code = key.virtual_code(),
            "Key press"
        );
        Ok(())
    }
}

/// One recorded call to [`RecordingInjector::inject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Injection {
    pub target: TargetHandle,
    pub key: KeyCode,
}

/// Records successful injections; can be told to fail for given targets.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    injections: Mutex<Vec<Injection>>,
    failing: Mutex<HashSet<TargetHandle>>,
}

impl RecordingInjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later injection into `target` fail.
    pub fn fail_for(&self, target: TargetHandle) {
        self.failing.lock().insert(target);
    }

    #[must_use]
    pub fn injections(&self) -> Vec<Injection> {
        self.injections.lock().clone()
    }

    /// Keys injected into `target`, in order.
    #[must_use]
    pub fn keys_for(&self, target: TargetHandle) -> Vec<KeyCode> {
        self.injections
            .lock()
            .iter()
            .filter(|i| i.target == target)
            .map(|i| i.key)
            .collect()
    }
}

impl InputInjector for RecordingInjector {
    fn inject(&self, target: TargetHandle, key: KeyCode) -> Result<(), InjectError> {
        if self.failing.lock().contains(&target) {
            return Err(InjectError::InvalidTarget(target));
        }
        self.injections.lock().push(Injection { target, key });
        Ok(())
    }
}
