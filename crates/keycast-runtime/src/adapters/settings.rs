//! # Settings
//!
//! JSON settings file: the processes to drive and the key bindings.
//!
//! ```json
//! {
//!   "processes": [
//!     { "id": "Game", "path": "C:/game.exe", "args": ["-w"], "instances": 2, "window_sequence": 1 }
//!   ],
//!   "key_bindings": [
//!     { "trigger_key": "A",
//!       "sequences": [
//!         { "process": "Game", "instance": -1,
//!           "actions": [ { "key": "X", "delay": 50 }, { "key": "Enter" } ] }
//!       ] }
//!   ]
//! }
//! ```

use super::keys::KeyCode;
use crate::ports::{BindingSource, KeyAction, KeyBinding, TargetSequence};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// A process whose windows receive key presses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_count")]
    pub instances: u32,
    /// Which of the process's top-level windows receives input (1-based).
    #[serde(default = "default_count")]
    pub window_sequence: u32,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    processes: Vec<ProcessConfig>,
    #[serde(default)]
    key_bindings: Vec<BindingEntry>,
}

#[derive(Debug, Deserialize)]
struct BindingEntry {
    trigger_key: String,
    #[serde(default)]
    sequences: Vec<SequenceEntry>,
}

#[derive(Debug, Deserialize)]
struct SequenceEntry {
    process: String,
    #[serde(default = "broadcast")]
    instance: i32,
    #[serde(default)]
    actions: Vec<ActionEntry>,
}

fn broadcast() -> i32 {
    -1
}

#[derive(Debug, Deserialize)]
struct ActionEntry {
    key: String,
    #[serde(default)]
    delay: u64,
}

/// Validated settings. Doubles as the runtime's binding source.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    processes: Vec<ProcessConfig>,
    bindings: Vec<KeyBinding>,
}

impl Settings {
    /// Read and validate a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading settings");
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate settings JSON.
    pub fn parse(json: &str) -> Result<Self, SettingsError> {
        let file: SettingsFile = serde_json::from_str(json)?;

        let bindings = file
            .key_bindings
            .into_iter()
            .map(|binding| KeyBinding {
                trigger: binding.trigger_key,
                sequences: binding
                    .sequences
                    .into_iter()
                    .map(|seq| TargetSequence {
                        target_id: seq.process,
                        instance: seq.instance,
                        actions: seq
                            .actions
                            .into_iter()
                            .map(|a| KeyAction {
                                key: a.key,
                                delay_ms: a.delay,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        let settings = Self {
            processes: file.processes,
            bindings,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        for process in &self.processes {
            if process.id.trim().is_empty() {
                return Err(SettingsError::Invalid("process with empty id".into()));
            }
            if process.window_sequence == 0 {
                return Err(SettingsError::Invalid(format!(
                    "process {}: window_sequence starts at 1",
                    process.id
                )));
            }
        }

        for binding in &self.bindings {
            if binding.trigger.is_empty() {
                return Err(SettingsError::Invalid("binding with empty trigger_key".into()));
            }
            for seq in &binding.sequences {
                if seq.target_id.trim().is_empty() {
                    return Err(SettingsError::Invalid(format!(
                        "binding {}: sequence with empty process",
                        binding.trigger
                    )));
                }
                if seq.instance < -1 {
                    return Err(SettingsError::Invalid(format!(
                        "binding {}: instance {} (use -1 for all instances)",
                        binding.trigger, seq.instance
                    )));
                }
                if seq.actions.is_empty() {
                    return Err(SettingsError::Invalid(format!(
                        "binding {}: sequence for {} has no actions",
                        binding.trigger, seq.target_id
                    )));
                }
                if let Some(action) = seq
                    .actions
                    .iter()
                    .find(|a| KeyCode::from_name(&a.key).is_none())
                {
                    return Err(SettingsError::Invalid(format!(
                        "binding {}: unknown key {:?}",
                        binding.trigger, action.key
                    )));
                }
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn processes(&self) -> &[ProcessConfig] {
        &self.processes
    }

    /// Log a summary of processes and bindings.
    pub fn log_summary(&self) {
        for process in &self.processes {
            info!(
                id = %process.id,
                path = %process.path,
                instances = process.instances,
                window_sequence = process.window_sequence,
                args = ?process.args,
                "Process"
            );
        }
        for binding in &self.bindings {
            for seq in &binding.sequences {
                let keys: Vec<&str> = seq.actions.iter().map(|a| a.key.as_str()).collect();
                info!(
                    trigger = %binding.trigger,
                    target_id = %seq.target_id,
                    instance = seq.instance,
                    keys = ?keys,
                    "Key binding"
                );
            }
        }
    }
}

impl BindingSource for Settings {
    fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }
}
