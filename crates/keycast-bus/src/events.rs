//! # Bus Events
//!
//! Defines the event type that flows through every channel, its opcodes,
//! and the route identity used to address it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload prefix for key-press events.
pub const KEY_PRESS_PREFIX: &str = "Key pressed: ";

/// Event opcode.
///
/// Integer codes are stable; unknown codes survive a round trip as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum Command {
    /// Internal ping-pong traffic.
    Ping,
    /// Inject one key into the addressed target.
    KeyPress,
    /// Acknowledgement sent back to the dispatcher by an input worker.
    Ack,
    /// A detected trigger, consumed by the dispatcher.
    Trigger,
    /// Opcode with no known meaning.
    Other(u32),
}

impl Command {
    /// Integer opcode for this command.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Ping => 1,
            Self::KeyPress => 2,
            Self::Ack => 3,
            Self::Trigger => 4,
            Self::Other(code) => code,
        }
    }
}

impl From<u32> for Command {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::Ping,
            2 => Self::KeyPress,
            3 => Self::Ack,
            4 => Self::Trigger,
            other => Self::Other(other),
        }
    }
}

impl From<Command> for u32 {
    fn from(command: Command) -> Self {
        command.code()
    }
}

/// Identity of one addressable inbound route: `(target_id, instance)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteIdentity {
    target_id: String,
    instance: u32,
}

impl RouteIdentity {
    /// Create a route identity.
    pub fn new(target_id: impl Into<String>, instance: u32) -> Self {
        Self {
            target_id: target_id.into(),
            instance,
        }
    }

    /// Destination group.
    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Instance number within the group.
    #[must_use]
    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Canonical string key, `"<target_id>:<instance>"`.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RouteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_id, self.instance)
    }
}

/// How an event is addressed, derived from `target_id` / `target_instance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing<'a> {
    /// No explicit destination (internal ping-pong, triggers, acks).
    Unaddressed,
    /// Every instance currently registered under the target id.
    Broadcast(&'a str),
    /// Exactly one route.
    Exact(&'a str, u32),
}

/// The unit transferred on a channel.
///
/// Immutable once built; ownership moves producer -> channel -> consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    command: Command,
    sequence_id: u64,
    payload: String,
    target_id: String,
    target_instance: i32,
    #[serde(default)]
    delay_after_ms: u64,
}

impl Event {
    /// Create an unaddressed event.
    pub fn new(command: Command, sequence_id: u64, payload: impl Into<String>) -> Self {
        Self {
            command,
            sequence_id,
            payload: payload.into(),
            target_id: String::new(),
            target_instance: -1,
            delay_after_ms: 0,
        }
    }

    /// Key-press event for `key`, addressed to `target_id` / `target_instance`.
    pub fn key_press(
        sequence_id: u64,
        key: &str,
        target_id: impl Into<String>,
        target_instance: i32,
    ) -> Self {
        Self::new(
            Command::KeyPress,
            sequence_id,
            format!("{KEY_PRESS_PREFIX}{key}"),
        )
        .addressed_to(target_id, target_instance)
    }

    /// Trigger event carrying the trigger name.
    pub fn trigger(sequence_id: u64, name: impl Into<String>) -> Self {
        Self::new(Command::Trigger, sequence_id, name)
    }

    /// Set the destination. `target_instance < 0` means broadcast.
    #[must_use]
    pub fn addressed_to(mut self, target_id: impl Into<String>, target_instance: i32) -> Self {
        self.target_id = target_id.into();
        self.target_instance = target_instance;
        self
    }

    /// Pause the consumer for `delay_ms` after it handles this event.
    #[must_use]
    pub fn with_delay_after(mut self, delay_ms: u64) -> Self {
        self.delay_after_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn command(&self) -> Command {
        self.command
    }

    #[must_use]
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// `-1` for broadcast, otherwise the exact instance.
    #[must_use]
    pub fn target_instance(&self) -> i32 {
        self.target_instance
    }

    #[must_use]
    pub fn delay_after_ms(&self) -> u64 {
        self.delay_after_ms
    }

    /// Addressing mode of this event.
    #[must_use]
    pub fn addressing(&self) -> Addressing<'_> {
        if self.target_id.is_empty() {
            return Addressing::Unaddressed;
        }
        match u32::try_from(self.target_instance) {
            Ok(instance) => Addressing::Exact(&self.target_id, instance),
            Err(_) => Addressing::Broadcast(&self.target_id),
        }
    }

    /// Whether a route with identity `route` should handle this event.
    #[must_use]
    pub fn is_addressed_to(&self, route: &RouteIdentity) -> bool {
        match self.addressing() {
            Addressing::Unaddressed => false,
            Addressing::Broadcast(target_id) => target_id == route.target_id(),
            Addressing::Exact(target_id, instance) => {
                target_id == route.target_id() && instance == route.instance()
            }
        }
    }

    /// Key name carried by a key-press payload.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        if self.command != Command::KeyPress {
            return None;
        }
        self.payload
            .strip_prefix(KEY_PRESS_PREFIX)
            .filter(|key| !key.is_empty())
    }
}
