//! # Keycast Bus - Addressed Bounded-Queue Message Bus
//!
//! Point-to-point channels that connect independently running worker threads.
//!
//! ## Layout
//!
//! ```text
//!   producer thread                                  consumer thread
//! ┌────────────────┐      ┌──────────────────┐      ┌────────────────┐
//! │     Sender     │ ───► │  BoundedChannel  │ ───► │    Receiver    │
//! │ send_message() │      │  FIFO, capacity  │      │ receive_batch()│
//! │ send_batch()   │      │  not_empty/full  │      │                │
//! └────────────────┘      └────────┬─────────┘      └────────────────┘
//!                                  │ observes
//!                         ┌────────▼─────────┐
//!                         │  ShutdownSignal  │  (process-wide, set once)
//!                         └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Strict FIFO within one channel, nothing across channels.
//! - Length never exceeds capacity; a full channel is backpressure, not a fault.
//! - Shutdown and per-channel close wake every blocked waiter.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod channel;
pub mod events;
pub mod publisher;
pub mod shutdown;
pub mod subscriber;

pub use channel::{BoundedChannel, SendError, TrySendError};
pub use events::{Addressing, Command, Event, RouteIdentity, KEY_PRESS_PREFIX};
pub use publisher::{BatchSendError, Sender};
pub use shutdown::ShutdownSignal;
pub use subscriber::Receiver;

/// Maximum events buffered per channel before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Events drained per `receive_batch` call by worker loops.
pub const DEFAULT_BATCH_SIZE: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }

    #[test]
    fn test_default_batch_size_fits_capacity() {
        assert!(DEFAULT_BATCH_SIZE <= DEFAULT_CHANNEL_CAPACITY);
    }
}
