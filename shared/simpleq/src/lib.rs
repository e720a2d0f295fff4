//! A super simple queue backed by Redis lists
//!
//! Provides FIFO push/pop, blocking consumption through a background [`Listener`],
//! and atomic transfer of elements between queues.
//!
//! Blocking timeouts (`blocking_pop`, `blocking_pop_pipe`, the listener's poll interval)
//! are sent in seconds. Whole seconds work on any Redis version; sub-second values need
//! Redis 6.0 or later.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Error types for queue operations
pub mod error;
/// Background consumer for a queue
pub mod listener;
/// Queue handle and its list operations
pub mod queue;
/// Redis connection acquisition
pub mod redis;
/// Lua scripts executed by the store
mod scripts;
/// Atomic moves between queues
pub mod transfer;

pub use self::error::{QueueError, QueueResult};
pub use self::listener::{Listener, ListenerConfig};
pub use self::queue::Queue;
pub use self::redis::{ConnectionProvider, RedisClient};
pub use self::transfer::TransferOutcome;
