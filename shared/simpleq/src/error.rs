use std::time::Duration;

use thiserror::Error;

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Error types for queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// Transport or protocol failure talking to Redis
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A blocking pop gave up waiting for an element
    #[error("Timed out after {0:?} waiting for an element")]
    Timeout(Duration),

    /// The queue's connection has already been closed
    #[error("Queue {0} is closed")]
    Closed(String),
}

impl QueueError {
    /// Checks if this error comes from the connection rather than from the command
    #[must_use]
    pub fn is_connectivity_error(&self) -> bool {
        match self {
            Self::Redis(err) => {
                err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
            }
            Self::Timeout(_) | Self::Closed(_) => false,
        }
    }
}
