use std::time::Duration;

use redis::AsyncCommands;
use tracing::debug;

use crate::error::QueueResult;
use crate::queue::{timeout_arg, Queue};
use crate::scripts::SAFE_PULL_PIPE;

/// Result of a conditional move between two queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The element was removed from the source and pushed onto the destination
    Moved {
        /// Length of the destination right after the push
        destination_len: u64,
    },
    /// The source did not contain the element; neither queue changed
    NotMoved,
}

impl TransferOutcome {
    /// Decodes the safe pull-pipe script reply: 0 or the destination length
    const fn from_script_reply(reply: u64) -> Self {
        if reply == 0 {
            Self::NotMoved
        } else {
            Self::Moved {
                destination_len: reply,
            }
        }
    }

    /// Whether the element was moved
    #[must_use]
    pub const fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }

    /// The destination length after the move, or 0 if nothing was moved
    #[must_use]
    pub const fn destination_len(&self) -> u64 {
        match self {
            Self::Moved { destination_len } => *destination_len,
            Self::NotMoved => 0,
        }
    }
}

impl Queue {
    /// Pops the oldest element and pushes it onto `destination` atomically
    ///
    /// Returns the moved element, or `None` if this queue was empty.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the command fails
    pub async fn pop_pipe(&self, destination: &Self) -> QueueResult<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        Ok(conn.rpoplpush(self.key(), destination.key()).await?)
    }

    /// Blocks until an element can be moved onto `destination`
    ///
    /// A zero `timeout` blocks indefinitely. Unlike [`Queue::blocking_pop`], a timeout
    /// is not an error: it returns `None`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the command fails
    pub async fn blocking_pop_pipe(
        &self,
        destination: &Self,
        timeout: Duration,
    ) -> QueueResult<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        Ok(redis::cmd("BRPOPLPUSH")
            .arg(self.key())
            .arg(destination.key())
            .arg(timeout_arg(timeout))
            .query_async(&mut conn)
            .await?)
    }

    /// Removes `element` from this queue and pushes it onto `destination` in one transaction
    ///
    /// Returns the length of `destination`.
    ///
    /// Note: the push happens whether or not the element was found in this queue.
    /// Use [`Queue::safe_pull_pipe`] to move only elements that were present.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the transaction fails
    pub async fn pull_pipe(&self, destination: &Self, element: &[u8]) -> QueueResult<u64> {
        let mut conn = self.conn()?;
        let (removed, destination_len): (u64, u64) = redis::pipe()
            .atomic()
            .lrem(self.key(), -1, element)
            .lpush(destination.key(), element)
            .query_async(&mut conn)
            .await?;

        if removed == 0 {
            debug!(
                queue = %self.key(),
                destination = %destination.key(),
                "Pull-pipe pushed an element that was not in the source"
            );
        }

        Ok(destination_len)
    }

    /// Moves `element` onto `destination` only if this queue contained it
    ///
    /// Runs as a single script on the store, so the check and both writes are atomic.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the script fails
    pub async fn safe_pull_pipe(
        &self,
        destination: &Self,
        element: &[u8],
    ) -> QueueResult<TransferOutcome> {
        let mut conn = self.conn()?;
        let reply: u64 = SAFE_PULL_PIPE
            .key(self.key())
            .key(destination.key())
            .arg(element)
            .invoke_async(&mut conn)
            .await?;

        Ok(TransferOutcome::from_script_reply(reply))
    }
}
