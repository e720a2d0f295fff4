use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, info};

use crate::error::{QueueError, QueueResult};
use crate::listener::{Listener, ListenerConfig, ListenerSignals};
use crate::redis::ConnectionProvider;

/// Slot holding the signals of the one listener attached to a queue
type ListenerSlot = Arc<Mutex<Option<Arc<ListenerSignals>>>>;

/// A super simple Redis-backed queue
///
/// Elements are pushed on the left of the list and popped from the right, so the
/// queue is FIFO. The queue owns its connection; a [`Listener`] gets its own.
pub struct Queue {
    key: String,
    provider: Arc<dyn ConnectionProvider>,
    conn: RwLock<Option<ConnectionManager>>,
    listener: ListenerSlot,
}

impl Queue {
    /// Opens a queue on `key` with a dedicated connection from `provider`
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Redis` if the connection cannot be established
    pub async fn open(
        provider: Arc<dyn ConnectionProvider>,
        key: impl Into<String>,
    ) -> QueueResult<Self> {
        let conn = provider.connect().await?;

        Ok(Self {
            key: key.into(),
            provider,
            conn: RwLock::new(Some(conn)),
            listener: Arc::new(Mutex::new(None)),
        })
    }

    /// The Redis key of the backing list
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Opens another handle on the same key with its own connection
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Redis` if the connection cannot be established
    pub async fn duplicate(&self) -> QueueResult<Self> {
        Self::open(Arc::clone(&self.provider), self.key.clone()).await
    }

    /// Pushes an element onto the queue, returning the new length
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the command fails
    pub async fn push(&self, element: &[u8]) -> QueueResult<u64> {
        let mut conn = self.conn()?;
        Ok(conn.lpush(&self.key, element).await?)
    }

    /// Pops the oldest element, or `None` if the queue is empty
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the command fails
    pub async fn pop(&self) -> QueueResult<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        Ok(conn.rpop(&self.key, None).await?)
    }

    /// Blocks until an element can be popped
    ///
    /// A zero `timeout` blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Unlike [`Queue::pop`], an empty queue is an error here: returns
    /// `QueueError::Timeout` once `timeout` elapses without an element.
    pub async fn blocking_pop(&self, timeout: Duration) -> QueueResult<Vec<u8>> {
        let mut conn = self.conn()?;
        let popped: Option<(Vec<u8>, Vec<u8>)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(timeout_arg(timeout))
            .query_async(&mut conn)
            .await?;

        popped
            .map(|(_key, element)| element)
            .ok_or(QueueError::Timeout(timeout))
    }

    /// Removes one occurrence of `element`, the oldest if it was pushed more than once
    ///
    /// Returns the number of elements removed (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the command fails
    pub async fn pull(&self, element: &[u8]) -> QueueResult<u64> {
        let mut conn = self.conn()?;
        Ok(conn.lrem(&self.key, -1, element).await?)
    }

    /// Lists every element, oldest last
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the command fails
    pub async fn list(&self) -> QueueResult<Vec<Vec<u8>>> {
        let mut conn = self.conn()?;
        Ok(conn.lrange(&self.key, 0, -1).await?)
    }

    /// Deletes the queue, returning the number of keys removed
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the command fails
    pub async fn clear(&self) -> QueueResult<u64> {
        let mut conn = self.conn()?;
        Ok(conn.del(&self.key).await?)
    }

    /// Starts a listener that pops elements off this queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the listener's connection fails
    ///
    /// # Panics
    ///
    /// Panics if another listener is still attached to this queue
    pub async fn listen(&self) -> QueueResult<Listener> {
        self.attach_listener(None, ListenerConfig::default()).await
    }

    /// Same as [`Queue::listen`] with a custom configuration
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the listener's connection fails
    ///
    /// # Panics
    ///
    /// Panics if another listener is still attached to this queue
    pub async fn listen_with(&self, config: ListenerConfig) -> QueueResult<Listener> {
        self.attach_listener(None, config).await
    }

    /// Starts a listener that moves elements from this queue onto `destination`
    ///
    /// Every element delivered by the listener is already on `destination`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the listener's connection fails
    ///
    /// # Panics
    ///
    /// Panics if another listener is still attached to this queue
    pub async fn listen_pipe(&self, destination: &Self) -> QueueResult<Listener> {
        self.attach_listener(Some(destination), ListenerConfig::default())
            .await
    }

    /// Same as [`Queue::listen_pipe`] with a custom configuration
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue is closed or the listener's connection fails
    ///
    /// # Panics
    ///
    /// Panics if another listener is still attached to this queue
    pub async fn listen_pipe_with(
        &self,
        destination: &Self,
        config: ListenerConfig,
    ) -> QueueResult<Listener> {
        self.attach_listener(Some(destination), config).await
    }

    /// Whether a listener is attached and has not ended yet
    #[must_use]
    pub fn has_listener(&self) -> bool {
        lock(&self.listener)
            .as_ref()
            .is_some_and(|signals| !signals.is_ended())
    }

    /// Closes the queue's connection and ends its listener, if any
    ///
    /// Waits for the listener to finish; calling it again is a no-op.
    pub async fn close(&self) {
        let conn = self
            .conn
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if conn.is_some() {
            info!(queue = %self.key, "Closing queue");
        }
        drop(conn);

        let attached = lock(&self.listener).clone();
        if let Some(signals) = attached {
            signals.end().await;
        }
    }

    /// Clone of the queue's own connection
    pub(crate) fn conn(&self) -> QueueResult<ConnectionManager> {
        self.conn
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| QueueError::Closed(self.key.clone()))
    }

    async fn attach_listener(
        &self,
        destination: Option<&Self>,
        config: ListenerConfig,
    ) -> QueueResult<Listener> {
        let signals = self.reserve_listener()?;
        let conn = match self.provider.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                // A concurrent close() may already be waiting for this listener
                signals.abandon();
                release(&self.listener, &signals);
                return Err(e);
            }
        };

        let listener = Listener::spawn(
            conn,
            self.key.clone(),
            destination.map(|queue| queue.key.clone()),
            config,
            Arc::clone(&signals),
        );
        self.release_on_end(signals);

        Ok(listener)
    }

    /// Takes the listener slot
    ///
    /// The closed check happens under the slot lock: `close` drops the connection
    /// before reading the slot, so it either sees this listener or we see it closed.
    fn reserve_listener(&self) -> QueueResult<Arc<ListenerSignals>> {
        let mut slot = lock(&self.listener);
        self.conn()?;

        let occupied = slot.as_ref().is_some_and(|signals| !signals.is_ended());
        if occupied {
            drop(slot);
            panic!("Queue {} can only have one listener", self.key);
        }

        let signals = Arc::new(ListenerSignals::new());
        *slot = Some(Arc::clone(&signals));
        Ok(signals)
    }

    fn release_on_end(&self, signals: Arc<ListenerSignals>) {
        let slot = Arc::clone(&self.listener);
        let key = self.key.clone();

        tokio::spawn(async move {
            signals.ended().await;
            release(&slot, &signals);
            debug!(queue = %key, "Listener slot released");
        });
    }
}

fn lock(slot: &ListenerSlot) -> MutexGuard<'_, Option<Arc<ListenerSignals>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empties the slot, unless a newer listener already took it
fn release(slot: &ListenerSlot, signals: &Arc<ListenerSignals>) {
    let mut slot = lock(slot);
    if slot
        .as_ref()
        .is_some_and(|attached| Arc::ptr_eq(attached, signals))
    {
        *slot = None;
    }
}

/// Formats a blocking-command timeout in seconds
///
/// Whole seconds go out as integers so servers older than Redis 6.0, which reject
/// fractional timeouts, keep working.
pub(crate) fn timeout_arg(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        timeout.as_secs().to_string()
    } else {
        timeout.as_secs_f64().to_string()
    }
}
