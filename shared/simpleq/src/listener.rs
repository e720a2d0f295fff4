use std::sync::Arc;
use std::time::Duration;

use redis::{aio::ConnectionManager, AsyncCommands};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::queue::timeout_arg;

/// Default wait of a single blocking poll
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest wait accepted for a single blocking poll
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a [`Listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// How long each blocking poll waits for an element.
    ///
    /// This bounds how long [`Listener::end`] waits for the loop to notice the request.
    pub poll_interval: Duration,
}

impl ListenerConfig {
    /// Creates a configuration, raising `poll_interval` to [`MIN_POLL_INTERVAL`] if needed
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Shutdown handshake between a listener loop and whoever wants it stopped
///
/// `end` is cancelled once to ask the loop to stop, `ended` is cancelled by the loop
/// after its cleanup.
#[derive(Debug, Default)]
pub(crate) struct ListenerSignals {
    end: CancellationToken,
    ended: CancellationToken,
}

impl ListenerSignals {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended.is_cancelled()
    }

    pub(crate) async fn ended(&self) {
        self.ended.cancelled().await;
    }

    fn request_end(&self) {
        self.end.cancel();
    }

    /// Fires both signals for a listener whose loop never started
    pub(crate) fn abandon(&self) {
        self.end.cancel();
        self.ended.cancel();
    }

    pub(crate) async fn end(&self) {
        if self.is_ended() {
            return;
        }
        self.request_end();
        self.ended().await;
    }
}

/// A listener on a queue, repeatedly calling `BRPOP` or `BRPOPLPUSH`
///
/// Elements and errors are handed over on two rendezvous channels: the loop does not
/// poll again until the previous result was received, so both channels must be
/// drained concurrently. Both channels are closed once the listener has ended.
///
/// Dropping the listener asks the loop to stop without waiting for it.
pub struct Listener {
    elements: flume::Receiver<Vec<u8>>,
    errors: flume::Receiver<QueueError>,
    signals: Arc<ListenerSignals>,
}

impl Listener {
    pub(crate) fn spawn(
        conn: ConnectionManager,
        source: String,
        destination: Option<String>,
        config: ListenerConfig,
        signals: Arc<ListenerSignals>,
    ) -> Self {
        let (elements_tx, elements_rx) = flume::bounded(0);
        let (errors_tx, errors_rx) = flume::bounded(0);

        let listen_loop = ListenLoop {
            conn,
            source,
            destination,
            poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
            elements: elements_tx,
            errors: errors_tx,
            signals: Arc::clone(&signals),
        };
        tokio::spawn(listen_loop.run());

        Self {
            elements: elements_rx,
            errors: errors_rx,
            signals,
        }
    }

    /// Elements in the order the store returned them
    #[must_use]
    pub const fn elements(&self) -> &flume::Receiver<Vec<u8>> {
        &self.elements
    }

    /// Errors from individual polls; the listener keeps polling after each one
    #[must_use]
    pub const fn errors(&self) -> &flume::Receiver<QueueError> {
        &self.errors
    }

    /// Whether the loop has exited and both channels are closed
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.signals.is_ended()
    }

    /// Stops the listener and waits until it has ended
    ///
    /// The request is picked up before the next poll, so this waits for the poll in
    /// flight and for the delivery of its result. Calling it again is a no-op.
    pub async fn end(&self) {
        self.signals.end().await;
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.signals.request_end();
    }
}

/// The loop behind a [`Listener`], owning its dedicated connection
struct ListenLoop {
    conn: ConnectionManager,
    source: String,
    destination: Option<String>,
    poll_interval: Duration,
    elements: flume::Sender<Vec<u8>>,
    errors: flume::Sender<QueueError>,
    signals: Arc<ListenerSignals>,
}

impl ListenLoop {
    async fn run(mut self) {
        info!(
            queue = %self.source,
            destination = ?self.destination,
            "Listener started"
        );

        while !self.signals.end.is_cancelled() {
            let delivered = match self.poll_once().await {
                Ok(Some(element)) => match self.elements.send_async(element).await {
                    Ok(()) => true,
                    Err(flume::SendError(element)) => {
                        // Piped elements are already on the destination
                        if self.destination.is_none() {
                            self.requeue(&element).await;
                        }
                        false
                    }
                },
                Ok(None) => true,
                Err(e) => {
                    debug!(queue = %self.source, "Listener poll failed: {e}");
                    self.errors.send_async(e).await.is_ok()
                }
            };

            if !delivered {
                warn!(queue = %self.source, "Listener receivers dropped, stopping");
                break;
            }
        }

        self.finish();
    }

    /// One blocking call; `None` when the poll interval passed without an element
    async fn poll_once(&mut self) -> QueueResult<Option<Vec<u8>>> {
        let timeout = timeout_arg(self.poll_interval);

        if let Some(destination) = &self.destination {
            let moved: Option<Vec<u8>> = redis::cmd("BRPOPLPUSH")
                .arg(&self.source)
                .arg(destination)
                .arg(&timeout)
                .query_async(&mut self.conn)
                .await?;
            return Ok(moved);
        }

        let popped: Option<(Vec<u8>, Vec<u8>)> = redis::cmd("BRPOP")
            .arg(&self.source)
            .arg(timeout)
            .query_async(&mut self.conn)
            .await?;
        Ok(popped.map(|(_key, element)| element))
    }

    /// Puts back an element popped after its receiver went away
    ///
    /// `RPUSH` returns it to the pop end, so it is the next element out.
    async fn requeue(&mut self, element: &[u8]) {
        let pushed: Result<u64, _> = self.conn.rpush(&self.source, element).await;
        match pushed {
            Ok(_) => warn!(queue = %self.source, "No receiver left, element returned to queue"),
            Err(e) => error!(
                queue = %self.source,
                "No receiver left and requeue failed, element lost: {e}"
            ),
        }
    }

    /// Drops the connection and closes both channels before signalling `ended`,
    /// so closed channels can be observed as soon as `end()` returns.
    fn finish(self) {
        let Self {
            conn,
            source,
            elements,
            errors,
            signals,
            ..
        } = self;

        drop(conn);
        drop(elements);
        drop(errors);
        signals.ended.cancel();

        info!(queue = %source, "Listener ended");
    }
}
