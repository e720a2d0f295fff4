use anyhow::Context;
use simpleq::{Listener, ListenerConfig, Queue, QueueError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Settings for a [`Relay`]
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Listener configuration for the source queue
    pub listener: ListenerConfig,
    /// Errors in a row after which the relay stops, 0 to never stop on errors
    pub max_consecutive_errors: u32,
}

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The shutdown token was cancelled
    Shutdown,
    /// Too many polls failed in a row
    TooManyErrors,
    /// The listener closed its channels on its own
    ListenerEnded,
}

/// Summary of a finished relay run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    /// Elements moved onto the destination
    pub relayed: u64,
    /// Errors received from the listener
    pub errors: u64,
    /// Why the relay stopped
    pub exit: RelayExit,
}

/// `Relay` moves every element of a source queue onto a destination queue
pub struct Relay {
    source: Queue,
    destination: Queue,
    config: RelayConfig,
    shutdown_token: CancellationToken,
}

impl Relay {
    /// Creates a new `Relay`
    #[must_use]
    pub const fn new(
        source: Queue,
        destination: Queue,
        config: RelayConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            destination,
            config,
            shutdown_token,
        }
    }

    /// Runs until shutdown, or until too many consecutive errors, then closes both queues
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be started.
    pub async fn run(self) -> anyhow::Result<RelayReport> {
        info!(
            "Relaying {} -> {}",
            self.source.key(),
            self.destination.key()
        );

        let listener = self
            .source
            .listen_pipe_with(&self.destination, self.config.listener)
            .await
            .context("Failed to start listener")?;

        let mut report = self.drain(&listener).await;
        self.end_listener(&listener, &mut report).await;

        self.source.close().await;
        self.destination.close().await;

        info!(
            "Relay stopped ({:?}): {} relayed, {} errors",
            report.exit, report.relayed, report.errors
        );
        Ok(report)
    }

    /// Receives from both listener channels until it is time to stop
    async fn drain(&self, listener: &Listener) -> RelayReport {
        let mut relayed = 0;
        let mut errors = 0;
        let mut consecutive_errors = 0;

        let exit = loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Relay received shutdown signal");
                    break RelayExit::Shutdown;
                }
                element = listener.elements().recv_async() => {
                    let Ok(element) = element else {
                        break RelayExit::ListenerEnded;
                    };
                    relayed += 1;
                    consecutive_errors = 0;
                    info!(
                        "Relayed element of {} bytes onto {}",
                        element.len(),
                        self.destination.key()
                    );
                }
                err = listener.errors().recv_async() => {
                    let Ok(err) = err else {
                        break RelayExit::ListenerEnded;
                    };
                    errors += 1;
                    consecutive_errors += 1;
                    self.log_error(&err, consecutive_errors);

                    if self.config.max_consecutive_errors > 0
                        && consecutive_errors >= self.config.max_consecutive_errors
                    {
                        error!("Giving up after {} consecutive errors", consecutive_errors);
                        break RelayExit::TooManyErrors;
                    }
                }
            }
        };

        RelayReport {
            relayed,
            errors,
            exit,
        }
    }

    /// Ends the listener while still receiving whatever it delivers meanwhile,
    /// since it cannot finish while a delivery is pending
    async fn end_listener(&self, listener: &Listener, report: &mut RelayReport) {
        let ending = listener.end();
        tokio::pin!(ending);

        loop {
            tokio::select! {
                () = &mut ending => break,
                Ok(_element) = listener.elements().recv_async() => {
                    report.relayed += 1;
                }
                Ok(err) = listener.errors().recv_async() => {
                    report.errors += 1;
                    warn!("Polling {} failed while stopping: {}", self.source.key(), err);
                }
            }
        }
    }

    fn log_error(&self, err: &QueueError, consecutive_errors: u32) {
        if err.is_connectivity_error() {
            error!(
                "Lost connection while polling {} ({} in a row): {}",
                self.source.key(),
                consecutive_errors,
                err
            );
        } else {
            warn!(
                "Polling {} failed ({} in a row): {}",
                self.source.key(),
                consecutive_errors,
                err
            );
        }
    }
}
