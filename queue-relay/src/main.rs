use std::sync::Arc;

use anyhow::{Context, Result};
use queue_relay::{
    relay::{Relay, RelayConfig, RelayExit},
    types::Environment,
};
use simpleq::{ConnectionProvider, ListenerConfig, Queue, RedisClient};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let env = Environment::from_env();
    info!("Starting Queue Relay in {:?} environment", env);

    let provider: Arc<dyn ConnectionProvider> =
        Arc::new(RedisClient::new(&env.redis_url()).context("Invalid REDIS_URL")?);

    let source = Queue::open(Arc::clone(&provider), env.source_queue())
        .await
        .context("Failed to open source queue")?;
    let destination = Queue::open(Arc::clone(&provider), env.destination_queue())
        .await
        .context("Failed to open destination queue")?;

    info!("✅ Connected to Redis");

    // Spawn signal handler
    let shutdown_token = CancellationToken::new();
    let signal_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                signal_shutdown.cancel();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });

    let config = RelayConfig {
        listener: ListenerConfig::new(env.poll_interval()),
        max_consecutive_errors: env.max_consecutive_errors(),
    };
    let report = Relay::new(source, destination, config, shutdown_token)
        .run()
        .await?;

    if report.exit == RelayExit::TooManyErrors {
        anyhow::bail!("Relay stopped after {} errors", report.errors);
    }

    info!("✅ Queue Relay shutdown complete");
    Ok(())
}
