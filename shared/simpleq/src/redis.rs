use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use tracing::debug;

use crate::error::QueueResult;

/// Hands out dedicated Redis connections
///
/// Every call must return a connection that is not shared with any previous caller,
/// so a blocking command on one connection never stalls commands on another.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Opens a new dedicated connection
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Redis` if the connection cannot be established
    async fn connect(&self) -> QueueResult<ConnectionManager>;
}

/// Redis client that opens one connection manager per caller
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
}

impl RedisClient {
    /// Create a new Redis client
    ///
    /// # Errors
    /// Returns an error if the Redis URL is invalid
    pub fn new(url: &str) -> QueueResult<Self> {
        let client = Client::open(url)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ConnectionProvider for RedisClient {
    async fn connect(&self) -> QueueResult<ConnectionManager> {
        let connection_manager = ConnectionManager::new(self.client.clone()).await?;
        debug!("Opened dedicated Redis connection");

        Ok(connection_manager)
    }
}
