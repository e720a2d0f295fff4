//! Shared setup for integration tests against a local Redis

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use pretty_assertions::assert_eq;
use simpleq::{ConnectionProvider, Queue, RedisClient};
use uuid::Uuid;

/// Setup test environment variables and tracing
fn setup_test_env() {
    // Load test environment variables if exists, otherwise use defaults
    dotenvy::from_path(".env.test").ok();

    // Initialize tracing for tests
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Turns a string literal into an element
pub fn b(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

/// Asserts the queue holds exactly `expected`, newest first
pub async fn assert_list(queue: &Queue, expected: &[&str]) {
    let listed = queue.list().await.expect("Failed to list queue");
    let listed: Vec<String> = listed
        .iter()
        .map(|el| String::from_utf8_lossy(el).into_owned())
        .collect();
    assert_eq!(listed, expected, "Unexpected contents of {}", queue.key());
}

/// Test context handing out queues on unique keys
pub struct TestContext {
    pub provider: Arc<dyn ConnectionProvider>,
    queues: Vec<String>,
}

impl TestContext {
    /// Create a new test context with a Redis client
    pub fn new() -> Result<Self> {
        setup_test_env();

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let provider: Arc<dyn ConnectionProvider> = Arc::new(RedisClient::new(&redis_url)?);

        Ok(Self {
            provider,
            queues: Vec::new(),
        })
    }

    /// Opens a queue on a fresh key
    pub async fn queue(&mut self, test_name: &str) -> Result<Queue> {
        let key = format!("simpleq-test:{test_name}:{}", Uuid::new_v4());
        self.queues.push(key.clone());
        Ok(Queue::open(Arc::clone(&self.provider), key).await?)
    }

    /// Opens a queue on a fresh key through a custom provider
    pub async fn queue_with_provider(
        &mut self,
        test_name: &str,
        provider: Arc<dyn ConnectionProvider>,
    ) -> Result<Queue> {
        let key = format!("simpleq-test:{test_name}:{}", Uuid::new_v4());
        self.queues.push(key.clone());
        Ok(Queue::open(provider, key).await?)
    }

    /// Deletes every key handed out by this context
    pub async fn cleanup(&self) -> Result<()> {
        for key in &self.queues {
            let queue = Queue::open(Arc::clone(&self.provider), key.clone()).await?;
            queue.clear().await?;
            queue.close().await;
        }
        Ok(())
    }
}
