//! Environment configuration for different deployment stages

use std::{env, time::Duration};

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses a local Redis)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Returns the Redis URL holding the queues
    ///
    /// # Panics
    ///
    /// Panics if the `REDIS_URL` environment variable is not set in production/staging
    #[must_use]
    pub fn redis_url(&self) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var("REDIS_URL").expect("REDIS_URL environment variable is not set")
            }
            Self::Development => {
                env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
            }
        }
    }

    /// Returns the key of the queue elements are taken from
    ///
    /// # Panics
    ///
    /// Panics if the `RELAY_SOURCE_QUEUE` environment variable is not set in production/staging
    #[must_use]
    pub fn source_queue(&self) -> String {
        match self {
            Self::Production | Self::Staging => env::var("RELAY_SOURCE_QUEUE")
                .expect("RELAY_SOURCE_QUEUE environment variable is not set"),
            Self::Development => {
                env::var("RELAY_SOURCE_QUEUE").unwrap_or_else(|_| "relay:inbox".to_string())
            }
        }
    }

    /// Returns the key of the queue elements are moved onto
    ///
    /// # Panics
    ///
    /// Panics if the `RELAY_DESTINATION_QUEUE` environment variable is not set in production/staging
    #[must_use]
    pub fn destination_queue(&self) -> String {
        match self {
            Self::Production | Self::Staging => env::var("RELAY_DESTINATION_QUEUE")
                .expect("RELAY_DESTINATION_QUEUE environment variable is not set"),
            Self::Development => env::var("RELAY_DESTINATION_QUEUE")
                .unwrap_or_else(|_| "relay:outbox".to_string()),
        }
    }

    /// Returns how long each blocking poll of the listener waits
    ///
    /// # Panics
    ///
    /// Panics if `RELAY_POLL_INTERVAL_MS` is set but is not a valid u64
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        let millis = env::var("RELAY_POLL_INTERVAL_MS").map_or(1000, |v| {
            v.parse()
                .expect("RELAY_POLL_INTERVAL_MS environment variable is not a valid u64")
        });
        Duration::from_millis(millis)
    }

    /// Returns how many errors in a row stop the relay, 0 to never stop on errors
    ///
    /// # Panics
    ///
    /// Panics if `RELAY_MAX_CONSECUTIVE_ERRORS` is set but is not a valid u32
    #[must_use]
    pub fn max_consecutive_errors(&self) -> u32 {
        let default = match self {
            Self::Production | Self::Staging => 5,
            Self::Development => 0,
        };

        env::var("RELAY_MAX_CONSECUTIVE_ERRORS").map_or(default, |v| {
            v.parse()
                .expect("RELAY_MAX_CONSECUTIVE_ERRORS environment variable is not a valid u32")
        })
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Staging => write!(f, "staging"),
            Self::Development => write!(f, "development"),
        }
    }
}
