//! Fixed-window rate limiting.
//!
//! Each key owns a counter that starts a window on its first hit:
//!
//! ```text
//! INCR key        -> n
//! n == 1          -> EXPIRE key window
//! n >  limit      -> limited
//! ```
//!
//! Stores that can run both steps as one unit override
//! [`CounterStore::incr_with_ttl`] so a key never outlives its window.
//!
//! Bursts of up to `2 * limit` across a window boundary are possible. A
//! backend failure is reported as an error, never as "allowed".

mod inmemory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use inmemory::InMemoryCounterStore;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisCounterStore;

use crate::config::RateLimitConfig;
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Backend-agnostic counter storage with expiry.
///
/// Synchronous so that the Redis implementation can use a blocking pooled
/// client; the limiter moves calls onto the blocking thread pool.
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key`, creating it at 1 when absent or expired.
    fn incr(&self, key: &str) -> Result<i64>;

    /// Expire `key` after `seconds`. Zero expires it immediately.
    fn expire(&self, key: &str, seconds: u64) -> Result<()>;

    /// Increment `key`, starting a `seconds` window when the count is 1.
    fn incr_with_ttl(&self, key: &str, seconds: u64) -> Result<i64> {
        let count = self.incr(key)?;
        if count == 1 {
            self.expire(key, seconds)?;
        }
        Ok(count)
    }
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit backend failed: {0}")]
    Backend(String),
    #[error("rate limit task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Create a counter store for the configured backend
pub fn create_counter_store(config: &RateLimitConfig) -> Result<Arc<dyn CounterStore>> {
    match config.backend.as_str() {
        "inmemory" => {
            tracing::info!("Using in-memory rate limit counters");
            Ok(Arc::new(InMemoryCounterStore::new()))
        }
        "redis" => {
            let redis_config = config.redis.as_ref().ok_or_else(|| {
                anyhow::anyhow!("Redis backend selected but no redis config provided")
            })?;

            #[cfg(feature = "redis-backend")]
            {
                use anyhow::Context;

                let store = RedisCounterStore::new(
                    &redis_config.url,
                    redis_config.pool_size,
                    redis_config.key_prefix.clone(),
                )
                .context("Failed to create Redis rate limit backend")?;
                tracing::info!("Using redis rate limit counters (url={})", redis_config.url);
                Ok(Arc::new(store))
            }

            #[cfg(not(feature = "redis-backend"))]
            {
                let _ = redis_config;
                Err(anyhow::anyhow!(
                    "Redis backend not available. Compile with --features redis-backend"
                ))
            }
        }
        other => Err(anyhow::anyhow!("Unknown rate limit backend: '{other}'")),
    }
}

/// `prefix:ip`, the key of the per-caller global window.
pub fn rate_limit_key(prefix: &str, ip: &str) -> String {
    [prefix, ip].join(":")
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max_requests: u64,
    window_seconds: u64,
    key_prefix: String,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            max_requests: config.max_requests,
            window_seconds: config.window_seconds,
            key_prefix: config.key_prefix.clone(),
        }
    }

    /// Count one hit against `key` and report whether it is over `limit`.
    ///
    /// Usable with any key, e.g. a per-project window, though the pipeline
    /// only enforces the global one.
    pub async fn check_and_increment(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RateLimitError> {
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let outcome = tokio::task::spawn_blocking(move || -> Result<(i64, bool)> {
            let count = store.incr_with_ttl(&key, window_seconds)?;
            Ok((count, count > limit))
        })
        .await?;

        match outcome {
            Ok((count, limited)) => {
                debug!(count, limit, limited, "Rate limit checked");
                Ok(limited)
            }
            Err(e) => Err(RateLimitError::Backend(format!("{e:#}"))),
        }
    }

    /// Check the global per-IP window.
    pub async fn check_global(&self, ip: &str) -> Result<bool, RateLimitError> {
        let key = rate_limit_key(&self.key_prefix, ip);
        self.check_and_increment(&key, self.max_requests, self.window_seconds)
            .await
    }
}
