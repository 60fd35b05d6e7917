//! Global rate limit and counter backend configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests allowed per caller IP within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_backend_type")]
    pub backend: String, // "inmemory" or "redis"
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

fn default_max_requests() -> u64 {
    100
}

fn default_window_seconds() -> u64 {
    60
}

fn default_key_prefix() -> String {
    "ratelimit:global".to_string()
}

fn default_backend_type() -> String {
    "inmemory".to_string()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
            key_prefix: default_key_prefix(),
            backend: default_backend_type(),
            redis: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,
    /// Prepended to every counter key, empty by default
    #[serde(default)]
    pub key_prefix: String,
}

fn default_redis_pool_size() -> usize {
    10
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: default_redis_pool_size(),
            key_prefix: String::new(),
        }
    }
}
