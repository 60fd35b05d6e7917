//! Configuration types for the mock server.

mod auth;
mod listen;
mod protocol;
mod rate_limit;
mod relay;
mod request_log;

use std::path::{Path, PathBuf};

use anyhow::Context;

use serde::{Deserialize, Serialize};

pub use auth::AuthConfig;
pub use listen::{ListenConfig, TlsConfig};
pub use protocol::Protocol;
pub use rate_limit::{RateLimitConfig, RedisConfig};
pub use relay::RelayConfig;
pub use request_log::{RequestLogBackend, RequestLogConfig};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub request_log: RequestLogConfig,
    /// YAML file with teams, projects, urls and mock contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<PathBuf>,
}

impl Config {
    /// Parse and validate a YAML config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating, for callers that apply overrides first.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.protocol == Protocol::Https && self.listen.tls.is_none() {
            anyhow::bail!(
                "TLS configuration is required when listener protocol is 'https'. \
                 Please provide 'listen.tls.cert_path' and 'listen.tls.key_path'"
            );
        }

        if self.rate_limit.max_requests == 0 {
            anyhow::bail!("'rate_limit.max_requests' must be greater than zero");
        }
        if self.rate_limit.window_seconds == 0 {
            anyhow::bail!("'rate_limit.window_seconds' must be greater than zero");
        }
        match self.rate_limit.backend.as_str() {
            "inmemory" => {}
            "redis" => {
                if self.rate_limit.redis.is_none() {
                    anyhow::bail!(
                        "Redis rate limit backend selected but no 'rate_limit.redis' section provided"
                    );
                }
            }
            other => anyhow::bail!(
                "Unknown rate limit backend: '{other}'. Supported: inmemory, redis"
            ),
        }

        if self.relay.timeout_secs == 0 {
            anyhow::bail!("'relay.timeout_secs' must be greater than zero");
        }

        if self.auth.enabled
            && self
                .auth
                .jwt_secret
                .as_deref()
                .map_or(true, |secret| secret.is_empty())
        {
            anyhow::bail!(
                "Authentication is enabled but no JWT secret is configured. \
                 Set 'auth.jwt_secret' or JWT_SECRET_KEY, or disable auth"
            );
        }

        if self.request_log.backend == RequestLogBackend::Jsonl && self.request_log.path.is_none() {
            anyhow::bail!("'request_log.path' is required for the jsonl request log backend");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn valid() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("secret".to_string());
        config
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
listen:
  port: 9000
  trust_forwarded_for: true
rate_limit:
  max_requests: 5
  window_seconds: 30
relay:
  timeout_secs: 3
auth:
  jwt_secret: "s3cret"
request_log:
  backend: jsonl
  path: /tmp/requests.jsonl
definitions: ./mocks.yaml
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.port, 9000);
        assert_eq!(config.listen.host, "0.0.0.0");
        assert!(config.listen.trust_forwarded_for);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_seconds, 30);
        assert_eq!(config.rate_limit.key_prefix, "ratelimit:global");
        assert_eq!(config.relay.timeout_secs, 3);
        assert_eq!(config.relay.connect_timeout_secs, 5);
        assert!(config.auth.enabled);
        assert_eq!(config.request_log.backend, RequestLogBackend::Jsonl);
        assert_eq!(config.definitions, Some(PathBuf::from("./mocks.yaml")));
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.rate_limit.backend, "inmemory");
        assert_eq!(config.relay.timeout_secs, 10);
        assert_eq!(config.request_log.capacity, 10_000);
    }

    #[test]
    fn test_parse_redis_backend() {
        let yaml = r#"
rate_limit:
  backend: redis
  redis:
    url: "redis://localhost:6379"
auth:
  enabled: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let redis = config.rate_limit.redis.as_ref().unwrap();
        assert_eq!(redis.pool_size, 10);
        assert_eq!(redis.key_prefix, "");
        config.validate().unwrap();
    }

    #[test]
    fn test_https_requires_tls() {
        let mut config = valid();
        config.listen.protocol = Protocol::Https;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("TLS configuration is required"));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = valid();
        config.rate_limit.max_requests = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.rate_limit.window_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.relay.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redis_backend_requires_section() {
        let mut config = valid();
        config.rate_limit.backend = "redis".to_string();
        assert_err!(config.validate());

        config.rate_limit.redis = Some(RedisConfig::new("redis://localhost:6379"));
        assert_ok!(config.validate());

        config.rate_limit.backend = "memcached".to_string();
        assert_err!(config.validate());
    }

    #[test]
    fn test_auth_requires_secret_unless_disabled() {
        let mut config = Config::default();
        assert_err!(config.validate());

        config.auth.jwt_secret = Some(String::new());
        assert_err!(config.validate());

        config.auth.enabled = false;
        assert_ok!(config.validate());
    }

    #[test]
    fn test_jsonl_requires_path() {
        let mut config = valid();
        config.request_log.backend = RequestLogBackend::Jsonl;
        assert!(config.validate().is_err());

        config.request_log.path = Some(PathBuf::from("/tmp/log.jsonl"));
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen:\n  port: 7070\nauth:\n  enabled: false").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.listen.port, 7070);
        assert!(!config.auth.enabled);
    }

    #[test]
    fn test_read_file_defers_validation() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen:\n  port: 7071").unwrap();

        assert!(Config::from_file(file.path()).is_err());
        let config = Config::read_file(file.path()).unwrap();
        assert_eq!(config.listen.port, 7071);
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = Config::read_file("/nonexistent/mockapi.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/mockapi.yaml"));
    }
}
