use super::CounterStore;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use redis::{Commands, Connection, Script};

/// INCR plus first-hit EXPIRE, run atomically on the server.
const INCR_WITH_TTL: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Simple connection manager for Redis
struct RedisConnectionManager {
    client: redis::Client,
}

impl r2d2::ManageConnection for RedisConnectionManager {
    type Connection = Mutex<Connection>;
    type Error = redis::RedisError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = self.client.get_connection()?;
        Ok(Mutex::new(conn))
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        redis::cmd("PING").query(conn.get_mut())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Redis counter store using a synchronous client behind an r2d2 pool.
///
/// Counters are shared by every server instance pointing at the same Redis,
/// so the global limit holds across a fleet.
pub struct RedisCounterStore {
    pool: r2d2::Pool<RedisConnectionManager>,
    key_prefix: String,
    windowed_incr: Script,
}

impl RedisCounterStore {
    /// Connect and verify with a PING.
    ///
    /// * `url` - Redis connection URL (e.g. "redis://localhost:6379")
    /// * `pool_size` - Connection pool size
    /// * `key_prefix` - Prepended to every key
    pub fn new(url: &str, pool_size: usize, key_prefix: String) -> Result<Self> {
        let client = redis::Client::open(url).context("Failed to parse Redis URL")?;

        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1) as u32)
            .connection_timeout(std::time::Duration::from_secs(5))
            .build(RedisConnectionManager { client })
            .context("Failed to create Redis connection pool")?;

        {
            let conn = pool.get().context("Failed to get connection from pool")?;
            let _: String = redis::cmd("PING")
                .query(&mut *conn.lock())
                .context("Failed to PING Redis")?;
        }

        tracing::info!(
            "Connected to Redis with prefix='{}', pool_size={}",
            key_prefix,
            pool_size
        );

        Ok(Self {
            pool,
            key_prefix,
            windowed_incr: Script::new(INCR_WITH_TTL),
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

impl CounterStore for RedisCounterStore {
    fn incr(&self, key: &str) -> Result<i64> {
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;

        let value: i64 = conn
            .lock()
            .incr(self.make_key(key), 1)
            .context("Redis INCR failed")?;
        Ok(value)
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<()> {
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;

        let _: () = redis::cmd("EXPIRE")
            .arg(self.make_key(key))
            .arg(seconds)
            .query(&mut *conn.lock())
            .context("Redis EXPIRE failed")?;
        Ok(())
    }

    fn incr_with_ttl(&self, key: &str, seconds: u64) -> Result<i64> {
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;

        let value: i64 = self
            .windowed_incr
            .key(self.make_key(key))
            .arg(seconds)
            .invoke(&mut *conn.lock())
            .context("Redis windowed INCR failed")?;
        Ok(value)
    }
}
