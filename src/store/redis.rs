//! Redis-backed store for deployments with more than one process.
//!
//! Counter increments run as a single Lua script so "add, then set expiry
//! only if the key has none" is atomic on the server. A racing second
//! "first" writer sees the expiry already set and leaves it alone.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::info;

use super::{CacheStore, CounterStore};
use crate::{HuginnError, Result};

const INCREMENT_WITH_EXPIRY: &str = r"
local value = redis.call('INCRBYFLOAT', KEYS[1], ARGV[1])
if redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return value
";

/// Shared store over a multiplexed redis connection.
pub struct RedisStore {
    conn: MultiplexedConnection,
    increment: redis::Script,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| HuginnError::Configuration(format!("invalid redis url: {e}")))?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url, "connected to redis store");
        Ok(Self {
            conn,
            increment: redis::Script::new(INCREMENT_WITH_EXPIRY),
        })
    }
}

fn whole_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, whole_seconds(ttl)).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn read(&self, key: &str) -> Result<f64> {
        let mut conn = self.conn.clone();
        let value: Option<f64> = conn.get(key).await?;
        Ok(value.unwrap_or(0.0))
    }

    async fn increment(&self, key: &str, amount: f64, ttl_if_first: Duration) -> Result<f64> {
        let mut conn = self.conn.clone();
        let raw: String = self
            .increment
            .key(key)
            .arg(amount)
            .arg(whole_seconds(ttl_if_first))
            .invoke_async(&mut conn)
            .await?;
        raw.parse::<f64>()
            .map_err(|e| HuginnError::store("redis", format!("non-numeric counter {key}: {e}")))
    }

    async fn clear(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        // Multi-key DEL is a single command, so the reset is atomic.
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}
