//! Redis-backed counter store.
//!
//! The increment and the expiry initialization run as one Lua script, so the
//! check-and-increment is a single indivisible operation on the Redis side
//! regardless of how many gateway processes share the store.

use super::{CounterError, CounterStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;

const INCREMENT_SCRIPT: &str = r#"
local current = redis.call('incr', KEYS[1])
if current == 1 then
    redis.call('expire', KEYS[1], ARGV[1])
end
return current
"#;

pub struct RedisCounterStore {
    conn: ConnectionManager,
    script: Script,
}

impl RedisCounterStore {
    /// Connect to the counter store at `url` (e.g. `redis://localhost:6379`).
    /// The connection manager reconnects on its own; individual command
    /// failures surface as `CounterError::Unavailable`.
    pub async fn connect(url: &str) -> Result<Self, CounterError> {
        let client =
            redis::Client::open(url).map_err(|e| CounterError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))?;
        Ok(RedisCounterStore {
            conn,
            script: Script::new(INCREMENT_SCRIPT),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterError> {
        let mut conn = self.conn.clone();
        let count: u64 = self
            .script
            .key(key)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))?;
        Ok(count)
    }
}
