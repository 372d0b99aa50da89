use redis::{AsyncCommands, RedisError, Script};

use crate::{ConditionalIncrement, LimitStore, StoreUnavailable, TiergateRedisClient};

const INCREMENT_LUA: &str = r#"
    local key = KEYS[1]
    local expires_at = tonumber(ARGV[1])

    local count = redis.call("INCR", key)
    redis.call("EXPIREAT", key, expires_at)

    return count
"#;

const INCREMENT_IF_BELOW_LUA: &str = r#"
    local key = KEYS[1]
    local expires_at = tonumber(ARGV[1])
    local limit = tonumber(ARGV[2])

    -- an absent record always admits the increment
    local current = redis.call("GET", key)
    if current and tonumber(current) >= limit then
        return -1
    end

    local count = redis.call("INCR", key)
    redis.call("EXPIREAT", key, expires_at)

    return count
"#;

/// A [`LimitStore`] backed by Redis.
///
/// Counters and minute marks are plain Redis strings. Both increments run as Lua
/// scripts, so each one is a single atomic step on the server and concurrent workers
/// never lose updates.
///
/// # Requirements
///
/// - **Redis version:** >= 2.6.0 (Lua `EVAL`; the scripts use only `GET`, `INCR`, `EXPIREAT`)
/// - **Runtime:** Tokio or Smol (via `redis-tokio` or `redis-smol` features)
///
/// # Expiry
///
/// Counters are given an absolute expiry with `EXPIREAT`. Redis reclaims them on its
/// own; an `expires_at` in the past makes Redis drop the record right away.
///
/// # Examples
///
/// ```ignore
/// use tiergate::{RedisLimitStore, TiergateRedisClient};
///
/// let client = redis::Client::open("redis://127.0.0.1:6379/")?;
/// let store = RedisLimitStore::new(TiergateRedisClient::from_client(client, 4).await?);
/// ```
#[derive(Debug, Clone)]
pub struct RedisLimitStore {
    client: TiergateRedisClient,
    increment_script: Script,
    increment_if_below_script: Script,
}

impl RedisLimitStore {
    /// Create a store that issues commands over `client`.
    pub fn new(client: TiergateRedisClient) -> Self {
        Self {
            client,
            increment_script: Script::new(INCREMENT_LUA),
            increment_if_below_script: Script::new(INCREMENT_IF_BELOW_LUA),
        }
    }
}

impl LimitStore for RedisLimitStore {
    async fn get_counter(&self, key: &str) -> Result<Option<u64>, StoreUnavailable> {
        let mut connection_manager = self.client.get();

        let result: Result<Option<u64>, RedisError> = connection_manager.get(key).await;
        result.map_err(|err| StoreUnavailable::new("get_counter", key, err))
    }

    async fn get_timestamp(&self, key: &str) -> Result<Option<i64>, StoreUnavailable> {
        let mut connection_manager = self.client.get();

        let result: Result<Option<i64>, RedisError> = connection_manager.get(key).await;
        result.map_err(|err| StoreUnavailable::new("get_timestamp", key, err))
    }

    async fn set_timestamp(&self, key: &str, epoch_seconds: i64) -> Result<(), StoreUnavailable> {
        let mut connection_manager = self.client.get();

        let result: Result<(), RedisError> = connection_manager.set(key, epoch_seconds).await;
        result.map_err(|err| StoreUnavailable::new("set_timestamp", key, err))
    }

    async fn increment(&self, key: &str, expires_at: i64) -> Result<u64, StoreUnavailable> {
        let mut connection_manager = self.client.get();

        let result: Result<u64, RedisError> = self
            .increment_script
            .key(key)
            .arg(expires_at)
            .invoke_async(&mut connection_manager)
            .await;

        result.map_err(|err| StoreUnavailable::new("increment", key, err))
    }

    async fn increment_if_below(
        &self,
        key: &str,
        expires_at: i64,
        limit: u64,
    ) -> Result<ConditionalIncrement, StoreUnavailable> {
        let mut connection_manager = self.client.get();

        let result: Result<i64, RedisError> = self
            .increment_if_below_script
            .key(key)
            .arg(expires_at)
            .arg(limit)
            .invoke_async(&mut connection_manager)
            .await;

        match result {
            Ok(count) => match u64::try_from(count) {
                Ok(count) => Ok(ConditionalIncrement::Incremented(count)),
                Err(_) => Ok(ConditionalIncrement::Rejected),
            },
            Err(err) => Err(StoreUnavailable::new("increment_if_below", key, err)),
        }
    }
}
