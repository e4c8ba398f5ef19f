use std::time::Duration;

use redis::AsyncCommands;

use crate::error::StoreError;
use crate::idempotency::IdempotencyStore;

/// Marker stored between reserve and store_result. Never returned to callers.
const RESERVED_SENTINEL: &str = "__reserved__";

#[derive(Clone)]
pub struct RedisIdempotencyStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisIdempotencyStore {
    pub fn new(redis_url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait::async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn try_reserve(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        // SET NX is the atomic check-and-reserve: only one concurrent caller
        // sees a reply.
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.storage_key(key))
            .arg(RESERVED_SENTINEL)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn get_result(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.storage_key(key)).await?;
        match raw {
            Some(s) if s == RESERVED_SENTINEL => Ok(None),
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn store_result(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let body = serde_json::to_string(value)?;
        let _: () = conn.set_ex(self.storage_key(key), body, ttl.as_secs()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: i64 = conn.del(self.storage_key(key)).await?;
        Ok(())
    }

    async fn is_duplicate(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = conn.exists(self.storage_key(key)).await?;
        Ok(exists)
    }
}
