use std::time::Duration;

use crate::error::StoreError;

pub mod memory;
pub mod redis_store;

/// Port for idempotency key storage.
///
/// `try_reserve` is the critical primitive: an atomic conditional insert that
/// succeeds for exactly one caller per key. A plain read-then-write check
/// would let two concurrent requests with the same key both reach the
/// gateway.
#[async_trait::async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically claim the key. Returns true when this caller now owns it.
    async fn try_reserve(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Cached response for a completed request, None while still in flight.
    async fn get_result(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn store_result(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Release a reservation so the client may retry after a failed run.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn is_duplicate(&self, key: &str) -> Result<bool, StoreError>;
}
